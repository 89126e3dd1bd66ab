use std::env;
use std::path::PathBuf;

/// Locates a pre-built `liblmdb` and emits the right `cargo:rustc-link-*`
/// directives. Vendoring or cross-compiling the C sources themselves is out
/// of scope for this crate: callers are expected to have `liblmdb` (and its
/// headers, if they need them) available through their system package
/// manager, or to point us at a custom location via env vars.
fn main() {
    println!("cargo:rerun-if-env-changed=LMDB_LIB_DIR");
    println!("cargo:rerun-if-env-changed=LMDB_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=LMDB_STATIC");

    if let Ok(lib_dir) = env::var("LMDB_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", lib_dir);
        let mode = if env::var_os("LMDB_STATIC").is_some() {
            "static"
        } else {
            "dylib"
        };
        println!("cargo:rustc-link-lib={}=lmdb", mode);
        return;
    }

    match pkg_config::Config::new().atleast_version("0.9").probe("lmdb") {
        Ok(_) => return,
        Err(err) => {
            println!(
                "cargo:warning=pkg-config could not find liblmdb ({err}); falling back to a bare -llmdb"
            );
        }
    }

    // Last resort: trust the default linker search path (common on systems
    // that ship liblmdb-dev without a .pc file registered).
    let fallback: PathBuf = ["/usr/lib", "/usr/local/lib"].iter().collect();
    println!("cargo:rustc-link-search=native={}", fallback.display());
    println!("cargo:rustc-link-lib=dylib=lmdb");
}
