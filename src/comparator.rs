//! User-supplied key/value comparators (spec §4.8, §9 design note).
//!
//! `mdb_set_compare`/`mdb_set_dupsort` take an `extern "C" fn(*const
//! MDB_val, *const MDB_val) -> c_int` with no userdata slot — there is
//! nowhere to stash a `Box<dyn Fn>` that the callback could retrieve at
//! call time. The idiomatic answer (see `custom-key-cmp.rs` and
//! `custom-dupsort-comparator.rs`) is to implement [`Comparator`] on a
//! zero-sized marker type and let the compiler monomorphize
//! [`trampoline`] into a distinct function per `C`, so the function
//! pointer itself carries the "which comparator" information that a
//! runtime registry would otherwise need a lookup key for.

use std::cmp::Ordering;

use libc::c_int;

use crate::ffi::MDB_val;
use crate::proxy::{integer_comparator, unsigned_bytewise_compare};

/// A user-supplied ordering over raw key (or, for `mdb_set_dupsort`,
/// value) bytes. Implement this on an empty enum or unit struct — the
/// type itself is never instantiated, only named.
pub trait Comparator: 'static {
    fn compare(a: &[u8], b: &[u8]) -> Ordering;
}

/// The `extern "C" fn` LMDB actually calls. One instantiation per
/// concrete `C`, resolved at compile time — `trampoline::<StringAsInt>`
/// and `trampoline::<SomeOtherCmp>` are two distinct function pointers.
pub extern "C" fn trampoline<C: Comparator>(a: *const MDB_val, b: *const MDB_val) -> c_int {
    // SAFETY: LMDB always calls this with two valid, non-null MDB_val
    // pointers into memory that outlives the call.
    let (a, b) = unsafe {
        let a = std::slice::from_raw_parts((*a).mv_data as *const u8, (*a).mv_size as usize);
        let b = std::slice::from_raw_parts((*b).mv_data as *const u8, (*b).mv_size as usize);
        (a, b)
    };
    match C::compare(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Which comparator a [`crate::dbi::Dbi`] should install when it's
/// opened, chosen by the caller at `DatabaseBuilder` time (spec.md §4.6).
pub enum ComparatorStrategy<C: Comparator = NeverComparator> {
    /// Leave LMDB's built-in unsigned byte-wise (or integer-key, if the
    /// db flags say so) comparator in place. No `mdb_set_compare` call.
    Native,
    /// Install the proxy's own notion of its default comparator — the
    /// same ordering `Native` would produce, but routed through
    /// `BufferProxy::comparator` so a proxy with a non-byte-wise notion
    /// of its buffer type can override it.
    ProxyDefault,
    /// Install a comparator used only to drive cursor iteration order;
    /// semantically identical to `ProxyDefault` in this crate, kept as a
    /// distinct variant because callers reason about it separately (it
    /// documents *why* a comparator was installed, not *what* it does).
    IterationOnly,
    /// Install a user-supplied [`Comparator`] via [`trampoline`].
    Callback(std::marker::PhantomData<C>),
}

/// Uninhabited default type parameter for [`ComparatorStrategy`] variants
/// that don't carry a `Comparator`. Never constructed.
pub enum NeverComparator {}

impl Comparator for NeverComparator {
    fn compare(_: &[u8], _: &[u8]) -> Ordering {
        unreachable!("NeverComparator is never installed")
    }
}

/// Marker for [`ComparatorStrategy::ProxyDefault`]/`IterationOnly` when the
/// dbi's flags don't declare fixed-width integer keys: installs
/// [`unsigned_bytewise_compare`] through the same [`trampoline`] machinery
/// a user callback would use, so `Dbi::open` has one code path for
/// "install a comparator" regardless of which one.
pub enum BytewiseComparator {}

impl Comparator for BytewiseComparator {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        unsigned_bytewise_compare(a, b)
    }
}

/// Marker for `ProxyDefault`/`IterationOnly` when the dbi was opened with
/// `INTEGER_KEY`/`INTEGER_DUP`.
pub enum IntegerComparator {}

impl Comparator for IntegerComparator {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        integer_comparator(a, b)
    }
}

impl<C: Comparator> ComparatorStrategy<C> {
    pub fn callback() -> ComparatorStrategy<C> {
        ComparatorStrategy::Callback(std::marker::PhantomData)
    }
}
