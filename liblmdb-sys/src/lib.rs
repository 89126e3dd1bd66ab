//! Raw, unsafe bindings to the LMDB C API.
//!
//! This crate declares the `extern "C"` surface documented in `lmdb.h` and
//! nothing more: no lifetime checking, no error translation, no ownership.
//! The safe layer lives in the `lmdb-zc` crate one level up.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

use libc::{c_char, c_int, c_uint, c_void, size_t};

pub type mdb_mode_t = libc::mode_t;
pub type mdb_filehandle_t = c_int;

pub type MDB_dbi = c_uint;

/// Opaque native environment handle. LMDB manages its layout; we only ever
/// hold a pointer to it.
#[repr(C)]
pub struct MDB_env {
    _private: [u8; 0],
}

/// Opaque native transaction handle.
#[repr(C)]
pub struct MDB_txn {
    _private: [u8; 0],
}

/// Opaque native cursor handle.
#[repr(C)]
pub struct MDB_cursor {
    _private: [u8; 0],
}

/// A size + pointer pair. This is the one struct LMDB actually shares the
/// layout of with callers: every key and value crosses the FFI boundary as
/// one of these, and the safe layer's `BufferProxy` exists specifically to
/// marshal into and out of it without copying.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MDB_val {
    pub mv_size: size_t,
    pub mv_data: *const c_void,
}

impl MDB_val {
    #[inline]
    pub const fn empty() -> MDB_val {
        MDB_val {
            mv_size: 0,
            mv_data: std::ptr::null(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct MDB_stat {
    pub ms_psize: c_uint,
    pub ms_depth: c_uint,
    pub ms_branch_pages: size_t,
    pub ms_leaf_pages: size_t,
    pub ms_overflow_pages: size_t,
    pub ms_entries: size_t,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct MDB_envinfo {
    pub me_mapaddr: *const c_void,
    pub me_mapsize: size_t,
    pub me_last_pgno: size_t,
    pub me_last_txnid: size_t,
    pub me_maxreaders: c_uint,
    pub me_numreaders: c_uint,
}

unsafe impl Send for MDB_envinfo {}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MDB_cursor_op {
    MDB_FIRST = 0,
    MDB_FIRST_DUP,
    MDB_GET_BOTH,
    MDB_GET_BOTH_RANGE,
    MDB_GET_CURRENT,
    MDB_GET_MULTIPLE,
    MDB_LAST,
    MDB_LAST_DUP,
    MDB_NEXT,
    MDB_NEXT_DUP,
    MDB_NEXT_MULTIPLE,
    MDB_NEXT_NODUP,
    MDB_PREV,
    MDB_PREV_DUP,
    MDB_PREV_NODUP,
    MDB_SET,
    MDB_SET_KEY,
    MDB_SET_RANGE,
}

pub type MDB_cmp_func = extern "C" fn(*const MDB_val, *const MDB_val) -> c_int;
pub type MDB_msg_func = extern "C" fn(*const c_char, *mut c_void) -> c_int;

// Return codes.
pub const MDB_SUCCESS: c_int = 0;
pub const MDB_KEYEXIST: c_int = -30_799;
pub const MDB_NOTFOUND: c_int = -30_798;
pub const MDB_PAGE_NOTFOUND: c_int = -30_797;
pub const MDB_CORRUPTED: c_int = -30_796;
pub const MDB_PANIC: c_int = -30_795;
pub const MDB_VERSION_MISMATCH: c_int = -30_794;
pub const MDB_INVALID: c_int = -30_793;
pub const MDB_MAP_FULL: c_int = -30_792;
pub const MDB_DBS_FULL: c_int = -30_791;
pub const MDB_READERS_FULL: c_int = -30_790;
pub const MDB_TLS_FULL: c_int = -30_789;
pub const MDB_TXN_FULL: c_int = -30_788;
pub const MDB_CURSOR_FULL: c_int = -30_787;
pub const MDB_PAGE_FULL: c_int = -30_786;
pub const MDB_MAP_RESIZED: c_int = -30_785;
pub const MDB_INCOMPATIBLE: c_int = -30_784;
pub const MDB_BAD_RSLOT: c_int = -30_783;
pub const MDB_BAD_TXN: c_int = -30_782;
pub const MDB_BAD_VALSIZE: c_int = -30_781;
pub const MDB_BAD_DBI: c_int = -30_780;

// Write flags.
pub const MDB_NOOVERWRITE: c_uint = 0x10;
pub const MDB_NODUPDATA: c_uint = 0x20;
pub const MDB_CURRENT: c_uint = 0x40;
pub const MDB_RESERVE: c_uint = 0x1_0000;
pub const MDB_APPEND: c_uint = 0x2_0000;
pub const MDB_APPENDDUP: c_uint = 0x4_0000;
pub const MDB_MULTIPLE: c_uint = 0x8_0000;

// Database flags.
pub const MDB_REVERSEKEY: c_uint = 0x02;
pub const MDB_DUPSORT: c_uint = 0x04;
pub const MDB_INTEGERKEY: c_uint = 0x08;
pub const MDB_DUPFIXED: c_uint = 0x10;
pub const MDB_INTEGERDUP: c_uint = 0x20;
pub const MDB_REVERSEDUP: c_uint = 0x40;
pub const MDB_CREATE: c_uint = 0x4_0000;

// Environment flags.
pub const MDB_FIXEDMAP: c_uint = 0x01;
pub const MDB_NOSUBDIR: c_uint = 0x4000;
pub const MDB_NOSYNC: c_uint = 0x1_0000;
pub const MDB_RDONLY: c_uint = 0x2_0000;
pub const MDB_NOMETASYNC: c_uint = 0x4_0000;
pub const MDB_WRITEMAP: c_uint = 0x8_0000;
pub const MDB_MAPASYNC: c_uint = 0x10_0000;
pub const MDB_NOTLS: c_uint = 0x20_0000;
pub const MDB_NOLOCK: c_uint = 0x40_0000;
pub const MDB_NORDAHEAD: c_uint = 0x80_0000;
pub const MDB_NOMEMINIT: c_uint = 0x100_0000;

// Copy flags.
pub const MDB_CP_COMPACT: c_uint = 0x01;

#[allow(dead_code)]
#[link(name = "lmdb")]
extern "C" {
    pub fn mdb_version(major: *mut c_int, minor: *mut c_int, patch: *mut c_int) -> *const c_char;
    pub fn mdb_strerror(err: c_int) -> *const c_char;

    pub fn mdb_env_create(env: *mut *mut MDB_env) -> c_int;
    pub fn mdb_env_open(env: *mut MDB_env, path: *const c_char, flags: c_uint, mode: mdb_mode_t) -> c_int;
    pub fn mdb_env_copy2(env: *mut MDB_env, path: *const c_char, flags: c_uint) -> c_int;
    pub fn mdb_env_copyfd2(env: *mut MDB_env, fd: mdb_filehandle_t, flags: c_uint) -> c_int;
    pub fn mdb_env_stat(env: *mut MDB_env, stat: *mut MDB_stat) -> c_int;
    pub fn mdb_env_info(env: *mut MDB_env, info: *mut MDB_envinfo) -> c_int;
    pub fn mdb_env_sync(env: *mut MDB_env, force: c_int) -> c_int;
    pub fn mdb_env_close(env: *mut MDB_env);
    pub fn mdb_env_set_flags(env: *mut MDB_env, flags: c_uint, onoff: c_int) -> c_int;
    pub fn mdb_env_get_flags(env: *mut MDB_env, flags: *mut c_uint) -> c_int;
    pub fn mdb_env_get_path(env: *mut MDB_env, path: *mut *const c_char) -> c_int;
    pub fn mdb_env_get_fd(env: *mut MDB_env, fd: *mut mdb_filehandle_t) -> c_int;
    pub fn mdb_env_set_mapsize(env: *mut MDB_env, size: size_t) -> c_int;
    pub fn mdb_env_set_maxreaders(env: *mut MDB_env, readers: c_uint) -> c_int;
    pub fn mdb_env_get_maxreaders(env: *mut MDB_env, readers: *mut c_uint) -> c_int;
    pub fn mdb_env_set_maxdbs(env: *mut MDB_env, dbs: MDB_dbi) -> c_int;
    pub fn mdb_env_get_maxkeysize(env: *mut MDB_env) -> c_int;
    pub fn mdb_reader_check(env: *mut MDB_env, dead: *mut c_int) -> c_int;
    pub fn mdb_reader_list(env: *mut MDB_env, func: MDB_msg_func, ctx: *mut c_void) -> c_int;

    pub fn mdb_txn_begin(env: *mut MDB_env, parent: *mut MDB_txn, flags: c_uint, txn: *mut *mut MDB_txn) -> c_int;
    pub fn mdb_txn_env(txn: *mut MDB_txn) -> *mut MDB_env;
    pub fn mdb_txn_id(txn: *mut MDB_txn) -> size_t;
    pub fn mdb_txn_commit(txn: *mut MDB_txn) -> c_int;
    pub fn mdb_txn_abort(txn: *mut MDB_txn);
    pub fn mdb_txn_reset(txn: *mut MDB_txn);
    pub fn mdb_txn_renew(txn: *mut MDB_txn) -> c_int;

    pub fn mdb_dbi_open(txn: *mut MDB_txn, name: *const c_char, flags: c_uint, dbi: *mut MDB_dbi) -> c_int;
    pub fn mdb_stat(txn: *mut MDB_txn, dbi: MDB_dbi, stat: *mut MDB_stat) -> c_int;
    pub fn mdb_dbi_flags(txn: *mut MDB_txn, dbi: MDB_dbi, flags: *mut c_uint) -> c_int;
    pub fn mdb_dbi_close(env: *mut MDB_env, dbi: MDB_dbi);
    pub fn mdb_drop(txn: *mut MDB_txn, dbi: MDB_dbi, del: c_int) -> c_int;
    pub fn mdb_set_compare(txn: *mut MDB_txn, dbi: MDB_dbi, cmp: MDB_cmp_func) -> c_int;
    pub fn mdb_set_dupsort(txn: *mut MDB_txn, dbi: MDB_dbi, cmp: MDB_cmp_func) -> c_int;

    pub fn mdb_get(txn: *mut MDB_txn, dbi: MDB_dbi, key: *const MDB_val, data: *mut MDB_val) -> c_int;
    pub fn mdb_put(txn: *mut MDB_txn, dbi: MDB_dbi, key: *mut MDB_val, data: *mut MDB_val, flags: c_uint) -> c_int;
    pub fn mdb_del(txn: *mut MDB_txn, dbi: MDB_dbi, key: *const MDB_val, data: *const MDB_val) -> c_int;

    pub fn mdb_cursor_open(txn: *mut MDB_txn, dbi: MDB_dbi, cursor: *mut *mut MDB_cursor) -> c_int;
    pub fn mdb_cursor_close(cursor: *mut MDB_cursor);
    pub fn mdb_cursor_renew(txn: *mut MDB_txn, cursor: *mut MDB_cursor) -> c_int;
    pub fn mdb_cursor_get(
        cursor: *mut MDB_cursor,
        key: *mut MDB_val,
        data: *mut MDB_val,
        op: MDB_cursor_op,
    ) -> c_int;
    pub fn mdb_cursor_put(cursor: *mut MDB_cursor, key: *mut MDB_val, data: *mut MDB_val, flags: c_uint) -> c_int;
    pub fn mdb_cursor_del(cursor: *mut MDB_cursor, flags: c_uint) -> c_int;
    pub fn mdb_cursor_count(cursor: *mut MDB_cursor, countp: *mut size_t) -> c_int;

    pub fn mdb_cmp(txn: *mut MDB_txn, dbi: MDB_dbi, a: *const MDB_val, b: *const MDB_val) -> c_int;
    pub fn mdb_dcmp(txn: *mut MDB_txn, dbi: MDB_dbi, a: *const MDB_val, b: *const MDB_val) -> c_int;
}
