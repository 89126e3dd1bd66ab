//! Result-code mapping (spec component C1) and the lifecycle/buffer/misc
//! error taxonomy of §7.
//!
//! Every fallible native call is routed through [`check`]. The rest of the
//! crate layers its own lifecycle errors (state-machine violations) and
//! buffer errors (proxy contract violations) onto the same flat enum,
//! following the teacher's `MdbError` — one enum, not a hierarchy of error
//! types per concern.

use std::ffi::CStr;
use std::fmt;

use libc::c_int;

use crate::ffi;

/// All ways an operation in this crate can fail.
#[derive(Debug)]
pub enum Error {
    // --- native errors, one variant per reserved LMDB result code ---
    KeyExists,
    KeyNotFound,
    PageNotFound,
    PageCorrupted,
    Panic,
    VersionMismatch,
    FileInvalid,
    MapFull,
    DbsFull,
    ReadersFull,
    TlsFull,
    TxnFull,
    CursorFull,
    PageFull,
    MapResized,
    Incompatible,
    BadReaderLock,
    BadTxn,
    BadValueSize,
    BadDbi,
    /// Any other non-zero code LMDB returned; `errno`-shaped, not one of
    /// the reserved `[-30800, -30780]` codes.
    PlatformError(c_int, String),

    // --- lifecycle errors raised by this layer, not by LMDB ---
    AlreadyOpen,
    AlreadyClosed,
    NotOpen,
    AlreadyCommitted,
    AlreadyAborted,
    AlreadyReset,
    NotReset,
    ReadOnlyRequired,
    ReadWriteRequired,
    IncompatibleParent,
    EnvInUse(usize),
    InvalidCopyDestination,
    InvalidPath,

    // --- buffer errors ---
    BufferMustBeDirect,

    // --- misc ---
    IllegalState(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Translates a native LMDB result code. `rc == MDB_SUCCESS` is a
    /// programmer error — callers must have already branched on success
    /// before reaching here.
    pub fn from_code(rc: c_int) -> Error {
        debug_assert_ne!(rc, ffi::MDB_SUCCESS, "Error::from_code called with a success code");
        match rc {
            ffi::MDB_KEYEXIST => Error::KeyExists,
            ffi::MDB_NOTFOUND => Error::KeyNotFound,
            ffi::MDB_PAGE_NOTFOUND => Error::PageNotFound,
            ffi::MDB_CORRUPTED => Error::PageCorrupted,
            ffi::MDB_PANIC => Error::Panic,
            ffi::MDB_VERSION_MISMATCH => Error::VersionMismatch,
            ffi::MDB_INVALID => Error::FileInvalid,
            ffi::MDB_MAP_FULL => Error::MapFull,
            ffi::MDB_DBS_FULL => Error::DbsFull,
            ffi::MDB_READERS_FULL => Error::ReadersFull,
            ffi::MDB_TLS_FULL => Error::TlsFull,
            ffi::MDB_TXN_FULL => Error::TxnFull,
            ffi::MDB_CURSOR_FULL => Error::CursorFull,
            ffi::MDB_PAGE_FULL => Error::PageFull,
            ffi::MDB_MAP_RESIZED => Error::MapResized,
            ffi::MDB_INCOMPATIBLE => Error::Incompatible,
            ffi::MDB_BAD_RSLOT => Error::BadReaderLock,
            ffi::MDB_BAD_TXN => Error::BadTxn,
            ffi::MDB_BAD_VALSIZE => Error::BadValueSize,
            ffi::MDB_BAD_DBI => Error::BadDbi,
            other => Error::PlatformError(other, errno_message(other)),
        }
    }

    /// Whether this failure forces the owning transaction to become
    /// unusable (spec §7: "render the transaction unusable and force
    /// abort").
    pub fn poisons_transaction(&self) -> bool {
        matches!(self, Error::BadTxn | Error::Panic | Error::MapFull)
    }
}

/// Translates a raw LMDB result code, the way every FFI call site in this
/// crate does: `MDB_SUCCESS` becomes `Ok(with)`, anything else becomes a
/// mapped `Err`.
#[inline]
pub(crate) fn check<T>(rc: c_int, with: T) -> Result<T> {
    if rc == ffi::MDB_SUCCESS {
        Ok(with)
    } else {
        Err(Error::from_code(rc))
    }
}

#[inline]
pub(crate) fn check_unit(rc: c_int) -> Result<()> {
    check(rc, ())
}

fn errno_message(code: c_int) -> String {
    unsafe {
        let ptr = ffi::mdb_strerror(code);
        if ptr.is_null() {
            format!("unknown error {code}")
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyExists => write!(f, "key already exists"),
            Error::KeyNotFound => write!(f, "key not found"),
            Error::PageNotFound => write!(f, "requested page not found"),
            Error::PageCorrupted => write!(f, "page has invalid checksum"),
            Error::Panic => write!(f, "a fatal error occurred in a prior transaction"),
            Error::VersionMismatch => write!(f, "database environment version mismatch"),
            Error::FileInvalid => write!(f, "file is not an LMDB file"),
            Error::MapFull => write!(f, "environment map size limit reached"),
            Error::DbsFull => write!(f, "environment maxdbs limit reached"),
            Error::ReadersFull => write!(f, "environment maxreaders limit reached"),
            Error::TlsFull => write!(f, "thread-local storage keys exhausted"),
            Error::TxnFull => write!(f, "transaction has too many dirty pages"),
            Error::CursorFull => write!(f, "cursor stack too deep"),
            Error::PageFull => write!(f, "page has insufficient space"),
            Error::MapResized => write!(f, "environment map was resized by another process"),
            Error::Incompatible => write!(f, "operation incompatible with database flags"),
            Error::BadReaderLock => write!(f, "invalid reader locktable slot"),
            Error::BadTxn => write!(f, "transaction is not valid for this operation"),
            Error::BadValueSize => write!(f, "key/value size out of range"),
            Error::BadDbi => write!(f, "database handle is invalid"),
            Error::PlatformError(code, msg) => write!(f, "{code}: {msg}"),

            Error::AlreadyOpen => write!(f, "environment is already open"),
            Error::AlreadyClosed => write!(f, "environment is already closed"),
            Error::NotOpen => write!(f, "environment is not open yet"),
            Error::AlreadyCommitted => write!(f, "transaction was already committed"),
            Error::AlreadyAborted => write!(f, "transaction was already aborted"),
            Error::AlreadyReset => write!(f, "transaction was already reset"),
            Error::NotReset => write!(f, "transaction must be reset before renew"),
            Error::ReadOnlyRequired => write!(f, "operation requires a read-only transaction"),
            Error::ReadWriteRequired => write!(f, "operation requires a read-write transaction"),
            Error::IncompatibleParent => write!(f, "child transaction's readonly bit must match its parent's"),
            Error::EnvInUse(count) => write!(f, "environment still has {count} outstanding dependent(s)"),
            Error::InvalidCopyDestination => write!(f, "copy destination must be an existing, empty directory"),
            Error::InvalidPath => write!(f, "invalid environment path"),

            Error::BufferMustBeDirect => write!(f, "buffer does not alias off-heap memory"),
            Error::IllegalState(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
