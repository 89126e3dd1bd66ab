//! Flag sets (spec component C2).
//!
//! Each flag family is a small `bitflags` set with a cached combined mask.
//! `bitflags` gives us the zero-allocation `empty()`/single-flag
//! constructors and cheap union/contains for free — the struct itself
//! *is* the mask, `Copy`, no heap involved — which is what spec.md asks
//! for on hot paths like read-only transaction creation.

use bitflags::bitflags;
use libc::c_uint;

use crate::ffi;

bitflags! {
    /// Flags set at `mdb_env_open` time. A subset of these
    /// ([`EnvFlags`]) may also be flipped later via `mdb_env_set_flags`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EnvCreateFlags: c_uint {
        /// Use a fixed address for the mmap region. Highly experimental.
        const FIXED_MAP     = ffi::MDB_FIXEDMAP;
        /// Treat `path` as the data file itself rather than a directory.
        const NO_SUB_DIR    = ffi::MDB_NOSUBDIR;
        /// Don't fsync after every commit.
        const NO_SYNC       = ffi::MDB_NOSYNC;
        /// Open for reads only.
        const READ_ONLY     = ffi::MDB_RDONLY;
        /// fsync data but skip the metadata flush.
        const NO_META_SYNC  = ffi::MDB_NOMETASYNC;
        /// Use a writeable mmap; faster, fewer mallocs, no wild-write protection.
        const WRITE_MAP     = ffi::MDB_WRITEMAP;
        /// With `WRITE_MAP`, flush asynchronously.
        const MAP_ASYNC     = ffi::MDB_MAPASYNC;
        /// Tie reader slots to `MDB_txn` objects instead of to OS threads.
        const NO_TLS        = ffi::MDB_NOTLS;
        /// Skip all locking; caller must serialize access itself.
        const NO_LOCK       = ffi::MDB_NOLOCK;
        /// Disable readahead.
        const NO_READ_AHEAD = ffi::MDB_NORDAHEAD;
        /// Skip zero-filling freshly malloc'd pages.
        const NO_MEM_INIT   = ffi::MDB_NOMEMINIT;
    }
}

bitflags! {
    /// Flags that can be flipped at runtime via [`crate::Environment::set_flags`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EnvFlags: c_uint {
        const NO_SYNC       = ffi::MDB_NOSYNC;
        const NO_META_SYNC  = ffi::MDB_NOMETASYNC;
        const MAP_ASYNC     = ffi::MDB_MAPASYNC;
        const NO_MEM_INIT   = ffi::MDB_NOMEMINIT;
    }
}

bitflags! {
    /// Flags given to `mdb_dbi_open`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DbFlags: c_uint {
        /// Compare keys end-to-start instead of start-to-end.
        const REVERSE_KEY    = ffi::MDB_REVERSEKEY;
        /// Allow multiple values per key, stored sorted.
        const DUP_SORT       = ffi::MDB_DUPSORT;
        /// Keys are native-byte-order unsigned integers; all keys must be
        /// the same fixed width (4 or 8 bytes).
        const INTEGER_KEY    = ffi::MDB_INTEGERKEY;
        /// Requires `DUP_SORT`; all values for a key share one fixed size.
        const DUP_FIXED      = ffi::MDB_DUPFIXED;
        /// Requires `DUP_SORT`; values are native-byte-order integers too.
        const INTEGER_DUP    = ffi::MDB_INTEGERDUP;
        /// Requires `DUP_SORT`; compare values end-to-start.
        const REVERSE_DUP    = ffi::MDB_REVERSEDUP;
        /// Create the database if it doesn't already exist.
        const CREATE         = ffi::MDB_CREATE;
    }
}

bitflags! {
    /// Flags for `Txn::put`/`Cursor::put`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PutFlags: c_uint {
        /// Fail with `KeyExists` rather than overwriting.
        const NO_OVERWRITE = ffi::MDB_NOOVERWRITE;
        /// In a `DUP_SORT` db, fail rather than adding a duplicate value.
        const NO_DUP_DATA  = ffi::MDB_NODUPDATA;
        /// Overwrite the value for the cursor's current key only.
        const CURRENT      = ffi::MDB_CURRENT;
        /// Reserve space for the value and let the caller write into it
        /// directly (`BufferProxy::write_in_reserve`).
        const RESERVE      = ffi::MDB_RESERVE;
        /// Caller promises keys are inserted in already-sorted order.
        const APPEND       = ffi::MDB_APPEND;
        /// Like `APPEND`, for the value side of a `DUP_SORT` db.
        const APPEND_DUP   = ffi::MDB_APPENDDUP;
        /// Batch-insert several values for one key (`MDB_MULTIPLE`).
        const MULTIPLE     = ffi::MDB_MULTIPLE;
    }
}

bitflags! {
    /// Flags for `Environment::copy`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CopyFlags: c_uint {
        /// Omit free space left by deleted/overwritten entries.
        const COMPACT = ffi::MDB_CP_COMPACT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_accumulates_bits() {
        let set = EnvCreateFlags::NO_SYNC | EnvCreateFlags::NO_META_SYNC;
        assert!(set.contains(EnvCreateFlags::NO_SYNC));
        assert!(set.contains(EnvCreateFlags::NO_META_SYNC));
        assert!(!set.contains(EnvCreateFlags::WRITE_MAP));
        assert_eq!(set.bits(), ffi::MDB_NOSYNC | ffi::MDB_NOMETASYNC);
    }

    #[test]
    fn empty_is_zero_mask() {
        assert_eq!(DbFlags::empty().bits(), 0);
    }
}
