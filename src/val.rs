//! The reusable key/value flyweight (spec component C5).
//!
//! Every transaction and cursor operation that touches LMDB needs two
//! `MDB_val` slots — one for the key, one for the value. Allocating a
//! fresh pair per call would be wasteful for something this hot, so both
//! [`crate::txn::Txn`] and [`crate::cursor::Cursor`] keep one [`KeyVal`]
//! around and overwrite its slots in place, the same way the teacher's
//! `Cursor` reuses its `key_val`/`data_val` fields across every
//! `navigate` call instead of allocating per seek.

use crate::ffi::MDB_val;
use crate::proxy::BufferProxy;

/// Two reusable `MDB_val` slots plus a marker for whether the key slot
/// currently aliases LMDB-owned memory (valid to read) or is stale from
/// a write-only operation like `MDB_SET`.
#[derive(Debug)]
pub struct KeyVal {
    pub(crate) key: MDB_val,
    pub(crate) val: MDB_val,
    key_valid: bool,
}

impl KeyVal {
    pub fn empty() -> KeyVal {
        KeyVal {
            key: MDB_val::empty(),
            val: MDB_val::empty(),
            key_valid: false,
        }
    }

    /// Marshals `key` into the key slot via `P::write_in`. Invalidates
    /// the "current key is LMDB-owned" marker, since the slot now
    /// aliases caller memory instead.
    ///
    /// # Safety
    /// `key` must stay pinned until the next LMDB call consuming this
    /// slot returns.
    pub unsafe fn key_in<P: BufferProxy>(&mut self, key: &P::Buffer<'_>) {
        P::write_in(key, &mut self.key);
        self.key_valid = false;
    }

    /// # Safety
    /// See [`KeyVal::key_in`].
    pub unsafe fn val_in<P: BufferProxy>(&mut self, val: &P::Buffer<'_>) {
        P::write_in(val, &mut self.val);
    }

    /// Reserve-style value write for `MDB_RESERVE` puts.
    ///
    /// # Safety
    /// The slot must immediately be passed to a `put` call with
    /// `MDB_RESERVE` set.
    pub unsafe fn val_in_reserve<P: BufferProxy>(&mut self, size: usize) {
        P::write_in_reserve(size, &mut self.val);
    }

    /// Builds the two-slot `MDB_val` array `mdb_cursor_put` expects when
    /// called with `MDB_MULTIPLE`: slot 0 is `(element size, pointer to
    /// the first of `elems`'s contiguous fixed-size values)`, slot 1 is
    /// `(element count, unused)`. `elems` must hold a whole number of
    /// `elem_size`-byte elements.
    ///
    /// # Safety
    /// `elems` must stay pinned until the subsequent `mdb_cursor_put`
    /// call returns.
    pub unsafe fn val_in_multi<P: BufferProxy>(buf: &P::Buffer<'_>, elem_size: usize) -> [MDB_val; 2] {
        let bytes = P::get_bytes(buf);
        debug_assert_eq!(bytes.len() % elem_size, 0, "buffer is not a whole number of elements");
        let count = bytes.len() / elem_size;
        [
            MDB_val {
                mv_size: elem_size as libc::size_t,
                mv_data: bytes.as_ptr() as *const libc::c_void,
            },
            MDB_val {
                mv_size: count as libc::size_t,
                mv_data: std::ptr::null(),
            },
        ]
    }

    pub fn clear_val(&mut self) {
        self.val = MDB_val::empty();
    }

    /// Marks the key slot as currently holding an LMDB-owned address
    /// (set after any cursor op except `MDB_SET`, per the teacher's
    /// `navigate` comment: `MDB_SET` never writes back a fresh pointer).
    pub(crate) fn mark_key_valid(&mut self, valid: bool) {
        self.key_valid = valid;
    }

    pub(crate) fn key_is_valid(&self) -> bool {
        self.key_valid
    }

    /// Reads the current key out, aliasing whatever address is in the
    /// slot right now.
    ///
    /// # Safety
    /// The slot must have been populated by a prior successful LMDB call
    /// on the same transaction and not yet invalidated by a later one.
    pub unsafe fn key_out<'a, P: BufferProxy>(&self) -> P::Buffer<'a> {
        P::read_out(&self.key)
    }

    /// # Safety
    /// See [`KeyVal::key_out`].
    pub unsafe fn val_out<'a, P: BufferProxy>(&self) -> P::Buffer<'a> {
        P::read_out(&self.val)
    }
}

impl Default for KeyVal {
    fn default() -> KeyVal {
        KeyVal::empty()
    }
}
