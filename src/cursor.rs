//! Positional cursors (spec component C9).
//!
//! Generalizes the teacher's `Cursor` (`navigate`/`move_to` plus the
//! `to_first`/`to_key`/`to_next_key`/... family) into one struct
//! parameterized by [`BufferProxy`] the same way [`crate::txn::Txn`] is.
//! Every positioning method reuses a single [`KeyVal`] flyweight across
//! calls, exactly like the teacher's `Cursor` reuses its `key_val`/
//! `data_val` fields instead of allocating a fresh pair per seek.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::dbi::Dbi;
use crate::error::{check_unit, Result};
use crate::ffi::{self, MDB_cursor_op};
use crate::flags::PutFlags;
use crate::keyrange::CursorOp;
use crate::proxy::{BufferProxy, SliceProxy};
use crate::txn::Txn;
use crate::val::KeyVal;

/// A cursor positioned within one [`Dbi`] for the lifetime of the
/// borrowed [`Txn`] that opened it. Not `Send`: like `Txn`, the raw
/// handle is bound to the transaction's thread.
pub struct Cursor<'txn, P: BufferProxy = SliceProxy> {
    txn: &'txn Txn,
    handle: *mut ffi::MDB_cursor,
    kv: RefCell<KeyVal>,
    _proxy: PhantomData<fn() -> P>,
}

impl<'txn, P: BufferProxy> Cursor<'txn, P> {
    pub(crate) fn open(txn: &'txn Txn, dbi: &Dbi<P>) -> Result<Cursor<'txn, P>> {
        let mut handle: *mut ffi::MDB_cursor = std::ptr::null_mut();
        check_unit(unsafe { ffi::mdb_cursor_open(txn.raw(), dbi.raw(), &mut handle) })?;
        Ok(Cursor {
            txn,
            handle,
            kv: RefCell::new(KeyVal::empty()),
            _proxy: PhantomData,
        })
    }

    pub fn txn(&self) -> &'txn Txn {
        self.txn
    }

    /// Runs `op`, treating `MDB_NOTFOUND` as "no such entry" rather than
    /// an error — the expected, common outcome of a seek or of walking
    /// off either end of the database.
    fn navigate(&self, op: MDB_cursor_op) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        let mut kv = self.kv.borrow_mut();
        let rc = unsafe { ffi::mdb_cursor_get(self.handle, &mut kv.key, &mut kv.val, op) };
        if rc == ffi::MDB_NOTFOUND {
            return Ok(None);
        }
        check_unit(rc)?;
        kv.mark_key_valid(op != MDB_cursor_op::MDB_SET);
        let key = unsafe { kv.key_out::<P>() };
        let val = unsafe { kv.val_out::<P>() };
        Ok(Some((key, val)))
    }

    fn navigate_with_key(&self, op: MDB_cursor_op, key: &P::Buffer<'_>) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        {
            let mut kv = self.kv.borrow_mut();
            unsafe { kv.key_in::<P>(key) };
        }
        self.navigate(op)
    }

    pub fn first(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_FIRST)
    }

    pub fn last(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_LAST)
    }

    pub fn next(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_NEXT)
    }

    pub fn prev(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_PREV)
    }

    pub fn next_nodup(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_NEXT_NODUP)
    }

    pub fn prev_nodup(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_PREV_NODUP)
    }

    pub fn next_dup(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_NEXT_DUP)
    }

    pub fn prev_dup(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_PREV_DUP)
    }

    pub fn first_dup(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_FIRST_DUP)
    }

    pub fn last_dup(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_LAST_DUP)
    }

    pub fn current(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_GET_CURRENT)
    }

    /// In a `DUPFIXED` db, returns the value slot's contiguous page of
    /// same-sized duplicates for the current key as one flat buffer
    /// (not one entry per duplicate — the caller chunks it by element
    /// size, same as raw LMDB).
    pub fn get_multiple(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_GET_MULTIPLE)
    }

    /// Continues a `get_multiple` walk onto the next page of duplicates.
    pub fn next_multiple(&self) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate(MDB_cursor_op::MDB_NEXT_MULTIPLE)
    }

    /// Positions exactly on `key`. The returned key aliases the caller's
    /// own buffer (LMDB doesn't rewrite it for `MDB_SET`), so its
    /// lifetime is really bounded by `key`'s — treat the returned value
    /// buffer as the useful half of the result.
    pub fn set(&self, key: &P::Buffer<'_>) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate_with_key(MDB_cursor_op::MDB_SET, key)
    }

    /// Like [`Cursor::set`], but the key slot is rewritten to LMDB's own
    /// copy of the matched key on success.
    pub fn set_key(&self, key: &P::Buffer<'_>) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate_with_key(MDB_cursor_op::MDB_SET_KEY, key)
    }

    /// Positions on the first key `>= key`.
    pub fn set_range(&self, key: &P::Buffer<'_>) -> Result<Option<(P::Buffer<'_>, P::Buffer<'_>)>> {
        self.navigate_with_key(MDB_cursor_op::MDB_SET_RANGE, key)
    }

    /// In a `DUP_SORT` db, positions on the exact `(key, val)` pair.
    pub fn get_both(&self, key: &P::Buffer<'_>, val: &P::Buffer<'_>) -> Result<bool> {
        {
            let mut kv = self.kv.borrow_mut();
            unsafe {
                kv.key_in::<P>(key);
                kv.val_in::<P>(val);
            }
        }
        Ok(self.navigate(MDB_cursor_op::MDB_GET_BOTH)?.is_some())
    }

    /// In a `DUP_SORT` db, positions on `key` and the first value `>= val`.
    pub fn get_both_range(&self, key: &P::Buffer<'_>, val: &P::Buffer<'_>) -> Result<Option<P::Buffer<'_>>> {
        {
            let mut kv = self.kv.borrow_mut();
            unsafe {
                kv.key_in::<P>(key);
                kv.val_in::<P>(val);
            }
        }
        Ok(self.navigate(MDB_cursor_op::MDB_GET_BOTH_RANGE)?.map(|(_, v)| v))
    }

    /// Inserts at the cursor's current position (with `PutFlags::CURRENT`)
    /// or wherever `key` sorts.
    pub fn put(&self, key: &P::Buffer<'_>, val: &P::Buffer<'_>, flags: PutFlags) -> Result<()> {
        let mut kv = self.kv.borrow_mut();
        unsafe {
            kv.key_in::<P>(key);
            kv.val_in::<P>(val);
        }
        let rc = unsafe { ffi::mdb_cursor_put(self.handle, &mut kv.key, &mut kv.val, flags.bits()) };
        check_unit(rc)
    }

    /// Batch-inserts `elems` (a flat buffer of `elems.len() / elem_size`
    /// fixed-size values) under `key` in one call, requires the db to be
    /// `DUPFIXED`. Returns the number of elements LMDB reports writing.
    pub fn put_multiple(&self, key: &P::Buffer<'_>, elems: &P::Buffer<'_>, elem_size: usize) -> Result<usize> {
        let mut kv = self.kv.borrow_mut();
        unsafe { kv.key_in::<P>(key) };
        let mut data = unsafe { KeyVal::val_in_multi::<P>(elems, elem_size) };
        let rc = unsafe { ffi::mdb_cursor_put(self.handle, &mut kv.key, data.as_mut_ptr(), PutFlags::MULTIPLE.bits()) };
        check_unit(rc)?;
        Ok(data[1].mv_size as usize)
    }

    /// Deletes the entry at the cursor's current position. With
    /// `no_dup_data` set, deletes only the current value in a
    /// `DUP_SORT` db rather than every duplicate for the key.
    pub fn delete(&self, no_dup_data: bool) -> Result<()> {
        let flags = if no_dup_data { ffi::MDB_NODUPDATA } else { 0 };
        check_unit(unsafe { ffi::mdb_cursor_del(self.handle, flags) })
    }

    /// Number of values stored under the cursor's current key (1 unless
    /// the db is `DUP_SORT`).
    pub fn count(&self) -> Result<usize> {
        let mut count: libc::size_t = 0;
        check_unit(unsafe { ffi::mdb_cursor_count(self.handle, &mut count) })?;
        Ok(count as usize)
    }

    /// Rebinds this cursor to its transaction after the transaction was
    /// [renewed](crate::txn::Txn::renew).
    pub fn renew(&self) -> Result<()> {
        check_unit(unsafe { ffi::mdb_cursor_renew(self.txn.raw(), self.handle) })
    }
}

impl<'txn, P: BufferProxy> Drop for Cursor<'txn, P> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_cursor_close(self.handle) };
    }
}

/// Range-iteration support, restricted to [`SliceProxy`] per the design
/// note in `proxy.rs`: the crate ships one direct-address buffer type,
/// so [`crate::iter`] only ever needs to seek and compare raw bytes.
impl<'txn> Cursor<'txn, SliceProxy> {
    pub(crate) fn seek_raw(&self, op: CursorOp, key: Option<&[u8]>) -> Result<Option<(&[u8], &[u8])>> {
        match op {
            CursorOp::First => self.navigate(MDB_cursor_op::MDB_FIRST),
            CursorOp::Last => self.navigate(MDB_cursor_op::MDB_LAST),
            CursorOp::Next => self.navigate(MDB_cursor_op::MDB_NEXT),
            CursorOp::Prev => self.navigate(MDB_cursor_op::MDB_PREV),
            CursorOp::GetStartKey => {
                let start = key.expect("forward range start key required");
                self.navigate_with_key(MDB_cursor_op::MDB_SET_RANGE, &start)
            }
            CursorOp::GetStartKeyBackward => match key {
                Some(boundary) => self.get_start_key_backward(boundary),
                None => self.navigate(MDB_cursor_op::MDB_LAST),
            },
        }
    }

    /// Positions the cursor at the greatest key `<= start`, the
    /// "upper bound minus one" a descending walk needs to begin from.
    /// `MDB_SET_RANGE` only ever gives the smallest key `>= start`, so a
    /// landing strictly above `start` is stepped back once with
    /// `MDB_PREV`; a `start` past every key in the database (no landing
    /// at all) falls back to the database's true maximum via `MDB_LAST`.
    /// An exact landing on `start` itself lands on the *first* duplicate
    /// value LMDB's `MDB_SET_RANGE` happens to store it at, so in a
    /// `DUPSORT` db with duplicates that needs a further `MDB_LAST_DUP`
    /// to reach the last duplicate of `start` — otherwise the descending
    /// walk's first `MDB_PREV` would skip every other duplicate value of
    /// the start key entirely.
    fn get_start_key_backward(&self, start: &[u8]) -> Result<Option<(&[u8], &[u8])>> {
        match self.navigate_with_key(MDB_cursor_op::MDB_SET_RANGE, &start)? {
            Some((k, _)) if k == start => self.navigate(MDB_cursor_op::MDB_LAST_DUP),
            Some(_) => self.navigate(MDB_cursor_op::MDB_PREV),
            None => self.navigate(MDB_cursor_op::MDB_LAST),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::EnvCreateFlags;
    use crate::Environment;
    use std::path::Path;

    fn open_env(path: &Path) -> Environment {
        crate::EnvBuilder::new()
            .flags(EnvCreateFlags::empty())
            .map_size(10 * 1024 * 1024)
            .max_dbs(4)
            .open(path, 0o644)
            .unwrap()
    }

    fn seed(env: &Environment, dbi: &Dbi<SliceProxy>, pairs: &[(&[u8], &[u8])]) {
        let txn = env.txn_write().unwrap();
        for (k, v) in pairs {
            txn.put(dbi, k, v, PutFlags::empty()).unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn first_and_next_walk_forward_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[(b"b", b"2"), (b"a", b"1"), (b"c", b"3")]);

        let txn = env.txn_read().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        let (k, v) = cursor.first().unwrap().unwrap();
        assert_eq!((k, v), (&b"a"[..], &b"1"[..]));
        let (k, v) = cursor.next().unwrap().unwrap();
        assert_eq!((k, v), (&b"b"[..], &b"2"[..]));
        let (k, v) = cursor.next().unwrap().unwrap();
        assert_eq!((k, v), (&b"c"[..], &b"3"[..]));
        assert!(cursor.next().unwrap().is_none());
    }

    #[test]
    fn set_range_lands_on_successor_when_key_absent() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[(b"a", b"1"), (b"c", b"3")]);

        let txn = env.txn_read().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        let needle: &[u8] = b"b";
        let (k, _) = cursor.set_range(&needle).unwrap().unwrap();
        assert_eq!(k, b"c");
    }

    #[test]
    fn get_start_key_backward_steps_back_past_a_higher_landing() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[(b"a", b"1"), (b"c", b"3")]);

        let txn = env.txn_read().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        let (k, _) = cursor.get_start_key_backward(b"b").unwrap().unwrap();
        assert_eq!(k, b"a");
    }

    #[test]
    fn get_start_key_backward_falls_back_to_last_past_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[(b"a", b"1"), (b"c", b"3")]);

        let txn = env.txn_read().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        let (k, _) = cursor.get_start_key_backward(b"z").unwrap().unwrap();
        assert_eq!(k, b"c");
    }

    #[test]
    fn delete_removes_the_current_entry() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[(b"a", b"1")]);

        let txn = env.txn_write().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        cursor.first().unwrap().unwrap();
        cursor.delete(false).unwrap();
        assert!(cursor.first().unwrap().is_none());
    }

    #[test]
    fn put_multiple_writes_land_sorted_under_get_multiple() {
        use crate::flags::DbFlags;

        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env
            .open_db()
            .flags(DbFlags::CREATE | DbFlags::DUP_SORT | DbFlags::DUP_FIXED)
            .open(None)
            .unwrap();

        let txn = env.txn_write().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        let key: &[u8] = b"k";
        let elems: &[u8] = b"zyx";
        let written = cursor.put_multiple(&key, &elems, 1).unwrap();
        assert_eq!(written, 3);
        txn.commit().unwrap();

        let txn = env.txn_read().unwrap();
        let cursor = txn.open_cursor(&dbi).unwrap();
        cursor.set(&key).unwrap().unwrap();
        let (_, page) = cursor.get_multiple().unwrap().unwrap();
        assert_eq!(page, b"xyz", "DUP_SORT must have reordered the batch into sorted order");
        assert!(cursor.next_multiple().unwrap().is_none());
    }
}
