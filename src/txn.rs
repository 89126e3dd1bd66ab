//! Scoped units of consistency (spec component C7).
//!
//! A [`Txn`] is either a read-only snapshot or a pending read-write
//! mutation, generalizing the teacher's `Transaction`/`ReadonlyTransaction`
//! split into one type carrying a `readonly` bit, plus the state machine
//! spec.md §4.7 adds on top of the teacher's simpler
//! `Normal/Released/Invalid` enum: `ACTIVE -> {COMMITTED, ABORTED}` and
//! `ACTIVE -> RESET -> (renew) -> ACTIVE` for read-only transactions.

use std::cell::{Cell, RefCell};
use std::ptr;
use std::rc::Rc;

use crate::dbi::Dbi;
use crate::error::{check_unit, Error, Result};
use crate::ffi;
use crate::flags::PutFlags;
use crate::proxy::BufferProxy;
use crate::val::KeyVal;
use crate::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Reset,
    Committed,
    Aborted,
}

/// A read-only or read-write transaction. Not `Send`/`Sync`: the raw
/// `*mut MDB_txn` handle makes that the default, which is exactly the
/// thread-affinity spec.md §5 requires ("a write transaction is bound to
/// the thread that created it").
pub struct Txn {
    env: Environment,
    handle: *mut ffi::MDB_txn,
    readonly: bool,
    state: Cell<TxnState>,
    kv: RefCell<KeyVal>,
    /// Set (and shared with any child) while this write transaction has
    /// an uncommitted child outstanding — spec.md §3: "a write
    /// Transaction has at most one uncommitted child at a time".
    child_active: Rc<Cell<bool>>,
    /// Present only on a transaction that is itself a child: clearing
    /// this on commit/abort/drop releases the parent's `child_active`
    /// latch.
    parent_latch: Option<Rc<Cell<bool>>>,
}

impl Environment {
    /// Begins a read-only transaction.
    pub fn txn_read(&self) -> Result<Txn> {
        Txn::begin(self, true, ptr::null_mut())
    }

    /// Begins a read-write transaction. Blocks until the environment's
    /// single writer lock is free (spec.md §5).
    pub fn txn_write(&self) -> Result<Txn> {
        Txn::begin(self, false, ptr::null_mut())
    }
}

impl Txn {
    fn begin(env: &Environment, readonly: bool, parent: *mut ffi::MDB_txn) -> Result<Txn> {
        env.enter()?;
        let mut handle: *mut ffi::MDB_txn = ptr::null_mut();
        let flags: libc::c_uint = if readonly { ffi::MDB_RDONLY } else { 0 };
        let rc = unsafe { ffi::mdb_txn_begin(env.raw()?, parent, flags, &mut handle) };
        if rc != ffi::MDB_SUCCESS {
            env.leave();
            return Err(Error::from_code(rc));
        }
        log::debug!("began {} txn", if readonly { "read-only" } else { "read-write" });
        Ok(Txn {
            env: env.clone(),
            handle,
            readonly,
            state: Cell::new(TxnState::Active),
            kv: RefCell::new(KeyVal::empty()),
            child_active: Rc::new(Cell::new(false)),
            parent_latch: None,
        })
    }

    fn begin_child(&self, readonly: bool) -> Result<Txn> {
        self.require_active()?;
        if readonly != self.readonly {
            return Err(Error::IncompatibleParent);
        }
        if self.child_active.get() {
            return Err(Error::IllegalState("transaction already has an uncommitted child"));
        }
        let mut child = Txn::begin(&self.env, readonly, self.handle)?;
        self.child_active.set(true);
        child.parent_latch = Some(self.child_active.clone());
        Ok(child)
    }

    /// Opens a write child of a write transaction.
    pub fn new_child(&self) -> Result<Txn> {
        self.begin_child(false)
    }

    /// Opens a read-only child. The parent's `readonly` bit must match
    /// (spec.md §3); this is the teacher's `new_ro_child` generalized to
    /// the shared state machine.
    pub fn new_ro_child(&self) -> Result<Txn> {
        self.begin_child(true)
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub(crate) fn raw(&self) -> *mut ffi::MDB_txn {
        self.handle
    }

    fn require_active(&self) -> Result<()> {
        match self.state.get() {
            TxnState::Active => Ok(()),
            TxnState::Reset => Err(Error::NotReset),
            TxnState::Committed => Err(Error::AlreadyCommitted),
            TxnState::Aborted => Err(Error::AlreadyAborted),
        }
    }

    fn clear_parent_latch(&self) {
        if let Some(latch) = &self.parent_latch {
            latch.set(false);
        }
    }

    /// Transitions to `ABORTED` without calling `mdb_txn_abort` again if
    /// a prior native call already poisoned the transaction (spec.md §7:
    /// `BadTxn`/`Panic`/`MapFull` "render the transaction unusable and
    /// force abort").
    fn poison_if_needed(&self, err: &Error) {
        if err.poisons_transaction() && self.state.get() == TxnState::Active {
            unsafe { ffi::mdb_txn_abort(self.handle) };
            self.state.set(TxnState::Aborted);
            self.clear_parent_latch();
            self.env.leave();
        }
    }

    /// Commits the transaction, consuming it.
    pub fn commit(self) -> Result<()> {
        match self.state.get() {
            TxnState::Active => {}
            TxnState::Reset => return Err(Error::AlreadyReset),
            TxnState::Committed => return Err(Error::AlreadyCommitted),
            TxnState::Aborted => return Err(Error::AlreadyAborted),
        }
        log::debug!("commit txn");
        let rc = unsafe { ffi::mdb_txn_commit(self.handle) };
        self.state.set(TxnState::Committed);
        self.clear_parent_latch();
        self.env.leave();
        check_unit(rc)
    }

    /// Aborts the transaction, consuming it. A no-op (not an error) if
    /// already terminal, matching spec.md §8's "`close()` applied twice
    /// is a no-op" for the analogous `abort`.
    pub fn abort(self) {
        if self.state.get() == TxnState::Active || self.state.get() == TxnState::Reset {
            log::debug!("abort txn");
            unsafe { ffi::mdb_txn_abort(self.handle) };
            self.clear_parent_latch();
            self.env.leave();
        }
        self.state.set(TxnState::Aborted);
    }

    /// Releases the reader slot without destroying the handle. Read-only
    /// only; must be followed by [`Txn::renew`] before the transaction
    /// can be used again.
    pub fn reset(&self) -> Result<()> {
        if !self.readonly {
            return Err(Error::ReadOnlyRequired);
        }
        self.require_active()?;
        unsafe { ffi::mdb_txn_reset(self.handle) };
        self.state.set(TxnState::Reset);
        log::trace!("reset reader txn");
        Ok(())
    }

    /// Reacquires a reader slot for a transaction previously [`reset`](Txn::reset).
    pub fn renew(&self) -> Result<()> {
        if self.state.get() != TxnState::Reset {
            return Err(Error::NotReset);
        }
        check_unit(unsafe { ffi::mdb_txn_renew(self.handle) })?;
        self.state.set(TxnState::Active);
        log::trace!("renewed reader txn");
        Ok(())
    }

    /// Looks up `key` in `dbi`. The returned buffer aliases LMDB's memory
    /// map and is valid only until the next call on this transaction.
    pub fn get<'t, P: BufferProxy>(&'t self, dbi: &Dbi<P>, key: &P::Buffer<'_>) -> Result<P::Buffer<'t>> {
        self.require_active()?;
        let mut kv = self.kv.borrow_mut();
        unsafe { kv.key_in::<P>(key) };
        kv.clear_val();
        let rc = unsafe { ffi::mdb_get(self.handle, dbi.raw(), &mut kv.key, &mut kv.val) };
        if rc != ffi::MDB_SUCCESS {
            let err = Error::from_code(rc);
            drop(kv);
            self.poison_if_needed(&err);
            return Err(err);
        }
        Ok(unsafe { kv.val_out::<P>() })
    }

    /// Inserts or overwrites `key` -> `val` in `dbi`.
    pub fn put<P: BufferProxy>(
        &self,
        dbi: &Dbi<P>,
        key: &P::Buffer<'_>,
        val: &P::Buffer<'_>,
        flags: PutFlags,
    ) -> Result<()> {
        self.require_active()?;
        if self.readonly {
            return Err(Error::ReadWriteRequired);
        }
        let mut kv = self.kv.borrow_mut();
        unsafe {
            kv.key_in::<P>(key);
            kv.val_in::<P>(val);
        }
        let rc = unsafe { ffi::mdb_put(self.handle, dbi.raw(), &mut kv.key, &mut kv.val, flags.bits()) };
        drop(kv);
        if rc != ffi::MDB_SUCCESS {
            let err = Error::from_code(rc);
            self.poison_if_needed(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Deletes `key` (all values, in a `DUP_SORT` db) or, when `val` is
    /// given, only the matching duplicate.
    pub fn delete<P: BufferProxy>(&self, dbi: &Dbi<P>, key: &P::Buffer<'_>, val: Option<&P::Buffer<'_>>) -> Result<()> {
        self.require_active()?;
        if self.readonly {
            return Err(Error::ReadWriteRequired);
        }
        let mut kv = self.kv.borrow_mut();
        unsafe { kv.key_in::<P>(key) };
        let val_ptr = match val {
            Some(v) => {
                unsafe { kv.val_in::<P>(v) };
                &mut kv.val as *mut ffi::MDB_val
            }
            None => ptr::null_mut(),
        };
        let rc = unsafe { ffi::mdb_del(self.handle, dbi.raw(), &mut kv.key, val_ptr) };
        drop(kv);
        if rc != ffi::MDB_SUCCESS {
            let err = Error::from_code(rc);
            self.poison_if_needed(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Opens a cursor positioned on `dbi` within this transaction.
    pub fn open_cursor<'t, P: BufferProxy>(&'t self, dbi: &Dbi<P>) -> Result<crate::cursor::Cursor<'t, P>> {
        self.require_active()?;
        crate::cursor::Cursor::open(self, dbi)
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        if self.state.get() == TxnState::Active || self.state.get() == TxnState::Reset {
            unsafe { ffi::mdb_txn_abort(self.handle) };
            self.clear_parent_latch();
            self.env.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{DbFlags, EnvCreateFlags};
    use crate::proxy::SliceProxy;
    use std::path::Path;

    fn open_env(path: &Path) -> Environment {
        crate::EnvBuilder::new()
            .flags(EnvCreateFlags::empty())
            .map_size(10 * 1024 * 1024)
            .max_dbs(4)
            .open(path, 0o644)
            .unwrap()
    }

    #[test]
    fn write_txn_commits_and_is_visible_to_new_reader() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();

        let txn = env.txn_write().unwrap();
        let k: &[u8] = b"a";
        let v: &[u8] = b"1";
        txn.put(&dbi, &k, &v, PutFlags::empty()).unwrap();
        txn.commit().unwrap();

        let reader = env.txn_read().unwrap();
        let got: &[u8] = reader.get(&dbi, &k).unwrap();
        assert_eq!(got, b"1");
    }

    #[test]
    fn missing_key_is_key_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().flags(DbFlags::CREATE).open(None).unwrap();
        let reader = env.txn_read().unwrap();
        let k: &[u8] = b"missing";
        match reader.get(&dbi, &k) {
            Err(Error::KeyNotFound) => {}
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn put_on_a_readonly_txn_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        let txn = env.txn_read().unwrap();
        let k: &[u8] = b"a";
        let v: &[u8] = b"1";
        match txn.put(&dbi, &k, &v, PutFlags::empty()) {
            Err(Error::ReadWriteRequired) => {}
            other => panic!("expected ReadWriteRequired, got {other:?}"),
        }
    }

    #[test]
    fn reset_then_get_fails_until_renewed() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        let txn = env.txn_read().unwrap();
        txn.reset().unwrap();
        let k: &[u8] = b"a";
        match txn.get(&dbi, &k) {
            Err(Error::NotReset) => {}
            other => panic!("expected NotReset, got {other:?}"),
        }
        txn.renew().unwrap();
        match txn.get(&dbi, &k) {
            Err(Error::KeyNotFound) => {}
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn reset_renew_cycle_does_not_leak_reader_slots() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let txn = env.txn_read().unwrap();
        for _ in 0..1000 {
            txn.reset().unwrap();
            txn.renew().unwrap();
        }
        txn.abort();
    }

    #[test]
    fn second_concurrent_child_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let parent = env.txn_write().unwrap();
        let _child = parent.new_child().unwrap();
        match parent.new_child() {
            Err(Error::IllegalState(_)) => {}
            other => panic!("expected IllegalState, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_parent_child_readonly_bit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let parent = env.txn_write().unwrap();
        match parent.new_ro_child() {
            Err(Error::IncompatibleParent) => {}
            other => panic!("expected IncompatibleParent, got {other:?}"),
        }
    }
}
