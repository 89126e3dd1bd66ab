//! Environment lifecycle (spec component C6).
//!
//! Generalizes the teacher's `EnvBuilder`/`Environment` split: attribute
//! setters remain a consuming builder only usable before `open`, exactly
//! as the teacher has it, but `Environment` itself gains an explicit
//! `INITIAL → OPENED → CLOSED` state machine and an atomic reference
//! counter the teacher's implicit `Arc`-drop lifecycle never needed,
//! because this crate lets a caller *ask* to close an environment rather
//! than waiting for the last handle to simply go out of scope.

use std::ffi::CString;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use libc::{c_int, c_uint};

use crate::error::{check, check_unit, Error, Result};
use crate::ffi::{self, MDB_dbi, MDB_envinfo, MDB_stat};
use crate::flags::{CopyFlags, EnvCreateFlags, EnvFlags};

/// Staged construction of an [`Environment`]. Attribute setters
/// (`map_size`, `max_readers`, `max_dbs`) are only meaningful before
/// `mdb_env_open`, which is exactly the window this builder's ownership
/// models: once `open` consumes it, there's no way to call a setter on
/// an already-open environment by accident.
#[derive(Debug, Clone, Default)]
pub struct EnvBuilder {
    flags: EnvCreateFlags,
    max_readers: Option<c_uint>,
    max_dbs: Option<MDB_dbi>,
    map_size: Option<u64>,
}

impl EnvBuilder {
    pub fn new() -> EnvBuilder {
        EnvBuilder::default()
    }

    pub fn flags(mut self, flags: EnvCreateFlags) -> EnvBuilder {
        self.flags = flags;
        self
    }

    pub fn max_readers(mut self, max_readers: u32) -> EnvBuilder {
        self.max_readers = Some(max_readers);
        self
    }

    pub fn max_dbs(mut self, max_dbs: u32) -> EnvBuilder {
        self.max_dbs = Some(max_dbs);
        self
    }

    pub fn map_size(mut self, map_size: u64) -> EnvBuilder {
        self.map_size = Some(map_size);
        self
    }

    /// Validates `path`, translates flags, and calls `mdb_env_open`.
    /// Transitions straight to OPENED on success; on failure the
    /// partially configured native handle is closed and nothing is kept
    /// around in INITIAL state (there is no retry-in-place — build a
    /// fresh `EnvBuilder` instead, matching the teacher's by-value
    /// `open` that consumes `self` either way).
    pub fn open(self, path: &Path, mode: u32) -> Result<Environment> {
        let mut handle: *mut ffi::MDB_env = ptr::null_mut();
        check_unit(unsafe { ffi::mdb_env_create(&mut handle) })?;

        if let Some(map_size) = self.map_size {
            let rc = unsafe { ffi::mdb_env_set_mapsize(handle, map_size as libc::size_t) };
            if let Err(e) = check_unit(rc) {
                unsafe { ffi::mdb_env_close(handle) };
                return Err(e);
            }
        }
        if let Some(max_readers) = self.max_readers {
            let rc = unsafe { ffi::mdb_env_set_maxreaders(handle, max_readers) };
            if let Err(e) = check_unit(rc) {
                unsafe { ffi::mdb_env_close(handle) };
                return Err(e);
            }
        }
        if let Some(max_dbs) = self.max_dbs {
            let rc = unsafe { ffi::mdb_env_set_maxdbs(handle, max_dbs) };
            if let Err(e) = check_unit(rc) {
                unsafe { ffi::mdb_env_close(handle) };
                return Err(e);
            }
        }

        let path_str = path.to_str().ok_or(Error::InvalidPath)?;
        let c_path = CString::new(path_str).map_err(|_| Error::InvalidPath)?;

        let rc = unsafe { ffi::mdb_env_open(handle, c_path.as_ptr(), self.flags.bits(), mode as ffi::mdb_mode_t) };
        if rc != ffi::MDB_SUCCESS {
            unsafe { ffi::mdb_env_close(handle) };
            return Err(Error::from_code(rc));
        }

        log::debug!("opened environment at {}", path.display());
        Ok(Environment::from_raw(handle))
    }
}

/// Sentinel `state` value meaning the environment has been closed. Any
/// other value is the live count of outstanding transactions and
/// non-transactional cursors.
const CLOSED: usize = usize::MAX;

/// `INITIAL` is represented by [`EnvBuilder`]; this struct only tracks the
/// two states reachable after a successful `open`.
///
/// `closed` and the reference count used to be two independent atomics —
/// that let a concurrent `enter()` observe "not yet closed" and increment
/// the count *after* `close()` had already checked the count was zero and
/// torn down the native handle, handing out a lease on a closed
/// environment. Folding both into one `AtomicUsize` (a live count, or the
/// `CLOSED` sentinel) makes the "count==0 open -> closed" transition in
/// spec.md §5 a single atomic compare-exchange instead of two separate
/// checks with a window between them.
#[derive(Debug)]
struct EnvInner {
    handle: *mut ffi::MDB_env,
    state: AtomicUsize,
}

unsafe impl Send for EnvInner {}
unsafe impl Sync for EnvInner {}

impl Drop for EnvInner {
    fn drop(&mut self) {
        if self.state.load(AtomicOrdering::Acquire) != CLOSED {
            unsafe { ffi::mdb_env_close(self.handle) };
        }
    }
}

/// A live LMDB environment. Cheap to clone (it's a handle around
/// `Arc<EnvInner>`, the way the teacher's `Environment` is a clonable
/// handle around `Arc<EnvHandle>`); every clone shares the same
/// reference counter and native handle.
#[derive(Debug, Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

impl Environment {
    pub fn new() -> EnvBuilder {
        EnvBuilder::new()
    }

    fn from_raw(handle: *mut ffi::MDB_env) -> Environment {
        Environment {
            inner: Arc::new(EnvInner {
                handle,
                state: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn raw(&self) -> Result<*mut ffi::MDB_env> {
        if self.inner.state.load(AtomicOrdering::Acquire) == CLOSED {
            Err(Error::AlreadyClosed)
        } else {
            Ok(self.inner.handle)
        }
    }

    /// Registers a new dependent (transaction or non-transactional
    /// cursor), failing if the environment is already closed. Loops on a
    /// `compare_exchange` instead of a plain `fetch_add` so the "is it
    /// closed" check and the increment happen as one atomic step — a
    /// `fetch_add` would happily increment past the `CLOSED` sentinel if
    /// it raced with `close()`.
    pub(crate) fn enter(&self) -> Result<()> {
        let mut current = self.inner.state.load(AtomicOrdering::Acquire);
        loop {
            if current == CLOSED {
                return Err(Error::AlreadyClosed);
            }
            match self.inner.state.compare_exchange_weak(
                current,
                current + 1,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn leave(&self) {
        let prev = self.inner.state.fetch_sub(1, AtomicOrdering::AcqRel);
        debug_assert!(prev != 0 && prev != CLOSED, "environment refcount underflow");
    }

    pub fn reader_check(&self) -> Result<c_int> {
        let handle = self.raw()?;
        let mut dead: c_int = 0;
        check(unsafe { ffi::mdb_reader_check(handle, &mut dead) }, dead)
    }

    pub fn stat(&self) -> Result<MDB_stat> {
        let handle = self.raw()?;
        let mut stat = MDB_stat::default();
        check(unsafe { ffi::mdb_env_stat(handle, &mut stat) }, stat)
    }

    pub fn info(&self) -> Result<MDB_envinfo> {
        let handle = self.raw()?;
        let mut info = MDB_envinfo::default();
        check(unsafe { ffi::mdb_env_info(handle, &mut info) }, info)
    }

    pub fn sync(&self, force: bool) -> Result<()> {
        let handle = self.raw()?;
        check_unit(unsafe { ffi::mdb_env_sync(handle, force as c_int) })
    }

    pub fn set_flags(&self, flags: EnvFlags, turn_on: bool) -> Result<()> {
        let handle = self.raw()?;
        check_unit(unsafe { ffi::mdb_env_set_flags(handle, flags.bits(), turn_on as c_int) })
    }

    pub fn get_flags(&self) -> Result<EnvFlags> {
        let handle = self.raw()?;
        let mut bits: c_uint = 0;
        check(unsafe { ffi::mdb_env_get_flags(handle, &mut bits) }, EnvFlags::from_bits_truncate(bits))
    }

    pub fn max_key_size(&self) -> Result<c_int> {
        let handle = self.raw()?;
        Ok(unsafe { ffi::mdb_env_get_maxkeysize(handle) })
    }

    /// Requires `path` to already exist, be a directory, and be empty —
    /// LMDB itself doesn't enforce "empty", but a non-empty destination
    /// produces a confusing native error, so this checks up front and
    /// surfaces a clearer [`Error::InvalidCopyDestination`].
    pub fn copy(&self, path: &Path, flags: CopyFlags) -> Result<()> {
        let handle = self.raw()?;
        let metadata = std::fs::metadata(path).map_err(|_| Error::InvalidCopyDestination)?;
        if !metadata.is_dir() {
            return Err(Error::InvalidCopyDestination);
        }
        let is_empty = std::fs::read_dir(path).map_err(|_| Error::InvalidCopyDestination)?.next().is_none();
        if !is_empty {
            return Err(Error::InvalidCopyDestination);
        }
        let path_str = path.to_str().ok_or(Error::InvalidPath)?;
        let c_path = CString::new(path_str).map_err(|_| Error::InvalidPath)?;
        check_unit(unsafe { ffi::mdb_env_copy2(handle, c_path.as_ptr(), flags.bits()) })
    }

    /// Closes the environment. Idempotent: closing an already-closed
    /// environment is a no-op rather than an error, matching the
    /// teacher's `Drop`-based "close can't really fail" stance while
    /// still enforcing the reference-counter contract on the first call.
    ///
    /// The "count==0, open -> closed" transition is one
    /// `compare_exchange` loop rather than a separate load-then-CAS, so a
    /// concurrent `enter()` can never slip its increment in between this
    /// call's "is it zero" check and the transition to `CLOSED` — either
    /// `enter()`'s increment lands first (and this call sees the
    /// nonzero count and fails with `EnvInUse`), or this call's CAS to
    /// `CLOSED` lands first (and `enter()`'s own CAS then fails with
    /// `AlreadyClosed`).
    pub fn close(&self) -> Result<()> {
        let mut current = self.inner.state.load(AtomicOrdering::Acquire);
        loop {
            if current == CLOSED {
                return Ok(());
            }
            if current != 0 {
                return Err(Error::EnvInUse(current));
            }
            match self.inner.state.compare_exchange(
                current,
                CLOSED,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            ) {
                Ok(_) => {
                    log::debug!("closing environment");
                    unsafe { ffi::mdb_env_close(self.inner.handle) };
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }
}
