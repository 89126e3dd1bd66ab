//! Range- and prefix-driven cursor iteration (spec component C10).
//!
//! The teacher's `CursorIterator<'c, I>` dispatches to one of several
//! concrete `CursorIteratorInner` impls (`CursorKeyRangeIter`,
//! `CursorFromKeyIter`, `CursorToKeyIter`, plain `CursorIter`,
//! `CursorItemIter`) chosen at construction time. This crate collapses
//! all fourteen range shapes into the single declarative
//! [`crate::keyrange::KeyRange`] and drives them through one engine here
//! instead of one struct per shape, consulting `initial_op`/`next_op`/
//! `iterator_op` (see `keyrange.rs`) at exactly the three points a walk
//! needs to make a decision.
//!
//! [`CursorIterable::next`] is deliberately not `std::iter::Iterator`:
//! the returned `(&[u8], &[u8])` pair aliases the one [`crate::val::KeyVal`]
//! slot the underlying cursor reuses every call, so two pairs from
//! different calls can never be live at once — a "streaming iterator"
//! shape `Iterator` can't express. [`OwnedRangeIter`] is the copying
//! adapter for callers who do want a real `Iterator`.

use crate::cursor::Cursor;
use crate::dbi::Dbi;
use crate::error::Result;
use crate::keyrange::{IteratorOp, KeyRange};
use crate::proxy::{BufferProxy, CompareFn, SliceProxy};
use crate::txn::Txn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    RequiresInitialOp,
    RequiresNextOp,
    Terminated,
}

/// A lazy, allocation-free walk over a [`KeyRange`]. Construct one via
/// [`Txn::iter_range`] or [`Cursor::into_range_iter`].
pub struct CursorIterable<'txn> {
    cursor: Cursor<'txn, SliceProxy>,
    range: KeyRange,
    cmp: CompareFn,
    state: IterState,
}

impl<'txn> CursorIterable<'txn> {
    pub(crate) fn new(cursor: Cursor<'txn, SliceProxy>, range: KeyRange, cmp: CompareFn) -> CursorIterable<'txn> {
        CursorIterable {
            cursor,
            range,
            cmp,
            state: IterState::RequiresInitialOp,
        }
    }

    /// Advances the walk by one entry. The returned slices alias the
    /// cursor's reused buffer and are only valid until the next call.
    pub fn next(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        loop {
            let pair = match self.state {
                IterState::Terminated => return Ok(None),
                IterState::RequiresInitialOp => {
                    let op = self.range.range_type().initial_op();
                    // Backward walks that carry an upper bound (`stop`)
                    // seek near it, since that's where the descending
                    // walk starts; the no-`stop` backward cases (and
                    // every forward case) seek near `start` as before —
                    // `seek_raw` falls back to `MDB_LAST` when `None`
                    // reaches `GetStartKeyBackward`.
                    let seek_key = match op {
                        crate::keyrange::CursorOp::GetStartKeyBackward => self.range.stop(),
                        _ => self.range.start(),
                    };
                    self.cursor.seek_raw(op, seek_key)?
                }
                IterState::RequiresNextOp => {
                    let op = self.range.range_type().next_op();
                    self.cursor.seek_raw(op, None)?
                }
            };

            let current = pair.map(|(k, _)| k);
            match self
                .range
                .range_type()
                .iterator_op(self.range.start(), self.range.stop(), current, self.cmp)
            {
                IteratorOp::Terminate => {
                    self.state = IterState::Terminated;
                    return Ok(None);
                }
                IteratorOp::CallNextOp => {
                    self.state = IterState::RequiresNextOp;
                    continue;
                }
                IteratorOp::Release => {
                    self.state = IterState::RequiresNextOp;
                    return Ok(pair);
                }
            }
        }
    }

    /// Adapts this walk into a real [`Iterator`] that copies each pair
    /// into owned `Vec<u8>`s, for callers who need one (`for` loops,
    /// `collect`, combinators) more than they need zero-copy access.
    pub fn owned(self) -> OwnedRangeIter<'txn> {
        OwnedRangeIter { inner: self }
    }
}

impl Cursor<'_, SliceProxy> {
    /// Consumes this cursor to drive `range`, using `cmp` to evaluate
    /// range boundaries (typically [`Dbi::flags`] run through
    /// [`crate::proxy::BufferProxy::comparator`]).
    pub fn into_range_iter(self, range: KeyRange, cmp: CompareFn) -> CursorIterable<'_> {
        CursorIterable::new(self, range, cmp)
    }
}

impl Txn {
    /// Opens a cursor on `dbi` and immediately wires it up to walk `range`.
    pub fn iter_range<'t>(&'t self, dbi: &Dbi<SliceProxy>, range: KeyRange) -> Result<CursorIterable<'t>> {
        let cmp = SliceProxy::comparator(dbi.flags());
        let cursor = self.open_cursor(dbi)?;
        Ok(cursor.into_range_iter(range, cmp))
    }

    /// Opens a cursor walking every key sharing `prefix`, in key order
    /// (`forward`) or reverse.
    pub fn iter_prefix<'t>(&'t self, dbi: &Dbi<SliceProxy>, prefix: Vec<u8>, forward: bool) -> Result<PrefixIterable<'t>> {
        let cursor = self.open_cursor(dbi)?;
        Ok(PrefixIterable::new(cursor, prefix, forward))
    }
}

/// A copying [`Iterator`] adapter over a [`CursorIterable`].
pub struct OwnedRangeIter<'txn> {
    inner: CursorIterable<'txn>,
}

impl Iterator for OwnedRangeIter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Ok(Some((k, v))) => Some(Ok((k.to_vec(), v.to_vec()))),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// A lazy walk over every key sharing a common prefix, independent of
/// [`KeyRange`]: the boundary check is `contains_prefix` rather than a
/// fixed start/stop comparison, so this gets its own small engine
/// instead of being shoehorned into a `KeyRangeType` variant.
pub struct PrefixIterable<'txn> {
    cursor: Cursor<'txn, SliceProxy>,
    prefix: Vec<u8>,
    forward: bool,
    started: bool,
    terminated: bool,
}

impl<'txn> PrefixIterable<'txn> {
    pub(crate) fn new(cursor: Cursor<'txn, SliceProxy>, prefix: Vec<u8>, forward: bool) -> PrefixIterable<'txn> {
        PrefixIterable {
            cursor,
            prefix,
            forward,
            started: false,
            terminated: false,
        }
    }

    /// Advances to the next matching entry, or `None` once the prefix
    /// run ends (sorted order means the first non-match ends it for
    /// good, so this latches `terminated` rather than re-checking).
    pub fn next(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        if self.terminated {
            return Ok(None);
        }

        let pair = if !self.started {
            self.started = true;
            self.position_first()?
        } else if self.forward {
            self.cursor.next()?
        } else {
            self.cursor.prev()?
        };

        match pair {
            Some((k, v)) if SliceProxy::contains_prefix(k, &self.prefix) => Ok(Some((k, v))),
            _ => {
                self.terminated = true;
                Ok(None)
            }
        }
    }

    fn position_first(&self) -> Result<Option<(&[u8], &[u8])>> {
        if self.forward {
            let prefix: &[u8] = &self.prefix;
            return self.cursor.set_range(&prefix);
        }
        match SliceProxy::increment_least_significant_byte(&self.prefix) {
            Some(upper) => {
                let upper: &[u8] = &upper;
                match self.cursor.set_range(&upper)? {
                    Some(_) => self.cursor.prev(),
                    None => self.cursor.last(),
                }
            }
            None => self.cursor.last(),
        }
    }

    /// Adapts this walk into a real [`Iterator`] over owned `Vec<u8>`
    /// pairs, mirroring [`CursorIterable::owned`].
    pub fn owned(self) -> OwnedPrefixIter<'txn> {
        OwnedPrefixIter { inner: self }
    }
}

pub struct OwnedPrefixIter<'txn> {
    inner: PrefixIterable<'txn>,
}

impl Iterator for OwnedPrefixIter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Ok(Some((k, v))) => Some(Ok((k.to_vec(), v.to_vec()))),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{EnvCreateFlags, PutFlags};
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

    fn seed(env: &Environment, dbi: &Dbi<SliceProxy>, keys: &[&[u8]]) {
        let txn = env.txn_write().unwrap();
        let v: &[u8] = b"v";
        for k in keys {
            txn.put(dbi, k, &v, PutFlags::empty()).unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn forward_closed_range_yields_bounded_keys_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[b"1", b"2", b"3", b"4", b"5"]);

        let txn = env.txn_read().unwrap();
        let range = KeyRange::closed(true, b"2".to_vec(), b"4".to_vec());
        let mut iter = txn.iter_range(&dbi, range).unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = iter.next().unwrap() {
            seen.push(k.to_vec());
        }
        assert_eq!(seen, vec![b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]);
    }

    #[test]
    fn backward_open_range_excludes_both_endpoints_in_descending_order() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[b"1", b"2", b"3", b"4", b"5"]);

        let txn = env.txn_read().unwrap();
        let range = KeyRange::open(false, b"5".to_vec(), b"1".to_vec());
        let mut iter = txn.iter_range(&dbi, range).unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = iter.next().unwrap() {
            seen.push(k.to_vec());
        }
        assert_eq!(seen, vec![b"4".to_vec(), b"3".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn forward_all_on_empty_database_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        let txn = env.txn_read().unwrap();
        let mut iter = txn.iter_range(&dbi, KeyRange::all(true)).unwrap();
        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn owned_adapter_collects_into_a_vec() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[b"a", b"b", b"c"]);

        let txn = env.txn_read().unwrap();
        let pairs: Vec<_> = txn
            .iter_range(&dbi, KeyRange::all(true))
            .unwrap()
            .owned()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, b"a");
    }

    #[test]
    fn forward_prefix_iteration_stops_at_first_non_match() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[b"ab1", b"ab2", b"ac1", b"b1"]);

        let txn = env.txn_read().unwrap();
        let mut iter = txn.iter_prefix(&dbi, b"ab".to_vec(), true).unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = iter.next().unwrap() {
            seen.push(k.to_vec());
        }
        assert_eq!(seen, vec![b"ab1".to_vec(), b"ab2".to_vec()]);
    }

    #[test]
    fn backward_prefix_iteration_visits_in_reverse() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[b"ab1", b"ab2", b"ac1"]);

        let txn = env.txn_read().unwrap();
        let mut iter = txn.iter_prefix(&dbi, b"ab".to_vec(), false).unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = iter.next().unwrap() {
            seen.push(k.to_vec());
        }
        assert_eq!(seen, vec![b"ab2".to_vec(), b"ab1".to_vec()]);
    }

    #[test]
    fn prefix_at_the_very_end_of_the_keyspace_falls_back_to_last() {
        let dir = tempfile::tempdir().unwrap();
        let env = open_env(dir.path());
        let dbi: Dbi<SliceProxy> = env.open_db().open(None).unwrap();
        seed(&env, &dbi, &[b"\xff\x01", b"\xff\x02"]);

        let txn = env.txn_read().unwrap();
        let mut iter = txn.iter_prefix(&dbi, vec![0xff], false).unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = iter.next().unwrap() {
            seen.push(k.to_vec());
        }
        assert_eq!(seen, vec![b"\xff\x02".to_vec(), b"\xff\x01".to_vec()]);
    }
}
