//! Declarative iteration windows (spec component C3).
//!
//! A [`KeyRange`] describes *what subset* of a database a cursor should
//! walk and in *which direction*, independent of the cursor itself. The
//! iterator engine in [`crate::iter`] turns a `KeyRange` plus a
//! comparator into a sequence of cursor operations by consulting
//! [`KeyRangeType::initial_op`], [`KeyRangeType::next_op`], and
//! [`KeyRangeType::iterator_op`] — the only three points where range
//! semantics enter the walk.

use std::cmp::Ordering;

use crate::ffi::MDB_cursor_op;

/// One of the fourteen forward/backward iteration windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRangeType {
    ForwardAll,
    ForwardAtLeast,
    ForwardAtMost,
    ForwardClosed,
    ForwardGreaterThan,
    ForwardLessThan,
    ForwardOpen,
    BackwardAll,
    BackwardAtLeast,
    BackwardAtMost,
    BackwardClosed,
    BackwardGreaterThan,
    BackwardLessThan,
    BackwardOpen,
}

impl KeyRangeType {
    pub fn forward(self) -> bool {
        !matches!(
            self,
            KeyRangeType::BackwardAll
                | KeyRangeType::BackwardAtLeast
                | KeyRangeType::BackwardAtMost
                | KeyRangeType::BackwardClosed
                | KeyRangeType::BackwardGreaterThan
                | KeyRangeType::BackwardLessThan
                | KeyRangeType::BackwardOpen
        )
    }

    pub fn requires_start(self) -> bool {
        matches!(
            self,
            KeyRangeType::ForwardAtLeast
                | KeyRangeType::ForwardClosed
                | KeyRangeType::ForwardGreaterThan
                | KeyRangeType::ForwardOpen
                | KeyRangeType::BackwardAtLeast
                | KeyRangeType::BackwardClosed
                | KeyRangeType::BackwardGreaterThan
                | KeyRangeType::BackwardOpen
        )
    }

    pub fn requires_stop(self) -> bool {
        matches!(
            self,
            KeyRangeType::ForwardAtMost
                | KeyRangeType::ForwardClosed
                | KeyRangeType::ForwardLessThan
                | KeyRangeType::ForwardOpen
                | KeyRangeType::BackwardAtMost
                | KeyRangeType::BackwardClosed
                | KeyRangeType::BackwardLessThan
                | KeyRangeType::BackwardOpen
        )
    }

    /// The cursor op that positions the cursor before the walk begins.
    pub fn initial_op(self) -> CursorOp {
        use KeyRangeType::*;
        match self {
            ForwardAll | ForwardAtMost | ForwardLessThan => CursorOp::First,
            BackwardAll | BackwardAtMost | BackwardLessThan => CursorOp::Last,
            ForwardAtLeast | ForwardClosed | ForwardGreaterThan | ForwardOpen => {
                CursorOp::GetStartKey
            }
            BackwardAtLeast | BackwardClosed | BackwardGreaterThan | BackwardOpen => {
                CursorOp::GetStartKeyBackward
            }
        }
    }

    /// The cursor op that advances the walk by one entry.
    pub fn next_op(self) -> CursorOp {
        if self.forward() {
            CursorOp::Next
        } else {
            CursorOp::Prev
        }
    }

    /// Consults the decision table for whether the entry at `current`
    /// should be released to the caller, the walk should advance and
    /// retry, or the walk is over. `start`/`stop` are `None` exactly when
    /// `requires_start`/`requires_stop` say they're unused by this type.
    /// `current` is `None` when the cursor fell off the end of the
    /// database, which always terminates the walk.
    pub fn iterator_op(
        self,
        start: Option<&[u8]>,
        stop: Option<&[u8]>,
        current: Option<&[u8]>,
        cmp: impl Fn(&[u8], &[u8]) -> Ordering,
    ) -> IteratorOp {
        use KeyRangeType::*;

        let Some(b) = current else {
            return IteratorOp::Terminate;
        };

        match self {
            ForwardAll | BackwardAll | ForwardAtLeast => IteratorOp::Release,
            ForwardAtMost | ForwardClosed => {
                let stop = stop.expect("stop key required");
                if cmp(b, stop) == Ordering::Greater {
                    IteratorOp::Terminate
                } else {
                    IteratorOp::Release
                }
            }
            ForwardGreaterThan => {
                let start = start.expect("start key required");
                if cmp(b, start) == Ordering::Equal {
                    IteratorOp::CallNextOp
                } else {
                    IteratorOp::Release
                }
            }
            ForwardLessThan => {
                let stop = stop.expect("stop key required");
                if cmp(b, stop) != Ordering::Less {
                    IteratorOp::Terminate
                } else {
                    IteratorOp::Release
                }
            }
            ForwardOpen => {
                let start = start.expect("start key required");
                let stop = stop.expect("stop key required");
                if cmp(b, start) == Ordering::Equal {
                    IteratorOp::CallNextOp
                } else if cmp(b, stop) != Ordering::Less {
                    IteratorOp::Terminate
                } else {
                    IteratorOp::Release
                }
            }
            BackwardAtLeast => {
                let start = start.expect("start key required");
                if cmp(b, start) == Ordering::Less {
                    IteratorOp::Terminate
                } else {
                    IteratorOp::Release
                }
            }
            // BACKWARD_AT_MOST / BACKWARD_CLOSED only differ in whether
            // the lower boundary (`start`) is enforced at all — AT_MOST
            // has no lower bound. Past the upper bound (`stop`), both
            // rewind (CALL_NEXT_OP, i.e. cursor.prev) rather than
            // terminate, since the walk started at the last key in the
            // database and must step backward until it's inside [*,
            // stop]; once inside, CLOSED additionally terminates the
            // instant it steps below `start`.
            BackwardAtMost => {
                let stop = stop.expect("stop key required");
                if cmp(b, stop) == Ordering::Greater {
                    IteratorOp::CallNextOp
                } else {
                    IteratorOp::Release
                }
            }
            BackwardClosed => {
                let start = start.expect("start key required");
                let stop = stop.expect("stop key required");
                if cmp(b, stop) == Ordering::Greater {
                    IteratorOp::CallNextOp
                } else if cmp(b, start) == Ordering::Less {
                    IteratorOp::Terminate
                } else {
                    IteratorOp::Release
                }
            }
            BackwardGreaterThan => {
                let start = start.expect("start key required");
                if cmp(b, start) == Ordering::Greater {
                    IteratorOp::Release
                } else {
                    IteratorOp::Terminate
                }
            }
            BackwardLessThan => {
                let stop = stop.expect("stop key required");
                if cmp(b, stop) == Ordering::Greater {
                    IteratorOp::Release
                } else {
                    IteratorOp::Terminate
                }
            }
            // Mirrors BackwardClosed: rewind (CALL_NEXT_OP) while still at
            // or past `stop` (the open upper bound, excluded), terminate
            // the instant `start` (the open lower bound) is reached.
            BackwardOpen => {
                let start = start.expect("start key required");
                let stop = stop.expect("stop key required");
                if cmp(b, stop) != Ordering::Less {
                    IteratorOp::CallNextOp
                } else if cmp(b, start) != Ordering::Greater {
                    IteratorOp::Terminate
                } else {
                    IteratorOp::Release
                }
            }
        }
    }
}

/// The abstract cursor operation an [`KeyRangeType::initial_op`] resolves
/// to. `GetStartKey`/`GetStartKeyBackward` are not raw `MDB_cursor_op`
/// values — they additionally carry a start-key `SET_RANGE` seek, wired
/// up by [`crate::iter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    First,
    Last,
    GetStartKey,
    GetStartKeyBackward,
    Next,
    Prev,
}

impl CursorOp {
    /// The raw seek op for the cases that map onto one directly.
    pub fn raw(self) -> Option<MDB_cursor_op> {
        match self {
            CursorOp::First => Some(MDB_cursor_op::MDB_FIRST),
            CursorOp::Last => Some(MDB_cursor_op::MDB_LAST),
            CursorOp::Next => Some(MDB_cursor_op::MDB_NEXT),
            CursorOp::Prev => Some(MDB_cursor_op::MDB_PREV),
            CursorOp::GetStartKey | CursorOp::GetStartKeyBackward => None,
        }
    }
}

/// What the iterator engine should do after landing on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorOp {
    CallNextOp,
    Release,
    Terminate,
}

/// An immutable iteration window: direction plus optional start/stop
/// bounds and (for prefix iteration) a shared prefix.
#[derive(Debug, Clone)]
pub struct KeyRange {
    range_type: KeyRangeType,
    start: Option<Vec<u8>>,
    stop: Option<Vec<u8>>,
}

impl KeyRange {
    fn new(range_type: KeyRangeType, start: Option<Vec<u8>>, stop: Option<Vec<u8>>) -> KeyRange {
        debug_assert_eq!(range_type.requires_start(), start.is_some());
        debug_assert_eq!(range_type.requires_stop(), stop.is_some());
        KeyRange { range_type, start, stop }
    }

    pub fn all(forward: bool) -> KeyRange {
        let t = if forward { KeyRangeType::ForwardAll } else { KeyRangeType::BackwardAll };
        KeyRange::new(t, None, None)
    }

    pub fn at_least(forward: bool, start: impl Into<Vec<u8>>) -> KeyRange {
        let t = if forward { KeyRangeType::ForwardAtLeast } else { KeyRangeType::BackwardAtLeast };
        KeyRange::new(t, Some(start.into()), None)
    }

    pub fn at_most(forward: bool, stop: impl Into<Vec<u8>>) -> KeyRange {
        let t = if forward { KeyRangeType::ForwardAtMost } else { KeyRangeType::BackwardAtMost };
        KeyRange::new(t, None, Some(stop.into()))
    }

    pub fn closed(forward: bool, start: impl Into<Vec<u8>>, stop: impl Into<Vec<u8>>) -> KeyRange {
        let t = if forward { KeyRangeType::ForwardClosed } else { KeyRangeType::BackwardClosed };
        let (start, stop) = (start.into(), stop.into());
        if forward {
            KeyRange::new(t, Some(start), Some(stop))
        } else {
            // For a backward range the walk descends from `start` down to
            // `stop`, so `start` names the upper bound here and `stop` the
            // lower one; swap into the `KeyRange` fields, which the
            // iteration engine always treats as (lower, upper).
            KeyRange::new(t, Some(stop), Some(start))
        }
    }

    pub fn greater_than(forward: bool, start: impl Into<Vec<u8>>) -> KeyRange {
        let t = if forward {
            KeyRangeType::ForwardGreaterThan
        } else {
            KeyRangeType::BackwardGreaterThan
        };
        KeyRange::new(t, Some(start.into()), None)
    }

    pub fn less_than(forward: bool, stop: impl Into<Vec<u8>>) -> KeyRange {
        let t = if forward { KeyRangeType::ForwardLessThan } else { KeyRangeType::BackwardLessThan };
        KeyRange::new(t, None, Some(stop.into()))
    }

    pub fn open(forward: bool, start: impl Into<Vec<u8>>, stop: impl Into<Vec<u8>>) -> KeyRange {
        let t = if forward { KeyRangeType::ForwardOpen } else { KeyRangeType::BackwardOpen };
        let (start, stop) = (start.into(), stop.into());
        if forward {
            KeyRange::new(t, Some(start), Some(stop))
        } else {
            // See the comment in `closed`: a backward range's `start` is
            // the upper (seek-anchor) bound, `stop` the lower one.
            KeyRange::new(t, Some(stop), Some(start))
        }
    }

    pub fn range_type(&self) -> KeyRangeType {
        self.range_type
    }

    pub fn start(&self) -> Option<&[u8]> {
        self.start.as_deref()
    }

    pub fn stop(&self) -> Option<&[u8]> {
        self.stop.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn forward_closed_releases_inside_and_terminates_past_stop() {
        let t = KeyRangeType::ForwardClosed;
        let start = Some(&b"2"[..]);
        let stop = Some(&b"6"[..]);
        assert_eq!(t.iterator_op(start, stop, Some(b"4"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"6"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"8"), cmp), IteratorOp::Terminate);
        assert_eq!(t.iterator_op(start, stop, None, cmp), IteratorOp::Terminate);
    }

    #[test]
    fn forward_open_skips_start_and_terminates_at_stop() {
        let t = KeyRangeType::ForwardOpen;
        let start = Some(&b"2"[..]);
        let stop = Some(&b"6"[..]);
        assert_eq!(t.iterator_op(start, stop, Some(b"2"), cmp), IteratorOp::CallNextOp);
        assert_eq!(t.iterator_op(start, stop, Some(b"4"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"6"), cmp), IteratorOp::Terminate);
    }

    #[test]
    fn backward_closed_rewinds_past_stop_and_terminates_past_start() {
        let t = KeyRangeType::BackwardClosed;
        let start = Some(&b"2"[..]);
        let stop = Some(&b"6"[..]);
        // scanning backward from the top: 8 is past stop, rewind
        assert_eq!(t.iterator_op(start, stop, Some(b"8"), cmp), IteratorOp::CallNextOp);
        assert_eq!(t.iterator_op(start, stop, Some(b"6"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"4"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"2"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"0"), cmp), IteratorOp::Terminate);
    }

    #[test]
    fn backward_at_most_has_no_lower_bound() {
        let t = KeyRangeType::BackwardAtMost;
        let stop = Some(&b"6"[..]);
        assert_eq!(t.iterator_op(None, stop, Some(b"8"), cmp), IteratorOp::CallNextOp);
        assert_eq!(t.iterator_op(None, stop, Some(b"0"), cmp), IteratorOp::Release);
    }

    #[test]
    fn backward_open_excludes_both_endpoints() {
        let t = KeyRangeType::BackwardOpen;
        let start = Some(&b"2"[..]);
        let stop = Some(&b"6"[..]);
        assert_eq!(t.iterator_op(start, stop, Some(b"6"), cmp), IteratorOp::CallNextOp);
        assert_eq!(t.iterator_op(start, stop, Some(b"4"), cmp), IteratorOp::Release);
        assert_eq!(t.iterator_op(start, stop, Some(b"2"), cmp), IteratorOp::Terminate);
    }

    #[test]
    fn initial_ops_match_direction_and_bound_presence() {
        assert_eq!(KeyRangeType::ForwardAll.initial_op(), CursorOp::First);
        assert_eq!(KeyRangeType::BackwardAll.initial_op(), CursorOp::Last);
        assert_eq!(KeyRangeType::ForwardAtLeast.initial_op(), CursorOp::GetStartKey);
        assert_eq!(KeyRangeType::BackwardClosed.initial_op(), CursorOp::GetStartKeyBackward);
    }
}
