//! Safe, zero-copy bindings over the LMDB C library.
//!
//! The crate is organized around the data flow LMDB itself imposes:
//! an [`Environment`] opens [`txn::Txn`]s, a `Txn` opens [`dbi::Dbi`]
//! handles and [`cursor::Cursor`]s against them, and a `Cursor` plus a
//! [`keyrange::KeyRange`] drives [`iter::CursorIterable`]. Every buffer
//! that crosses into or out of LMDB goes through a [`proxy::BufferProxy`],
//! so the whole stack stays generic over `P: BufferProxy` down to the
//! single [`proxy::SliceProxy`] implementation this crate ships.

pub use liblmdb_sys as ffi;

pub mod comparator;
pub mod cursor;
pub mod dbi;
pub mod env;
pub mod error;
pub mod flags;
pub mod iter;
pub mod keyrange;
pub mod proxy;
pub mod val;

mod txn;

pub use cursor::Cursor;
pub use dbi::{DatabaseBuilder, Dbi};
pub use env::{EnvBuilder, Environment};
pub use error::{Error, Result};
pub use flags::{CopyFlags, DbFlags, EnvCreateFlags, EnvFlags, PutFlags};
pub use iter::{CursorIterable, OwnedPrefixIter, OwnedRangeIter, PrefixIterable};
pub use keyrange::{KeyRange, KeyRangeType};
pub use proxy::{BufferProxy, SliceProxy};
pub use txn::Txn;
