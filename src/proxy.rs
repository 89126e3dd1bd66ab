//! The buffer-proxy abstraction (spec component C4).
//!
//! `BufferProxy` is a tagged strategy over a buffer type, generalizing the
//! teacher's `AsByteSlice`/`FromBytes` traits: instead of converting a
//! concrete Rust value to an owned `&[u8]` by value, a proxy marshals
//! directly into and out of an [`ffi::MDB_val`] slot, so a read-out never
//! copies and a write-in never allocates.
//!
//! Per the design note in spec.md §9 ("prefer a single direct-address
//! implementation... the proxy abstraction exists for pluggability of
//! buffer *types*, not access *techniques*"), this crate ships exactly one
//! implementation, [`SliceProxy`], whose buffer type is a plain borrowed
//! `&[u8]`. Implementing `BufferProxy` for another off-heap buffer type
//! (e.g. a custom arena handle) is the extension point.

use std::cmp::Ordering;

use byteorder::{ByteOrder, NativeEndian};

use crate::ffi::MDB_val;
use crate::flags::DbFlags;

/// A comparator over raw bytes, as returned by [`BufferProxy::comparator`].
pub type CompareFn = fn(&[u8], &[u8]) -> Ordering;

/// Marshals a buffer type to/from the native `MDB_val` flyweight.
///
/// # Safety
///
/// Implementations of `write_in`/`write_in_reserve`/`read_out` deal
/// directly in raw pointers aliasing LMDB- or caller-owned memory. A
/// buffer handed to `write_in` must stay pinned and valid for the
/// duration of the single subsequent LMDB call that consumes the slot;
/// a buffer produced by `read_out` aliases memory owned by LMDB and is
/// only valid until the next LMDB call on the same transaction.
pub unsafe trait BufferProxy {
    /// The buffer type this proxy knows how to marshal. Parameterized by
    /// a lifetime so a borrowed representation (the common case) can
    /// alias the transaction or LMDB's memory map directly rather than
    /// copying.
    type Buffer<'a>: 'a;

    /// Allocates an empty/default buffer of this type, for callers that
    /// need a placeholder before a read-out fills it in.
    fn allocate<'a>() -> Self::Buffer<'a>;

    /// Releases any resources `allocate` reserved. A no-op for borrowed
    /// proxies like [`SliceProxy`].
    fn deallocate(buf: Self::Buffer<'_>) {
        drop(buf);
    }

    /// Returns the readable bytes of `buf`, for prefix logic and test
    /// assertions.
    fn get_bytes<'a>(buf: &Self::Buffer<'a>) -> &'a [u8];

    /// Writes `buf`'s address and length into `slot`. `buf` must remain
    /// pinned until the LMDB call consuming `slot` returns.
    ///
    /// # Safety
    /// `slot` must not be read after `buf` is dropped or moved.
    unsafe fn write_in(buf: &Self::Buffer<'_>, slot: &mut MDB_val);

    /// Reserve-style variant for `MDB_RESERVE` puts: the caller knows the
    /// write size but not yet the bytes, and LMDB will hand back a
    /// writable pointer of that size in `slot.mv_data`.
    ///
    /// # Safety
    /// `slot` must be passed to `mdb_put`/`mdb_cursor_put` with
    /// `MDB_RESERVE` immediately after this call.
    unsafe fn write_in_reserve(size: usize, slot: &mut MDB_val);

    /// Reads a buffer view aliasing `slot`'s address for `slot.mv_size`
    /// bytes. Valid only until the next LMDB call on the same
    /// transaction.
    ///
    /// # Safety
    /// `slot` must have been populated by a prior successful LMDB call
    /// on the same transaction and not yet invalidated by a later one.
    unsafe fn read_out<'a>(slot: &MDB_val) -> Self::Buffer<'a>;

    /// The proxy-native comparator for keys of this type: unsigned
    /// byte-wise by default, specialized to a native-endian integer
    /// compare when `flags` declares fixed-width integer keys.
    fn comparator(flags: DbFlags) -> CompareFn {
        if flags.contains(DbFlags::INTEGER_KEY) || flags.contains(DbFlags::INTEGER_DUP) {
            integer_comparator
        } else {
            unsigned_bytewise_compare
        }
    }

    /// Whether `key`'s leading bytes equal `prefix`.
    fn contains_prefix(key: &[u8], prefix: &[u8]) -> bool {
        key.len() >= prefix.len() && &key[..prefix.len()] == prefix
    }

    /// Returns `prefix` with its least significant byte incremented,
    /// carrying into preceding bytes as needed. Used by backward prefix
    /// iteration to seek just past the prefix's range. Returns `None` if
    /// the prefix is all `0xFF` bytes (the increment overflows).
    fn increment_least_significant_byte(prefix: &[u8]) -> Option<Vec<u8>> {
        let mut out = prefix.to_vec();
        for byte in out.iter_mut().rev() {
            if *byte == 0xFF {
                *byte = 0;
            } else {
                *byte += 1;
                return Some(out);
            }
        }
        None
    }
}

/// Unsigned byte-wise compare: lexicographic over `min(len_a, len_b)`
/// bytes (treated as unsigned, which `u8`/`[u8]` always are in Rust), and
/// the longer buffer wins on an equal common prefix. This is exactly
/// `[u8]`'s `Ord`, spelled out because it's a load-bearing contract (spec
/// §8: reflexive, antisymmetric, transitive, stable) rather than an
/// implementation detail.
pub fn unsigned_bytewise_compare(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Native-byte-order unsigned integer compare for 4- or 8-byte keys, as
/// LMDB performs internally when a database is opened with
/// `INTEGER_KEY`/`INTEGER_DUP`. Any other width falls back to the
/// byte-wise compare rather than panicking, since a prefix-range scan
/// may briefly present a key outside the fixed width.
pub fn integer_comparator(a: &[u8], b: &[u8]) -> Ordering {
    match (a.len(), b.len()) {
        (4, 4) => NativeEndian::read_u32(a).cmp(&NativeEndian::read_u32(b)),
        (8, 8) => NativeEndian::read_u64(a).cmp(&NativeEndian::read_u64(b)),
        _ => unsigned_bytewise_compare(a, b),
    }
}

/// The default, zero-overhead proxy: a buffer is simply a borrowed byte
/// slice aliasing either caller memory (on writes) or LMDB's memory map
/// (on reads). `allocate`/`deallocate` are no-ops since a `&[u8]` owns
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceProxy;

unsafe impl BufferProxy for SliceProxy {
    type Buffer<'a> = &'a [u8];

    fn allocate<'a>() -> &'a [u8] {
        &[]
    }

    fn get_bytes<'a>(buf: &&'a [u8]) -> &'a [u8] {
        buf
    }

    unsafe fn write_in(buf: &&[u8], slot: &mut MDB_val) {
        slot.mv_size = buf.len() as libc::size_t;
        slot.mv_data = buf.as_ptr() as *const libc::c_void;
    }

    unsafe fn write_in_reserve(size: usize, slot: &mut MDB_val) {
        slot.mv_size = size as libc::size_t;
        slot.mv_data = std::ptr::null();
    }

    unsafe fn read_out<'a>(slot: &MDB_val) -> &'a [u8] {
        if slot.mv_data.is_null() {
            &[]
        } else {
            std::slice::from_raw_parts(slot.mv_data as *const u8, slot.mv_size as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytewise_compare_matches_invariants() {
        assert_eq!(unsigned_bytewise_compare(b"a", b"a"), Ordering::Equal);
        assert_eq!(unsigned_bytewise_compare(b"a", b"b"), Ordering::Less);
        assert_eq!(unsigned_bytewise_compare(b"b", b"a"), Ordering::Greater);
        // equal prefix, longer buffer wins
        assert_eq!(unsigned_bytewise_compare(b"ab", b"a"), Ordering::Greater);
    }

    #[test]
    fn integer_compare_is_native_endian_numeric() {
        let a = 1u32.to_ne_bytes();
        let b = 2u32.to_ne_bytes();
        assert_eq!(integer_comparator(&a, &b), Ordering::Less);
    }

    #[test]
    fn increment_lsb_carries() {
        assert_eq!(
            SliceProxy::increment_least_significant_byte(&[1, 2, 0xFF]),
            Some(vec![1, 3, 0])
        );
        assert_eq!(SliceProxy::increment_least_significant_byte(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn contains_prefix_checks_leading_bytes() {
        assert!(SliceProxy::contains_prefix(b"hello world", b"hello"));
        assert!(!SliceProxy::contains_prefix(b"hell", b"hello"));
    }
}
