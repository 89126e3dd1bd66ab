//! Integration-level coverage of every `KeyRangeType`, run against a real
//! environment rather than the bare decision-table unit tests in
//! `src/keyrange.rs`. Keys `2, 4, 6, 8`, matching the design document's
//! worked examples.

use lmdb_zc::{Environment, EnvCreateFlags, KeyRange, PutFlags};

fn seeded_env() -> (tempfile::TempDir, Environment, lmdb_zc::Dbi) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let env = Environment::new()
        .flags(EnvCreateFlags::empty())
        .map_size(1024 * 1024)
        .max_dbs(1)
        .open(dir.path(), 0o644)
        .unwrap();
    let dbi = env.open_db::<lmdb_zc::SliceProxy>().open(None).unwrap();
    let txn = env.txn_write().unwrap();
    let v: &[u8] = b"v";
    for k in [b"2".as_slice(), b"4", b"6", b"8"] {
        txn.put(&dbi, &k, &v, PutFlags::empty()).unwrap();
    }
    txn.commit().unwrap();
    (dir, env, dbi)
}

fn walk(env: &Environment, dbi: &lmdb_zc::Dbi, range: KeyRange) -> Vec<Vec<u8>> {
    let txn = env.txn_read().unwrap();
    txn.iter_range(dbi, range).unwrap().owned().map(|r| r.unwrap().0).collect()
}

#[test]
fn forward_all_is_every_key_ascending() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::all(true)),
        vec![b"2".to_vec(), b"4".to_vec(), b"6".to_vec(), b"8".to_vec()]
    );
}

#[test]
fn backward_all_is_every_key_descending() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::all(false)),
        vec![b"8".to_vec(), b"6".to_vec(), b"4".to_vec(), b"2".to_vec()]
    );
}

#[test]
fn forward_at_least_includes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::at_least(true, b"4".to_vec())),
        vec![b"4".to_vec(), b"6".to_vec(), b"8".to_vec()]
    );
}

#[test]
fn forward_at_most_includes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::at_most(true, b"6".to_vec())),
        vec![b"2".to_vec(), b"4".to_vec(), b"6".to_vec()]
    );
}

#[test]
fn forward_greater_than_excludes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::greater_than(true, b"4".to_vec())),
        vec![b"6".to_vec(), b"8".to_vec()]
    );
}

#[test]
fn forward_less_than_excludes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::less_than(true, b"6".to_vec())),
        vec![b"2".to_vec(), b"4".to_vec()]
    );
}

/// `BACKWARD_AT_MOST` has no lower bound: it only enforces the upper
/// bound (`stop`), so it includes every key at or below it.
#[test]
fn backward_at_most_has_no_lower_bound() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::at_most(false, b"6".to_vec())),
        vec![b"6".to_vec(), b"4".to_vec(), b"2".to_vec()]
    );
}

/// `BACKWARD_CLOSED` enforces both bounds inclusively, unlike
/// `BACKWARD_AT_MOST` which only has a `stop`. For a backward range
/// `start` is the upper bound the walk descends from and `stop` the
/// lower bound it ends at.
#[test]
fn backward_closed_enforces_both_bounds_inclusively() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::closed(false, b"6".to_vec(), b"2".to_vec())),
        vec![b"6".to_vec(), b"4".to_vec(), b"2".to_vec()]
    );
}

#[test]
fn backward_greater_than_excludes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::greater_than(false, b"4".to_vec())),
        vec![b"8".to_vec(), b"6".to_vec()]
    );
}

#[test]
fn backward_less_than_excludes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::less_than(false, b"4".to_vec())),
        vec![b"8".to_vec(), b"6".to_vec()]
    );
}

#[test]
fn forward_closed_includes_both_boundaries() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::closed(true, b"2".to_vec(), b"6".to_vec())),
        vec![b"2".to_vec(), b"4".to_vec(), b"6".to_vec()]
    );
}

#[test]
fn forward_open_excludes_both_boundaries() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::open(true, b"2".to_vec(), b"8".to_vec())),
        vec![b"4".to_vec(), b"6".to_vec()]
    );
}

#[test]
fn backward_at_least_includes_the_boundary() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::at_least(false, b"4".to_vec())),
        vec![b"8".to_vec(), b"6".to_vec(), b"4".to_vec()]
    );
}

#[test]
fn backward_open_excludes_both_boundaries() {
    let (_dir, env, dbi) = seeded_env();
    assert_eq!(
        walk(&env, &dbi, KeyRange::open(false, b"8".to_vec(), b"2".to_vec())),
        vec![b"6".to_vec(), b"4".to_vec()]
    );
}
