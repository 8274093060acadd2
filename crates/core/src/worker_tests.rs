// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn worker_id_display() {
    assert_eq!(WorkerId::Local.to_string(), "local");
    assert_eq!(WorkerId::remote(3).to_string(), "remote-3");
}

#[test]
fn worker_id_serde_tagged() {
    let json = serde_json::to_string(&WorkerId::remote(1)).unwrap();
    assert_eq!(json, r#"{"type":"remote","index":1}"#);
    let local: WorkerId = serde_json::from_str(r#"{"type":"local"}"#).unwrap();
    assert_eq!(local, WorkerId::Local);
}

#[test]
fn remote_index_only_for_remote() {
    assert_eq!(WorkerId::Local.remote_index(), None);
    assert_eq!(WorkerId::remote(4).remote_index(), Some(4));
    assert!(WorkerId::Local.is_local());
}

#[test]
fn pool_allocates_dense_indices() {
    let mut pool = WorkerIndexPool::new();
    assert_eq!(pool.allocate(), 0);
    assert_eq!(pool.allocate(), 1);
    assert_eq!(pool.allocate(), 2);
    assert_eq!(pool.allocated(), 3);
}

#[test]
fn pool_fills_gap_before_growing() {
    let mut pool = WorkerIndexPool::new();
    for _ in 0..4 {
        pool.allocate();
    }
    pool.release(1);
    assert!(!pool.is_allocated(1));
    assert_eq!(pool.allocate(), 1);
    assert_eq!(pool.allocate(), 4);
}

#[test]
fn pool_release_of_tail_shrinks() {
    let mut pool = WorkerIndexPool::new();
    for _ in 0..3 {
        pool.allocate();
    }
    pool.release(1);
    pool.release(2);
    assert_eq!(pool.allocated(), 1);
    assert_eq!(pool.allocate(), 1);
    assert_eq!(pool.allocate(), 2);
}

#[test]
fn pool_ignores_unknown_release() {
    let mut pool = WorkerIndexPool::new();
    pool.allocate();
    pool.release(9);
    assert_eq!(pool.allocated(), 1);
    assert_eq!(pool.allocate(), 1);
}

proptest! {
    #[test]
    fn pool_never_hands_out_duplicates(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
        let mut pool = WorkerIndexPool::new();
        let mut live: Vec<u32> = Vec::new();
        let mut peak = 0usize;
        for allocate in ops {
            if allocate || live.is_empty() {
                let index = pool.allocate();
                prop_assert!(!live.contains(&index));
                live.push(index);
                peak = peak.max(live.len());
            } else {
                let index = live.remove(live.len() / 2);
                pool.release(index);
            }
            prop_assert_eq!(pool.allocated(), live.len());
            if let Some(max) = live.iter().copied().max() {
                prop_assert!((max as usize) < peak);
            }
        }
    }
}
