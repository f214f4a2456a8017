use super::*;
use crate::sync::lock_pool::BufferLockPool;
use crate::sync::strategy::{FrameSync, NoopSync};
use crate::sync::sync_object::SyncFlags;
use std::sync::atomic::{AtomicU64, Ordering};

fn noop_manager() -> (Arc<BufferLockPool>, Arc<NoopSync>, LockManager) {
    let pool = Arc::new(BufferLockPool::new());
    let strategy = Arc::new(NoopSync);
    let manager = LockManager::new(pool.clone(), strategy.clone());
    (pool, strategy, manager)
}

// ============================================================================
// lock_range tests
// ============================================================================

#[test]
fn test_disjoint_locks_accumulate() {
    let (pool, strategy, manager) = noop_manager();
    let a = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    let b = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());

    manager.lock_range(0, 64, a);
    manager.lock_range(128, 64, b);
    assert_eq!(manager.active_count(), 2);
}

#[test]
fn test_overlapping_lock_merges_and_newest_guard_wins() {
    let (pool, strategy, manager) = noop_manager();
    let old = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    let new = pool.create_sync_object(strategy.as_ref(), 1, SyncFlags::empty());

    manager.lock_range(0, 64, old);
    manager.lock_range(32, 64, new); // overlaps [0, 64)
    assert_eq!(manager.active_count(), 1);

    // Whole union [0, 96) must now be guarded; waiting on any part of it
    // clears the single merged instance.
    assert!(manager.wait_for_locked_range(90, 6));
    assert_eq!(manager.active_count(), 0);
}

#[test]
fn test_bridging_lock_collapses_all_overlapped_instances() {
    let (pool, strategy, manager) = noop_manager();
    let a = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    let b = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    let c = pool.create_sync_object(strategy.as_ref(), 1, SyncFlags::empty());

    manager.lock_range(0, 32, a);
    manager.lock_range(64, 32, b);
    // Bridges both existing locks: all three collapse to one instance
    manager.lock_range(16, 64, c);
    assert_eq!(manager.active_count(), 1);
}

#[test]
#[should_panic(expected = "zero-length")]
fn test_zero_length_lock_is_fatal() {
    let (pool, strategy, manager) = noop_manager();
    let h = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    manager.lock_range(16, 0, h);
}

// ============================================================================
// wait_for_locked_range tests
// ============================================================================

#[test]
fn test_wait_keeps_non_overlapping_locks() {
    let (pool, strategy, manager) = noop_manager();
    let a = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    let b = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());

    manager.lock_range(0, 64, a);
    manager.lock_range(128, 64, b);

    assert!(manager.wait_for_locked_range(0, 32));
    assert_eq!(manager.active_count(), 1); // [128, 192) untouched
}

#[test]
fn test_wait_on_unlocked_range_is_noop() {
    let (_, _, manager) = noop_manager();
    assert!(manager.wait_for_locked_range(0, 1024));
    assert_eq!(manager.active_count(), 0);
}

#[test]
fn test_wait_blocks_until_guard_resolves() {
    let frame = Arc::new(AtomicU64::new(0));
    let strategy = Arc::new(FrameSync::new(frame.clone(), 2));
    let pool = Arc::new(BufferLockPool::new());
    let manager = Arc::new(LockManager::new(pool.clone(), strategy.clone()));

    let h = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    manager.lock_range(0, 256, h);

    let waiter = {
        let manager = manager.clone();
        std::thread::spawn(move || manager.wait_for_locked_range(64, 64))
    };

    // Give the waiter time to block, then satisfy the frame distance
    std::thread::sleep(std::time::Duration::from_millis(5));
    frame.store(2, Ordering::Release);

    assert!(waiter.join().unwrap());
    assert_eq!(manager.active_count(), 0);
}

#[test]
fn test_concurrent_waiters_on_same_range_all_block() {
    let frame = Arc::new(AtomicU64::new(0));
    let strategy = Arc::new(FrameSync::new(frame.clone(), 2));
    let pool = Arc::new(BufferLockPool::new());
    let manager = Arc::new(LockManager::new(pool.clone(), strategy.clone()));

    let h = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    manager.lock_range(0, 64, h);

    let first = {
        let manager = manager.clone();
        std::thread::spawn(move || manager.wait_for_locked_range(0, 64))
    };
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = {
        let manager = manager.clone();
        std::thread::spawn(move || manager.wait_for_locked_range(16, 16))
    };
    std::thread::sleep(std::time::Duration::from_millis(5));

    // The guard is still pending: neither waiter may slip past it, even
    // though the first one is already inside the wait.
    assert!(!first.is_finished());
    assert!(!second.is_finished());
    assert_eq!(manager.active_count(), 1);

    frame.store(2, Ordering::Release);
    assert!(first.join().unwrap());
    assert!(second.join().unwrap());
    assert_eq!(manager.active_count(), 0);
}

#[test]
fn test_disjoint_wait_proceeds_while_guard_pending() {
    let frame = Arc::new(AtomicU64::new(0));
    let strategy = Arc::new(FrameSync::new(frame.clone(), 2));
    let pool = Arc::new(BufferLockPool::new());
    let manager = Arc::new(LockManager::new(pool.clone(), strategy.clone()));

    let h = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    manager.lock_range(0, 64, h);

    let blocked = {
        let manager = manager.clone();
        std::thread::spawn(move || manager.wait_for_locked_range(0, 64))
    };
    std::thread::sleep(std::time::Duration::from_millis(5));

    // A disjoint range is not serialized behind the pending guard
    assert!(manager.wait_for_locked_range(128, 64));
    assert!(!blocked.is_finished());
    assert_eq!(manager.active_count(), 1);

    frame.store(2, Ordering::Release);
    assert!(blocked.join().unwrap());
}

#[test]
fn test_stale_guard_neither_blocks_nor_panics() {
    let frame = Arc::new(AtomicU64::new(0));
    let strategy = Arc::new(FrameSync::new(frame.clone(), 1));
    let pool = Arc::new(BufferLockPool::new());
    let manager = LockManager::new(pool.clone(), strategy.clone());

    let old = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
    manager.lock_range(0, 64, old);

    // Resolve and recycle the slot for unrelated work
    frame.store(1, Ordering::Release);
    pool.clean_expired(strategy.as_ref());
    let _unrelated = pool.create_sync_object(strategy.as_ref(), 1, SyncFlags::empty());

    // The manager still holds the stale handle; the wait must complete
    // immediately without touching the recycled slot.
    assert!(manager.wait_for_locked_range(0, 64));
    assert_eq!(pool.pending_count(), 1);
}

#[test]
fn test_corrupt_handle_reports_false() {
    let (pool, strategy, manager) = noop_manager();
    let h = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());

    let forged = crate::sync::sync_object::SyncObjectHandle {
        index: h.index,
        generation: h.generation + 3,
    };
    manager.lock_range(0, 64, forged);
    assert!(!manager.wait_for_locked_range(0, 64));
}

// ============================================================================
// wait_all tests
// ============================================================================

#[test]
fn test_wait_all_clears_every_lock() {
    let (pool, strategy, manager) = noop_manager();
    for i in 0..4 {
        let h = pool.create_sync_object(strategy.as_ref(), 0, SyncFlags::empty());
        manager.lock_range(i * 128, 64, h);
    }
    assert_eq!(manager.active_count(), 4);
    assert!(manager.wait_all());
    assert_eq!(manager.active_count(), 0);
}
