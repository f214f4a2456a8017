/// LockManager - per-buffer-owner registry of guarded byte ranges.
///
/// Records which byte ranges of one buffer are still in use by the GPU and
/// blocks CPU access to them until the guarding sync object resolves.
/// Overlap tests are linear in the active-lock count, which is bounded by
/// ring-buffer depth (a handful of outstanding write regions), not by
/// buffer size.

use std::sync::{Arc, Mutex};

use crate::gpu_error;
use crate::range::BufferRange;
use super::lock_pool::{BufferLockPool, WaitOutcome};
use super::strategy::SyncStrategy;
use super::sync_object::SyncObjectHandle;

/// "This byte range is guarded by this sync object"
#[derive(Debug, Clone, Copy)]
pub struct BufferLockInstance {
    /// Guarded byte window
    pub range: BufferRange,
    /// Guarding sync object
    pub sync: SyncObjectHandle,
}

/// Active-lock registry for one buffer owner.
///
/// Uses two independent critical sections: the shared pool's slot table and
/// this manager's own active-lock list, so pool reuse from unrelated
/// buffers never serializes against this buffer's bookkeeping.
pub struct LockManager {
    pool: Arc<BufferLockPool>,
    strategy: Arc<dyn SyncStrategy>,
    active: Mutex<Vec<BufferLockInstance>>,
}

impl LockManager {
    /// Create a manager drawing sync objects from `pool`
    pub fn new(pool: Arc<BufferLockPool>, strategy: Arc<dyn SyncStrategy>) -> Self {
        Self {
            pool,
            strategy,
            active: Mutex::new(Vec::new()),
        }
    }

    /// The shared sync-object pool this manager draws from
    pub fn pool(&self) -> &Arc<BufferLockPool> {
        &self.pool
    }

    /// Record that `[start, start + length)` is guarded by `sync`.
    ///
    /// Every active lock overlapping the new range is merged into a single
    /// instance guarded by the NEW handle: the newest guard wins for the
    /// union of the overlapping ranges, keeping at most one instance
    /// covering any locked sub-range. A zero-length range is a programmer
    /// error and fatal.
    pub fn lock_range(&self, start: u64, length: u64, sync: SyncObjectHandle) {
        assert!(length > 0, "locking a zero-length range at offset {}", start);

        let mut range = BufferRange::new(start, length);
        let mut active = self.active.lock().unwrap();

        // Fold all overlapping instances into the new range
        active.retain(|lock| {
            if lock.range.overlaps(&range) {
                range = range.merge(&lock.range);
                false
            } else {
                true
            }
        });
        active.push(BufferLockInstance { range, sync });
    }

    /// Block until no active lock overlaps `[start, start + length)`.
    ///
    /// Every overlapping guard is resolved (waiting on the underlying sync
    /// object if needed) and dropped from the active list; non-overlapping
    /// locks are kept. Returns `false` only when a handle turns out to be
    /// newer than its pool slot, which indicates corrupted allocator state.
    pub fn wait_for_locked_range(&self, start: u64, length: u64) -> bool {
        let query = BufferRange::new(start, length);
        let mut ok = true;

        // Resolve one overlapping guard at a time. The instance stays in
        // the active list until its guard has resolved, so concurrent
        // waiters on the same bytes keep blocking; the active-list lock is
        // released across the wait, so disjoint ranges stay parallel.
        loop {
            let pending = {
                let active = self.active.lock().unwrap();
                active.iter().find(|lock| lock.range.overlaps(&query)).copied()
            };
            let Some(lock) = pending else {
                return ok;
            };

            match self.pool.wait_handle(lock.sync, self.strategy.as_ref()) {
                WaitOutcome::Resolved => {}
                WaitOutcome::Corrupt => {
                    gpu_error!(
                        "vega3d::memory::LockManager",
                        "corrupt sync handle guarding [{}, {})",
                        lock.range.start,
                        lock.range.end()
                    );
                    ok = false;
                }
            }
            self.remove_instance(&lock);
        }
    }

    /// Resolve every active lock (used by buffer destructors)
    pub fn wait_all(&self) -> bool {
        let mut ok = true;
        loop {
            let pending = {
                let active = self.active.lock().unwrap();
                active.first().copied()
            };
            let Some(lock) = pending else {
                return ok;
            };
            if self.pool.wait_handle(lock.sync, self.strategy.as_ref()) == WaitOutcome::Corrupt {
                ok = false;
            }
            self.remove_instance(&lock);
        }
    }

    /// Drop a resolved instance, unless a concurrent `lock_range` already
    /// merged it away (in which case the replacement carries a newer guard
    /// and stays).
    fn remove_instance(&self, resolved: &BufferLockInstance) {
        let mut active = self.active.lock().unwrap();
        if let Some(pos) = active
            .iter()
            .position(|lock| lock.range == resolved.range && lock.sync == resolved.sync)
        {
            active.swap_remove(pos);
        }
    }

    /// Number of currently active locks
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

#[cfg(test)]
#[path = "lock_manager_tests.rs"]
mod tests;
