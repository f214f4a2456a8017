/// BufferLockPool - process-wide pool of reusable SyncObject slots.
///
/// Slots are recycled, never freed: the pool grows to the high-water mark
/// of concurrently outstanding sync objects and stays there. Each slot
/// carries a generation counter bumped on reuse, so a stale handle can be
/// detected (and treated as already resolved) without eager invalidation.

use std::sync::Mutex;

use crate::gpu_error;
use super::strategy::SyncStrategy;
use super::sync_object::{SyncFlags, SyncObject, SyncObjectHandle, INVALID_FRAME_NUMBER};

struct LockSlot {
    sync: SyncObject,
    generation: u32,
}

/// Outcome of waiting on a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The guarded work finished (or the handle was stale)
    Resolved,
    /// The handle's generation is newer than the slot's, or the index does
    /// not belong to this pool: allocator state is corrupted
    Corrupt,
}

/// Shared pool of sync-object slots.
///
/// Explicitly constructed and shared via `Arc`; the slot table sits behind
/// its own mutex so pool reuse from unrelated buffers never serializes
/// against any buffer's lock bookkeeping.
pub struct BufferLockPool {
    slots: Mutex<Vec<LockSlot>>,
}

impl BufferLockPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self { slots: Mutex::new(Vec::new()) }
    }

    /// Hand out a slot guaranteed to be newly created or resolved.
    ///
    /// Scans for a resolved slot first; reuse bumps the slot's generation
    /// (invalidating every outstanding handle to it). If none is free a new
    /// slot is appended. Never fails; this path always makes forward
    /// progress either by reuse or by growing the pool.
    pub fn create_sync_object(
        &self,
        strategy: &dyn SyncStrategy,
        frame: u64,
        flags: SyncFlags,
    ) -> SyncObjectHandle {
        let mut slots = self.slots.lock().unwrap();

        if let Some((index, slot)) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.sync.is_resolved())
        {
            slot.generation = slot.generation.wrapping_add(1);
            slot.sync = SyncObject { frame_number: frame, flags, payload: 0 };
            strategy.begin(&mut slot.sync);
            return SyncObjectHandle { index: index as u32, generation: slot.generation };
        }

        let mut sync = SyncObject { frame_number: frame, flags, payload: 0 };
        strategy.begin(&mut sync);
        slots.push(LockSlot { sync, generation: 0 });
        SyncObjectHandle {
            index: (slots.len() - 1) as u32,
            generation: 0,
        }
    }

    /// Once-per-frame sweep resetting every slot whose work has finished.
    pub fn clean_expired(&self, strategy: &dyn SyncStrategy) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            if !slot.sync.is_resolved() && strategy.resolve(&slot.sync) {
                strategy.retire(&mut slot.sync);
                slot.sync.frame_number = INVALID_FRAME_NUMBER;
                slot.sync.payload = 0;
            }
        }
    }

    /// Block until the work guarded by `handle` has finished.
    ///
    /// A stale handle (older generation) is already resolved and returns
    /// immediately. Waiting happens on a copy of the sync object with the
    /// slot table unlocked, so unrelated pool traffic keeps flowing.
    pub fn wait_handle(
        &self,
        handle: SyncObjectHandle,
        strategy: &dyn SyncStrategy,
    ) -> WaitOutcome {
        loop {
            let pending = {
                let mut slots = self.slots.lock().unwrap();
                let Some(slot) = slots.get_mut(handle.index as usize) else {
                    gpu_error!(
                        "vega3d::memory::BufferLockPool",
                        "handle index {} outside pool of {} slots",
                        handle.index,
                        slots.len()
                    );
                    return WaitOutcome::Corrupt;
                };

                if handle.generation > slot.generation {
                    gpu_error!(
                        "vega3d::memory::BufferLockPool",
                        "handle generation {} newer than slot generation {} (use-after-free)",
                        handle.generation,
                        slot.generation
                    );
                    return WaitOutcome::Corrupt;
                }
                if handle.generation < slot.generation || slot.sync.is_resolved() {
                    // Stale or already resolved
                    return WaitOutcome::Resolved;
                }
                if strategy.resolve(&slot.sync) {
                    strategy.retire(&mut slot.sync);
                    slot.sync.frame_number = INVALID_FRAME_NUMBER;
                    slot.sync.payload = 0;
                    return WaitOutcome::Resolved;
                }
                slot.sync
            };

            strategy.wait(&pending);
            // Re-enter the loop to re-check the slot under the lock; another
            // waiter may have retired it (or recycled it) in the meantime.
        }
    }

    /// Total number of slots (the pool's high-water mark)
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether the pool has no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }

    /// Number of slots currently guarding unfinished work
    pub fn pending_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|slot| !slot.sync.is_resolved())
            .count()
    }
}

impl Default for BufferLockPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lock_pool_tests.rs"]
mod tests;
