/// FenceSync - fence-backed SyncStrategy for the Vulkan backend
///
/// Each pending sync object is bound to a `vk::Fence` from an internal
/// pool. The fence index travels in the sync object's payload word
/// (index + 1, so 0 keeps meaning "no backend state"). The caller fetches
/// the fence via `fence_for` and passes it to `queue_submit`; the fence
/// signals when the guarded work finishes.

use std::sync::{Arc, Mutex};

use ash::vk;

use vega_gpu_memory::gpu_error;
use vega_gpu_memory::vega3d::sync::{SyncObject, SyncStrategy};

use crate::vulkan_context::GpuContext;

struct FencePool {
    fences: Vec<vk::Fence>,
    free: Vec<usize>,
}

/// Fence-based sync resolution.
///
/// Fences are recycled through a free list; the pool grows to the
/// high-water mark of concurrently pending sync objects.
pub struct FenceSync {
    ctx: Arc<GpuContext>,
    pool: Mutex<FencePool>,
}

impl FenceSync {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            pool: Mutex::new(FencePool {
                fences: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// The fence bound to a pending sync object, for `queue_submit`.
    ///
    /// `None` when the object carries no backend state (already resolved,
    /// or fence creation failed at `begin`).
    pub fn fence_for(&self, sync: &SyncObject) -> Option<vk::Fence> {
        if sync.payload == 0 {
            return None;
        }
        let pool = self.pool.lock().unwrap();
        pool.fences.get(sync.payload as usize - 1).copied()
    }

    /// Number of fences ever created (pool high-water mark)
    pub fn fence_count(&self) -> usize {
        self.pool.lock().unwrap().fences.len()
    }
}

impl SyncStrategy for FenceSync {
    fn begin(&self, sync: &mut SyncObject) {
        let mut pool = self.pool.lock().unwrap();

        let index = match pool.free.pop() {
            Some(index) => index,
            None => {
                let fence = unsafe {
                    self.ctx
                        .device
                        .create_fence(&vk::FenceCreateInfo::default(), None)
                };
                match fence {
                    Ok(fence) => {
                        pool.fences.push(fence);
                        pool.fences.len() - 1
                    }
                    Err(e) => {
                        // Without a fence the object degrades to "resolved
                        // immediately"; the range guard is lost but nothing
                        // deadlocks
                        gpu_error!("vega3d::vulkan", "Failed to create sync fence: {:?}", e);
                        sync.payload = 0;
                        return;
                    }
                }
            }
        };
        sync.payload = index as u64 + 1;
    }

    fn resolve(&self, sync: &SyncObject) -> bool {
        if sync.is_resolved() || sync.payload == 0 {
            return true;
        }
        let fence = {
            let pool = self.pool.lock().unwrap();
            match pool.fences.get(sync.payload as usize - 1) {
                Some(fence) => *fence,
                None => return true,
            }
        };
        unsafe { self.ctx.device.get_fence_status(fence).unwrap_or(false) }
    }

    fn wait(&self, sync: &SyncObject) {
        let Some(fence) = self.fence_for(sync) else {
            return;
        };
        let waited = unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) };
        if let Err(e) = waited {
            // A fence that cannot be waited on means a lost device; surface
            // it loudly and let the re-check in the pool decide
            gpu_error!("vega3d::vulkan", "wait_for_fences failed: {:?}", e);
        }
    }

    fn retire(&self, sync: &mut SyncObject) {
        if sync.payload == 0 {
            return;
        }
        let index = sync.payload as usize - 1;
        sync.payload = 0;

        let mut pool = self.pool.lock().unwrap();
        if let Some(fence) = pool.fences.get(index).copied() {
            let reset = unsafe { self.ctx.device.reset_fences(&[fence]) };
            if let Err(e) = reset {
                gpu_error!("vega3d::vulkan", "Failed to reset sync fence: {:?}", e);
            }
            pool.free.push(index);
        }
    }
}

impl Drop for FenceSync {
    fn drop(&mut self) {
        let pool = self.pool.lock().unwrap();
        for fence in &pool.fences {
            unsafe {
                self.ctx.device.destroy_fence(*fence, None);
            }
        }
    }
}
