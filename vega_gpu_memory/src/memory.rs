/// GpuMemory - service object tying the memory subsystem together.
///
/// Owns one DeviceAllocator per memory kind, the shared BufferLockPool,
/// the injected SyncStrategy and the frame counter. Everything a backend
/// needs to hand out race-free GPU buffers hangs off this one object.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::buffer::{GpuBuffer, UpdateFrequency};
use crate::device::{MemoryDevice, MemoryKind};
use crate::error::{Error, Result};
use crate::gpu_info;
use crate::sync::{BufferLockPool, RenderApi, SyncFlags, SyncObjectHandle, SyncStrategy, WaitOutcome};
use crate::alloc::DeviceAllocator;

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the memory service
#[derive(Debug, Clone, Copy)]
pub struct MemoryConfig {
    /// Default size of a pooled chunk, in bytes
    pub chunk_size: u64,
    /// How many frames the GPU may trail the CPU before frame-counted sync
    /// objects resolve
    pub frames_in_flight: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024 * 1024,
            frames_in_flight: 2,
        }
    }
}

// ============================================================================
// Service object
// ============================================================================

/// Process-level GPU memory service.
///
/// One per logical device. Shared freely via `Arc`; every operation takes
/// `&self`.
pub struct GpuMemory {
    device: Arc<dyn MemoryDevice>,
    allocators: FxHashMap<MemoryKind, Arc<DeviceAllocator>>,
    pool: Arc<BufferLockPool>,
    strategy: Arc<dyn SyncStrategy>,
    frame: Arc<AtomicU64>,
}

impl GpuMemory {
    /// Build the service around an injected sync strategy.
    pub fn new(
        device: Arc<dyn MemoryDevice>,
        strategy: Arc<dyn SyncStrategy>,
        config: MemoryConfig,
    ) -> Self {
        assert!(config.chunk_size > 0, "chunk_size must be non-zero");

        let allocators = MemoryKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    Arc::new(DeviceAllocator::new(device.clone(), kind, config.chunk_size)),
                )
            })
            .collect();

        gpu_info!(
            "vega3d::memory::GpuMemory",
            "memory service up ({} byte chunks, {} frame(s) in flight)",
            config.chunk_size,
            config.frames_in_flight
        );

        Self {
            device,
            allocators,
            pool: Arc::new(BufferLockPool::new()),
            strategy,
            frame: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the service using the built-in strategy for `api`.
    ///
    /// Fails for APIs whose strategy must come from the backend crate
    /// (OpenGL fence polling needs a live context).
    pub fn with_api(
        device: Arc<dyn MemoryDevice>,
        api: RenderApi,
        config: MemoryConfig,
    ) -> Result<Self> {
        let frame = Arc::new(AtomicU64::new(0));
        let strategy = api.strategy(frame.clone(), config.frames_in_flight).ok_or_else(|| {
            Error::InitializationFailed(format!(
                "{:?} has no built-in sync strategy; inject one via GpuMemory::new",
                api
            ))
        })?;

        let mut service = Self::new(device, strategy, config);
        service.frame = frame;
        Ok(service)
    }

    /// Create a buffer of `size` bytes backed by the allocator for `kind`.
    pub fn create_buffer(
        &self,
        kind: MemoryKind,
        size: u64,
        frequency: UpdateFrequency,
    ) -> Result<GpuBuffer> {
        let allocator = &self.allocators[&kind];
        GpuBuffer::new(
            self.device.clone(),
            allocator.clone(),
            size,
            frequency,
            self.pool.clone(),
            self.strategy.clone(),
        )
    }

    /// Hand out a sync object stamped with the current frame.
    pub fn create_sync_object(&self, flags: SyncFlags) -> SyncObjectHandle {
        self.pool
            .create_sync_object(self.strategy.as_ref(), self.frame_number(), flags)
    }

    /// Block until the work guarded by `handle` has finished.
    pub fn wait_sync_object(&self, handle: SyncObjectHandle) -> WaitOutcome {
        self.pool.wait_handle(handle, self.strategy.as_ref())
    }

    /// End-of-frame housekeeping: advance the frame counter and sweep
    /// resolved sync-object slots back into the pool.
    pub fn end_frame(&self) {
        self.frame.fetch_add(1, Ordering::AcqRel);
        self.pool.clean_expired(self.strategy.as_ref());
    }

    /// Current frame number
    pub fn frame_number(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// The shared sync-object pool
    pub fn lock_pool(&self) -> &Arc<BufferLockPool> {
        &self.pool
    }

    /// The allocator serving `kind`
    pub fn allocator(&self, kind: MemoryKind) -> &Arc<DeviceAllocator> {
        &self.allocators[&kind]
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
