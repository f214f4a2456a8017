/// GpuBuffer - the backend-facing buffer façade.
///
/// Wraps exactly one Block (obtained from a DeviceAllocator) plus an
/// optional LockManager, and guarantees a CPU write or read never races a
/// GPU operation still using the same bytes: every mapped access waits on
/// overlapping range guards first, and every access returns a BufferLock
/// for the command-buffer layer to re-arm the guard after submission.

use std::sync::{Arc, Mutex};

use bytemuck::NoUninit;

use crate::alloc::{Block, DeviceAllocator};
use crate::device::{
    AccessFlags, BufferCreateDesc, BufferHandle, MemoryDevice, MemoryKind, RawBuffer, StorageFlags,
};
use crate::error::{Error, Result};
use crate::range::BufferRange;
use crate::sync::{BufferLockPool, LockManager, SyncObjectHandle, SyncStrategy};
use super::buffer::{BufferLock, LockKind, UpdateFrequency};

/// One logical GPU buffer with race-free CPU access.
///
/// `Once` buffers live in device-local storage with no CPU pointer and no
/// lock manager (the caller promises not to mutate after upload).
/// `Often`/`Occasional` buffers are persistently mapped and every access
/// is ordered against outstanding GPU work through the lock manager.
pub struct GpuBuffer {
    device: Arc<dyn MemoryDevice>,
    allocator: Arc<DeviceAllocator>,
    block: Option<Block>,
    frequency: UpdateFrequency,
    locks: Option<LockManager>,
    // Readback scratch for unmapped buffers; grown to the largest read
    // seen so far, never shrunk
    scratch: Mutex<Option<RawBuffer>>,
    size: u64,
}

impl GpuBuffer {
    /// Allocate a buffer of `size` bytes with the given update policy.
    pub fn new(
        device: Arc<dyn MemoryDevice>,
        allocator: Arc<DeviceAllocator>,
        size: u64,
        frequency: UpdateFrequency,
        pool: Arc<BufferLockPool>,
        strategy: Arc<dyn SyncStrategy>,
    ) -> Result<Self> {
        assert!(size > 0, "creating a zero-sized buffer");

        let (block, locks) = match frequency {
            UpdateFrequency::Once => {
                // Driver-owned storage, one-off lifetime: pooling would
                // only fragment the shared chunks
                let block = allocator.allocate(
                    false,
                    size,
                    StorageFlags::DEVICE_LOCAL,
                    AccessFlags::empty(),
                    None,
                )?;
                (block, None)
            }
            UpdateFrequency::Often | UpdateFrequency::Occasional => {
                let block = allocator.allocate(
                    true,
                    size,
                    StorageFlags::HOST_VISIBLE | StorageFlags::HOST_COHERENT,
                    AccessFlags::MAP_READ | AccessFlags::MAP_WRITE | AccessFlags::PERSISTENT,
                    None,
                )?;
                (block, Some(LockManager::new(pool, strategy)))
            }
        };

        Ok(Self {
            device,
            allocator,
            block: Some(block),
            frequency,
            locks,
            scratch: Mutex::new(None),
            size,
        })
    }

    /// Buffer size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Update policy declared at construction
    pub fn frequency(&self) -> UpdateFrequency {
        self.frequency
    }

    /// Backing buffer handle
    pub fn handle(&self) -> BufferHandle {
        self.block().buffer
    }

    /// Whether the CPU has a persistent pointer into this buffer
    pub fn is_mapped(&self) -> bool {
        self.block().mapping.is_some()
    }

    /// The lock manager, when one is attached
    pub fn lock_manager(&self) -> Option<&LockManager> {
        self.locks.as_ref()
    }

    fn block(&self) -> &Block {
        // Only None during Drop
        self.block.as_ref().expect("buffer already torn down")
    }

    /// Write `data` at `offset`, or zero-fill `len` bytes when `data` is
    /// `None`.
    ///
    /// For mapped buffers this first waits until no outstanding GPU work
    /// overlaps the range, then copies through the persistent mapping. For
    /// `Once` buffers the write is a GPU-side upload/clear. The returned
    /// `BufferLock` must be handed to `submit_lock` once the GPU command
    /// consuming these bytes is submitted.
    pub fn write_or_clear_bytes(
        &self,
        offset: u64,
        len: u64,
        data: Option<&[u8]>,
    ) -> Result<BufferLock> {
        assert!(len > 0, "zero-length buffer write");
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.size),
            "write [{}, {}+{}) out of bounds (buffer is {} bytes)",
            offset, offset, len, self.size
        );
        if let Some(bytes) = data {
            assert_eq!(bytes.len() as u64, len, "data length does not match write length");
        }

        let block = self.block();
        match &block.mapping {
            Some(span) => {
                if let Some(locks) = &self.locks {
                    if !locks.wait_for_locked_range(offset, len) {
                        return Err(Error::InvalidResource(
                            "corrupt sync state while waiting for locked range".to_string(),
                        ));
                    }
                }
                match data {
                    Some(bytes) => span.write_bytes(offset, bytes),
                    None => span.fill_zero(offset, len),
                }
            }
            None => {
                self.device
                    .write_device_local(block.buffer, block.offset + offset, len, data)?;
            }
        }

        Ok(BufferLock {
            kind: LockKind::Write,
            range: BufferRange::new(offset, len),
            buffer: block.buffer,
        })
    }

    /// Typed write convenience over `write_or_clear_bytes`
    pub fn write_slice<T: NoUninit>(&self, offset: u64, data: &[T]) -> Result<BufferLock> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.write_or_clear_bytes(offset, bytes.len() as u64, Some(bytes))
    }

    /// Read `out.len()` bytes starting at `offset`.
    ///
    /// Host-visible buffers wait on overlapping guards and copy straight
    /// from the mapping. Unmapped buffers schedule a synchronized GPU→GPU
    /// copy into a host-visible scratch buffer (grown, never shrunk,
    /// across calls) and read from that.
    pub fn read_bytes(&self, offset: u64, out: &mut [u8]) -> Result<BufferLock> {
        let len = out.len() as u64;
        assert!(len > 0, "zero-length buffer read");
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.size),
            "read [{}, {}+{}) out of bounds (buffer is {} bytes)",
            offset, offset, len, self.size
        );

        let block = self.block();
        match &block.mapping {
            Some(span) => {
                if let Some(locks) = &self.locks {
                    if !locks.wait_for_locked_range(offset, len) {
                        return Err(Error::InvalidResource(
                            "corrupt sync state while waiting for locked range".to_string(),
                        ));
                    }
                }
                span.read_bytes(offset, out);
            }
            None => {
                let mut scratch = self.scratch.lock().unwrap();
                let needs_grow = scratch.as_ref().map_or(true, |buffer| buffer.size < len);
                if needs_grow {
                    if let Some(old) = scratch.take() {
                        self.device.destroy_buffer(old);
                    }
                    *scratch = Some(self.device.create_buffer(&BufferCreateDesc {
                        size: len,
                        kind: MemoryKind::Other,
                        storage: StorageFlags::HOST_VISIBLE | StorageFlags::HOST_COHERENT,
                        access: AccessFlags::MAP_READ,
                    })?);
                }
                let staging = scratch.as_ref().expect("scratch just ensured");
                self.device.copy_buffer(
                    block.buffer,
                    block.offset + offset,
                    staging.handle,
                    0,
                    len,
                )?;
                let span = staging.mapping.as_ref().ok_or_else(|| {
                    Error::BackendError("readback scratch has no mapping".to_string())
                })?;
                span.read_bytes(0, out);
            }
        }

        Ok(BufferLock {
            kind: LockKind::Read,
            range: BufferRange::new(offset, len),
            buffer: block.buffer,
        })
    }

    /// Arm the range guard for a previously returned `BufferLock`.
    ///
    /// Called by the command-buffer layer once the GPU command touching
    /// the locked bytes has actually been submitted. A no-op for buffers
    /// without a lock manager (`Once` policy).
    pub fn submit_lock(&self, lock: &BufferLock, sync: SyncObjectHandle) {
        if let Some(locks) = &self.locks {
            locks.lock_range(lock.range.start, lock.range.length, sync);
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        // No in-flight GPU access may outlive the freed memory
        if let Some(locks) = &self.locks {
            locks.wait_all();
        }
        if let Some(block) = self.block.take() {
            self.allocator.deallocate(block);
        }
        if let Some(scratch) = self.scratch.lock().unwrap().take() {
            self.device.destroy_buffer(scratch);
        }
    }
}

#[cfg(test)]
#[path = "gpu_buffer_tests.rs"]
mod tests;
