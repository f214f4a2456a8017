/// VulkanMemoryDevice - Vulkan implementation of the MemoryDevice trait
///
/// Buffers are created through ash + gpu-allocator and tracked in a handle
/// table so the backend-agnostic core only ever sees opaque `BufferHandle`
/// ids. Uploads into device-local memory go through a staging buffer and a
/// one-shot transfer submission; both upload and copy are synchronized
/// (completed on return), matching the trait contract.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use rustc_hash::FxHashMap;

use vega_gpu_memory::vega3d::alloc::MappedSpan;
use vega_gpu_memory::vega3d::device::{
    AccessFlags, BufferCreateDesc, BufferHandle, MemoryDevice, MemoryKind, RawBuffer, StorageFlags,
};
use vega_gpu_memory::{gpu_error, gpu_warn};
use vega_gpu_memory::{Error, Result};

use crate::vulkan_context::GpuContext;

struct BufferEntry {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
}

/// Vulkan memory device implementation
pub struct VulkanMemoryDevice {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    /// Handle table mapping opaque ids to live Vulkan buffers
    buffers: Mutex<FxHashMap<u64, BufferEntry>>,
    next_handle: AtomicU64,
}

impl VulkanMemoryDevice {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            buffers: Mutex::new(FxHashMap::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The shared context this device operates on
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    fn usage_for_kind(kind: MemoryKind) -> vk::BufferUsageFlags {
        let usage = match kind {
            MemoryKind::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryKind::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            MemoryKind::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryKind::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
            MemoryKind::Other => vk::BufferUsageFlags::empty(),
        };
        // Every buffer can be an upload target and a readback source
        usage | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC
    }

    fn location_for(storage: StorageFlags, access: AccessFlags) -> MemoryLocation {
        if !storage.contains(StorageFlags::HOST_VISIBLE) {
            MemoryLocation::GpuOnly
        } else if access.contains(AccessFlags::MAP_READ) && !access.contains(AccessFlags::MAP_WRITE)
        {
            MemoryLocation::GpuToCpu
        } else {
            MemoryLocation::CpuToGpu
        }
    }

    fn lookup(&self, handle: BufferHandle) -> Result<vk::Buffer> {
        self.buffers
            .lock()
            .unwrap()
            .get(&handle.0)
            .map(|entry| entry.buffer)
            .ok_or_else(|| {
                gpu_error!("vega3d::vulkan", "Unknown buffer handle {:?}", handle);
                Error::InvalidResource(format!("unknown buffer handle {:?}", handle))
            })
    }

    /// Create a CpuToGpu staging buffer pre-filled with `data` (or zeroes).
    fn create_staging(&self, len: u64, data: Option<&[u8]>) -> Result<(vk::Buffer, Allocation)> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(len)
                .usage(vk::BufferUsageFlags::TRANSFER_SRC)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self
                .ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| {
                    gpu_error!("vega3d::vulkan", "Failed to create staging buffer: {:?}", e);
                    Error::BackendError(format!("Failed to create staging buffer: {:?}", e))
                })?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = self
                .ctx
                .allocator
                .lock()
                .unwrap()
                .allocate(&AllocationCreateDesc {
                    name: "staging",
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_e| {
                    self.ctx.device.destroy_buffer(buffer, None);
                    gpu_error!(
                        "vega3d::vulkan",
                        "Out of GPU memory for {} byte staging buffer",
                        len
                    );
                    Error::OutOfMemory
                })?;

            self.ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| {
                    gpu_error!("vega3d::vulkan", "Failed to bind staging memory: {:?}", e);
                    Error::BackendError(format!("Failed to bind staging memory: {:?}", e))
                })?;

            let mapped = allocation.mapped_ptr().ok_or_else(|| {
                Error::BackendError("staging buffer is not CPU-accessible".to_string())
            })?;
            let span = MappedSpan::from_raw(mapped.cast(), len);
            match data {
                Some(bytes) => span.write_bytes(0, bytes),
                None => span.fill_zero(0, len),
            }

            Ok((buffer, allocation))
        }
    }

    fn destroy_staging(&self, buffer: vk::Buffer, allocation: Allocation) {
        unsafe {
            if let Ok(mut allocator) = self.ctx.allocator.lock() {
                allocator.free(allocation).ok();
            }
            self.ctx.device.destroy_buffer(buffer, None);
        }
    }
}

impl MemoryDevice for VulkanMemoryDevice {
    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<RawBuffer> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(Self::usage_for_kind(desc.kind))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self
                .ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| {
                    gpu_error!(
                        "vega3d::vulkan",
                        "Failed to create buffer of size {} bytes: {:?}",
                        desc.size,
                        e
                    );
                    Error::BackendError(format!("Failed to create buffer: {:?}", e))
                })?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = self
                .ctx
                .allocator
                .lock()
                .unwrap()
                .allocate(&AllocationCreateDesc {
                    name: "buffer",
                    requirements,
                    location: Self::location_for(desc.storage, desc.access),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_e| {
                    self.ctx.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    gpu_error!(
                        "vega3d::vulkan",
                        "Out of GPU memory for buffer (required: {:.2} MB)",
                        size_mb
                    );
                    Error::OutOfMemory
                })?;

            self.ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| {
                    gpu_error!("vega3d::vulkan", "Failed to bind buffer memory: {:?}", e);
                    Error::BackendError(format!("Failed to bind buffer memory: {:?}", e))
                })?;

            let mapping = if desc.storage.contains(StorageFlags::HOST_VISIBLE) {
                let ptr: NonNull<u8> = allocation
                    .mapped_ptr()
                    .ok_or_else(|| {
                        Error::BackendError("host-visible buffer has no mapping".to_string())
                    })?
                    .cast();
                Some(MappedSpan::from_raw(ptr, desc.size))
            } else {
                None
            };

            let handle = BufferHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
            self.buffers.lock().unwrap().insert(
                handle.0,
                BufferEntry {
                    buffer,
                    allocation: Some(allocation),
                },
            );

            Ok(RawBuffer {
                handle,
                size: desc.size,
                mapping,
            })
        }
    }

    fn destroy_buffer(&self, buffer: RawBuffer) {
        let entry = self.buffers.lock().unwrap().remove(&buffer.handle.0);
        match entry {
            Some(mut entry) => unsafe {
                if let Some(allocation) = entry.allocation.take() {
                    // Don't panic if lock fails - we still need to destroy the buffer
                    if let Ok(mut allocator) = self.ctx.allocator.lock() {
                        allocator.free(allocation).ok();
                    }
                }
                self.ctx.device.destroy_buffer(entry.buffer, None);
            },
            None => {
                gpu_warn!(
                    "vega3d::vulkan",
                    "destroy_buffer for unknown handle {:?}",
                    buffer.handle
                );
            }
        }
    }

    fn write_device_local(
        &self,
        buffer: BufferHandle,
        offset: u64,
        len: u64,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let dst = self.lookup(buffer)?;
        let (staging, staging_allocation) = self.create_staging(len, data)?;

        let result = self.ctx.submit_one_shot(|device, cmd| unsafe {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: offset,
                size: len,
            };
            device.cmd_copy_buffer(cmd, staging, dst, &[region]);
        });

        self.destroy_staging(staging, staging_allocation);
        result
    }

    fn copy_buffer(
        &self,
        src: BufferHandle,
        src_offset: u64,
        dst: BufferHandle,
        dst_offset: u64,
        len: u64,
    ) -> Result<()> {
        let src_buffer = self.lookup(src)?;
        let dst_buffer = self.lookup(dst)?;

        self.ctx.submit_one_shot(|device, cmd| unsafe {
            let region = vk::BufferCopy {
                src_offset,
                dst_offset,
                size: len,
            };
            device.cmd_copy_buffer(cmd, src_buffer, dst_buffer, &[region]);
        })
    }
}

impl Drop for VulkanMemoryDevice {
    fn drop(&mut self) {
        let mut buffers = self.buffers.lock().unwrap();
        if !buffers.is_empty() {
            gpu_warn!(
                "vega3d::vulkan",
                "{} buffer(s) never destroyed before device teardown",
                buffers.len()
            );
        }
        for (_, mut entry) in buffers.drain() {
            unsafe {
                if let Some(allocation) = entry.allocation.take() {
                    if let Ok(mut allocator) = self.ctx.allocator.lock() {
                        allocator.free(allocation).ok();
                    }
                }
                self.ctx.device.destroy_buffer(entry.buffer, None);
            }
        }
    }
}
