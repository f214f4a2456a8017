/// Mock MemoryDevice for unit tests (no GPU required)
///
/// Backs every "GPU buffer" with host memory so allocator, lock and buffer
/// tests run without a graphics backend. Device-local buffers get storage
/// too (so copy/readback paths work) but expose no mapping, matching the
/// real contract.

use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::alloc::MappedSpan;
use crate::device::{
    BufferCreateDesc, BufferHandle, MemoryDevice, RawBuffer, StorageFlags,
};
use crate::error::{Error, Result};

struct MockBufferData {
    // Box keeps the storage address stable while the map reallocates
    storage: Box<[u8]>,
}

/// Host-memory MemoryDevice implementation
pub struct MockMemoryDevice {
    buffers: Mutex<FxHashMap<u64, MockBufferData>>,
    next_id: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
    copies: AtomicU64,
}

impl MockMemoryDevice {
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            copies: AtomicU64::new(0),
        }
    }

    /// Number of buffers created so far
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of buffers destroyed so far
    pub fn destroyed_count(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Number of buffers currently alive
    pub fn live_count(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    /// Number of GPU-side copies performed
    pub fn copy_count(&self) -> u64 {
        self.copies.load(Ordering::Relaxed)
    }

    /// Read bytes out of any buffer, mapped or not (test inspection)
    pub fn inspect(&self, buffer: BufferHandle, offset: u64, out: &mut [u8]) {
        let buffers = self.buffers.lock().unwrap();
        let data = buffers.get(&buffer.0).expect("inspecting unknown buffer");
        let start = offset as usize;
        out.copy_from_slice(&data.storage[start..start + out.len()]);
    }
}

impl Default for MockMemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDevice for MockMemoryDevice {
    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<RawBuffer> {
        let mut storage = vec![0u8; desc.size as usize].into_boxed_slice();

        let mapping = if desc.storage.contains(StorageFlags::HOST_VISIBLE) {
            let ptr = NonNull::new(storage.as_mut_ptr())
                .ok_or_else(|| Error::BackendError("null mock storage".to_string()))?;
            Some(unsafe { MappedSpan::from_raw(ptr, desc.size) })
        } else {
            None
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().unwrap().insert(id, MockBufferData { storage });
        self.created.fetch_add(1, Ordering::Relaxed);

        Ok(RawBuffer {
            handle: BufferHandle(id),
            size: desc.size,
            mapping,
        })
    }

    fn destroy_buffer(&self, buffer: RawBuffer) {
        // Frees the backing storage: any MappedSpan handed out for this
        // buffer must already be gone, same as unmapping device memory on
        // a real backend. The consumed RawBuffer (and the mapping inside
        // it) enforces that for callers holding the buffer itself.
        let removed = self.buffers.lock().unwrap().remove(&buffer.handle.0);
        assert!(removed.is_some(), "double-destroy of mock buffer {:?}", buffer.handle);
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    fn write_device_local(
        &self,
        buffer: BufferHandle,
        offset: u64,
        len: u64,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let mut buffers = self.buffers.lock().unwrap();
        let entry = buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| Error::InvalidResource(format!("unknown buffer {:?}", buffer)))?;
        let start = offset as usize;
        let end = start + len as usize;
        if end > entry.storage.len() {
            return Err(Error::InvalidResource("device-local write out of bounds".to_string()));
        }
        match data {
            Some(bytes) => entry.storage[start..end].copy_from_slice(&bytes[..len as usize]),
            None => entry.storage[start..end].fill(0),
        }
        Ok(())
    }

    fn copy_buffer(
        &self,
        src: BufferHandle,
        src_offset: u64,
        dst: BufferHandle,
        dst_offset: u64,
        len: u64,
    ) -> Result<()> {
        let mut buffers = self.buffers.lock().unwrap();

        let src_bytes = {
            let src_entry = buffers
                .get(&src.0)
                .ok_or_else(|| Error::InvalidResource(format!("unknown src buffer {:?}", src)))?;
            let start = src_offset as usize;
            src_entry.storage[start..start + len as usize].to_vec()
        };

        let dst_entry = buffers
            .get_mut(&dst.0)
            .ok_or_else(|| Error::InvalidResource(format!("unknown dst buffer {:?}", dst)))?;
        let start = dst_offset as usize;
        dst_entry.storage[start..start + len as usize].copy_from_slice(&src_bytes);

        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
