/// DeviceAllocator - per-memory-type top-level allocator.
///
/// Pools Chunks for small and medium requests, and creates one-off
/// standalone buffers for requests that should not be shared. Pooled and
/// unpooled traffic are guarded by separate mutexes so they never contend
/// with each other.

use std::sync::{Arc, Mutex};

use slotmap::SlotMap;

use crate::{gpu_debug, gpu_error, gpu_warn};
use crate::device::{AccessFlags, BufferCreateDesc, MemoryDevice, MemoryKind, RawBuffer, StorageFlags};
use crate::error::{Error, Result};
use super::block::{Block, ChunkId};
use super::chunk::{Chunk, ChunkAllocator};

/// Per-memory-kind allocator over pooled chunks and standalone buffers.
///
/// One instance exists per `MemoryKind`; each lives for the life of the
/// device and is torn down only when the owning service is dropped.
pub struct DeviceAllocator {
    device: Arc<dyn MemoryDevice>,
    kind: MemoryKind,
    chunk_allocator: ChunkAllocator,
    chunks: Mutex<SlotMap<ChunkId, Chunk>>,
    standalone: Mutex<Vec<RawBuffer>>,
}

impl DeviceAllocator {
    /// Create an allocator serving `kind` with the given default chunk size
    pub fn new(device: Arc<dyn MemoryDevice>, kind: MemoryKind, chunk_size: u64) -> Self {
        Self {
            device,
            kind,
            chunk_allocator: ChunkAllocator::new(chunk_size),
            chunks: Mutex::new(SlotMap::with_key()),
            standalone: Mutex::new(Vec::new()),
        }
    }

    /// Memory kind this allocator serves
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Allocate a block of `size` bytes.
    ///
    /// With `pooled` set, scans all owned chunks with matching flags
    /// first-fit; on a miss, a new chunk is created and the allocation
    /// retried once. A second failure means allocator exhaustion, which
    /// has no recovery path: it is surfaced as `Error::OutOfMemory` after
    /// an error log and callers are expected to treat it as fatal.
    ///
    /// Without `pooled`, one standalone buffer is created per call and
    /// recorded in a flat list, never shared - for allocations whose
    /// lifetime or size profile makes pooling counter-productive.
    pub fn allocate(
        &self,
        pooled: bool,
        size: u64,
        storage: StorageFlags,
        access: AccessFlags,
        initial: Option<&[u8]>,
    ) -> Result<Block> {
        if pooled {
            self.allocate_pooled(size, storage, access, initial)
        } else {
            self.allocate_standalone(size, storage, access, initial)
        }
    }

    fn allocate_pooled(
        &self,
        size: u64,
        storage: StorageFlags,
        access: AccessFlags,
        initial: Option<&[u8]>,
    ) -> Result<Block> {
        let mut chunks = self.chunks.lock().unwrap();

        for (id, chunk) in chunks.iter_mut() {
            if chunk.matches(storage, access) {
                if let Some(block) = chunk.allocate(id, size, initial) {
                    return self.finish(block, initial);
                }
            }
        }

        // No chunk had room: grow the pool and retry once
        let chunk = self
            .chunk_allocator
            .allocate_chunk(self.device.as_ref(), self.kind, size, storage, access)?;
        let id = chunks.insert(chunk);
        match chunks[id].allocate(id, size, initial) {
            Some(block) => self.finish(block, initial),
            None => {
                gpu_error!(
                    "vega3d::memory::DeviceAllocator",
                    "{:?} pool exhausted: {} bytes did not fit a fresh chunk",
                    self.kind,
                    size
                );
                Err(Error::OutOfMemory)
            }
        }
    }

    fn allocate_standalone(
        &self,
        size: u64,
        storage: StorageFlags,
        access: AccessFlags,
        initial: Option<&[u8]>,
    ) -> Result<Block> {
        let buffer = self.device.create_buffer(&BufferCreateDesc {
            size,
            kind: self.kind,
            storage,
            access,
        })?;
        gpu_debug!(
            "vega3d::memory::DeviceAllocator",
            "standalone {:?} buffer of {} bytes ({:?})",
            self.kind,
            size,
            buffer.handle
        );

        let block = Block {
            buffer: buffer.handle,
            offset: 0,
            size,
            mapping: buffer.mapping,
            chunk: None,
        };
        if let (Some(data), Some(span)) = (initial, &block.mapping) {
            span.write_bytes(0, data);
        }

        self.standalone.lock().unwrap().push(buffer);
        self.finish(block, initial)
    }

    /// Upload initial data for blocks that carry no CPU mapping
    fn finish(&self, block: Block, initial: Option<&[u8]>) -> Result<Block> {
        if let Some(data) = initial {
            if block.mapping.is_none() {
                self.device.write_device_local(
                    block.buffer,
                    block.offset,
                    data.len() as u64,
                    Some(data),
                )?;
            }
        }
        Ok(block)
    }

    /// Return a block to its owner.
    ///
    /// Routed to the owning chunk when pooled; otherwise the standalone
    /// buffer is removed from the flat list and destroyed. Freeing a block
    /// this allocator never handed out is a programmer error and fatal.
    pub fn deallocate(&self, block: Block) {
        match block.chunk {
            Some(id) => {
                let mut chunks = self.chunks.lock().unwrap();
                let chunk = chunks
                    .get_mut(id)
                    .unwrap_or_else(|| panic!("block references unknown chunk {:?}", id));
                chunk.deallocate(&block);
            }
            None => {
                let mut standalone = self.standalone.lock().unwrap();
                let index = standalone
                    .iter()
                    .position(|buffer| buffer.handle == block.buffer)
                    .unwrap_or_else(|| {
                        panic!("standalone block {:?} not owned by this allocator", block.buffer)
                    });
                let buffer = standalone.swap_remove(index);
                drop(standalone);
                self.device.destroy_buffer(buffer);
            }
        }
    }

    /// Number of pooled chunks currently owned
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    /// Number of standalone buffers currently owned
    pub fn standalone_count(&self) -> usize {
        self.standalone.lock().unwrap().len()
    }
}

impl Drop for DeviceAllocator {
    fn drop(&mut self) {
        // Chunks assert emptiness; a live block here is a leak upstream
        let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
        for (_, chunk) in chunks {
            self.device.destroy_buffer(chunk.release());
        }

        let standalone = std::mem::take(&mut *self.standalone.lock().unwrap());
        if !standalone.is_empty() {
            gpu_warn!(
                "vega3d::memory::DeviceAllocator",
                "{} standalone {:?} buffer(s) never deallocated",
                standalone.len(),
                self.kind
            );
        }
        for buffer in standalone {
            self.device.destroy_buffer(buffer);
        }
    }
}

#[cfg(test)]
#[path = "device_allocator_tests.rs"]
mod tests;
