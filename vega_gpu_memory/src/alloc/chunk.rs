/// Chunk and ChunkAllocator - one physical buffer plus its free-list.
///
/// A Chunk owns one persistently-mapped GPU buffer and sub-allocates
/// Blocks inside it: first-fit in offset order, splitting the first free
/// region large enough and coalescing free neighbours on deallocate.

use crate::gpu_debug;
use crate::device::{AccessFlags, BufferCreateDesc, MemoryDevice, MemoryKind, RawBuffer, StorageFlags};
use crate::error::Result;
use super::block::{Block, ChunkId};

/// One entry of a chunk's ordered free-list
#[derive(Debug, Clone, Copy)]
struct Region {
    offset: u64,
    size: u64,
    free: bool,
}

/// One physical, persistently-mapped GPU buffer plus the free-list that
/// manages sub-allocations within it.
///
/// Owned by a `DeviceAllocator` and destroyed only when the allocator is
/// torn down; teardown asserts no live blocks remain.
pub struct Chunk {
    buffer: RawBuffer,
    storage: StorageFlags,
    access: AccessFlags,
    regions: Vec<Region>,
    live: u32,
}

impl Chunk {
    /// Create a chunk backed by one freshly created buffer
    pub fn new(
        device: &dyn MemoryDevice,
        kind: MemoryKind,
        size: u64,
        storage: StorageFlags,
        access: AccessFlags,
    ) -> Result<Self> {
        let buffer = device.create_buffer(&BufferCreateDesc { size, kind, storage, access })?;
        gpu_debug!(
            "vega3d::memory::Chunk",
            "created {:?} chunk of {} bytes ({:?})",
            kind,
            size,
            buffer.handle
        );
        Ok(Self {
            buffer,
            storage,
            access,
            regions: vec![Region { offset: 0, size, free: true }],
            live: 0,
        })
    }

    /// Whether this chunk can serve requests with the given flags
    pub fn matches(&self, storage: StorageFlags, access: AccessFlags) -> bool {
        self.storage == storage && self.access == access
    }

    /// Total chunk capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.buffer.size
    }

    /// Number of blocks currently allocated from this chunk
    pub fn live_blocks(&self) -> u32 {
        self.live
    }

    /// First-fit allocation of `size` bytes.
    ///
    /// Scans the free-list in offset order and splits the first free region
    /// whose size fits into `[used][remainder]` (the remainder is omitted
    /// when zero-sized). `initial` is copied through the mapping at
    /// allocation time when the chunk is host-visible; unmapped chunks
    /// leave the upload to the caller. Returns `None` when no free region
    /// is large enough; the caller is expected to fall back to a new chunk.
    pub fn allocate(&mut self, id: ChunkId, size: u64, initial: Option<&[u8]>) -> Option<Block> {
        assert!(size > 0, "allocating a zero-sized block");

        let index = self
            .regions
            .iter()
            .position(|region| region.free && region.size >= size)?;

        let offset = self.regions[index].offset;
        let remainder = self.regions[index].size - size;

        self.regions[index] = Region { offset, size, free: false };
        if remainder > 0 {
            self.regions.insert(index + 1, Region {
                offset: offset + size,
                size: remainder,
                free: true,
            });
        }
        self.live += 1;

        let mapping = self.buffer.mapping.map(|span| span.subspan(offset, size));
        if let (Some(data), Some(span)) = (initial, &mapping) {
            assert!(data.len() as u64 <= size, "initial data larger than block");
            span.write_bytes(0, data);
        }

        Some(Block {
            buffer: self.buffer.handle,
            offset,
            size,
            mapping,
            chunk: Some(id),
        })
    }

    /// Return a block's bytes to the free-list and coalesce.
    ///
    /// Freeing an unknown or already-free region is a programmer error and
    /// fatal. After marking the region free, adjacent free regions across
    /// the whole list are merged (each free region absorbs its free
    /// successor), so any contiguous run of free space collapses into one
    /// region regardless of free order.
    pub fn deallocate(&mut self, block: &Block) {
        let index = self
            .regions
            .iter()
            .position(|region| region.offset == block.offset)
            .unwrap_or_else(|| {
                panic!("freeing unknown block at offset {} in chunk {:?}",
                       block.offset, self.buffer.handle)
            });
        let region = &mut self.regions[index];
        assert!(!region.free, "double-free of block at offset {}", block.offset);
        assert_eq!(region.size, block.size, "freed block size mismatch");
        region.free = true;
        self.live -= 1;

        // Forward sweep: merge every free region into its free successor
        let mut i = 0;
        while i + 1 < self.regions.len() {
            if self.regions[i].free && self.regions[i + 1].free {
                self.regions[i].size += self.regions[i + 1].size;
                self.regions.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    /// Free regions as `(offset, size)` pairs, in offset order
    pub fn free_regions(&self) -> Vec<(u64, u64)> {
        self.regions
            .iter()
            .filter(|region| region.free)
            .map(|region| (region.offset, region.size))
            .collect()
    }

    /// Give up the backing buffer for destruction.
    ///
    /// Tearing down a chunk with live blocks is fatal: the memory is still
    /// referenced by outstanding `Block`s.
    pub(crate) fn release(self) -> RawBuffer {
        assert!(
            self.live == 0,
            "destroying chunk {:?} with {} live blocks",
            self.buffer.handle,
            self.live
        );
        self.buffer
    }
}

/// Creates chunks for a DeviceAllocator, sized to its configured chunk
/// size - or, for a single oversized request, to the next power of two
/// above the request (an "overflow chunk"), so one large allocation never
/// fails merely because the default chunk size is too small.
pub struct ChunkAllocator {
    chunk_size: u64,
}

impl ChunkAllocator {
    pub fn new(chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self { chunk_size }
    }

    /// Configured default chunk size
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Create a chunk large enough for a `size`-byte request
    pub fn allocate_chunk(
        &self,
        device: &dyn MemoryDevice,
        kind: MemoryKind,
        size: u64,
        storage: StorageFlags,
        access: AccessFlags,
    ) -> Result<Chunk> {
        let chunk_size = if size <= self.chunk_size {
            self.chunk_size
        } else {
            size.next_power_of_two()
        };
        Chunk::new(device, kind, chunk_size, storage, access)
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
