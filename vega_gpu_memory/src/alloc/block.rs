/// Block and MappedSpan - the units handed out by the allocators.
///
/// A `Block` is a contiguous byte sub-range inside a backing GPU buffer.
/// All CPU access to persistently mapped memory goes through `MappedSpan`,
/// which carries explicit bounds; no caller performs raw pointer arithmetic.

use std::ptr::NonNull;

use slotmap::new_key_type;

use crate::device::BufferHandle;

new_key_type! {
    /// Key identifying a pooled chunk inside a DeviceAllocator
    pub struct ChunkId;
}

/// Bounds-checked view over persistently mapped GPU-visible memory.
///
/// The pointer remains valid for the lifetime of the backing buffer
/// (persistent mapping). Every access asserts its bounds; an out-of-range
/// offset is a programmer error and fatal.
#[derive(Debug, Clone, Copy)]
pub struct MappedSpan {
    ptr: NonNull<u8>,
    len: u64,
}

// A span is handed to exactly one owner at a time (a Block is exclusively
// owned by its caller until deallocated), so cross-thread moves are sound.
unsafe impl Send for MappedSpan {}
unsafe impl Sync for MappedSpan {}

impl MappedSpan {
    /// Wrap a mapped pointer with its valid length.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `len` bytes of memory that stays mapped
    /// for as long as the span (or any subspan of it) is used.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: u64) -> Self {
        Self { ptr, len }
    }

    /// Length of the span in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the span covers zero bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw base pointer (for backend handoff only)
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Narrow the span to `[offset, offset + len)`
    pub fn subspan(&self, offset: u64, len: u64) -> MappedSpan {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "subspan [{}, {}+{}) out of bounds (span is {} bytes)",
            offset, offset, len, self.len
        );
        unsafe {
            MappedSpan {
                ptr: NonNull::new_unchecked(self.ptr.as_ptr().add(offset as usize)),
                len,
            }
        }
    }

    /// Copy `data` into the span at `offset`
    pub fn write_bytes(&self, offset: u64, data: &[u8]) {
        self.check(offset, data.len() as u64);
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(offset as usize),
                data.len(),
            );
        }
    }

    /// Zero `len` bytes of the span starting at `offset`
    pub fn fill_zero(&self, offset: u64, len: u64) {
        self.check(offset, len);
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr().add(offset as usize), 0, len as usize);
        }
    }

    /// Copy bytes out of the span at `offset` into `out`
    pub fn read_bytes(&self, offset: u64, out: &mut [u8]) {
        self.check(offset, out.len() as u64);
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(offset as usize),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }

    fn check(&self, offset: u64, len: u64) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "mapped access [{}, {}+{}) out of bounds (span is {} bytes)",
            offset, offset, len, self.len
        );
    }
}

/// A live sub-allocation inside a chunk, or a standalone allocation.
///
/// Returned by `DeviceAllocator::allocate` and exclusively owned by the
/// caller until passed back to `DeviceAllocator::deallocate`.
#[derive(Debug)]
pub struct Block {
    /// Backing GPU buffer
    pub buffer: BufferHandle,
    /// Byte offset of this block inside the backing buffer
    pub offset: u64,
    /// Block size in bytes
    pub size: u64,
    /// CPU-visible span covering exactly this block, if the backing
    /// buffer is host-visible
    pub mapping: Option<MappedSpan>,
    /// Owning chunk when pooled; `None` for standalone allocations
    pub(crate) chunk: Option<ChunkId>,
}

impl Block {
    /// Whether this block lives inside a pooled chunk
    pub fn pooled(&self) -> bool {
        self.chunk.is_some()
    }

    /// The byte window this block covers in its backing buffer
    pub fn range(&self) -> crate::range::BufferRange {
        crate::range::BufferRange::new(self.offset, self.size)
    }
}

#[cfg(test)]
#[path = "block_tests.rs"]
mod tests;
