/// MemoryDevice trait - the backend seam of the memory subsystem.
///
/// Implemented by backend-specific devices (e.g., VulkanMemoryDevice).
/// Everything above this trait is backend-agnostic; everything below it
/// talks to a real graphics API.

use bitflags::bitflags;

use crate::alloc::MappedSpan;
use crate::error::Result;

/// Opaque backend buffer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

bitflags! {
    /// Where a buffer's memory lives
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StorageFlags: u32 {
        /// Fast GPU-only memory, no CPU pointer
        const DEVICE_LOCAL  = 1 << 0;
        /// CPU-mappable memory
        const HOST_VISIBLE  = 1 << 1;
        /// CPU writes are visible to the GPU without explicit flushes
        const HOST_COHERENT = 1 << 2;
    }
}

bitflags! {
    /// How the CPU is allowed to touch a buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// CPU reads through the mapping
        const MAP_READ   = 1 << 0;
        /// CPU writes through the mapping
        const MAP_WRITE  = 1 << 1;
        /// Mapping stays valid for the buffer's whole lifetime
        const PERSISTENT = 1 << 2;
    }
}

/// Memory type a DeviceAllocator serves.
///
/// One allocator exists per kind so that vertex, index, uniform and storage
/// traffic never share chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Vertex buffer memory
    Vertex,
    /// Index buffer memory
    Index,
    /// Uniform/constant buffer memory
    Uniform,
    /// Shader storage buffer memory
    Storage,
    /// Anything else (staging, readback, indirect args, ...)
    Other,
}

impl MemoryKind {
    /// All kinds, in a fixed order (used to build per-kind allocator tables)
    pub const ALL: [MemoryKind; 5] = [
        MemoryKind::Vertex,
        MemoryKind::Index,
        MemoryKind::Uniform,
        MemoryKind::Storage,
        MemoryKind::Other,
    ];
}

/// Descriptor for creating a physical backing buffer
#[derive(Debug, Clone)]
pub struct BufferCreateDesc {
    /// Size in bytes
    pub size: u64,
    /// Memory type the buffer will serve
    pub kind: MemoryKind,
    /// Storage placement flags
    pub storage: StorageFlags,
    /// CPU access flags
    pub access: AccessFlags,
}

/// A physical backing buffer as created by the device
#[derive(Debug)]
pub struct RawBuffer {
    /// Backend identifier
    pub handle: BufferHandle,
    /// Buffer size in bytes
    pub size: u64,
    /// Persistent mapping covering the whole buffer, if host-visible
    pub mapping: Option<MappedSpan>,
}

/// Backend device trait for physical buffer management
///
/// Implemented by backend-specific devices. `copy_buffer` and
/// `write_device_local` are synchronized: the GPU work they schedule has
/// completed by the time they return.
pub trait MemoryDevice: Send + Sync {
    /// Create one physical buffer.
    ///
    /// When `desc.storage` contains `HOST_VISIBLE` the returned buffer
    /// carries a persistent mapping over its full size.
    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<RawBuffer>;

    /// Destroy a buffer previously returned by `create_buffer`
    fn destroy_buffer(&self, buffer: RawBuffer);

    /// GPU-side write into a device-local buffer.
    ///
    /// Uploads `data` at `offset`, or clears `len` bytes to zero when
    /// `data` is `None`. Used for write-once buffers that have no CPU
    /// mapping.
    fn write_device_local(
        &self,
        buffer: BufferHandle,
        offset: u64,
        len: u64,
        data: Option<&[u8]>,
    ) -> Result<()>;

    /// GPU→GPU copy, completed on return (used by the readback path)
    fn copy_buffer(
        &self,
        src: BufferHandle,
        src_offset: u64,
        dst: BufferHandle,
        dst_offset: u64,
        len: u64,
    ) -> Result<()>;
}
