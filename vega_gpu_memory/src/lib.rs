/*!
# Vega GPU Memory

Buffer sub-allocation and range synchronization for the Vega 3D engine.

This crate provides the platform-agnostic core of GPU buffer memory
management: chunked sub-allocation with first-fit placement and free-list
coalescing, persistently mapped buffers with race-free CPU access, and a
generation-counted sync-object pool that guards byte ranges against
in-flight GPU work. Backend implementations (Vulkan, OpenGL, etc.) supply
a `MemoryDevice` and, where needed, a `SyncStrategy`.

## Architecture

- **MemoryDevice**: backend trait for raw buffer creation, uploads and copies
- **DeviceAllocator / Chunk**: per-memory-kind pooled sub-allocation
- **BufferLockPool / LockManager**: sync-object slots and per-buffer range guards
- **GpuBuffer**: the buffer façade backends hand to callers
- **GpuMemory**: service object owning allocators, pool and frame counter

Backend implementations provide concrete `MemoryDevice` types that plug
into `GpuMemory`.
*/

// Internal modules
mod error;
mod memory;
pub mod alloc;
pub mod buffer;
pub mod device;
pub mod log;
pub mod range;
pub mod sync;

#[cfg(test)]
pub mod mock_device;

// Main vega3d namespace module
pub mod vega3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Memory service
    pub use crate::memory::{GpuMemory, MemoryConfig};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: gpu_* macros are NOT re-exported here - they are internal only
    }

    // Device sub-module with the backend-facing traits and flags
    pub mod device {
        pub use crate::device::*;
    }

    // Allocation sub-module
    pub mod alloc {
        pub use crate::alloc::*;
    }

    // Buffer sub-module
    pub mod buffer {
        pub use crate::buffer::*;
        pub use crate::range::BufferRange;
    }

    // Sync sub-module
    pub mod sync {
        pub use crate::sync::*;
    }
}

// Flat re-exports for backend crates
pub use error::{Error, Result};
pub use memory::{GpuMemory, MemoryConfig};
pub use range::BufferRange;
