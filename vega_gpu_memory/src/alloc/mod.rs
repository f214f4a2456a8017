/// Allocation module - blocks, chunks and the per-kind device allocator

// Module declarations
pub mod block;
pub mod chunk;
pub mod device_allocator;

// Re-exports
pub use block::*;
pub use chunk::*;
pub use device_allocator::*;
