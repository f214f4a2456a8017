/// Buffer module - the GpuBuffer façade and its value types

// Module declarations
pub mod buffer;
pub mod gpu_buffer;

// Re-exports
pub use buffer::*;
pub use gpu_buffer::*;
