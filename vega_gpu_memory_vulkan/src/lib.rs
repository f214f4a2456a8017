/*!
# Vega GPU Memory - Vulkan Backend

Vulkan implementation of the `vega_gpu_memory` backend traits.

This crate provides a headless Vulkan `MemoryDevice` using the Ash library
for Vulkan bindings and gpu-allocator for memory management, plus a
fence-based `SyncStrategy` (`FenceSync`) for real GPU-side resolution of
buffer range guards.
*/

// Vulkan implementation modules
mod vulkan_context;
mod vulkan_device;
mod vulkan_sync;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_context::{Config, GpuContext};
pub use vulkan_device::VulkanMemoryDevice;
pub use vulkan_sync::FenceSync;
