/// Sync module - sync objects, the shared lock pool and per-buffer lock managers

// Module declarations
pub mod sync_object;
pub mod strategy;
pub mod lock_pool;
pub mod lock_manager;

// Re-exports
pub use sync_object::*;
pub use strategy::*;
pub use lock_pool::*;
pub use lock_manager::*;
