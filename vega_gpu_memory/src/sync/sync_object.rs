/// SyncObject and SyncObjectHandle - "GPU work in flight" tokens.

use bitflags::bitflags;

/// Sentinel frame number meaning "resolved / slot unused"
pub const INVALID_FRAME_NUMBER: u64 = u64::MAX;

bitflags! {
    /// Caller-supplied flags attached to a sync object at creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SyncFlags: u32 {
        /// Ask the backend to flush pending commands when the fence is
        /// inserted (GL-style `GL_SYNC_FLUSH_COMMANDS_BIT` semantics)
        const FLUSH = 1 << 0;
    }
}

/// One outstanding "GPU has/had pending work" marker.
///
/// Lives inside a `BufferLockPool` slot; reset (not destroyed) when the
/// guarded work resolves, then reused for unrelated work in a later frame.
#[derive(Debug, Clone, Copy)]
pub struct SyncObject {
    /// Frame the object was created in; `INVALID_FRAME_NUMBER` once resolved
    pub frame_number: u64,
    /// Caller-supplied flags
    pub flags: SyncFlags,
    /// Opaque backend word installed by the sync strategy (0 = none).
    /// The Vulkan backend stores a fence-pool index here.
    pub payload: u64,
}

impl SyncObject {
    /// A resolved object with no backend state attached
    pub fn resolved() -> Self {
        Self {
            frame_number: INVALID_FRAME_NUMBER,
            flags: SyncFlags::empty(),
            payload: 0,
        }
    }

    /// Whether the guarded work is already known finished
    pub fn is_resolved(&self) -> bool {
        self.frame_number == INVALID_FRAME_NUMBER
    }
}

/// External reference to a `BufferLockPool` slot.
///
/// A handle is stale once its generation no longer matches the slot's
/// current generation; stale handles are treated as already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncObjectHandle {
    /// Slot index inside the pool
    pub index: u32,
    /// Generation the slot had when this handle was issued
    pub generation: u32,
}
