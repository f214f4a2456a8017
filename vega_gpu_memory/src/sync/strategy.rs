/// Backend-specific sync resolution, expressed as a strategy object.
///
/// The lock machinery never switches on a graphics API; it calls through
/// `SyncStrategy`, and each backend supplies its own implementation
/// (frame counting for implicitly N-buffered APIs, real fences for OpenGL
/// or Vulkan fence pools).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::sync_object::SyncObject;

/// Graphics API selector.
///
/// Chooses a built-in resolution strategy where one exists; fence-based
/// backends (OpenGL sync objects, Vulkan fence pools) inject their own
/// `SyncStrategy` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderApi {
    /// No GPU - every sync object is immediately resolved
    None,
    /// OpenGL - fence-based, strategy supplied by the GL backend
    OpenGl,
    /// Vulkan-style implicit N-buffering - frame-counted resolution
    Vulkan,
}

impl RenderApi {
    /// Built-in strategy for this API, if one exists.
    ///
    /// Returns `None` for `OpenGl`: fence polling needs a live GL context,
    /// so the strategy must come from the backend crate.
    pub fn strategy(
        &self,
        frame: Arc<AtomicU64>,
        frames_in_flight: u64,
    ) -> Option<Arc<dyn SyncStrategy>> {
        match self {
            RenderApi::None => Some(Arc::new(NoopSync)),
            RenderApi::OpenGl => None,
            RenderApi::Vulkan => Some(Arc::new(FrameSync::new(frame, frames_in_flight))),
        }
    }
}

/// Strategy deciding when a `SyncObject`'s guarded work has finished.
pub trait SyncStrategy: Send + Sync {
    /// Attach backend state to a freshly created sync object.
    ///
    /// Runs under the pool lock; must not block.
    fn begin(&self, _sync: &mut SyncObject) {}

    /// Non-blocking poll: is the guarded work provably finished?
    fn resolve(&self, sync: &SyncObject) -> bool;

    /// Block the calling thread until the guarded work finishes.
    ///
    /// Called on a copy of the sync object, outside the pool lock. The
    /// default polls and yields; fence backends override this with a real
    /// driver wait. There is no timeout: a stuck fence is fatal by design.
    fn wait(&self, sync: &SyncObject) {
        while !self.resolve(sync) {
            std::thread::yield_now();
        }
    }

    /// Release backend state when a slot is reset.
    ///
    /// Runs under the pool lock; must not block.
    fn retire(&self, _sync: &mut SyncObject) {}
}

/// Strategy for `RenderApi::None`: nothing is ever in flight.
pub struct NoopSync;

impl SyncStrategy for NoopSync {
    fn resolve(&self, _sync: &SyncObject) -> bool {
        true
    }
}

/// Frame-counted resolution for implicitly N-buffered backends.
///
/// Work submitted in frame `f` is provably finished once the shared frame
/// counter reaches `f + frames_in_flight`.
pub struct FrameSync {
    frame: Arc<AtomicU64>,
    frames_in_flight: u64,
}

impl FrameSync {
    pub fn new(frame: Arc<AtomicU64>, frames_in_flight: u64) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");
        Self { frame, frames_in_flight }
    }

    /// The frame-distance threshold this strategy waits for
    pub fn frames_in_flight(&self) -> u64 {
        self.frames_in_flight
    }
}

impl SyncStrategy for FrameSync {
    fn resolve(&self, sync: &SyncObject) -> bool {
        if sync.is_resolved() {
            return true;
        }
        let current = self.frame.load(Ordering::Acquire);
        current.saturating_sub(sync.frame_number) >= self.frames_in_flight
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
