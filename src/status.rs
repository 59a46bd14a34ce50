use parking_lot::RwLock;
use std::sync::Arc;

/// The three latest per-region detection flags.
///
/// Written once per loop iteration, read by any observer in between.
/// Last-write-wins; a read that is stale by one iteration is harmless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionStatus {
    pub local: bool,
    pub overview: bool,
    pub monster: bool,
}

/// Shared handle to the latest detection status. Clones observe the same
/// underlying snapshot; the handle is passed explicitly rather than living
/// in ambient global state.
#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<DetectionStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> DetectionStatus {
        *self.inner.read()
    }

    pub fn set(&self, status: DetectionStatus) {
        *self.inner.write() = status;
    }
}
