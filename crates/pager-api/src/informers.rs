//! Shared informer factory handle.

use std::time::Duration;

pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Opaque handle to the shared informer factory.
///
/// Carried through configuration for components that watch pager objects.
/// Server assembly never starts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedInformerFactory {
    resync_period: Duration,
}

impl SharedInformerFactory {
    pub fn new(resync_period: Duration) -> Self {
        Self { resync_period }
    }

    pub fn resync_period(&self) -> Duration {
        self.resync_period
    }
}

impl Default for SharedInformerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_RESYNC_PERIOD)
    }
}
