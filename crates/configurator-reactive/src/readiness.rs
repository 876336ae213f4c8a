//! Tracks the "configuration became usable" transition.

use crate::derived::Derived;
use crate::graph::ConfigurationInitialization;
use configurator_core::Guarded;
use configurator_session::{DeferredSignal, Pending};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Follows the configuration initialization cell.
///
/// The signal is armed while initializing and resolved once usable. Equal
/// consecutive initialization values are ignored, so a wait started while
/// initializing always observes the same future.
pub struct ReadinessTracker {
    signal: DeferredSignal,
    last: Mutex<Option<ConfigurationInitialization>>,
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self {
            signal: DeferredSignal::new(),
            last: Mutex::new(None),
        }
    }

    /// Feeds the latest initialization value. Returns whether it differed
    /// from the previous one.
    pub fn update(&self, initialization: &ConfigurationInitialization) -> bool {
        {
            let mut last = self.last.lock();
            if last.as_ref() == Some(initialization) {
                return false;
            }
            *last = Some(initialization.clone());
        }

        if initialization.is_initializing {
            self.signal.arm();
        } else if self.signal.resolve() {
            debug!("[ReadinessTracker] Configuration ready");
        }
        true
    }

    /// The capsule: the pending wait, or `None` when ready.
    pub fn pending(&self) -> Option<Pending<()>> {
        self.signal.pending()
    }

    pub fn is_ready(&self) -> bool {
        self.pending().is_none()
    }
}

impl Default for ReadinessTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps `tracker` in step with `initialization`.
pub(crate) fn spawn_readiness(
    tracker: Arc<ReadinessTracker>,
    initialization: Derived<ConfigurationInitialization>,
) -> JoinHandle<()> {
    let mut changes = initialization.revision().subscribe();
    if let Guarded::Initialized(current) = initialization.read() {
        tracker.update(&current);
    }
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            if let Guarded::Initialized(current) = initialization.read() {
                tracker.update(&current);
            }
        }
    })
}
