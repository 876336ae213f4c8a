//! Debounced garbage collection of attribute family members.

use crate::attribute::AttributeFamilies;
use crate::graph::GraphCells;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Sweeps `families` once the configuration cell stayed quiet for `delay`.
///
/// Every configuration change restarts the wait.
pub(crate) fn spawn_family_janitor(
    families: Arc<AttributeFamilies>,
    cells: Arc<GraphCells>,
    delay: Duration,
) -> JoinHandle<()> {
    let mut changes = cells.configuration.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(delay) => break,
                }
            }

            let registry = cells.attributes.get();
            let removed = families.sweep(registry.as_deref());
            if removed > 0 {
                debug!(
                    "[AttributeJanitor] Swept {} members, {} remaining",
                    removed,
                    families.len()
                );
            }
        }
    })
}
