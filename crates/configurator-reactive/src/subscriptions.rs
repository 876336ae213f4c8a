//! Watcher subscriptions on named cells.
//!
//! Each [`WatchSubscription`] owns a token; the registry only keeps a weak
//! reference to it. `unsubscribe` removes the record at once, while a
//! subscription that is just dropped leaves a dead record behind until the
//! next sweep.

use crate::derived::Derived;
use chrono::{DateTime, Utc};
use configurator_core::Guarded;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

struct WatchToken;

struct WatchRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    token: Weak<WatchToken>,
}

/// Summary of one live record.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchInfo {
    pub id: Uuid,
    pub cell: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    records: Mutex<HashMap<String, Vec<WatchRecord>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers interest in `source` under `cell`.
    pub fn watch<T>(self: &Arc<Self>, cell: &str, source: &Derived<T>) -> WatchSubscription<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let token = Arc::new(WatchToken);
        let record = WatchRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            token: Arc::downgrade(&token),
        };
        let id = record.id;
        self.records.lock().entry(cell.to_string()).or_default().push(record);

        WatchSubscription {
            id,
            cell: cell.to_string(),
            source: source.clone(),
            changes: source.revision().subscribe(),
            token: Some(token),
            registry: Arc::downgrade(self),
        }
    }

    /// Removes records whose subscription is gone. Returns how many.
    pub fn sweep(&self) -> usize {
        let mut records = self.records.lock();
        let before: usize = records.values().map(Vec::len).sum();
        for list in records.values_mut() {
            list.retain(|record| record.token.strong_count() > 0);
        }
        records.retain(|_, list| !list.is_empty());
        before - records.values().map(Vec::len).sum::<usize>()
    }

    /// Live subscriptions on `cell`.
    pub fn active_count(&self, cell: &str) -> usize {
        self.records
            .lock()
            .get(cell)
            .map_or(0, |list| list.iter().filter(|r| r.token.strong_count() > 0).count())
    }

    /// All records, dead ones included.
    pub fn record_count(&self) -> usize {
        self.records.lock().values().map(Vec::len).sum()
    }

    pub fn active(&self) -> Vec<WatchInfo> {
        let records = self.records.lock();
        let mut active: Vec<_> = records
            .iter()
            .flat_map(|(cell, list)| {
                list.iter()
                    .filter(|r| r.token.strong_count() > 0)
                    .map(move |r| WatchInfo {
                        id: r.id,
                        cell: cell.clone(),
                        created_at: r.created_at,
                    })
            })
            .collect();
        active.sort_by_key(|info| info.created_at);
        active
    }

    fn remove(&self, cell: &str, id: Uuid) {
        let mut records = self.records.lock();
        if let Some(list) = records.get_mut(cell) {
            list.retain(|record| record.id != id);
            if list.is_empty() {
                records.remove(cell);
            }
        }
    }
}

/// Periodically sweeps `registry` until it is dropped.
pub(crate) fn spawn_sweeper(
    registry: Weak<SubscriptionRegistry>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(period);
        ticks.tick().await;
        loop {
            ticks.tick().await;
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let removed = registry.sweep();
            if removed > 0 {
                debug!("[SubscriptionRegistry] Swept {} dead watch records", removed);
            }
        }
    })
}

/// Change notifications for one watched cell.
///
/// A notification means the graph moved; the value handed out is the
/// cell's value at that point and may equal the previous one.
pub struct WatchSubscription<T> {
    id: Uuid,
    cell: String,
    source: Derived<T>,
    changes: watch::Receiver<u64>,
    token: Option<Arc<WatchToken>>,
    registry: Weak<SubscriptionRegistry>,
}

impl<T> WatchSubscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cell(&self) -> &str {
        &self.cell
    }

    pub fn current(&self) -> Guarded<T> {
        self.source.read()
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    /// Waits for the next change. `None` once unsubscribed or when the
    /// graph is gone.
    pub async fn changed(&mut self) -> Option<Guarded<T>> {
        if self.token.is_none() {
            return None;
        }
        self.changes.changed().await.ok()?;
        Some(self.source.read())
    }

    pub fn unsubscribe(&mut self) {
        if self.token.take().is_some() {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(&self.cell, self.id);
            }
        }
    }
}
