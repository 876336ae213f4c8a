//! Suspension over guarded cells.
//!
//! Reading a [`Suspended`] cell yields the value once the source is
//! initialized, or a [`Pending`] future to await until it is. While the
//! source stays uninitialized every read returns the same future, so a
//! consumer that suspends on it and reads again does not restart its wait.

use crate::derived::Derived;
use configurator_core::Guarded;
use configurator_session::{Abandoned, Pending};
use parking_lot::Mutex;
use std::sync::Arc;

/// Result of reading a suspending cell.
#[derive(Debug, Clone)]
pub enum MaybePending<T> {
    Pending(Pending<T>),
    Ready(T),
}

impl<T> MaybePending<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// A guarded cell adapted to suspend its readers.
pub struct Suspended<T> {
    source: Derived<T>,
    retained: Arc<Mutex<Option<Pending<T>>>>,
}

impl<T> Clone for Suspended<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            retained: self.retained.clone(),
        }
    }
}

impl<T> Suspended<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(source: Derived<T>) -> Self {
        Self {
            source,
            retained: Arc::new(Mutex::new(None)),
        }
    }

    /// Once the source initializes, the retained future is returned one
    /// last time (already resolvable) and the raw value after that.
    pub fn read(&self) -> MaybePending<T> {
        let current = self.source.read();
        let mut retained = self.retained.lock();
        match current {
            Guarded::Initialized(value) => match retained.take() {
                Some(pending) => MaybePending::Pending(pending),
                None => MaybePending::Ready(value),
            },
            Guarded::Uninitialized => {
                let pending = retained.get_or_insert_with(|| self.wait_for_source());
                MaybePending::Pending(pending.clone())
            }
        }
    }

    /// Reads, awaiting the pending future if there is one.
    pub async fn wait(&self) -> Result<T, Abandoned> {
        match self.read() {
            MaybePending::Ready(value) => Ok(value),
            MaybePending::Pending(pending) => pending.await,
        }
    }

    pub fn source(&self) -> &Derived<T> {
        &self.source
    }

    fn wait_for_source(&self) -> Pending<T> {
        let source = self.source.clone();
        let mut changes = source.revision().subscribe();
        Pending::from_future(async move {
            loop {
                if let Guarded::Initialized(value) = source.read() {
                    return Ok(value);
                }
                if changes.changed().await.is_err() {
                    return Err(Abandoned);
                }
            }
        })
    }
}
