//! Primitive cells and the graph revision counter.
//!
//! A [`Cell`] is a plain mutable holder backed by a tokio watch channel.
//! Every write also bumps the shared [`Revision`] of the graph the cell
//! belongs to, which is what derived cells memoize against and what
//! suspended reads wait on.

use std::sync::Arc;
use tokio::sync::watch;

/// Monotonic change counter shared by every cell of one graph.
#[derive(Clone)]
pub struct Revision {
    sender: Arc<watch::Sender<u64>>,
}

impl Revision {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> u64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    pub(crate) fn bump(&self) {
        self.sender.send_modify(|revision| *revision += 1);
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::new()
    }
}

/// A mutable value holder without guard logic.
pub struct Cell<T> {
    value: Arc<watch::Sender<T>>,
    revision: Revision,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            revision: self.revision.clone(),
        }
    }
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(revision: &Revision, initial: T) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            value: Arc::new(value),
            revision: revision.clone(),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        self.value.send_replace(value);
        self.revision.bump();
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value.subscribe()
    }
}

impl<T> Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Writes only when the value differs. Returns whether it was written.
    pub fn set_if_changed(&self, value: T) -> bool {
        let changed = self.value.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            self.revision.bump();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bumps_revision() {
        let revision = Revision::new();
        let cell = Cell::new(&revision, 1u32);

        cell.set(2);
        assert_eq!(cell.get(), 2);
        assert_eq!(revision.current(), 1);
    }

    #[test]
    fn test_set_if_changed_skips_equal_values() {
        let revision = Revision::new();
        let cell = Cell::new(&revision, Some(true));

        assert!(!cell.set_if_changed(Some(true)));
        assert_eq!(revision.current(), 0);
        assert!(cell.set_if_changed(Some(false)));
        assert_eq!(revision.current(), 1);
    }
}
