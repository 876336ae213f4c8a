//! Guarded derived cells.
//!
//! A derived cell's body returns `Result<Option<T>, Uninitialized>`. Reads
//! of other guarded cells inside the body go through [`Derived::get`], so
//! `?` stops the body at the first uninitialized input. Both that early
//! exit and an `Ok(None)` result make the cell itself `Uninitialized`.

use crate::cell::{Cell, Revision};
use configurator_core::{Guarded, Uninitialized};
use parking_lot::Mutex;
use std::sync::Arc;

type Compute<T> = dyn Fn() -> Result<Option<T>, Uninitialized> + Send + Sync;

/// A memoized computation over cells of one graph.
///
/// The value is recomputed on the first read after the graph revision
/// moved, and served from the memo otherwise.
pub struct Derived<T> {
    compute: Arc<Compute<T>>,
    revision: Revision,
    memo: Arc<Mutex<Option<(u64, Guarded<T>)>>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            compute: self.compute.clone(),
            revision: self.revision.clone(),
            memo: self.memo.clone(),
        }
    }
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn with_guard<F>(revision: &Revision, compute: F) -> Self
    where
        F: Fn() -> Result<Option<T>, Uninitialized> + Send + Sync + 'static,
    {
        Self {
            compute: Arc::new(compute),
            revision: revision.clone(),
            memo: Arc::new(Mutex::new(None)),
        }
    }

    /// Guarded view of a primitive cell: `None` reads as `Uninitialized`.
    pub fn from_cell(cell: &Cell<Option<T>>) -> Self {
        let source = cell.clone();
        Self::with_guard(cell.revision(), move || Ok(source.get()))
    }

    pub fn read(&self) -> Guarded<T> {
        let revision = self.revision.current();
        if let Some((seen, value)) = self.memo.lock().as_ref() {
            if *seen == revision {
                return value.clone();
            }
        }

        let value = Guarded::from((self.compute)());
        *self.memo.lock() = Some((revision, value.clone()));
        value
    }

    /// Reads for use inside another guarded body.
    pub fn get(&self) -> Result<T, Uninitialized> {
        self.read().get()
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn map<U, F>(&self, f: F) -> Derived<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        Derived::with_guard(&self.revision, move || Ok(f(source.get()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_uninitialized_propagates_three_levels_without_running_bodies() {
        let revision = Revision::new();
        let root: Cell<Option<u32>> = Cell::new(&revision, None);
        let level1 = Derived::from_cell(&root);

        let spy = Arc::new(AtomicUsize::new(0));
        let level2 = {
            let level1 = level1.clone();
            let spy = spy.clone();
            Derived::with_guard(&revision, move || {
                let value = level1.get()?;
                spy.fetch_add(1, Ordering::SeqCst);
                Ok(Some(value + 1))
            })
        };
        let level3 = {
            let level2 = level2.clone();
            let spy = spy.clone();
            Derived::with_guard(&revision, move || {
                let value = level2.get()?;
                spy.fetch_add(1, Ordering::SeqCst);
                Ok(Some(value * 10))
            })
        };

        assert_eq!(level3.read(), Guarded::Uninitialized);
        assert_eq!(spy.load(Ordering::SeqCst), 0);

        root.set(Some(4));
        assert_eq!(level3.read(), Guarded::Initialized(50));
        assert_eq!(spy.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_none_result_is_uninitialized() {
        let revision = Revision::new();
        let derived: Derived<u32> = Derived::with_guard(&revision, || Ok(None));
        assert_eq!(derived.read(), Guarded::Uninitialized);
    }

    #[test]
    fn test_memoized_until_revision_moves() {
        let revision = Revision::new();
        let cell = Cell::new(&revision, Some(1u32));
        let calls = Arc::new(AtomicUsize::new(0));
        let derived = {
            let cell = cell.clone();
            let calls = calls.clone();
            Derived::with_guard(&revision, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(cell.get())
            })
        };

        derived.read();
        derived.read();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cell.set(Some(2));
        assert_eq!(derived.read(), Guarded::Initialized(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_map_keeps_guard() {
        let revision = Revision::new();
        let cell: Cell<Option<u32>> = Cell::new(&revision, None);
        let doubled = Derived::from_cell(&cell).map(|v| Some(v * 2));

        assert!(!doubled.read().is_initialized());
        cell.set(Some(3));
        assert_eq!(doubled.read(), Guarded::Initialized(6));
    }
}
