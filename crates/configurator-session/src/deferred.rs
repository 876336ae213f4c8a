//! One-shot resolvable futures with stable identity.
//!
//! A [`Pending`] is a cheaply clonable handle to a single shared future.
//! Clones compare equal with [`Pending::ptr_eq`], which is what suspending
//! consumers rely on to recognise "the same wait" across repeated reads.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

/// The resolving side went away without resolving.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("deferred value was abandoned before it resolved")]
pub struct Abandoned;

/// A shared handle to a value that settles once.
pub struct Pending<T> {
    inner: Shared<BoxFuture<'static, Result<T, Abandoned>>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Pending<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Abandoned>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// Whether both handles point at the same underlying future.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// The settled output, if the future has completed.
    pub fn peek(&self) -> Option<&Result<T, Abandoned>> {
        self.inner.peek()
    }
}

impl<T: Clone> Future for Pending<T> {
    type Output = Result<T, Abandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

/// A future resolved from the outside, exactly once.
pub struct Deferred<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
    pending: Pending<T>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: Mutex::new(Some(sender)),
            pending: Pending::from_future(receiver.map(|r| r.map_err(|_| Abandoned))),
        }
    }

    pub fn pending(&self) -> Pending<T> {
        self.pending.clone()
    }

    /// Resolves the future. Returns `false` if it was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                // Nobody waiting is fine; the value is simply unobserved.
                let _ = sender.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl<T> Default for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A "became ready" signal with a readable capsule.
///
/// The capsule holds the pending future while the signal is armed and
/// `None` once it has resolved. Re-arming while still pending keeps the
/// existing future, so waiters never see a fresh identity for the same wait.
pub struct DeferredSignal {
    capsule: Mutex<Option<Deferred<()>>>,
}

impl DeferredSignal {
    /// A signal that starts armed.
    pub fn new() -> Self {
        Self {
            capsule: Mutex::new(Some(Deferred::new())),
        }
    }

    /// The capsule: the pending future, or `None` after resolution.
    pub fn pending(&self) -> Option<Pending<()>> {
        self.capsule.lock().as_ref().map(Deferred::pending)
    }

    /// Arms the signal unless it already is, returning the pending future.
    pub fn arm(&self) -> Pending<()> {
        self.capsule.lock().get_or_insert_with(Deferred::new).pending()
    }

    /// Resolves the armed future and empties the capsule.
    pub fn resolve(&self) -> bool {
        match self.capsule.lock().take() {
            Some(deferred) => deferred.resolve(()),
            None => false,
        }
    }
}

impl Default for DeferredSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deferred_resolves_once() {
        let deferred = Deferred::new();
        let pending = deferred.pending();

        assert!(deferred.resolve(7u32));
        assert!(!deferred.resolve(8u32));
        assert_eq!(pending.await, Ok(7));
    }

    #[tokio::test]
    async fn test_dropped_deferred_is_abandoned() {
        let deferred: Deferred<u32> = Deferred::new();
        let pending = deferred.pending();
        drop(deferred);

        assert_eq!(pending.await, Err(Abandoned));
    }

    #[test]
    fn test_signal_keeps_identity_while_armed() {
        let signal = DeferredSignal::new();
        let first = signal.pending().unwrap();
        let second = signal.arm();

        assert!(first.ptr_eq(&second));
    }

    #[tokio::test]
    async fn test_signal_capsule_empties_on_resolve() {
        let signal = DeferredSignal::new();
        let waiting = signal.arm();

        assert!(signal.resolve());
        assert!(signal.pending().is_none());
        assert!(!signal.resolve());
        assert_eq!(waiting.clone().await, Ok(()));

        let rearmed = signal.arm();
        assert!(!rearmed.ptr_eq(&waiting));
    }
}
