/// A registered listener that can be removed again.
///
/// `unsubscribe` must be idempotent.
pub trait Subscription: Send + Sync {
    fn unsubscribe(&self);
}

/// Unsubscribes the wrapped subscription when dropped.
pub struct SubscriptionGuard(Option<Box<dyn Subscription>>);

impl SubscriptionGuard {
    pub fn new(subscription: Box<dyn Subscription>) -> Self {
        Self(Some(subscription))
    }

    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.0.take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("active", &self.0.is_some())
            .finish()
    }
}
