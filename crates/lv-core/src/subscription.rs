//! Subscription handles returned by the event bus and the reactive store

use parking_lot::Mutex;

type Release = Box<dyn FnOnce() + Send>;

/// Handle for a registered callback.
///
/// Dropping a `Subscription` does **not** release the callback. Owners are
/// expected to call [`Subscription::unsubscribe`] (usually through a
/// [`SubscriptionSet`]) when they go away. Calling `unsubscribe` more than
/// once is a no-op.
#[must_use = "a subscription stays registered until `unsubscribe` is called"]
pub struct Subscription {
    id: u64,
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Registration id, unique within the bus or store that issued it
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether `unsubscribe` has not been called yet
    pub fn is_active(&self) -> bool {
        self.release.lock().is_some()
    }

    /// Remove the callback from its registry
    pub fn unsubscribe(&self) {
        // Take first so the release closure runs without holding our lock
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A group of subscriptions owned by one view, released together
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a subscription
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribe everything and forget the handles
    pub fn unsubscribe_all(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unsubscribe_runs_release_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = Subscription::new(7, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();

        assert!(!subscription.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(subscription.id(), 7);
    }

    #[test]
    fn test_set_releases_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut set = SubscriptionSet::new();
        for id in 0..3 {
            let counter = calls.clone();
            set.push(Subscription::new(id, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(set.len(), 3);
        set.unsubscribe_all();
        assert!(set.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
