//! In-process publish/subscribe registry.
//!
//! Used for sync status updates and connectivity transitions. Listeners
//! run synchronously on the notifying task; a panicking listener is logged
//! and skipped, it never reaches the notifier or the other listeners.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use crate::models::SyncStatus;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

/// Registry of listeners for values of type `T`.
pub struct Publisher<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

/// Publisher for sync status updates.
pub type StatusPublisher = Publisher<SyncStatus>;

impl<T: 'static> Publisher<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Registers a listener. It stays registered until the returned
    /// subscription is unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.listeners.remove(&id);
                }
            })),
        }
    }

    /// Calls every listener with `value`, in subscription order.
    pub fn notify(&self, value: &T) {
        // Snapshot the listeners so a listener may subscribe or unsubscribe
        // without deadlocking the registry.
        let listeners: Vec<Listener<T>> = self.lock().listeners.values().cloned().collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                tracing::warn!("Listener panicked; continuing with remaining listeners");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: 'static> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Publisher::subscribe`].
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Removes the listener. Safe to call after the publisher is gone.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_all_listeners() {
        let publisher: Publisher<u32> = Publisher::new();
        let total = Arc::new(AtomicUsize::new(0));

        let _a = {
            let total = total.clone();
            publisher.subscribe(move |v| {
                total.fetch_add(*v as usize, Ordering::SeqCst);
            })
        };
        let _b = {
            let total = total.clone();
            publisher.subscribe(move |v| {
                total.fetch_add(*v as usize * 10, Ordering::SeqCst);
            })
        };

        publisher.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let publisher: Publisher<u32> = Publisher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let sub = {
            let calls = calls.clone();
            publisher.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        publisher.notify(&1);
        sub.unsubscribe();
        publisher.notify(&1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.listener_count(), 0);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let publisher = StatusPublisher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let _bad = publisher.subscribe(|_| panic!("listener failure"));
        let _good = {
            let calls = calls.clone();
            publisher.subscribe(move |status: &SyncStatus| {
                assert_eq!(status.pending_changes, 4);
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        publisher.notify(&SyncStatus {
            pending_changes: 4,
            ..Default::default()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.listener_count(), 2);
    }

    #[test]
    fn test_unsubscribe_after_publisher_dropped() {
        let publisher: Publisher<u32> = Publisher::new();
        let sub = publisher.subscribe(|_| {});
        drop(publisher);
        sub.unsubscribe();
    }
}
