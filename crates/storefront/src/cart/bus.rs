//! Publish/subscribe for cart changes.
//!
//! UI surfaces (cart badge, header, restaurant page, order review) subscribe
//! instead of reading shared state. Each callback runs synchronously, in
//! registration order, against a snapshot of the registry taken when the
//! publish starts. A subscriber that fails or panics is logged and skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use forkful_core::Cart;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Error a subscriber may return from its callback.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&CartEvent) -> Result<(), SubscriberError> + Send + Sync>;

/// Identifies one visitor's cart across requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartKey(String);

impl CartKey {
    /// A fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A saved cart, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEvent {
    pub key: CartKey,
    pub cart: Cart,
}

/// Delivery counts for one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registry of cart subscribers. Clones share the same registry.
#[derive(Clone, Default)]
pub struct SubscriptionBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

impl BusInner {
    fn remove(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(sid, _)| *sid != id);
    }
}

impl SubscriptionBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every subsequent publish.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CartEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber.
    pub fn publish(&self, event: &CartEvent) -> PublishReport {
        // Callbacks run without the lock so they may subscribe or unsubscribe.
        let subscribers: Vec<(u64, Callback)> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut report = PublishReport::default();
        for (id, callback) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(subscriber = id, error = %e, "Cart subscriber failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(subscriber = id, "Cart subscriber panicked");
                }
            }
        }
        report
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle to a registered callback. Dropping it unsubscribes.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Deregister the callback.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn event() -> CartEvent {
        CartEvent {
            key: CartKey::new("k"),
            cart: Cart::empty(),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl Fn(&CartEvent) -> Result<(), SubscriberError> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_| {
            log.lock().unwrap().push(name);
            Ok(())
        }
    }

    #[test]
    fn test_publish_in_registration_order() {
        let bus = SubscriptionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.subscribe(recorder(&log, "badge"));
        let _b = bus.subscribe(recorder(&log, "header"));
        let _c = bus.subscribe(recorder(&log, "review"));

        let report = bus.publish(&event());
        assert_eq!(report.delivered, 3);
        assert_eq!(*log.lock().unwrap(), vec!["badge", "header", "review"]);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let bus = SubscriptionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.subscribe(recorder(&log, "before"));
        let _b = bus.subscribe(|_| Err("boom".into()));
        let _c = bus.subscribe(|_| panic!("subscriber bug"));
        let _d = bus.subscribe(recorder(&log, "after"));

        let report = bus.publish(&event());
        assert_eq!(report, PublishReport { delivered: 2, failed: 2 });
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = SubscriptionBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sub = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&event());
        sub.unsubscribe();
        bus.publish(&event());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = SubscriptionBus::new();
        {
            let _sub = bus.subscribe(|_| Ok(()));
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_during_publish_gets_later_events() {
        let bus = SubscriptionBus::new();
        let late_count = Arc::new(AtomicUsize::new(0));
        let late_subs = Arc::new(Mutex::new(Vec::new()));

        let registering_bus = bus.clone();
        let counter = Arc::clone(&late_count);
        let holder = Arc::clone(&late_subs);
        let _registrar = bus.subscribe(move |_| {
            let counter = Arc::clone(&counter);
            let sub = registering_bus.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            holder.lock().unwrap().push(sub);
            Ok(())
        });

        bus.publish(&event());
        assert_eq!(late_count.load(Ordering::SeqCst), 0);

        bus.publish(&event());
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = SubscriptionBus::new();
        let sub = bus.subscribe(|_| Ok(()));
        drop(bus);
        sub.unsubscribe();
    }
}
