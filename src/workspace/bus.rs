//! Cross-panel event bus.
//!
//! Panels that know nothing about each other (notes, map, status line) learn
//! about domain selections here. Dispatch is synchronous and in subscription
//! order; there is no replay and no buffering.

use geopanes_core::events::{DomainEvent, DomainEventKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A subscriber callback. Returning `Err` marks the delivery as failed.
pub type Handler = Arc<dyn Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by `subscribe`, needed to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Outcome of one `publish` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Handlers that returned Ok
    pub delivered: usize,
    /// Handlers that returned Err or panicked
    pub failed: usize,
}

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: HashMap<DomainEventKind, Vec<Subscriber>>,
}

/// Cloneable handle to one publish/subscribe channel.
///
/// Clones share the same subscriber table, so the tracker and every panel
/// can hold their own handle.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        let counts: HashMap<_, _> = inner
            .subscribers
            .iter()
            .map(|(kind, subs)| (kind.as_str(), subs.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: DomainEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.entry(kind).or_default().push(Subscriber {
            id,
            handler: Arc::new(handler),
        });
        log::debug!("Subscribed {:?} to {}", id, kind);
        id
    }

    /// Remove a subscription. Returns false if it was not subscribed to `kind`.
    pub fn unsubscribe(&self, kind: DomainEventKind, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let Some(subs) = inner.subscribers.get_mut(&kind) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self, kind: DomainEventKind) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to every current subscriber of its kind.
    ///
    /// Handlers run against a snapshot taken before dispatch with the lock
    /// released, so they may publish, subscribe or unsubscribe themselves.
    /// A failing or panicking handler is logged and skipped.
    pub fn publish(&self, event: &DomainEvent) -> DeliveryReport {
        let kind = event.kind();
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let inner = self.inner.lock();
            inner
                .subscribers
                .get(&kind)
                .map(|subs| subs.iter().map(|s| (s.id, s.handler.clone())).collect())
                .unwrap_or_default()
        };

        let mut report = DeliveryReport::default();
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    log::warn!("{} handler {:?} failed: {:#}", kind, id, e);
                    report.failed += 1;
                }
                Err(payload) => {
                    log::error!("{} handler {:?} panicked: {}", kind, id, panic_message(&payload));
                    report.failed += 1;
                }
            }
        }
        log::debug!(
            "Published {}: {} delivered, {} failed",
            kind,
            report.delivered,
            report.failed
        );
        report
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopanes_core::events::ZoneRef;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |event: &DomainEvent| {
            if let Some(record) = event.record() {
                sink.lock().push(record.record_id.clone());
            }
            Ok(())
        })
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            bus.subscribe(DomainEventKind::RecordSelected, move |_| {
                order.lock().push(n);
                Ok(())
            });
        }
        let report = bus.publish(&DomainEvent::record_selected("GC1", None));
        assert_eq!(report, DeliveryReport { delivered: 3, failed: 0 });
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn only_matching_kind_is_delivered() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe(DomainEventKind::RecordSelected, handler);
        let report = bus.publish(&DomainEvent::ZoneSelected(ZoneRef { zone_id: "z".into() }));
        assert_eq!(report, DeliveryReport::default());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn failing_and_panicking_handlers_do_not_stop_others() {
        let bus = EventBus::new();
        bus.subscribe(DomainEventKind::RecordSelected, |_| anyhow::bail!("boom"));
        bus.subscribe(DomainEventKind::RecordSelected, |_| panic!("handler exploded"));
        let (seen, handler) = recorder();
        bus.subscribe(DomainEventKind::RecordSelected, handler);

        let report = bus.publish(&DomainEvent::record_selected("GC123", Some("GC123")));
        assert_eq!(report, DeliveryReport { delivered: 1, failed: 2 });
        assert_eq!(*seen.lock(), vec!["GC123".to_string()]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        let id = bus.subscribe(DomainEventKind::RecordSelected, handler);
        assert!(bus.unsubscribe(DomainEventKind::RecordSelected, id));
        assert!(!bus.unsubscribe(DomainEventKind::RecordSelected, id));
        assert!(!bus.unsubscribe(DomainEventKind::ZoneSelected, id));
        bus.publish(&DomainEvent::record_selected("GC1", None));
        assert!(seen.lock().is_empty());
        assert_eq!(bus.subscriber_count(DomainEventKind::RecordSelected), 0);
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        bus.publish(&DomainEvent::record_selected("GC1", None));
        let (seen, handler) = recorder();
        bus.subscribe(DomainEventKind::RecordSelected, handler);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_dispatch() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));
        let id = {
            let bus2 = bus.clone();
            let slot = slot.clone();
            let calls = calls.clone();
            bus.subscribe(DomainEventKind::RecordSelected, move |_| {
                *calls.lock() += 1;
                if let Some(id) = *slot.lock() {
                    bus2.unsubscribe(DomainEventKind::RecordSelected, id);
                }
                Ok(())
            })
        };
        *slot.lock() = Some(id);

        bus.publish(&DomainEvent::record_selected("a", None));
        bus.publish(&DomainEvent::record_selected("b", None));
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn clones_share_subscribers() {
        let bus = EventBus::new();
        let other = bus.clone();
        let (seen, handler) = recorder();
        other.subscribe(DomainEventKind::RecordSelected, handler);
        bus.publish(&DomainEvent::record_selected("GC9", None));
        assert_eq!(*seen.lock(), vec!["GC9".to_string()]);
    }
}
