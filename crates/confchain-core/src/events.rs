//! Change notifications
//!
//! A [`ChangeBroadcaster`] fans each [`ChangeEvent`] out to its subscribers,
//! synchronously and in subscription order, before `emit` returns. Nothing is
//! buffered or replayed: a late subscriber only sees events emitted after it
//! subscribed.

use std::sync::{Arc, Mutex, Weak};

use crate::value::Value;

/// One configuration change
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Property path that changed
    pub path: String,
    /// Value resolved for the path before the change, if any
    pub old_value: Option<Value>,
    /// Value written
    pub new_value: Value,
}

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

impl Subscribers {
    fn contains(&self, id: u64) -> bool {
        self.handlers.iter().any(|(handler_id, _)| *handler_id == id)
    }
}

/// Ordered, synchronous multicast of change events
#[derive(Default)]
pub struct ChangeBroadcaster {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ChangeBroadcaster {
    /// Create a broadcaster with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it receives every event emitted from now on until
    /// the returned [`Subscription`] is unsubscribed
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.handlers.push((id, Arc::new(handler)));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver `event` to every current subscriber
    ///
    /// The lock is not held while handlers run, so a handler may subscribe or
    /// unsubscribe (itself or others). Handlers unsubscribed during delivery
    /// are skipped; handlers added during delivery wait for the next event.
    pub fn emit(&self, event: ChangeEvent) {
        let snapshot: Vec<(u64, Handler)> = self.lock().handlers.clone();
        log::trace!(
            "Emitting change for '{}' to {} subscriber(s)",
            event.path,
            snapshot.len()
        );

        for (id, handler) in snapshot {
            if self.lock().contains(id) {
                handler(&event);
            }
        }
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers.lock().expect("subscriber lock poisoned")
    }
}

impl std::fmt::Debug for ChangeBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`ChangeBroadcaster::subscribe`]
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    /// Stop receiving events. Returns `false` if already unsubscribed or the
    /// broadcaster is gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return false;
        };
        let mut subscribers = subscribers.lock().expect("subscriber lock poisoned");
        let before = subscribers.handlers.len();
        subscribers.handlers.retain(|(id, _)| *id != self.id);
        subscribers.handlers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(path: &str, new_value: impl Into<Value>) -> ChangeEvent {
        ChangeEvent {
            path: path.to_string(),
            old_value: None,
            new_value: new_value.into(),
        }
    }

    #[test]
    fn test_delivers_in_subscription_order() {
        let broadcaster = ChangeBroadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        let _a = broadcaster.subscribe(move |e| first.lock().unwrap().push(format!("a:{}", e.path)));
        let second = Arc::clone(&seen);
        let _b = broadcaster.subscribe(move |e| second.lock().unwrap().push(format!("b:{}", e.path)));

        broadcaster.emit(event("PORT", 8080));

        // Delivery is synchronous: both handlers ran before emit returned
        assert_eq!(*seen.lock().unwrap(), vec!["a:PORT", "b:PORT"]);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let broadcaster = ChangeBroadcaster::new();
        broadcaster.emit(event("EARLY", 1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _s = broadcaster.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        broadcaster.emit(event("LATE", 2));

        assert_eq!(*seen.lock().unwrap(), vec![event("LATE", 2)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let broadcaster = ChangeBroadcaster::new();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let subscription = broadcaster.subscribe(move |_| *counter.lock().unwrap() += 1);

        broadcaster.emit(event("A", 1));
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        broadcaster.emit(event("A", 2));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_delivery() {
        let broadcaster = ChangeBroadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        // First handler unsubscribes itself and the second handler
        let own: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let own_handle = Arc::clone(&own);
        let victim_handle = Arc::clone(&victim);
        let sink = Arc::clone(&seen);
        let first = broadcaster.subscribe(move |_| {
            sink.lock().unwrap().push("first");
            if let Some(s) = own_handle.lock().unwrap().as_ref() {
                s.unsubscribe();
            }
            if let Some(s) = victim_handle.lock().unwrap().as_ref() {
                s.unsubscribe();
            }
        });
        *own.lock().unwrap() = Some(first);

        let sink = Arc::clone(&seen);
        let second = broadcaster.subscribe(move |_| sink.lock().unwrap().push("second"));
        *victim.lock().unwrap() = Some(second);

        let sink = Arc::clone(&seen);
        let _third = broadcaster.subscribe(move |_| sink.lock().unwrap().push("third"));

        broadcaster.emit(event("A", 1));
        broadcaster.emit(event("A", 2));

        assert_eq!(*seen.lock().unwrap(), vec!["first", "third", "third"]);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_subscribe_during_delivery_waits_for_next_event() {
        let broadcaster = Arc::new(ChangeBroadcaster::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&broadcaster);
        let sink = Arc::clone(&seen);
        let _outer = broadcaster.subscribe(move |e| {
            if e.path == "first" {
                let late_sink = Arc::clone(&sink);
                let _ = inner.subscribe(move |e| late_sink.lock().unwrap().push(e.path.clone()));
            }
        });

        broadcaster.emit(event("first", 1));
        assert!(seen.lock().unwrap().is_empty());

        broadcaster.emit(event("second", 2));
        assert_eq!(*seen.lock().unwrap(), vec!["second".to_string()]);
    }

    #[test]
    fn test_unsubscribe_after_broadcaster_dropped() {
        let broadcaster = ChangeBroadcaster::new();
        let subscription = broadcaster.subscribe(|_| {});
        drop(broadcaster);

        assert!(!subscription.unsubscribe());
    }
}
