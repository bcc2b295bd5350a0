//! Typed publish/subscribe event channel

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::events::CollabEvent;

/// In-process event listener.
///
/// Callbacks run synchronously on the emitter's execution context: a slow
/// listener delays the emitter. This is a documented constraint of the
/// delivery model, not a bug. Delivery is at-least-once for listeners
/// subscribed at emit time; events are not buffered for late subscribers.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &CollabEvent);
}

impl<F> EventListener for F
where
    F: Fn(&CollabEvent) + Send + Sync,
{
    fn on_event(&self, event: &CollabEvent) {
        self(event)
    }
}

/// Fire-and-forget notifier over a closed set of event variants.
#[derive(Clone, Default)]
pub struct EventNotifier {
    listeners: Arc<Mutex<Vec<Arc<dyn EventListener>>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all subsequent events.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Subscribe with a plain closure.
    pub fn subscribe_fn<F>(&self, f: F)
    where
        F: Fn(&CollabEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(f));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Dispatch one event to every current listener, synchronously.
    pub fn emit(&self, event: CollabEvent) {
        debug!(kind = event.kind(), "dispatching collaboration event");
        // Snapshot under the lock, call outside it: a slow listener must
        // not block subscription.
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn task_created() -> CollabEvent {
        CollabEvent::TaskCreated {
            meta: EventMeta::new(),
            task_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_emit_reaches_all_listeners() {
        let notifier = EventNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            notifier.subscribe_fn(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        notifier.emit(task_created());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_delivery_to_late_subscriber() {
        let notifier = EventNotifier::new();
        notifier.emit(task_created());

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        notifier.subscribe_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // The earlier event was not buffered
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        notifier.emit(task_created());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_shares_listeners() {
        let notifier = EventNotifier::new();
        let clone = notifier.clone();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        notifier.subscribe_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        clone.emit(task_created());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
