use crate::errors::{reporter::ErrorReporter, ErrorCategory};
use crate::events::schema::{EventKind, HostEvent};
use crate::prelude::HashMap;
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handler callback type for bus subscriptions
pub type EventHandler = Arc<dyn Fn(&HostEvent) -> Result<()> + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: EventHandler,
}

#[derive(Default)]
struct BusState {
    subscribers: HashMap<EventKind, Vec<Subscriber>>,
    next_id: u64,
    reporter: Option<ErrorReporter>,
}

/// Typed publish/subscribe hub.
///
/// `emit` synchronously invokes every currently-subscribed handler for the
/// event's kind, in subscription order. Handler failures are routed to the
/// error reporter individually; one failing handler never prevents its
/// siblings from running. Events with no subscribers are dropped, never
/// buffered.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wires the reporter that receives handler failures. Called once by the
    /// host during construction.
    pub fn set_reporter(&self, reporter: ErrorReporter) {
        self.state().reporter = Some(reporter);
    }

    /// Subscribes a handler to one event kind. The returned subscription
    /// unsubscribes the handler; dropping it without calling
    /// [`Subscription::unsubscribe`] leaves the handler installed.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&HostEvent) -> Result<()> + Send + Sync + 'static,
    {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state
            .subscribers
            .entry(kind.clone())
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });

        Subscription {
            bus: self.clone(),
            kind,
            id,
        }
    }

    /// Synchronously delivers an event to all subscribers of its kind.
    ///
    /// The subscriber list is snapshotted before any handler runs, so
    /// handlers may subscribe or unsubscribe re-entrantly; such changes take
    /// effect from the next `emit`.
    pub fn emit(&self, event: &HostEvent) {
        let kind = event.kind();
        let (handlers, reporter) = {
            let state = self.state();
            let handlers: Vec<EventHandler> = state
                .subscribers
                .get(&kind)
                .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
                .unwrap_or_default();
            (handlers, state.reporter.clone())
        };

        for handler in handlers {
            if let Err(err) = handler(event) {
                match &reporter {
                    Some(reporter) => {
                        let source = format!("event handler for '{}'", kind.name());
                        reporter.report(&source, ErrorCategory::General, &err);
                    }
                    None => {
                        log::warn!("unreported handler failure for '{}': {}", kind.name(), err)
                    }
                }
            }
        }
    }

    /// Number of live subscriptions for an event kind
    pub fn subscriber_count(&self, kind: &EventKind) -> usize {
        self.state()
            .subscribers
            .get(kind)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    fn remove(&self, kind: &EventKind, id: u64) {
        let mut state = self.state();
        if let Some(subs) = state.subscribers.get_mut(kind) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                state.subscribers.remove(kind);
            }
        }
    }
}

/// Handle returned by [`EventBus::on`]; detaches the handler on demand.
pub struct Subscription {
    bus: EventBus,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Removes the associated handler. Idempotent.
    pub fn unsubscribe(&self) {
        self.bus.remove(&self.kind, self.id);
    }
}
