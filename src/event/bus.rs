//! Named-signal publish/subscribe bus.
//!
//! [`SignalBus`] delivers a [`SignalPayload`] synchronously to every handler
//! subscribed to a signal, in subscription order. Handlers may subscribe,
//! unsubscribe or emit other signals while being dispatched; emitting the
//! signal that is currently being dispatched is dropped with a warning.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// What every signal carries: the originating component and a JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub component: String,
    pub data: Value,
}

impl SignalPayload {
    pub fn new(component: impl Into<String>, data: Value) -> Self {
        Self {
            component: component.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// SignalBus
// ---------------------------------------------------------------------------

/// Handle returned by [`SignalBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&SignalPayload)>;

struct Subscription {
    id: SubscriptionId,
    signal: String,
    handler: Handler,
}

/// Single-threaded signal bus.
#[derive(Default)]
pub struct SignalBus {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
    /// Signals currently being dispatched.
    in_flight: RefCell<HashSet<String>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `signal`.
    pub fn subscribe(
        &self,
        signal: impl Into<String>,
        handler: impl Fn(&SignalPayload) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            signal: signal.into(),
            handler: Rc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Deliver `payload` to every handler of `signal`.
    ///
    /// Returns the number of handlers invoked. Handlers subscribed during
    /// dispatch are not called for this emission.
    pub fn emit(&self, signal: &str, payload: &SignalPayload) -> usize {
        let Some(_guard) = DispatchGuard::enter(self, signal) else {
            warn!(%signal, "dropping re-entrant emission");
            return 0;
        };

        // Snapshot so handlers can touch the subscription list.
        let handlers: Vec<Handler> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.signal == signal)
            .map(|s| Rc::clone(&s.handler))
            .collect();

        debug!(%signal, handlers = handlers.len(), "emit");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Number of handlers currently subscribed to `signal`.
    pub fn subscriber_count(&self, signal: &str) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.signal == signal)
            .count()
    }

    /// Total number of subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signals: Vec<String> = self
            .subscriptions
            .borrow()
            .iter()
            .map(|s| s.signal.clone())
            .collect();
        f.debug_struct("SignalBus")
            .field("subscriptions", &signals)
            .finish()
    }
}

/// Marks a signal in flight for the lifetime of the guard, so a panicking
/// handler cannot leave the signal blocked.
struct DispatchGuard<'a> {
    bus: &'a SignalBus,
    signal: String,
}

impl<'a> DispatchGuard<'a> {
    fn enter(bus: &'a SignalBus, signal: &str) -> Option<Self> {
        if !bus.in_flight.borrow_mut().insert(signal.to_string()) {
            return None;
        }
        Some(Self {
            bus,
            signal: signal.to_string(),
        })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.bus.in_flight.borrow_mut().remove(&self.signal);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
