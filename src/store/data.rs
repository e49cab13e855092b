//! The central data store.
//!
//! Holds raw collections, computed bindings, schemas and state cells for one
//! runtime. All methods take `&self`; interior borrows are always released
//! before handlers or persistence adapters run.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::persist::{DurableStore, EphemeralStore, PersistTarget};
use super::schema::{kind_of, Schema};
use crate::error::{DataError, ValidationError};
use crate::event::bus::{SignalBus, SignalPayload};
use crate::event::scheduler::Scheduler;
use crate::expr::{evaluate, Collections, Expr};

/// Prefix of the signal broadcast by [`DataStore::set_state`].
pub const STATE_SIGNAL_PREFIX: &str = "state:";

#[derive(Debug, Clone)]
enum Entry {
    Raw(Value),
    /// Expression source, re-parsed and evaluated on every read.
    Computed(String),
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    schemas: HashMap<String, Schema>,
    state: HashMap<String, Value>,
}

/// Computed bindings only see raw collections.
impl Collections for Inner {
    fn collection(&self, name: &str) -> Option<&Value> {
        match self.entries.get(name)? {
            Entry::Raw(value) => Some(value),
            Entry::Computed(_) => None,
        }
    }
}

pub struct DataStore {
    inner: RefCell<Inner>,
    bus: Rc<SignalBus>,
    scheduler: Rc<dyn Scheduler>,
    durable: Rc<dyn DurableStore>,
    ephemeral: Rc<dyn EphemeralStore>,
}

impl DataStore {
    pub fn new(
        bus: Rc<SignalBus>,
        scheduler: Rc<dyn Scheduler>,
        durable: Rc<dyn DurableStore>,
        ephemeral: Rc<dyn EphemeralStore>,
    ) -> Self {
        Self {
            inner: RefCell::new(Inner::default()),
            bus,
            scheduler,
            durable,
            ephemeral,
        }
    }

    // ── Collections ──────────────────────────────────────────────────

    /// Declare the expected shape of `name`. Checked on later raw registrations.
    pub fn register_schema(&self, name: impl Into<String>, schema: Schema) {
        self.inner.borrow_mut().schemas.insert(name.into(), schema);
    }

    pub fn schema(&self, name: &str) -> Option<Schema> {
        self.inner.borrow().schemas.get(name).copied()
    }

    /// Store `payload` under `name`, replacing any previous entry.
    ///
    /// Fails without storing anything when a registered schema disagrees.
    pub fn register_raw(&self, name: impl Into<String>, payload: Value) -> Result<(), ValidationError> {
        let name = name.into();
        let mut inner = self.inner.borrow_mut();
        if let Some(schema) = inner.schemas.get(&name).copied() {
            if !schema.matches(&payload) {
                return Err(ValidationError::SchemaMismatch {
                    name,
                    expected: schema.name(),
                    actual: kind_of(&payload),
                });
            }
        }
        debug!(%name, "register raw collection");
        inner.entries.insert(name, Entry::Raw(payload));
        Ok(())
    }

    /// Bind `name` to an expression. The text is stored as given.
    pub fn register_computed(&self, name: impl Into<String>, expression: impl Into<String>) {
        let name = name.into();
        let expression = expression.into();
        debug!(%name, %expression, "register computed binding");
        self.inner
            .borrow_mut()
            .entries
            .insert(name, Entry::Computed(expression));
    }

    /// Read a collection.
    ///
    /// Raw entries come back as an independent deep copy. Computed entries are
    /// evaluated against the current raw collections.
    pub fn get(&self, name: &str) -> Option<Value> {
        let inner = self.inner.borrow();
        match inner.entries.get(name) {
            Some(Entry::Raw(value)) => Some(value.clone()),
            Some(Entry::Computed(source)) => Some(evaluate(&Expr::parse(source), &*inner)),
            None => {
                warn!(error = %DataError::MissingCollection(name.to_string()), "read of unknown collection");
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().entries.contains_key(name)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        matches!(self.inner.borrow().entries.get(name), Some(Entry::Computed(_)))
    }

    /// Registered collection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.borrow().entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop a collection and its schema. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.schemas.remove(name);
        inner.entries.remove(name).is_some()
    }

    /// Every collection resolved to its current value.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let inner = self.inner.borrow();
        inner
            .entries
            .iter()
            .map(|(name, entry)| {
                let value = match entry {
                    Entry::Raw(value) => value.clone(),
                    Entry::Computed(source) => evaluate(&Expr::parse(source), &*inner),
                };
                (name.clone(), value)
            })
            .collect()
    }

    // ── State cells ──────────────────────────────────────────────────

    /// Set a state cell and broadcast `state:<name>` before returning.
    pub fn set_state(&self, name: &str, value: Value) -> usize {
        self.inner
            .borrow_mut()
            .state
            .insert(name.to_string(), value.clone());
        let signal = format!("{STATE_SIGNAL_PREFIX}{name}");
        self.bus.emit(&signal, &SignalPayload::new(name, value))
    }

    pub fn get_state(&self, name: &str) -> Option<Value> {
        self.inner.borrow().state.get(name).cloned()
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Session cache lookup.
    pub fn cached(&self, key: &str) -> Option<Value> {
        self.ephemeral.get(key)
    }

    /// Forward `data` to a persistence adapter on the scheduler's immediate
    /// queue. Failures are logged.
    pub fn persist(&self, target: PersistTarget, name: &str, key: &str, data: Value) {
        let task: Box<dyn FnOnce()> = match target {
            PersistTarget::None => return,
            PersistTarget::Durable => {
                let durable = Rc::clone(&self.durable);
                let name = name.to_string();
                let timestamp = Utc::now();
                Box::new(move || {
                    if let Err(err) = durable.put(&name, &data, timestamp) {
                        error!(%err, "durable persist failed");
                    }
                })
            }
            PersistTarget::Session => {
                let ephemeral = Rc::clone(&self.ephemeral);
                let key = key.to_string();
                Box::new(move || {
                    if let Err(err) = ephemeral.set(&key, &data) {
                        error!(%err, "session persist failed");
                    }
                })
            }
        };
        debug!(%name, %key, %target, "persist scheduled");
        self.scheduler.immediate(task);
    }

    pub fn bus(&self) -> &Rc<SignalBus> {
        &self.bus
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("collections", &self.names())
            .finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
