//! Runtime: the scoped context that owns a store, a bus and a registry.
//!
//! [`Runtime`] ties together markup parsing, source resolution, event
//! dispatch and bonded subscriptions. Several runtimes can coexist; nothing
//! is global. The `headless` constructor wires in-memory collaborators.
//!
//! Remote loads and bonded submits are spawned on the runtime's
//! [`Scheduler`]. With a [`TokioScheduler`](crate::event::TokioScheduler)
//! they run on the current `tokio::task::LocalSet`; with the
//! [`ManualScheduler`] of a headless runtime they wait for
//! [`Runtime::settle`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::component::{parse_components, CachePolicy, Component, Source};
use crate::error::Error;
use crate::event::action::{perform, run_sync, submit, ActionEnv, ActionOutcome};
use crate::event::binding::Bond;
use crate::event::bus::{SignalBus, SignalPayload, SubscriptionId};
use crate::event::scheduler::{ManualScheduler, Scheduler};
use crate::markup::parse_document;
use crate::net::{HttpClient, Method, Navigator};
use crate::store::{
    DataStore, DurableStore, EphemeralStore, MemoryDurableStore, MemoryEphemeralStore,
    PersistTarget,
};
use crate::testing::{FakeHttp, RecordingNavigator};

// ---------------------------------------------------------------------------
// RuntimeConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long a fired binding stays excited.
    pub energy_decay: Duration,
    /// Tag of component root elements.
    pub root_tag: String,
    /// Method for submits that do not name one.
    pub default_method: Method,
    /// Whether `cache="session"` sources read through the ephemeral store.
    pub honour_session_cache: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            energy_decay: Duration::from_millis(300),
            root_tag: "atom".to_string(),
            default_method: Method::Post,
            honour_session_cache: true,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_energy_decay(mut self, decay: Duration) -> Self {
        self.energy_decay = decay;
        self
    }

    /// Set the component root tag (lowercased, as the tokenizer lowercases tags).
    pub fn with_root_tag(mut self, tag: impl Into<String>) -> Self {
        self.root_tag = tag.into().to_ascii_lowercase();
        self
    }

    pub fn with_default_method(mut self, method: Method) -> Self {
        self.default_method = method;
        self
    }

    pub fn with_session_cache(mut self, enable: bool) -> Self {
        self.honour_session_cache = enable;
        self
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External services a runtime talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub http: Rc<dyn HttpClient>,
    pub navigator: Rc<dyn Navigator>,
    pub durable: Rc<dyn DurableStore>,
    pub ephemeral: Rc<dyn EphemeralStore>,
    pub scheduler: Rc<dyn Scheduler>,
}

impl Collaborators {
    /// In-memory stores, an unrouted fake HTTP client, a recording navigator
    /// and a manual scheduler.
    pub fn in_memory() -> Self {
        Self {
            http: Rc::new(FakeHttp::new()),
            navigator: Rc::new(RecordingNavigator::new()),
            durable: Rc::new(MemoryDurableStore::new()),
            ephemeral: Rc::new(MemoryEphemeralStore::new()),
            scheduler: Rc::new(ManualScheduler::new()),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// BootReport
// ---------------------------------------------------------------------------

/// Result of [`Runtime::boot`].
#[derive(Debug, Default)]
pub struct BootReport {
    /// Registered component names, in document order.
    pub components: Vec<String>,
    /// Every recovered error: markup structure, bad children, schema mismatches.
    pub errors: Vec<Error>,
}

impl BootReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

struct Registered {
    component: Rc<Component>,
    subscriptions: Vec<SubscriptionId>,
}

struct Context {
    config: RuntimeConfig,
    env: ActionEnv,
    scheduler: Rc<dyn Scheduler>,
    components: RefCell<BTreeMap<String, Registered>>,
}

impl Context {
    fn bus(&self) -> &SignalBus {
        self.env.store.bus()
    }

    fn spawn(&self, future: impl std::future::Future<Output = ()> + 'static) {
        self.scheduler.spawn(Box::pin(future));
    }

    /// Fire binding `index` of `component` in response to a bus signal.
    /// Submits are spawned; every other action runs before returning.
    fn fire_bonded(ctx: &Rc<Context>, component: Rc<Component>, index: usize) {
        let Some(binding) = component.events.get(index) else {
            return;
        };
        binding.fire(ctx.scheduler.as_ref(), ctx.config.energy_decay);

        if binding.action.is_submit() {
            let task_ctx = Rc::clone(ctx);
            ctx.spawn(async move {
                if let Some(binding) = component.events.get(index) {
                    let outcome = submit(&task_ctx.env, &component, binding).await;
                    debug!(component = %component.name, binding = %binding.id, ?outcome, "bonded submit finished");
                }
            });
        } else {
            let outcome = run_sync(&ctx.env, &component, binding);
            debug!(component = %component.name, binding = %binding.id, ?outcome, "bonded action finished");
        }
    }
}

/// A scoped markup runtime.
pub struct Runtime {
    ctx: Rc<Context>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, collaborators: Collaborators) -> Self {
        let bus = Rc::new(SignalBus::new());
        let store = Rc::new(DataStore::new(
            bus,
            Rc::clone(&collaborators.scheduler),
            collaborators.durable,
            collaborators.ephemeral,
        ));
        Self {
            ctx: Rc::new(Context {
                config,
                env: ActionEnv {
                    store,
                    http: collaborators.http,
                    navigator: collaborators.navigator,
                },
                scheduler: collaborators.scheduler,
                components: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// Runtime with default config and in-memory collaborators.
    ///
    /// Nothing runs in the background: [`settle`](Self::settle) performs
    /// remote loads, submits and persistence, and [`advance`](Self::advance)
    /// moves the clock that resets binding energy.
    pub fn headless() -> Self {
        Self::new(RuntimeConfig::default(), Collaborators::in_memory())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.ctx.config
    }

    pub fn store(&self) -> &DataStore {
        &self.ctx.env.store
    }

    pub fn bus(&self) -> &SignalBus {
        self.ctx.bus()
    }

    // ── Boot and registration ────────────────────────────────────────

    /// Parse `markup` and register every component in it.
    ///
    /// A failing component never prevents the others from registering.
    pub fn boot(&self, markup: &str) -> BootReport {
        let mut report = BootReport::default();
        let doc = parse_document(markup);
        for diagnostic in doc.diagnostics() {
            warn!(%diagnostic, "recovered from malformed markup");
            report.errors.push(diagnostic.clone().into());
        }

        let (components, errors) = parse_components(&doc, &self.ctx.config);
        report.errors.extend(errors.into_iter().map(Error::from));

        for component in components {
            let name = component.name.clone();
            report.errors.extend(self.register(component));
            report.components.push(name);
        }
        debug!(components = report.components.len(), errors = report.errors.len(), "boot finished");
        report
    }

    /// Register a parsed component, replacing any earlier one with the same
    /// name. Returns schema errors met while resolving local sources.
    pub fn register(&self, component: Component) -> Vec<Error> {
        let name = component.name.clone();
        let replacing = self.ctx.components.borrow().contains_key(&name);
        if replacing {
            debug!(component = %name, "replacing registered component");
            self.teardown(&name);
        }

        let component = Rc::new(component);
        let errors = self.resolve_sources(&component);
        let subscriptions = self.subscribe_bonded(&component);
        self.ctx.components.borrow_mut().insert(
            name,
            Registered {
                component,
                subscriptions,
            },
        );
        errors
    }

    fn resolve_sources(&self, component: &Rc<Component>) -> Vec<Error> {
        let store = self.store();
        let mut errors = Vec::new();

        for source in &component.sources {
            if let Some(schema) = source.schema {
                store.register_schema(&source.id, schema);
            }
            if let Some(expression) = &source.computed {
                store.register_computed(&source.id, expression);
                continue;
            }
            if let Some(url) = &source.remote {
                let cached = self
                    .uses_session_cache(source)
                    .then(|| store.cached(&source.key))
                    .flatten();
                match cached {
                    Some(hit) => {
                        debug!(source = %source.id, key = %source.key, "session cache hit");
                        if let Err(err) = store.register_raw(&source.id, hit) {
                            warn!(%err, "cached data rejected");
                            errors.push(err.into());
                        }
                    }
                    None => self.spawn_load(component, source.clone(), url.clone()),
                }
                continue;
            }

            let value = source.inline.clone().unwrap_or_else(|| source.default_value());
            match store.register_raw(&source.id, value.clone()) {
                Ok(()) => store.persist(source.persist, &source.id, &source.key, value),
                Err(err) => {
                    warn!(component = %component.name, %err, "local data rejected");
                    errors.push(err.into());
                }
            }
        }
        errors
    }

    fn uses_session_cache(&self, source: &Source) -> bool {
        self.ctx.config.honour_session_cache && source.cache == CachePolicy::Session
    }

    fn spawn_load(&self, component: &Component, source: Source, url: String) {
        let store = Rc::clone(&self.ctx.env.store);
        let http = Rc::clone(&self.ctx.env.http);
        let lifetime = component.lifetime().clone();
        let owner = component.name.clone();
        let cache = self.uses_session_cache(&source);

        self.ctx.spawn(async move {
            let result = http.fetch(&url).await;
            if !lifetime.is_live() {
                debug!(component = %owner, source = %source.id, "discarding late response");
                return;
            }

            let (value, fetched) = match result {
                Ok(Value::Null) => (source.default_value(), false),
                Ok(value) => (value, true),
                Err(err) => {
                    error!(component = %owner, source = %source.id, %err, "load failed, using fallback");
                    (source.default_value(), false)
                }
            };

            if let Err(err) = store.register_raw(&source.id, value.clone()) {
                warn!(component = %owner, %err, "loaded data rejected, using fallback");
                if let Err(err) = store.register_raw(&source.id, source.default_value()) {
                    warn!(component = %owner, %err, "fallback rejected");
                }
                return;
            }
            if fetched {
                if cache {
                    store.persist(PersistTarget::Session, &source.id, &source.key, value.clone());
                }
                store.persist(source.persist, &source.id, &source.key, value);
            }
        });
    }

    fn subscribe_bonded(&self, component: &Rc<Component>) -> Vec<SubscriptionId> {
        component
            .events
            .iter()
            .enumerate()
            .filter_map(|(index, binding)| {
                binding.bond.as_ref()?;
                let signal = binding.listen.clone()?;
                let ctx = Rc::downgrade(&self.ctx);
                let weak = Rc::downgrade(component);
                debug!(component = %component.name, %signal, "subscribing bonded event");
                Some(self.bus().subscribe(signal, move |_: &SignalPayload| {
                    if let (Some(ctx), Some(component)) = (ctx.upgrade(), weak.upgrade()) {
                        Context::fire_bonded(&ctx, component, index);
                    }
                }))
            })
            .collect()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn component(&self, name: &str) -> Option<Rc<Component>> {
        self.ctx
            .components
            .borrow()
            .get(name)
            .map(|r| Rc::clone(&r.component))
    }

    /// Registered component names, sorted.
    pub fn components(&self) -> Vec<String> {
        self.ctx.components.borrow().keys().cloned().collect()
    }

    /// Bonds declared by every registered component.
    pub fn bonds(&self) -> Vec<Bond> {
        self.ctx
            .components
            .borrow()
            .values()
            .flat_map(|r| r.component.bonds())
            .collect()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Fire every binding of `component` whose trigger is `event`, in order.
    pub async fn trigger(&self, component: &str, event: &str) -> Vec<ActionOutcome> {
        let Some(component) = self.component(component) else {
            warn!(%component, %event, "trigger on unknown component");
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        for binding in component.events_for(event) {
            binding.fire(self.ctx.scheduler.as_ref(), self.ctx.config.energy_decay);
            outcomes.push(perform(&self.ctx.env, &component, binding).await);
        }
        outcomes
    }

    /// Emit a signal on this runtime's bus.
    pub fn emit(&self, signal: &str, payload: SignalPayload) -> usize {
        self.bus().emit(signal, &payload)
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Remove a component: void its lifetime token, drop its subscriptions
    /// and collections. Returns whether it was registered.
    pub fn teardown(&self, name: &str) -> bool {
        let Some(registered) = self.ctx.components.borrow_mut().remove(name) else {
            return false;
        };
        registered.component.lifetime().void();
        for id in registered.subscriptions {
            self.bus().unsubscribe(id);
        }
        for source in &registered.component.sources {
            self.store().remove(&source.id);
        }
        debug!(component = %name, "torn down");
        true
    }

    /// Wait for every spawned load and submit, including ones spawned while
    /// waiting.
    pub async fn settle(&self) {
        self.ctx.scheduler.settle().await;
    }

    /// Move the scheduler's virtual clock, if it has one.
    pub fn advance(&self, by: Duration) -> usize {
        self.ctx.scheduler.advance(by)
    }

    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.ctx.scheduler
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.ctx.config)
            .field("components", &self.components())
            .finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
