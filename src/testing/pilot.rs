//! Pilot: programmatic interaction with a headless runtime.
//!
//! The `Pilot` owns a [`Runtime`] wired to recording fakes and keeps handles
//! to each of them, so tests can route responses, drive the virtual clock,
//! and inspect requests, navigations and persisted records.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use super::fakes::{FakeHttp, RecordingNavigator};
use crate::event::action::ActionOutcome;
use crate::event::bus::SignalPayload;
use crate::event::scheduler::ManualScheduler;
use crate::runtime::{BootReport, Collaborators, Runtime, RuntimeConfig};
use crate::store::{DataStore, MemoryDurableStore, MemoryEphemeralStore};

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless runtime driver for testing.
///
/// # Examples
///
/// ```ignore
/// use atomic_ui::testing::Pilot;
/// use serde_json::json;
///
/// let pilot = Pilot::new();
/// pilot.http().on_send("/api/save", json!({"ok": true}));
/// pilot.boot(r#"<atom name="form">...</atom>"#);
/// let outcomes = pilot.trigger("form", "click").await;
/// ```
pub struct Pilot {
    runtime: Runtime,
    http: Rc<FakeHttp>,
    navigator: Rc<RecordingNavigator>,
    durable: Rc<MemoryDurableStore>,
    ephemeral: Rc<MemoryEphemeralStore>,
    scheduler: Rc<ManualScheduler>,
}

impl Pilot {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let http = Rc::new(FakeHttp::new());
        let navigator = Rc::new(RecordingNavigator::new());
        let durable = Rc::new(MemoryDurableStore::new());
        let ephemeral = Rc::new(MemoryEphemeralStore::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let collaborators = Collaborators {
            http: http.clone(),
            navigator: navigator.clone(),
            durable: durable.clone(),
            ephemeral: ephemeral.clone(),
            scheduler: scheduler.clone(),
        };
        Self {
            runtime: Runtime::new(config, collaborators),
            http,
            navigator,
            durable,
            ephemeral,
            scheduler,
        }
    }

    // ── Driving ──────────────────────────────────────────────────────

    pub fn boot(&self, markup: &str) -> BootReport {
        self.runtime.boot(markup)
    }

    /// Fire bindings, then flush persistence work they queued.
    pub async fn trigger(&self, component: &str, event: &str) -> Vec<ActionOutcome> {
        let outcomes = self.runtime.trigger(component, event).await;
        self.scheduler.run_immediate();
        outcomes
    }

    pub fn emit(&self, signal: &str, data: Value) -> usize {
        self.runtime.emit(signal, SignalPayload::new("pilot", data))
    }

    /// Await spawned loads and submits, then run queued persistence tasks.
    pub async fn settle(&self) {
        self.runtime.settle().await;
        self.scheduler.run_immediate();
    }

    /// Advance the virtual clock (energy decay).
    pub fn advance(&self, by: Duration) -> usize {
        self.scheduler.advance(by)
    }

    /// Record every payload emitted on `signal` from now on.
    pub fn record(&self, signal: &str) -> Rc<RefCell<Vec<SignalPayload>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        self.runtime
            .bus()
            .subscribe(signal, move |payload: &SignalPayload| sink.borrow_mut().push(payload.clone()));
        log
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn store(&self) -> &DataStore {
        self.runtime.store()
    }

    pub fn http(&self) -> &FakeHttp {
        &self.http
    }

    pub fn navigator(&self) -> &RecordingNavigator {
        &self.navigator
    }

    pub fn durable(&self) -> &MemoryDurableStore {
        &self.durable
    }

    pub fn ephemeral(&self) -> &MemoryEphemeralStore {
        &self.ephemeral
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }
}

impl Default for Pilot {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boots_headless() {
        let pilot = Pilot::new();
        let report = pilot.boot(r#"<atom name="a"><proton id="n">[1,2]</proton></atom>"#);
        assert!(report.is_clean());
        assert_eq!(pilot.store().get("n"), Some(json!([1, 2])));
    }

    #[test]
    fn records_signals() {
        let pilot = Pilot::new();
        let log = pilot.record("hello");
        assert_eq!(pilot.emit("hello", json!(1)), 1);
        assert_eq!(*log.borrow(), vec![SignalPayload::new("pilot", json!(1))]);
    }

    #[test]
    fn local_persistence_flushes_on_run() {
        let pilot = Pilot::new();
        pilot.boot(r#"<atom name="a"><proton id="prefs" key="app.prefs" persist="session">{"dark":true}</proton></atom>"#);
        assert!(pilot.ephemeral().is_empty());
        pilot.scheduler().run_immediate();
        assert_eq!(
            crate::store::EphemeralStore::get(pilot.ephemeral(), "app.prefs"),
            Some(json!({"dark": true}))
        );
    }

    #[tokio::test]
    async fn trigger_on_unknown_component_is_empty() {
        let pilot = Pilot::new();
        assert!(pilot.trigger("ghost", "click").await.is_empty());
    }
}
