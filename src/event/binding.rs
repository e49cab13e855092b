//! Event bindings (`electron`), their energy state machine, and bonds.
//!
//! An [`EventBinding`] pairs a trigger name with an [`Action`]. Firing moves
//! the binding from [`EnergyState::Ground`] to [`EnergyState::Excited`]; a
//! delayed scheduler task returns it to ground.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use super::action::Action;
use super::scheduler::Scheduler;
use crate::net::Method;

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyState {
    #[default]
    Ground,
    Excited,
}

/// Shared with pending reset tasks. A reset only applies if no newer fire
/// happened since it was scheduled.
#[derive(Debug, Default)]
struct Energy {
    state: Cell<EnergyState>,
    generation: Cell<u64>,
}

// ---------------------------------------------------------------------------
// EventBinding
// ---------------------------------------------------------------------------

/// Default trigger when the markup names none.
pub const DEFAULT_TRIGGER: &str = "click";

#[derive(Debug, Clone)]
pub struct EventBinding {
    pub id: String,
    pub trigger: String,
    pub action: Action,
    pub endpoint: Option<String>,
    pub method: Method,
    pub redirect: Option<String>,
    /// Name of the bonded component.
    pub bond: Option<String>,
    /// Signal emitted after the action.
    pub emit: Option<String>,
    /// Signal that fires this binding.
    pub listen: Option<String>,
    energy: Rc<Energy>,
}

impl EventBinding {
    pub fn new(id: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            trigger: DEFAULT_TRIGGER.to_string(),
            action,
            endpoint: None,
            method: Method::default(),
            redirect: None,
            bond: None,
            emit: None,
            listen: None,
            energy: Rc::default(),
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    pub fn with_bond(mut self, component: impl Into<String>) -> Self {
        self.bond = Some(component.into());
        self
    }

    pub fn with_emit(mut self, signal: impl Into<String>) -> Self {
        self.emit = Some(signal.into());
        self
    }

    pub fn with_listen(mut self, signal: impl Into<String>) -> Self {
        self.listen = Some(signal.into());
        self
    }

    pub fn energy(&self) -> EnergyState {
        self.energy.state.get()
    }

    /// Excite the binding and schedule its return to ground after `decay`.
    pub fn fire(&self, scheduler: &dyn Scheduler, decay: Duration) {
        let generation = self.energy.generation.get() + 1;
        self.energy.generation.set(generation);
        self.energy.state.set(EnergyState::Excited);

        let energy = Rc::clone(&self.energy);
        scheduler.delayed(
            decay,
            Box::new(move || {
                if energy.generation.get() == generation {
                    energy.state.set(EnergyState::Ground);
                }
            }),
        );
    }

    /// Bonds this binding declares on behalf of `component`.
    pub fn bonds(&self, component: &str) -> Vec<Bond> {
        let Some(target) = &self.bond else {
            return Vec::new();
        };
        let mut bonds = Vec::new();
        if let Some(signal) = &self.emit {
            bonds.push(Bond {
                from: component.to_string(),
                to: target.clone(),
                signal: signal.clone(),
                kind: BondKind::Emits,
            });
        }
        if let Some(signal) = &self.listen {
            bonds.push(Bond {
                from: target.clone(),
                to: component.to_string(),
                signal: signal.clone(),
                kind: BondKind::Listens,
            });
        }
        bonds
    }
}

// ---------------------------------------------------------------------------
// Bond
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BondKind {
    Emits,
    Listens,
}

/// A declared signal link between two components. Informational only:
/// delivery goes through the bus whether or not a bond exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Bond {
    pub from: String,
    pub to: String,
    pub signal: String,
    pub kind: BondKind,
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.kind {
            BondKind::Emits => "emits",
            BondKind::Listens => "listens",
        };
        write!(f, "{} -[{} {}]-> {}", self.from, arrow, self.signal, self.to)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
