//! Event system: bindings, actions, the signal bus and scheduling.

pub mod action;
pub mod binding;
pub mod bus;
pub mod scheduler;

pub use action::{
    gather, perform, run_sync, submit, validate_component, Action, ActionEnv, ActionOutcome,
};
pub use binding::{Bond, BondKind, EnergyState, EventBinding, DEFAULT_TRIGGER};
pub use bus::{SignalBus, SignalPayload, SubscriptionId};
pub use scheduler::{LocalFuture, ManualScheduler, Scheduler, Task, TokioScheduler};
