//! Action protocol: what a fired binding does.
//!
//! Redirect, validate and emit complete synchronously ([`run_sync`]); submit
//! suspends on its HTTP call ([`submit`]). [`perform`] dispatches either way.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::binding::EventBinding;
use super::bus::SignalPayload;
use crate::component::Component;
use crate::error::NetworkError;
use crate::net::{HttpClient, Navigator};
use crate::rules::{validate, ValidationReport};
use crate::store::DataStore;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// `submit`, `post` or `save`.
    Submit,
    Redirect,
    Validate,
    Emit,
    /// Kept as written; logged when fired.
    Unsupported(String),
}

impl Action {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "submit" | "post" | "save" => Self::Submit,
            "redirect" => Self::Redirect,
            "validate" => Self::Validate,
            "emit" => Self::Emit,
            _ => Self::Unsupported(name.trim().to_string()),
        }
    }

    pub fn is_submit(&self) -> bool {
        matches!(self, Self::Submit)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => f.write_str("submit"),
            Self::Redirect => f.write_str("redirect"),
            Self::Validate => f.write_str("validate"),
            Self::Emit => f.write_str("emit"),
            Self::Unsupported(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionOutcome
// ---------------------------------------------------------------------------

/// What happened when a binding fired.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The request succeeded; `response` is the decoded body.
    Submitted { response: Value },
    /// Validation failed, nothing was sent.
    Rejected(ValidationReport),
    /// The request failed. Not retried.
    Failed(NetworkError),
    /// The response arrived after the component was torn down.
    Discarded,
    Redirected(String),
    Validated(ValidationReport),
    Emitted { signal: String, handlers: usize },
    /// Nothing to do: unsupported action or missing target.
    Skipped(String),
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Collaborators an action may touch.
#[derive(Clone)]
pub struct ActionEnv {
    pub store: Rc<DataStore>,
    pub http: Rc<dyn HttpClient>,
    pub navigator: Rc<dyn Navigator>,
}

impl fmt::Debug for ActionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEnv")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// `{source id: current value}` for every source of `component`.
pub fn gather(store: &DataStore, component: &Component) -> Map<String, Value> {
    component
        .sources
        .iter()
        .map(|source| {
            let value = store.get(&source.id).unwrap_or(Value::Null);
            (source.id.clone(), value)
        })
        .collect()
}

/// Run every `validate` rule of `component` against `data`.
pub fn validate_component(component: &Component, data: &Map<String, Value>) -> ValidationReport {
    component
        .validation_rules()
        .map(|checks| validate(checks, data))
        .fold(ValidationReport::ok(), |mut report, next| {
            report.merge(next);
            report
        })
}

/// Run `binding` on behalf of `component`.
pub async fn perform(env: &ActionEnv, component: &Component, binding: &EventBinding) -> ActionOutcome {
    match binding.action {
        Action::Submit => submit(env, component, binding).await,
        _ => run_sync(env, component, binding),
    }
}

/// Every action except submit, which is reported as skipped here.
pub fn run_sync(env: &ActionEnv, component: &Component, binding: &EventBinding) -> ActionOutcome {
    match &binding.action {
        Action::Redirect => match &binding.redirect {
            Some(target) => {
                env.navigator.navigate(target);
                ActionOutcome::Redirected(target.clone())
            }
            None => skip(component, binding, "redirect without a target"),
        },
        Action::Validate => {
            let data = gather(&env.store, component);
            ActionOutcome::Validated(validate_component(component, &data))
        }
        Action::Emit => match &binding.emit {
            Some(signal) => {
                let data = Value::Object(gather(&env.store, component));
                let handlers = env
                    .store
                    .bus()
                    .emit(signal, &SignalPayload::new(&component.name, data));
                ActionOutcome::Emitted {
                    signal: signal.clone(),
                    handlers,
                }
            }
            None => skip(component, binding, "emit without a signal"),
        },
        Action::Submit => skip(component, binding, "submit needs an async context"),
        Action::Unsupported(name) => {
            warn!(component = %component.name, binding = %binding.id, action = %name, "unsupported action");
            ActionOutcome::Skipped(format!("unsupported action `{name}`"))
        }
    }
}

/// Gather, validate, send once, then navigate and emit on success.
pub async fn submit(env: &ActionEnv, component: &Component, binding: &EventBinding) -> ActionOutcome {
    let Some(endpoint) = binding.endpoint.as_deref() else {
        return skip(component, binding, "submit without an endpoint");
    };

    let data = gather(&env.store, component);
    let report = validate_component(component, &data);
    if !report.valid {
        debug!(component = %component.name, errors = ?report.errors, "submit rejected");
        return ActionOutcome::Rejected(report);
    }

    let body = Value::Object(data);
    let lifetime = component.lifetime().clone();
    let result = env.http.send(binding.method, endpoint, &body).await;

    if !lifetime.is_live() {
        debug!(component = %component.name, %endpoint, "discarding late submit response");
        return ActionOutcome::Discarded;
    }

    match result {
        Ok(response) => {
            if let Some(target) = &binding.redirect {
                env.navigator.navigate(target);
            }
            if let Some(signal) = &binding.emit {
                env.store
                    .bus()
                    .emit(signal, &SignalPayload::new(&component.name, response.clone()));
            }
            ActionOutcome::Submitted { response }
        }
        Err(err) => {
            error!(component = %component.name, %err, "submit failed");
            ActionOutcome::Failed(err)
        }
    }
}

fn skip(component: &Component, binding: &EventBinding, reason: &str) -> ActionOutcome {
    warn!(component = %component.name, binding = %binding.id, "{reason}");
    ActionOutcome::Skipped(reason.to_string())
}
