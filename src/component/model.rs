//! Component descriptors: sources, metrics, lifetime tokens.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::event::binding::{Bond, EventBinding};
use crate::rules::{FieldChecks, Rule};
use crate::store::{PersistTarget, Schema};

// ---------------------------------------------------------------------------
// Source (proton)
// ---------------------------------------------------------------------------

/// Read-through cache policy for remote sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    #[default]
    None,
    Session,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "session" => Ok(Self::Session),
            other => Err(other.to_string()),
        }
    }
}

/// A named data source.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Collection name in the store.
    pub id: String,
    /// Remote URI fetched with GET.
    pub remote: Option<String>,
    /// Key for the persistence adapters.
    pub key: String,
    pub cache: CachePolicy,
    pub persist: PersistTarget,
    pub fallback: Option<Value>,
    pub schema: Option<Schema>,
    /// Expression registered as a computed binding.
    pub computed: Option<String>,
    /// Inline JSON body.
    pub inline: Option<Value>,
}

impl Source {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            key: id.clone(),
            id,
            remote: None,
            cache: CachePolicy::None,
            persist: PersistTarget::None,
            fallback: None,
            schema: None,
            computed: None,
            inline: None,
        }
    }

    pub fn with_remote(mut self, uri: impl Into<String>) -> Self {
        self.remote = Some(uri.into());
        self
    }

    pub fn with_inline(mut self, data: Value) -> Self {
        self.inline = Some(data);
        self
    }

    pub fn with_computed(mut self, expression: impl Into<String>) -> Self {
        self.computed = Some(expression.into());
        self
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some() && self.computed.is_none()
    }

    /// Value used when nothing else resolves: fallback, then the schema's
    /// empty shape, then null.
    pub fn default_value(&self) -> Value {
        if let Some(fallback) = &self.fallback {
            return fallback.clone();
        }
        match self.schema {
            Some(Schema::Array) => Value::Array(Vec::new()),
            Some(Schema::Object) => Value::Object(serde_json::Map::new()),
            None => Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub source_count: usize,
    pub rule_count: usize,
    pub combined_weight: usize,
    /// `rule_count / source_count`, or 1.0 without sources.
    pub stability: f64,
}

impl Metrics {
    pub fn new(source_count: usize, rule_count: usize) -> Self {
        let stability = if source_count == 0 {
            1.0
        } else {
            rule_count as f64 / source_count as f64
        };
        Self {
            source_count,
            rule_count,
            combined_weight: source_count + rule_count * Rule::WEIGHT,
            stability,
        }
    }

    /// More than two sources with fewer rules than sources.
    pub fn needs_advisory(&self) -> bool {
        self.stability < 1.0 && self.source_count > 2
    }
}

// ---------------------------------------------------------------------------
// LifetimeToken
// ---------------------------------------------------------------------------

/// Shared liveness flag for a component's in-flight requests.
#[derive(Clone)]
pub struct LifetimeToken(Rc<Cell<bool>>);

impl LifetimeToken {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.get()
    }

    pub fn void(&self) {
        self.0.set(false);
    }
}

impl Default for LifetimeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifetimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LifetimeToken").field(&self.is_live()).finish()
    }
}

// ---------------------------------------------------------------------------
// Component (atom)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Component {
    pub name: String,
    pub sources: Vec<Source>,
    pub rules: Vec<Rule>,
    pub events: Vec<EventBinding>,
    pub metrics: Metrics,
    lifetime: LifetimeToken,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Source>,
        rules: Vec<Rule>,
        events: Vec<EventBinding>,
    ) -> Self {
        let metrics = Metrics::new(sources.len(), rules.len());
        Self {
            name: name.into(),
            sources,
            rules,
            events,
            metrics,
            lifetime: LifetimeToken::new(),
        }
    }

    pub fn lifetime(&self) -> &LifetimeToken {
        &self.lifetime
    }

    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Field checks of every `validate` rule, in document order.
    pub fn validation_rules(&self) -> impl Iterator<Item = &[FieldChecks]> {
        self.rules.iter().filter_map(Rule::checks)
    }

    pub fn bonds(&self) -> Vec<Bond> {
        self.events
            .iter()
            .flat_map(|event| event.bonds(&self.name))
            .collect()
    }

    /// Bindings fired by `trigger`.
    pub fn events_for<'a>(&'a self, trigger: &'a str) -> impl Iterator<Item = &'a EventBinding> + 'a {
        self.events.iter().filter(move |e| e.trigger == trigger)
    }
}
