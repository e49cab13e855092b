//! Rule AST: RuleKind, Check, RuleSet.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Which shape a `neutron` body has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Validate,
    Transform,
    Compute,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Transform => "transform",
            Self::Compute => "compute",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "validate" => Ok(Self::Validate),
            "transform" => Ok(Self::Transform),
            "compute" => Ok(Self::Compute),
            other => Err(other.to_string()),
        }
    }
}

/// One validation check on a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// `required`
    Required,
    /// `email-format`
    EmailFormat,
    /// `minLength(N)`
    MinLength(usize),
    /// Any other token. Kept, never evaluated.
    Unrecognized(String),
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("required"),
            Self::EmailFormat => f.write_str("email-format"),
            Self::MinLength(n) => write!(f, "minLength({n})"),
            Self::Unrecognized(token) => f.write_str(token),
        }
    }
}

/// `field: check, check, ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChecks {
    pub field: String,
    pub checks: Vec<Check>,
}

/// `field: transform, transform, ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTransforms {
    pub field: String,
    pub transforms: Vec<String>,
}

/// `name = expression`. The expression is stored as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedField {
    pub name: String,
    pub expression: String,
}

/// A parsed rule body, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSet {
    Validate(Vec<FieldChecks>),
    Transform(Vec<FieldTransforms>),
    Compute(Vec<ComputedField>),
}

impl RuleSet {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Validate(_) => RuleKind::Validate,
            Self::Transform(_) => RuleKind::Transform,
            Self::Compute(_) => RuleKind::Compute,
        }
    }

    /// Number of declared lines (fields or computed names).
    pub fn len(&self) -> usize {
        match self {
            Self::Validate(v) => v.len(),
            Self::Transform(t) => t.len(),
            Self::Compute(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A parsed `neutron`. Immutable after parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub set: RuleSet,
}

impl Rule {
    /// Every rule contributes the same weight to component metrics.
    pub const WEIGHT: usize = 1;

    pub fn new(id: impl Into<String>, set: RuleSet) -> Self {
        Self { id: id.into(), set }
    }

    pub fn kind(&self) -> RuleKind {
        self.set.kind()
    }

    /// Field checks when this is a `validate` rule.
    pub fn checks(&self) -> Option<&[FieldChecks]> {
        match &self.set {
            RuleSet::Validate(fields) => Some(fields),
            _ => None,
        }
    }
}
