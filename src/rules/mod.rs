//! Rule engine for `neutron` bodies.
//!
//! - [`parse_rules`] turns a body into a typed [`RuleSet`].
//! - [`validate`] applies `validate` checks to a data snapshot.

pub mod model;
pub mod parser;
pub mod validate;

pub use model::{Check, ComputedField, FieldChecks, FieldTransforms, Rule, RuleKind, RuleSet};
pub use parser::{parse_rules, LineToken};
pub use validate::{validate, ValidationReport};
