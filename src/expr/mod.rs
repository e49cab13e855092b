//! Expression evaluator for computed data.
//!
//! - [`Expr::parse`]: tokenize (logos) and parse into the closed grammar.
//! - [`evaluate`]: pure evaluation against a [`Collections`] snapshot.

pub mod parser;
pub mod eval;

pub use eval::{evaluate, Collections};
pub use parser::{Expr, ExprToken, Literal};
