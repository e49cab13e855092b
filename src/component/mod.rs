//! Component parser and descriptors.

pub mod model;
pub mod parser;

pub use model::{CachePolicy, Component, LifetimeToken, Metrics, Source};
pub use parser::{parse_atom, parse_components, parse_event, parse_rule, parse_source};
