//! # atomic-ui
//!
//! A declarative markup runtime. Documents describe components ("atoms")
//! built from data sources ("protons"), rules ("neutrons") and event
//! bindings ("electrons"). The runtime loads the sources into a shared data
//! store, validates gathered values against the rules, runs actions such as
//! submits and redirects, and connects components through a signal bus.
//!
//! ## Core Systems
//!
//! - **[`markup`]**: Tolerant markup tokenizer and tree builder
//! - **[`dom`]**: Slotmap-backed document arena with traversal and queries
//! - **[`expr`]**: Closed expression language for computed collections
//! - **[`rules`]**: Rule line parser and field validation
//! - **[`store`]**: Named collections, computed entries, state and persistence
//! - **[`component`]**: Component model, metrics and the markup-to-component parser
//! - **[`event`]**: Bindings, actions, energy, the signal bus and scheduling
//! - **[`net`]**: HTTP client and navigator seams, with a reqwest client
//! - **[`runtime`]**: Scoped runtime context tying everything together
//! - **[`logging`]**: `tracing` subscriber setup
//! - **[`testing`]**: Headless Pilot, recording fakes and snapshot helpers

// Foundation
pub mod error;
pub mod logging;

// Markup and documents
pub mod dom;
pub mod markup;

// Data
pub mod expr;
pub mod rules;
pub mod store;

// Components and events
pub mod component;
pub mod event;
pub mod net;

// Application
pub mod runtime;
pub mod testing;

pub use error::{Error, Result};
pub use runtime::{BootReport, Collaborators, Runtime, RuntimeConfig};
