//! Document arena: slotmap-backed element tree with tag/attribute queries.

pub mod node;
pub mod tree;
pub mod query;

pub use node::{ElementData, NodeData, NodeId};
pub use tree::Document;
