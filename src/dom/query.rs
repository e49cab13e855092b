//! Document queries: by tag or by an element predicate.
//!
//! All queries return ids in document order.

use super::node::{ElementData, NodeId};
use super::tree::Document;

impl Document {
    /// Find all elements with the given (lowercase) tag.
    pub fn query_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.query_all(|element| element.tag == tag)
    }

    /// Find all elements matching an arbitrary predicate.
    pub fn query_all(&self, predicate: impl Fn(&ElementData) -> bool) -> Vec<NodeId> {
        self.walk_document()
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(&predicate))
            .collect()
    }
}
