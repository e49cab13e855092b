//! Tree operations: insert, walk, text content.

use slotmap::{SecondaryMap, SlotMap};

use super::node::{ElementData, NodeData, NodeId};
use crate::error::ParseError;

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// A parsed markup document, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps with O(1) lookup.
/// A document may have several top-level nodes; they are kept in source order.
#[derive(Debug)]
pub struct Document {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    roots: Vec<NodeId>,
    /// Problems the parser recovered from (mismatched or unclosed tags).
    pub(crate) diagnostics: Vec<ParseError>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            roots: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Insert a top-level node (no parent).
    pub fn insert(&mut self, data: impl Into<NodeData>) -> NodeId {
        let id = self.nodes.insert(data.into());
        self.children.insert(id, Vec::new());
        self.roots.push(id);
        id
    }

    /// Insert a node as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics (debug) if `parent` does not exist in the tree.
    pub fn insert_child(&mut self, parent: NodeId, data: impl Into<NodeData>) -> NodeId {
        debug_assert!(
            self.nodes.contains_key(parent),
            "parent node does not exist"
        );
        let id = self.nodes.insert(data.into());
        self.children.insert(id, Vec::new());
        self.parent.insert(id, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(id);
        }
        id
    }

    /// Children of a node in source order. Empty if the node has none or does
    /// not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to the top level, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Element data for `id`, `None` for text nodes or stale ids.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id).and_then(NodeData::as_element)
    }

    /// Top-level nodes in source order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes in the document.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Problems recovered from while parsing.
    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Every node in document order.
    pub fn walk_document(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .flat_map(|&root| self.walk_depth_first(root))
            .collect()
    }

    /// Concatenated text of `id` and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.walk_depth_first(id)
            .into_iter()
            .filter_map(|node| self.nodes.get(node).and_then(NodeData::as_text))
            .collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a small test tree:
    /// ```text
    ///       atom
    ///      /    \
    ///   proton  neutron
    ///   /         \
    ///  "[]"     "email: required"
    /// ```
    fn build_tree() -> (Document, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let atom = doc.insert(ElementData::new("atom").with_attribute("name", "form"));
        let proton = doc.insert_child(atom, ElementData::new("proton").with_attribute("id", "users"));
        let neutron = doc.insert_child(atom, ElementData::new("neutron"));
        let data = doc.insert_child(proton, NodeData::text("[]"));
        let body = doc.insert_child(neutron, NodeData::text("email: required"));
        (doc, atom, proton, neutron, data, body)
    }

    #[test]
    fn insert_records_roots_in_order() {
        let mut doc = Document::new();
        let first = doc.insert(NodeData::element("first"));
        let second = doc.insert(NodeData::element("second"));
        assert_eq!(doc.roots(), &[first, second]);
    }

    #[test]
    fn insert_child_records_parent() {
        let (doc, atom, proton, _neutron, data, _body) = build_tree();
        assert_eq!(doc.ancestors(proton), vec![atom]);
        assert_eq!(doc.ancestors(data), vec![proton, atom]);
    }

    #[test]
    fn children_list() {
        let (doc, atom, proton, neutron, data, _body) = build_tree();
        assert_eq!(doc.children(atom), &[proton, neutron]);
        assert_eq!(doc.children(proton), &[data]);
        assert!(doc.children(data).is_empty());
    }

    #[test]
    fn ancestors() {
        let (doc, atom, proton, _neutron, data, _body) = build_tree();
        assert_eq!(doc.ancestors(data), vec![proton, atom]);
        assert!(doc.ancestors(atom).is_empty());
    }

    #[test]
    fn element_accessor_skips_text() {
        let (doc, atom, _proton, _neutron, data, _body) = build_tree();
        assert_eq!(doc.element(atom).unwrap().attribute("name"), Some("form"));
        assert!(doc.element(data).is_none());
    }

    #[test]
    fn len_and_is_empty() {
        let (doc, ..) = build_tree();
        assert_eq!(doc.len(), 5);
        assert!(!doc.is_empty());
        assert!(Document::default().is_empty());
    }

    #[test]
    fn walk_depth_first_order() {
        let (doc, atom, proton, neutron, data, body) = build_tree();
        assert_eq!(doc.walk_depth_first(atom), vec![atom, proton, data, neutron, body]);
    }

    #[test]
    fn walk_document_spans_roots() {
        let mut doc = Document::new();
        let a = doc.insert(NodeData::element("a"));
        let a1 = doc.insert_child(a, NodeData::element("a1"));
        let b = doc.insert(NodeData::element("b"));
        assert_eq!(doc.walk_document(), vec![a, a1, b]);
    }

    #[test]
    fn text_content_concatenates() {
        let (mut doc, atom, _proton, neutron, ..) = build_tree();
        doc.insert_child(neutron, NodeData::text("\nname: required"));
        assert_eq!(doc.text_content(neutron), "email: required\nname: required");
        assert_eq!(doc.text_content(atom), "[]email: required\nname: required");
    }
}
