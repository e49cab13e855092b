//! Tree builder: turns the token stream into a [`Document`].
//!
//! Structure errors are recovered the way browsers recover them: a closing
//! tag that matches an ancestor closes everything above it, a closing tag that
//! matches nothing is dropped, and elements still open at the end are closed.
//! Each recovery, including the tokenizer's, is recorded in
//! [`Document::diagnostics`].

use tracing::debug;

use super::tokenizer::{tokenize, MarkupToken};
use crate::dom::{Document, ElementData, NodeData, NodeId};
use crate::error::ParseError;

/// Parse a markup string into a [`Document`].
///
/// Whitespace-only text between elements is dropped; all other text is kept
/// verbatim (entity-decoded). Never fails: malformed input yields a partial
/// tree plus diagnostics.
pub fn parse_document(input: &str) -> Document {
    let (tokens, diagnostics) = tokenize(input);
    let mut builder = TreeBuilder {
        doc: Document::new(),
        open: Vec::new(),
    };
    builder.doc.diagnostics.extend(diagnostics);

    for token in tokens {
        match token {
            MarkupToken::Open {
                name,
                attributes,
                self_closing,
                ..
            } => {
                let id = builder.append(ElementData { tag: name.clone(), attributes }.into());
                if !self_closing {
                    builder.open.push((name, id));
                }
            }
            MarkupToken::Close { name, position } => builder.close(&name, position),
            MarkupToken::Text { text, .. } => {
                if !text.trim().is_empty() {
                    builder.append(NodeData::Text(text));
                }
            }
        }
    }

    for (name, _) in builder.open.drain(..).rev() {
        debug!(element = %name, "closing element left open at end of input");
        builder.doc.diagnostics.push(ParseError::UnexpectedEof(format!(
            "<{name}> is never closed"
        )));
    }

    builder.doc
}

struct TreeBuilder {
    doc: Document,
    /// Stack of currently open elements, innermost last.
    open: Vec<(String, NodeId)>,
}

impl TreeBuilder {
    fn append(&mut self, data: NodeData) -> NodeId {
        match self.open.last() {
            Some(&(_, parent)) => self.doc.insert_child(parent, data),
            None => self.doc.insert(data),
        }
    }

    fn close(&mut self, name: &str, position: usize) {
        let Some(depth) = self.open.iter().rposition(|(open, _)| open == name) else {
            debug!(element = %name, position, "dropping unmatched closing tag");
            self.doc.diagnostics.push(ParseError::UnexpectedToken {
                position,
                message: format!("closing tag </{name}> has no open element"),
            });
            return;
        };

        for (unclosed, _) in self.open.drain(depth + 1..).rev() {
            self.doc.diagnostics.push(ParseError::MismatchedClose {
                expected: unclosed,
                found: name.to_string(),
            });
        }
        self.open.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Document {
        parse_document(input)
    }

    fn tags(doc: &Document) -> Vec<String> {
        doc.walk_document()
            .into_iter()
            .filter_map(|id| doc.element(id).map(|e| e.tag.clone()))
            .collect()
    }

    #[test]
    fn nested_structure() {
        let doc = parse("<atom name=\"a\"><proton id=\"x\"></proton><neutron type=\"validate\">x: required</neutron></atom>");
        assert_eq!(tags(&doc), vec!["atom", "proton", "neutron"]);
        let atom = doc.roots()[0];
        assert_eq!(doc.children(atom).len(), 2);
        let neutron = doc.children(atom)[1];
        assert_eq!(doc.text_content(neutron), "x: required");
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn whitespace_text_is_dropped() {
        let doc = parse("<atom>\n   <proton/>\n</atom>");
        let atom = doc.roots()[0];
        assert_eq!(doc.children(atom).len(), 1);
    }

    #[test]
    fn multiple_top_level_nodes() {
        let doc = parse("<atom name=a></atom><atom name=b></atom>");
        assert_eq!(doc.roots().len(), 2);
    }

    #[test]
    fn full_html_page() {
        let doc = parse(
            "<!DOCTYPE html><html><head><meta charset=utf-8><title>x</title></head>\
             <body><atom name=app></atom></body></html>",
        );
        assert_eq!(doc.query_by_tag("atom").len(), 1);
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn close_tag_recovers_to_ancestor() {
        let doc = parse("<atom><div><p>text</atom><atom name=next></atom>");
        assert_eq!(doc.roots().len(), 2);
        assert_eq!(doc.diagnostics().len(), 2);
        assert!(matches!(
            &doc.diagnostics()[0],
            ParseError::MismatchedClose { expected, found } if expected == "p" && found == "atom"
        ));
    }

    #[test]
    fn unmatched_close_is_dropped() {
        let doc = parse("<atom></span></atom>");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.diagnostics().len(), 1);
    }

    #[test]
    fn unclosed_elements_are_closed_at_eof() {
        let doc = parse("<atom><proton>");
        assert_eq!(tags(&doc), vec!["atom", "proton"]);
        assert_eq!(doc.diagnostics().len(), 2);
    }

    #[test]
    fn tokenizer_recoveries_become_diagnostics() {
        let doc = parse("<atom name=\"a\"></atom><proton id=\"x\"");
        assert_eq!(tags(&doc), vec!["atom", "proton"]);
        // Unterminated tag, then the element it opened is never closed.
        assert_eq!(doc.diagnostics().len(), 2);
        assert!(matches!(&doc.diagnostics()[0], ParseError::UnexpectedEof(m) if m.contains("unterminated")));
    }

    #[test]
    fn stray_angle_bracket_stays_in_text() {
        let doc = parse("<neutron>a < b</neutron>");
        assert_eq!(doc.text_content(doc.roots()[0]), "a < b");
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn empty_input() {
        assert!(parse("").is_empty());
    }
}
