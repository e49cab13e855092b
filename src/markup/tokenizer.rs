//! logos-based markup tokenizer.
//!
//! Two lexer modes share one source:
//! - [`ContentToken`] scans text between tags and recognizes tag openings.
//! - [`TagToken`] scans the interior of an opening tag (attributes).
//!
//! The driver switches between them with [`logos::Lexer::morph`]. Comments and
//! doctype declarations are skipped; `script`/`style` bodies are taken verbatim.

use logos::{Lexer, Logos, Skip};
use tracing::debug;

use crate::error::ParseError;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose body is raw text, never markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

// ---------------------------------------------------------------------------
// Content mode
// ---------------------------------------------------------------------------

/// Tokens between tags.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum ContentToken {
    /// `<!-- ... -->`, skipped by the callback.
    #[token("<!--", skip_comment)]
    Comment,

    /// `<!DOCTYPE html>` and friends.
    #[regex(r"<![a-zA-Z][^>]*>", logos::skip)]
    Doctype,

    /// `</name>` with optional trailing whitespace before `>`.
    #[regex(r"</[a-zA-Z][a-zA-Z0-9_-]*[ \t\r\n]*>")]
    CloseTag,

    /// `<name`; the lexer morphs into [`TagToken`] after this.
    #[regex(r"<[a-zA-Z][a-zA-Z0-9_-]*")]
    OpenTag,

    /// Character data.
    #[regex(r"[^<]+")]
    Text,
}

fn skip_comment(lex: &mut Lexer<ContentToken>) -> Skip {
    match lex.remainder().find("-->") {
        Some(end) => lex.bump(end + 3),
        None => lex.bump(lex.remainder().len()),
    }
    Skip
}

// ---------------------------------------------------------------------------
// Tag mode
// ---------------------------------------------------------------------------

/// Tokens inside an opening tag.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum TagToken {
    /// `/>`
    #[token("/>")]
    SelfClose,

    /// `>`
    #[token(">")]
    End,

    /// `=`
    #[token("=")]
    Equals,

    /// Attribute name: `id`, `data-source`, `on:click`.
    #[regex(r"[a-zA-Z_:@][a-zA-Z0-9_:.@-]*", priority = 3)]
    Name,

    /// Double-quoted attribute value.
    #[regex(r#""[^"]*""#)]
    DoubleQuoted,

    /// Single-quoted attribute value.
    #[regex(r"'[^']*'")]
    SingleQuoted,

    /// Unquoted attribute value: `10`, `/api/users`.
    #[regex(r"[^ \t\n\r\f\x22'=<>`]+", priority = 1)]
    Bare,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A name/value pair from an opening tag. Names are lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A structural markup token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupToken {
    /// Opening tag. `self_closing` is set for `<x/>` and void elements.
    Open {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
        position: usize,
    },
    /// Closing tag.
    Close { name: String, position: usize },
    /// Entity-decoded text.
    Text { text: String, position: usize },
}

/// Tokenize a markup document.
///
/// Never fails. A `<` that cannot start a tag is kept as text, malformed
/// attribute syntax is skipped, and a tag still open at end of input is
/// closed where the input stops. Each recovery is returned as a diagnostic.
pub fn tokenize(input: &str) -> (Vec<MarkupToken>, Vec<ParseError>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut lex = ContentToken::lexer(input);

    while let Some(result) = lex.next() {
        let position = lex.span().start;
        match result {
            Ok(ContentToken::Text) => push_text(&mut tokens, decode_entities(lex.slice()), position),
            Ok(ContentToken::CloseTag) => {
                let name = lex.slice()[2..]
                    .trim_end_matches('>')
                    .trim_end()
                    .to_ascii_lowercase();
                tokens.push(MarkupToken::Close { name, position });
            }
            Ok(ContentToken::OpenTag) => {
                let name = lex.slice()[1..].to_ascii_lowercase();
                let mut tag_lex = lex.morph::<TagToken>();
                let (attributes, explicit_close) =
                    read_tag_interior(&mut tag_lex, &name, &mut diagnostics);
                lex = tag_lex.morph::<ContentToken>();

                let self_closing = explicit_close || VOID_ELEMENTS.contains(&name.as_str());
                let raw = !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str());
                tokens.push(MarkupToken::Open {
                    name: name.clone(),
                    attributes,
                    self_closing,
                    position,
                });
                if raw {
                    read_raw_text(&mut lex, &name, &mut tokens);
                }
            }
            Ok(ContentToken::Comment | ContentToken::Doctype) => {}
            // A lone `<` (as in `1 < 2`) is character data.
            Err(()) => push_text(&mut tokens, lex.slice().to_string(), position),
        }
    }

    (tokens, diagnostics)
}

/// Append text, merging with a directly preceding text token.
fn push_text(tokens: &mut Vec<MarkupToken>, text: String, position: usize) {
    if let Some(MarkupToken::Text { text: previous, .. }) = tokens.last_mut() {
        previous.push_str(&text);
        return;
    }
    tokens.push(MarkupToken::Text { text, position });
}

/// Consume attribute tokens up to and including `>` or `/>`, or to the end
/// of input. Returns the attributes and whether the tag closed itself.
fn read_tag_interior(
    lex: &mut Lexer<TagToken>,
    tag: &str,
    diagnostics: &mut Vec<ParseError>,
) -> (Vec<Attribute>, bool) {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut pending_value = false;

    loop {
        let Some(result) = lex.next() else {
            debug!(%tag, "closing tag left unterminated at end of input");
            diagnostics.push(ParseError::UnexpectedEof(format!("unterminated <{tag}> tag")));
            return (attributes, false);
        };
        let position = lex.span().start;
        let Ok(token) = result else {
            diagnostics.push(ParseError::UnexpectedToken {
                position,
                message: format!("unexpected {:?} inside <{tag}>", lex.slice()),
            });
            continue;
        };

        match token {
            TagToken::End => return (attributes, false),
            TagToken::SelfClose => return (attributes, true),
            TagToken::Equals => {
                if attributes.is_empty() || pending_value {
                    diagnostics.push(ParseError::UnexpectedToken {
                        position,
                        message: format!("'=' without attribute name inside <{tag}>"),
                    });
                    continue;
                }
                pending_value = true;
            }
            TagToken::Name | TagToken::Bare if pending_value => {
                set_last_value(&mut attributes, decode_entities(lex.slice()));
                pending_value = false;
            }
            TagToken::DoubleQuoted | TagToken::SingleQuoted if pending_value => {
                let quoted = lex.slice();
                set_last_value(&mut attributes, decode_entities(&quoted[1..quoted.len() - 1]));
                pending_value = false;
            }
            TagToken::Name => {
                attributes.push(Attribute::new(lex.slice().to_ascii_lowercase(), ""));
            }
            TagToken::Bare | TagToken::DoubleQuoted | TagToken::SingleQuoted => {
                diagnostics.push(ParseError::UnexpectedToken {
                    position,
                    message: format!("value {:?} without attribute name", lex.slice()),
                });
            }
        }
    }
}

fn set_last_value(attributes: &mut [Attribute], value: String) {
    if let Some(last) = attributes.last_mut() {
        last.value = value;
    }
}

/// Take everything up to `</name` as a single text token.
fn read_raw_text(lex: &mut Lexer<ContentToken>, name: &str, tokens: &mut Vec<MarkupToken>) {
    let closing = format!("</{name}");
    let remainder = lex.remainder();
    let end = remainder
        .to_ascii_lowercase()
        .find(&closing)
        .unwrap_or(remainder.len());
    if end > 0 {
        tokens.push(MarkupToken::Text {
            text: remainder[..end].to_string(),
            position: lex.span().end,
        });
        lex.bump(end);
    }
}

/// Decode the handful of entity references markup authors actually use.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
