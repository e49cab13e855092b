//! Computed-expression grammar.
//!
//! Only two shapes are recognized:
//!
//! ```text
//! <collection>.filter(<key>=<literal>)
//! <collection>.count
//! ```
//!
//! A literal is everything between `=` and the closing paren, so values such
//! as `a@b.com` or `/home` need no quoting. It may not contain whitespace,
//! parentheses or `=`.
//!
//! Everything else parses to [`Expr::Unsupported`]. There are no variables,
//! arithmetic or boolean operators, so markup cannot smuggle in code.

use std::fmt;

use logos::Logos;

/// Expression token.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum ExprToken {
    #[token(".")]
    Dot,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("=")]
    Equals,

    /// Collection, key or method name.
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$-]*")]
    Ident,
}

/// Right-hand side of a `filter` equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// `true` / `false`, matched against JSON booleans.
    Bool(bool),
    /// Any other bare token, compared as text.
    Token(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Token(t) => f.write_str(t),
        }
    }
}

/// A parsed computed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Filter {
        collection: String,
        key: String,
        literal: Literal,
    },
    Count {
        collection: String,
    },
    /// Text outside the grammar. Always evaluates to null.
    Unsupported(String),
}

impl Expr {
    /// Parse an expression. Never fails; unknown shapes become
    /// [`Expr::Unsupported`].
    pub fn parse(source: &str) -> Self {
        let mut lexer = ExprToken::lexer(source);
        let mut head = Vec::new();
        while let Some(result) = lexer.next() {
            let Ok(token) = result else {
                return Self::Unsupported(source.to_string());
            };
            head.push((token, lexer.slice()));
            if token == ExprToken::Equals {
                break;
            }
        }

        use ExprToken::{Dot, Equals, Ident, ParenOpen};
        match head.as_slice() {
            [(Ident, collection), (Dot, _), (Ident, "count")] => Self::Count {
                collection: (*collection).to_string(),
            },
            [(Ident, collection), (Dot, _), (Ident, "filter"), (ParenOpen, _), (Ident, key), (Equals, _)] => {
                match parse_literal(lexer.remainder()) {
                    Some(literal) => Self::Filter {
                        collection: (*collection).to_string(),
                        key: (*key).to_string(),
                        literal,
                    },
                    None => Self::Unsupported(source.to_string()),
                }
            }
            _ => Self::Unsupported(source.to_string()),
        }
    }

    /// The collection this expression reads, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::Filter { collection, .. } | Self::Count { collection } => Some(collection),
            Self::Unsupported(_) => None,
        }
    }
}

/// The text after `=` up to a final `)`.
fn parse_literal(rest: &str) -> Option<Literal> {
    let text = rest.trim_end().strip_suffix(')')?.trim();
    let bad = |c: char| c.is_whitespace() || matches!(c, '(' | ')' | '=');
    if text.is_empty() || text.contains(bad) {
        return None;
    }
    Some(match text {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => Literal::Token(text.to_string()),
    })
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter {
                collection,
                key,
                literal,
            } => write!(f, "{collection}.filter({key}={literal})"),
            Self::Count { collection } => write!(f, "{collection}.count"),
            Self::Unsupported(source) => write!(f, "<unsupported {source:?}>"),
        }
    }
}
