//! Markup reader: logos tokenizer and tree builder.

pub mod tokenizer;
pub mod parser;

pub use parser::parse_document;
pub use tokenizer::{tokenize, Attribute, MarkupToken};
