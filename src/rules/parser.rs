//! Line-oriented rule body parser.
//!
//! Each non-blank line is lexed with logos. The head (field or computed name)
//! is everything before the first separator token (`:` for validate and
//! transform, `=` for compute). Validate and transform items are split on
//! commas outside parentheses; compute right-hand sides are kept verbatim.

use std::ops::Range;

use logos::Logos;
use tracing::debug;

use super::model::{Check, ComputedField, FieldChecks, FieldTransforms, RuleKind, RuleSet};

/// Rule line token.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
pub enum LineToken {
    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token("=")]
    Equals,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[regex(r"[0-9]+")]
    Integer,

    #[regex(r"[A-Za-z_][A-Za-z0-9_.-]*")]
    Word,
}

/// A lexed line. Unlexable characters become `None` so spans stay intact.
struct Line<'a> {
    source: &'a str,
    tokens: Vec<(Option<LineToken>, Range<usize>)>,
}

impl<'a> Line<'a> {
    fn lex(source: &'a str) -> Self {
        let tokens = LineToken::lexer(source)
            .spanned()
            .map(|(result, span)| (result.ok(), span))
            .collect();
        Self { source, tokens }
    }

    /// Split at the first `separator`: (trimmed head, token index after it).
    fn split_head(&self, separator: LineToken) -> Option<(&'a str, usize)> {
        let index = self
            .tokens
            .iter()
            .position(|(token, _)| *token == Some(separator))?;
        let head = self.source[..self.tokens[index].1.start].trim();
        if head.is_empty() {
            return None;
        }
        Some((head, index + 1))
    }

    /// Comma-separated items from token `start` on, ignoring commas nested
    /// in parentheses. Each item is the token index range it spans.
    fn items(&self, start: usize) -> Vec<Range<usize>> {
        let mut items = Vec::new();
        let mut depth = 0usize;
        let mut item_start = start;

        for (i, (token, _)) in self.tokens.iter().enumerate().skip(start) {
            match token {
                Some(LineToken::ParenOpen) => depth += 1,
                Some(LineToken::ParenClose) => depth = depth.saturating_sub(1),
                Some(LineToken::Comma) if depth == 0 => {
                    items.push(item_start..i);
                    item_start = i + 1;
                }
                _ => {}
            }
        }
        items.push(item_start..self.tokens.len());
        items.retain(|range| !range.is_empty());
        items
    }

    /// Source text covered by a token index range.
    fn text(&self, range: &Range<usize>) -> &'a str {
        let start = self.tokens[range.start].1.start;
        let end = self.tokens[range.end - 1].1.end;
        self.source[start..end].trim()
    }
}

/// Parse a rule body of the given kind.
///
/// Blank lines and lines without a usable head are skipped.
pub fn parse_rules(kind: RuleKind, body: &str) -> RuleSet {
    let lines = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    match kind {
        RuleKind::Validate => RuleSet::Validate(
            lines
                .filter_map(|line| {
                    let lexed = Line::lex(line);
                    let Some((field, rest)) = lexed.split_head(LineToken::Colon) else {
                        debug!(%line, "skipping validate line without `field:`");
                        return None;
                    };
                    let checks = lexed
                        .items(rest)
                        .iter()
                        .map(|item| classify_check(&lexed, item))
                        .collect();
                    Some(FieldChecks {
                        field: field.to_string(),
                        checks,
                    })
                })
                .collect(),
        ),
        RuleKind::Transform => RuleSet::Transform(
            lines
                .filter_map(|line| {
                    let lexed = Line::lex(line);
                    let Some((field, rest)) = lexed.split_head(LineToken::Colon) else {
                        debug!(%line, "skipping transform line without `field:`");
                        return None;
                    };
                    let transforms = lexed
                        .items(rest)
                        .iter()
                        .map(|item| lexed.text(item).to_string())
                        .collect();
                    Some(FieldTransforms {
                        field: field.to_string(),
                        transforms,
                    })
                })
                .collect(),
        ),
        RuleKind::Compute => RuleSet::Compute(
            lines
                .filter_map(|line| {
                    let lexed = Line::lex(line);
                    let Some((name, rest)) = lexed.split_head(LineToken::Equals) else {
                        debug!(%line, "skipping compute line without `name =`");
                        return None;
                    };
                    let expression = lexed
                        .tokens
                        .get(rest)
                        .map_or("", |(_, span)| line[span.start..].trim());
                    Some(ComputedField {
                        name: name.to_string(),
                        expression: expression.to_string(),
                    })
                })
                .collect(),
        ),
    }
}

fn classify_check(line: &Line<'_>, item: &Range<usize>) -> Check {
    let tokens = &line.tokens[item.clone()];
    match tokens {
        [(Some(LineToken::Word), span)] if &line.source[span.clone()] == "required" => {
            Check::Required
        }
        [(Some(LineToken::Word), span)] if &line.source[span.clone()] == "email-format" => {
            Check::EmailFormat
        }
        [(Some(LineToken::Word), span), rest @ ..] if &line.source[span.clone()] == "minLength" => {
            rest.iter()
                .find(|(token, _)| *token == Some(LineToken::Integer))
                .and_then(|(_, span)| line.source[span.clone()].parse().ok())
                .map_or_else(|| Check::Unrecognized(line.text(item).to_string()), Check::MinLength)
        }
        _ => Check::Unrecognized(line.text(item).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn validate(body: &str) -> Vec<FieldChecks> {
        match parse_rules(RuleKind::Validate, body) {
            RuleSet::Validate(fields) => fields,
            other => panic!("expected validate rules, got {other:?}"),
        }
    }

    #[test]
    fn validate_lines() {
        let fields = validate(
            "
            email: required, email-format
            password: required, minLength(8)
            ",
        );
        assert_eq!(
            fields,
            vec![
                FieldChecks {
                    field: "email".into(),
                    checks: vec![Check::Required, Check::EmailFormat],
                },
                FieldChecks {
                    field: "password".into(),
                    checks: vec![Check::Required, Check::MinLength(8)],
                },
            ]
        );
    }

    #[test]
    fn min_length_takes_first_embedded_integer() {
        let fields = validate("name: minLength( 3 ), minLength(10, 20)");
        assert_eq!(fields[0].checks, vec![Check::MinLength(3), Check::MinLength(10)]);
    }

    #[test]
    fn min_length_without_integer_is_unrecognized() {
        let fields = validate("name: minLength(x)");
        assert_eq!(
            fields[0].checks,
            vec![Check::Unrecognized("minLength(x)".into())]
        );
    }

    #[test]
    fn unrecognized_tokens_are_kept() {
        let fields = validate("age: required, numeric, max(99)");
        assert_eq!(
            fields[0].checks,
            vec![
                Check::Required,
                Check::Unrecognized("numeric".into()),
                Check::Unrecognized("max(99)".into()),
            ]
        );
    }

    #[test]
    fn lines_without_head_are_skipped() {
        let fields = validate("just text\n: required\n\nemail: required");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "email");
    }

    #[test]
    fn field_with_no_checks() {
        let fields = validate("email:");
        assert_eq!(fields[0].checks, Vec::<Check>::new());
    }

    #[test]
    fn transform_lines() {
        let set = parse_rules(RuleKind::Transform, "email: trim, lowercase\nname: capitalize");
        assert_eq!(
            set,
            RuleSet::Transform(vec![
                FieldTransforms {
                    field: "email".into(),
                    transforms: vec!["trim".into(), "lowercase".into()],
                },
                FieldTransforms {
                    field: "name".into(),
                    transforms: vec!["capitalize".into()],
                },
            ])
        );
    }

    #[test]
    fn compute_keeps_expression_verbatim() {
        let set = parse_rules(
            RuleKind::Compute,
            "active = users.filter(active=true)\ntotal = tasks.count\nbroken =",
        );
        assert_eq!(
            set,
            RuleSet::Compute(vec![
                ComputedField {
                    name: "active".into(),
                    expression: "users.filter(active=true)".into(),
                },
                ComputedField {
                    name: "total".into(),
                    expression: "tasks.count".into(),
                },
                ComputedField {
                    name: "broken".into(),
                    expression: String::new(),
                },
            ])
        );
    }

    #[test]
    fn empty_body() {
        assert!(parse_rules(RuleKind::Validate, "  \n ").is_empty());
    }
}
