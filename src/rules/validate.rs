//! Validation of a data snapshot against `validate` rule sets.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::model::{Check, FieldChecks};

/// Outcome of running validation rules over a snapshot.
///
/// `errors` only holds fields with at least one failing check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: BTreeMap::new(),
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.valid = self.errors.is_empty();
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    fn fail(&mut self, field: &str, message: String) {
        self.errors.entry(field.to_string()).or_default().push(message);
        self.valid = false;
    }
}

/// Run every check in `rules` against `data`. Rules are read-only.
pub fn validate(rules: &[FieldChecks], data: &Map<String, Value>) -> ValidationReport {
    let mut report = ValidationReport::ok();

    for FieldChecks { field, checks } in rules {
        let value = data.get(field).filter(|v| !v.is_null());

        for check in checks {
            match (check, value) {
                (Check::Required, value) => {
                    if value.map_or(true, is_blank) {
                        report.fail(field, "is required".to_string());
                    }
                }
                (Check::EmailFormat, Some(value)) => {
                    if !value.as_str().is_some_and(is_email) {
                        report.fail(field, "must be a valid email address".to_string());
                    }
                }
                (Check::MinLength(min), Some(value)) => {
                    if length(value).is_some_and(|len| len < *min) {
                        report.fail(field, format!("must be at least {min} characters"));
                    }
                }
                (Check::EmailFormat | Check::MinLength(_), None) | (Check::Unrecognized(_), _) => {}
            }
        }
    }

    report
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Characters of a string or elements of an array. Other kinds have no length.
fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// `local@domain.tld`: no whitespace, exactly one `@`, a host that does not
/// start with a dot, and a non-empty top-level label.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.][^\s@]*\.[^\s@.]+$").expect("invalid email regex")
});

fn is_email(text: &str) -> bool {
    EMAIL_REGEX.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{parse_rules, RuleKind, RuleSet};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rules(body: &str) -> Vec<FieldChecks> {
        match parse_rules(RuleKind::Validate, body) {
            RuleSet::Validate(fields) => fields,
            other => panic!("expected validate rules, got {other:?}"),
        }
    }

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn required_email_empty_is_invalid() {
        let report = validate(&rules("email: required"), &data(json!({"email": ""})));
        assert!(!report.valid);
        assert_eq!(report.messages("email"), ["is required".to_string()]);
    }

    #[test]
    fn required_email_present_is_valid() {
        let report = validate(&rules("email: required"), &data(json!({"email": "a@b.com"})));
        assert_eq!(report, ValidationReport::ok());
    }

    #[test]
    fn required_fails_on_blank_shapes() {
        let checks = rules("a: required\nb: required\nc: required\nd: required\ne: required");
        let report = validate(
            &checks,
            &data(json!({"b": null, "c": "   ", "d": [], "e": {}})),
        );
        let failing: Vec<_> = report.errors.keys().cloned().collect();
        assert_eq!(failing, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn required_accepts_false_and_zero() {
        let report = validate(
            &rules("flag: required\ncount: required"),
            &data(json!({"flag": false, "count": 0})),
        );
        assert!(report.valid);
    }

    #[test]
    fn email_format() {
        let checks = rules("email: email-format");
        for good in ["a@b.com", "first.last@mail.example.org"] {
            assert!(validate(&checks, &data(json!({"email": good}))).valid, "{good}");
        }
        for bad in ["plain", "@b.com", "a@b", "a@.com", "a@b.", "a b@c.com", "a@b@c.com"] {
            let report = validate(&checks, &data(json!({"email": bad})));
            assert_eq!(
                report.messages("email"),
                ["must be a valid email address".to_string()],
                "{bad}"
            );
        }
    }

    #[test]
    fn email_pattern_is_anchored() {
        assert!(is_email("user+tag@sub.example.co"));
        assert!(!is_email("see a@b.com"));
        assert!(!is_email("a@b.com\n"));
        assert!(!is_email("a@b.c."));
    }

    #[test]
    fn email_format_and_min_length_skip_missing_values() {
        let report = validate(
            &rules("email: email-format, minLength(3)"),
            &data(json!({"email": null})),
        );
        assert!(report.valid);
    }

    #[test]
    fn min_length_counts_chars_and_elements() {
        let checks = rules("password: minLength(8)\ntags: minLength(2)");
        let report = validate(
            &checks,
            &data(json!({"password": "héllo", "tags": ["x"]})),
        );
        assert_eq!(
            report.messages("password"),
            ["must be at least 8 characters".to_string()]
        );
        assert_eq!(report.messages("tags").len(), 1);

        let report = validate(
            &checks,
            &data(json!({"password": "long enough", "tags": ["x", "y"]})),
        );
        assert!(report.valid);
    }

    #[test]
    fn unrecognized_checks_never_fail() {
        let report = validate(&rules("age: numeric, max(3)"), &data(json!({"age": "abc"})));
        assert!(report.valid);
    }

    #[test]
    fn multiple_failures_accumulate_per_field() {
        let report = validate(
            &rules("password: required, minLength(8)\nemail: email-format"),
            &data(json!({"password": "   ", "email": "nope"})),
        );
        assert_eq!(report.messages("password").len(), 2);
        assert_eq!(report.messages("email").len(), 1);
    }

    #[test]
    fn merge_reports() {
        let mut first = validate(&rules("a: required"), &data(json!({})));
        let second = validate(&rules("a: required\nb: required"), &data(json!({"b": 1})));
        first.merge(second);
        assert!(!first.valid);
        assert_eq!(first.messages("a").len(), 2);
        assert!(first.messages("b").is_empty());

        let mut clean = ValidationReport::ok();
        clean.merge(ValidationReport::ok());
        assert!(clean.valid);
    }

    #[test]
    fn report_serializes() {
        let report = validate(&rules("email: required"), &data(json!({})));
        insta::assert_snapshot!(
            serde_json::to_string(&report).unwrap(),
            @r#"{"valid":false,"errors":{"email":["is required"]}}"#
        );
    }
}
