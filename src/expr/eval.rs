//! Pure evaluation of [`Expr`] against a read-only snapshot.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use super::parser::{Expr, Literal};

/// Read-only view of named collections.
pub trait Collections {
    fn collection(&self, name: &str) -> Option<&Value>;
}

impl Collections for HashMap<String, Value> {
    fn collection(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Collections for BTreeMap<String, Value> {
    fn collection(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Evaluate `expr`. Missing collections and unsupported expressions yield
/// `Value::Null`; a non-array collection counts as 0.
pub fn evaluate(expr: &Expr, snapshot: &impl Collections) -> Value {
    match expr {
        Expr::Count { collection } => {
            let count = snapshot
                .collection(collection)
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            Value::from(count)
        }
        Expr::Filter {
            collection,
            key,
            literal,
        } => {
            let Some(items) = snapshot.collection(collection).and_then(Value::as_array) else {
                debug!(%collection, "filter over missing or non-array collection");
                return Value::Null;
            };
            Value::Array(
                items
                    .iter()
                    .filter(|item| item.get(key).is_some_and(|field| literal.matches(field)))
                    .cloned()
                    .collect(),
            )
        }
        Expr::Unsupported(source) => {
            debug!(expression = %source, "unsupported expression evaluates to null");
            Value::Null
        }
    }
}

impl Literal {
    /// Whether a field value equals this literal.
    ///
    /// Booleans match booleans. A bare token matches a string with the same
    /// text or a number whose canonical text is the token.
    pub fn matches(&self, field: &Value) -> bool {
        match (self, field) {
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Self::Token(token), Value::String(s)) => s == token,
            (Self::Token(token), Value::Number(n)) => n.to_string() == *token,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot() -> HashMap<String, Value> {
        HashMap::from([
            (
                "users".to_string(),
                json!([
                    {"id": 1, "active": true, "email": "a@b.com"},
                    {"id": 2, "active": false, "email": "c@d.org"}
                ]),
            ),
            (
                "tasks".to_string(),
                json!([
                    {"id": 1, "status": "done", "priority": 2},
                    {"id": 2, "status": "open", "priority": 1},
                    {"id": 3, "status": "done", "priority": 1},
                    {"id": 4, "status": "open"},
                    {"id": 5, "status": "true"}
                ]),
            ),
            ("empty".to_string(), json!([])),
            ("profile".to_string(), json!({"name": "x"})),
        ])
    }

    fn eval(source: &str) -> Value {
        evaluate(&Expr::parse(source), &snapshot())
    }

    #[test]
    fn filter_active_users() {
        assert_eq!(
            eval("users.filter(active=true)"),
            json!([{"id": 1, "active": true, "email": "a@b.com"}])
        );
        assert_eq!(
            eval("users.filter(active=false)"),
            json!([{"id": 2, "active": false, "email": "c@d.org"}])
        );
    }

    #[test]
    fn filter_by_string_token() {
        let done = eval("tasks.filter(status=done)");
        assert_eq!(done.as_array().unwrap().len(), 2);
    }

    #[test]
    fn filter_by_email_address() {
        let result = eval("users.filter(email=a@b.com)");
        assert_eq!(result.as_array().map(Vec::len), Some(1));
        assert_eq!(result[0]["id"], json!(1));
    }

    #[test]
    fn filter_by_number_token() {
        let result = eval("tasks.filter(priority=1)");
        let ids: Vec<_> = result
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn boolean_literal_does_not_match_string() {
        assert_eq!(eval("tasks.filter(status=true)"), json!([]));
    }

    #[test]
    fn items_without_the_key_are_excluded() {
        assert_eq!(eval("tasks.filter(priority=2)").as_array().unwrap().len(), 1);
    }

    #[test]
    fn count() {
        assert_eq!(eval("empty.count"), json!(0));
        assert_eq!(eval("tasks.count"), json!(5));
    }

    #[test]
    fn count_of_missing_or_non_array_is_zero() {
        assert_eq!(eval("ghosts.count"), json!(0));
        assert_eq!(eval("profile.count"), json!(0));
    }

    #[test]
    fn filter_of_missing_collection_is_null() {
        assert_eq!(eval("ghosts.filter(a=b)"), Value::Null);
        assert_eq!(eval("profile.filter(name=x)"), Value::Null);
    }

    #[test]
    fn unsupported_is_null() {
        assert_eq!(eval("users.map(x)"), Value::Null);
    }

    #[test]
    fn evaluation_is_pure() {
        let snap = snapshot();
        let expr = Expr::parse("tasks.filter(status=open)");
        assert_eq!(evaluate(&expr, &snap), evaluate(&expr, &snap));
        assert_eq!(snap, snapshot());
    }

    #[test]
    fn works_over_btreemap() {
        let snap = BTreeMap::from([("n".to_string(), json!([1, 2, 3]))]);
        assert_eq!(evaluate(&Expr::parse("n.count"), &snap), json!(3));
    }
}
