//! Persistence adapters: durable (timestamped records) and ephemeral
//! (session key/value).
//!
//! Concrete back-ends live outside the crate; the in-memory versions here
//! back headless runs and tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::PersistError;

/// Where a source's resolved data is written after load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PersistTarget {
    #[default]
    None,
    /// [`EphemeralStore::set`] under the source key.
    Session,
    /// [`DurableStore::put`] under the source id.
    Durable,
}

impl FromStr for PersistTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "session" => Ok(Self::Session),
            "durable" => Ok(Self::Durable),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for PersistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Session => "session",
            Self::Durable => "durable",
        })
    }
}

pub trait DurableStore {
    fn put(&self, name: &str, data: &Value, timestamp: DateTime<Utc>) -> Result<(), PersistError>;
}

pub trait EphemeralStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, data: &Value) -> Result<(), PersistError>;
}

// ---------------------------------------------------------------------------
// In-memory adapters
// ---------------------------------------------------------------------------

/// One `put` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurableRecord {
    pub name: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    records: RefCell<Vec<DurableRecord>>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written so far, oldest first.
    pub fn records(&self) -> Vec<DurableRecord> {
        self.records.borrow().clone()
    }

    /// Most recent record for `name`.
    pub fn latest(&self, name: &str) -> Option<DurableRecord> {
        self.records
            .borrow()
            .iter()
            .rev()
            .find(|r| r.name == name)
            .cloned()
    }
}

impl DurableStore for MemoryDurableStore {
    fn put(&self, name: &str, data: &Value, timestamp: DateTime<Utc>) -> Result<(), PersistError> {
        self.records.borrow_mut().push(DurableRecord {
            name: name.to_string(),
            data: data.clone(),
            timestamp,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEphemeralStore {
    entries: RefCell<HashMap<String, Value>>,
}

impl MemoryEphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl EphemeralStore for MemoryEphemeralStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, data: &Value) -> Result<(), PersistError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_from_str() {
        assert_eq!("".parse::<PersistTarget>(), Ok(PersistTarget::None));
        assert_eq!("Durable".parse::<PersistTarget>(), Ok(PersistTarget::Durable));
        assert_eq!("session".parse::<PersistTarget>(), Ok(PersistTarget::Session));
        assert!("disk".parse::<PersistTarget>().is_err());
        assert_eq!(PersistTarget::Session.to_string(), "session");
    }

    #[test]
    fn durable_keeps_every_put() {
        let store = MemoryDurableStore::new();
        let t0 = Utc::now();
        store.put("users", &json!([1]), t0).unwrap();
        store.put("users", &json!([1, 2]), t0).unwrap();
        store.put("tasks", &json!([]), t0).unwrap();

        assert_eq!(store.records().len(), 3);
        let latest = store.latest("users").unwrap();
        assert_eq!(latest.data, json!([1, 2]));
        assert_eq!(latest.timestamp, t0);
        assert!(store.latest("ghost").is_none());
    }

    #[test]
    fn ephemeral_get_set() {
        let store = MemoryEphemeralStore::new();
        assert!(store.is_empty());
        store.set("k", &json!({"a": 1})).unwrap();
        assert_eq!(store.get("k"), Some(json!({"a": 1})));
        assert_eq!(store.get("other"), None);
        assert_eq!(store.len(), 1);
    }
}
