//! Error taxonomy shared by every layer of the runtime.
//!
//! Parse and data errors are recovered locally (logged, safe default used).
//! Only [`ValidationError`] from raw registration reaches the caller.
//! Network and persistence failures are logged where they happen.

use thiserror::Error;

/// Malformed markup or a missing required attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected token at byte {position}: {message}")]
    UnexpectedToken { position: usize, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
    #[error("closing tag </{found}> does not match <{expected}>")]
    MismatchedClose { expected: String, found: String },
    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute { element: String, attribute: String },
    #[error("<{element}> has invalid `{attribute}` value {value:?}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },
}

/// A referenced collection is missing or a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("collection `{0}` is not registered")]
    MissingCollection(String),
    #[error("invalid JSON for `{name}`: {message}")]
    InvalidJson { name: String, message: String },
}

/// Raw registration rejected by a declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("collection `{name}` expects {expected}, got {actual}")]
    SchemaMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Fetch or submit failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("response from {url} is not valid JSON: {message}")]
    Decode { url: String, message: String },
}

/// Persistence adapter failure. Always logged, never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("persisting `{key}` failed: {message}")]
pub struct PersistError {
    pub key: String,
    pub message: String,
}

/// Any runtime error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
