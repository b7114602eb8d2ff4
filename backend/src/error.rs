//! Error types for the migration engine.
//!
//! This module defines one error type per concern:
//!
//! - [`StoreError`] - List-model store failures (memory, file, REST)
//! - [`MappingError`] - Resolver and rule failures while building a patch
//! - [`SourceError`] - Source supplier failures (fatal for a run)
//! - [`MigrateError`] - Per-record failures routed to the `error` channel
//! - [`Rejection`] - Skip vs error split for a single record
//! - [`ConfigError`] - Environment configuration errors
//! - [`ServerError`] - REST server errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a list-model store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record carries this id.
    #[error("Record not found in '{store}': {id}")]
    NotFound { store: String, id: String },

    /// The factory has no definition for this store.
    #[error("Unknown store: {0}")]
    UnknownStore(String),

    /// HTTP transport failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// IO error.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A persisted record came back without its index field.
    #[error("Record in '{store}' has no '{key}' field")]
    MissingIndex { store: String, key: String },

    /// The backend URL cannot address a store.
    #[error("Invalid store URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The store refused the record.
    #[error("Record rejected: {0}")]
    Rejected(String),
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors while resolving a field mapping against a source record.
#[derive(Debug, Error)]
pub enum MappingError {
    /// A resolver function failed.
    #[error("{0}")]
    Resolver(String),

    /// A declarative rule could not be evaluated.
    #[error("Rule for '{field}' failed: {message}")]
    Rule { field: String, message: String },

    /// The source record is not a JSON object.
    #[error("Source record is not an object")]
    NotAnObject,

    /// JSON error.
    #[error("Mapping JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while reading a mapping file.
    #[error("Mapping IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MappingError {
    /// Shorthand for resolver closures.
    pub fn resolver(message: impl Into<String>) -> Self {
        MappingError::Resolver(message.into())
    }
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors raised by a source supplier. These end the run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the input.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV content.
    #[error("Line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Empty input.
    #[error("Source is empty")]
    Empty,

    /// Walking a store failed.
    #[error("Store walk failed: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// Per-record Errors
// =============================================================================

/// Uniqueness conflict: a target record already holds this value.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Duplicate value for '{field}': {value}")]
pub struct Duplicate {
    pub field: String,
    pub value: Value,
}

/// Failures that send a record to the `error` channel.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Resolving the mapping for a source field failed.
    #[error("Mapping of '{field}' failed: {source}")]
    Mapping {
        field: String,
        #[source]
        source: MappingError,
    },

    /// The uniqueness lookup itself failed.
    #[error("Uniqueness check on '{field}' failed: {source}")]
    Lookup {
        field: String,
        #[source]
        source: StoreError,
    },

    /// Writing the primary record failed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// Why a record did not reach the `save` channel.
///
/// `Duplicate` is the only variant that maps to `skip`.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error(transparent)]
    Duplicate(#[from] Duplicate),

    #[error(transparent)]
    Failure(#[from] MigrateError),
}

/// Error category attached to progress notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Duplicate,
    Mapping,
    Relation,
    Persistence,
}

/// Serializable error carried by a progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProgressError {
    pub fn relation(err: &StoreError) -> Self {
        Self { kind: ErrorKind::Relation, message: err.to_string() }
    }
}

impl From<&Rejection> for ProgressError {
    fn from(rejection: &Rejection) -> Self {
        let kind = match rejection {
            Rejection::Duplicate(_) => ErrorKind::Duplicate,
            Rejection::Failure(MigrateError::Mapping { .. }) => ErrorKind::Mapping,
            Rejection::Failure(_) => ErrorKind::Persistence,
        };
        Self { kind, message: rejection.to_string() }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Environment configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds an unparsable value.
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for mapping resolution.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for source suppliers.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejection_classification() {
        let dup: Rejection = Duplicate { field: "email".into(), value: json!("jo@x") }.into();
        assert_eq!(ProgressError::from(&dup).kind, ErrorKind::Duplicate);

        let mapping: Rejection = MigrateError::Mapping {
            field: "title".into(),
            source: MappingError::resolver("boom"),
        }
        .into();
        assert_eq!(ProgressError::from(&mapping).kind, ErrorKind::Mapping);

        let write: Rejection = MigrateError::from(StoreError::Rejected("nope".into())).into();
        assert_eq!(ProgressError::from(&write).kind, ErrorKind::Persistence);
    }

    #[test]
    fn test_duplicate_message() {
        let dup = Duplicate { field: "email".into(), value: json!("jo@x") };
        let msg = dup.to_string();
        assert!(msg.contains("email"));
        assert!(msg.contains("jo@x"));
    }

    #[test]
    fn test_error_conversion_chain() {
        let store_err = StoreError::UnknownStore("users".into());
        let migrate_err: MigrateError = store_err.into();
        assert!(migrate_err.to_string().contains("users"));
    }
}
