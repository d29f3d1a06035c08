//! Query Backend
//!
//! Trait seam for the warehouse connection. The agent only ever sees rows or
//! an opaque error message; connectivity lives behind this boundary.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// A single result row: column name to value.
pub type Row = HashMap<String, Value>;

/// Raw failure from the execution backend. The message is classified by the
/// execution loop before anything is surfaced to a caller.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Opaque query-execution backend.
pub trait QueryBackend {
    fn execute(&self, sql: &str) -> std::result::Result<Vec<Row>, ExecutionError>;
}
