//! # Error Types
//!
//! Structured error types for cost_core. Malformed configuration and bad
//! numeric input are repaired silently by normalization, so the variants here
//! only cover what the caller genuinely has to react to: unreadable import
//! payloads, editing requests that cannot be honoured, and store writes that
//! failed.
//!
//! ## Example
//!
//! ```rust
//! use cost_core::errors::{CostError, CostResult};
//!
//! fn parse_payload(text: &str) -> CostResult<serde_json::Value> {
//!     serde_json::from_str(text).map_err(|e| CostError::invalid_data(e.to_string()))
//! }
//!
//! assert!(parse_payload("{ not json").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for cost_core operations
pub type CostResult<T> = Result<T, CostError>;

/// Structured error type for estimator operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CostError {
    /// Import payload could not be read as the expected structure
    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    /// An editing request is out of range (e.g. removing a missing lot)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// No trade preset exists for the selected typology
    #[error("No lot preset for typology: {typologie}")]
    PresetNotFound { typologie: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// Store directory is locked by another process
    #[error("Store locked: '{path}' is locked by pid {pid} since {locked_at}")]
    StoreLocked {
        path: String,
        pid: u32,
        locked_at: String,
    },

    /// JSON serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

impl CostError {
    /// Create an InvalidData error
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        CostError::InvalidData {
            reason: reason.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CostError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a PresetNotFound error
    pub fn preset_not_found(typologie: impl Into<String>) -> Self {
        CostError::PresetNotFound {
            typologie: typologie.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CostError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CostError::StoreLocked { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CostError::InvalidData { .. } => "INVALID_DATA",
            CostError::InvalidInput { .. } => "INVALID_INPUT",
            CostError::PresetNotFound { .. } => "PRESET_NOT_FOUND",
            CostError::FileError { .. } => "FILE_ERROR",
            CostError::StoreLocked { .. } => "STORE_LOCKED",
            CostError::SerializationError { .. } => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for CostError {
    fn from(e: serde_json::Error) -> Self {
        CostError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CostError::invalid_data("expected value at line 1 column 1");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"InvalidData\""));
        let roundtrip: CostError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CostError::invalid_data("x").error_code(), "INVALID_DATA");
        assert_eq!(CostError::preset_not_found("Scolaire").error_code(), "PRESET_NOT_FOUND");
        assert!(!CostError::invalid_data("x").is_recoverable());
    }

    #[test]
    fn test_display_carries_detail() {
        let error = CostError::preset_not_found("Scolaire");
        assert_eq!(error.to_string(), "No lot preset for typology: Scolaire");
    }
}
