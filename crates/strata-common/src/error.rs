//! Error types for StrataDB.

use thiserror::Error;

/// Result type alias using StrataError.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Errors that can occur in StrataDB operations.
#[derive(Debug, Error)]
pub enum StrataError {
    // Page errors
    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: u64 },

    #[error("Page corrupted: {page_id}, reason: {reason}")]
    PageCorrupted { page_id: u64, reason: String },

    // B+ tree errors
    #[error("Duplicate entry for key {key:?} at {tuple_id}")]
    DuplicateEntry { key: Vec<u8>, tuple_id: String },

    #[error("Unique violation in index {index}: key {key:?} already present")]
    UniqueViolation { index: String, key: Vec<u8> },

    #[error("B+ tree node full")]
    NodeFull,

    #[error("Key too large: {size} bytes (max {max})")]
    KeyTooLarge { size: usize, max: usize },

    #[error("B+ tree corrupted: {0}")]
    BTreeCorrupted(String),

    // Tier metadata errors
    #[error("Tier metadata corrupted: {0}")]
    MetadataCorrupted(String),

    #[error("Tier metadata changed concurrently on index {index}")]
    MetadataConflict { index: u32 },

    // Locking errors
    #[error("Timed out after {timeout_ms}ms waiting for {resource}")]
    LockTimeout { resource: String, timeout_ms: u64 },

    // Catalog errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Access method errors
    #[error("Operation not supported by {method}: {operation}")]
    Unsupported {
        method: &'static str,
        operation: &'static str,
    },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Returns true for constraint violations raised by an insert.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StrataError::DuplicateEntry { .. } | StrataError::UniqueViolation { .. }
        )
    }
}
