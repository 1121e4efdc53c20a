//! Error types for Storer
//!
//! Every operation reports exactly one [`ErrorKind`]. The engine's own error
//! types never reach a caller directly: they are wrapped in the
//! operation-specific `*Failed` variant.

use std::fmt;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Closed set of failure kinds
///
/// This is what travels over the wire (see `protocol::Status`) and what
/// callers should match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CollectionCreateFailed,
    CollectionDropFailed,
    CollectionNotFound,
    PutConflict,
    PutFailed,
    GetFailed,
    UpdateFailed,
    DeleteFailed,
    KeyNotFound,
    EngineUnavailable,
    Io,
    Protocol,
    Config,
}

impl ErrorKind {
    /// Stable name, used in logs and by the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CollectionCreateFailed => "collection_create_failed",
            ErrorKind::CollectionDropFailed => "collection_drop_failed",
            ErrorKind::CollectionNotFound => "collection_not_found",
            ErrorKind::PutConflict => "put_conflict",
            ErrorKind::PutFailed => "put_failed",
            ErrorKind::GetFailed => "get_failed",
            ErrorKind::UpdateFailed => "update_failed",
            ErrorKind::DeleteFailed => "delete_failed",
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::EngineUnavailable => "engine_unavailable",
            ErrorKind::Io => "io",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for Storer operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("failed to create collection ({collection}): {source}")]
    CollectionCreateFailed {
        collection: String,
        #[source]
        source: redb::Error,
    },

    #[error("failed to drop collection ({collection}): {reason}")]
    CollectionDropFailed { collection: String, reason: String },

    #[error("collection ({0}) not found")]
    CollectionNotFound(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("key ({key}) is already in collection ({collection})")]
    PutConflict { collection: String, key: String },

    #[error("key ({key}) is not in collection ({collection})")]
    KeyNotFound { collection: String, key: String },

    #[error("put into collection ({collection}) failed: {source}")]
    PutFailed {
        collection: String,
        #[source]
        source: redb::Error,
    },

    #[error("get from collection ({collection}) failed: {source}")]
    GetFailed {
        collection: String,
        #[source]
        source: redb::Error,
    },

    #[error("update in collection ({collection}) failed: {source}")]
    UpdateFailed {
        collection: String,
        #[source]
        source: redb::Error,
    },

    #[error("delete from collection ({collection}) failed: {source}")]
    DeleteFailed {
        collection: String,
        #[source]
        source: redb::Error,
    },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("storage engine unavailable: {0}")]
    EngineUnavailable(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An error response received by the client
    #[error("{kind}: {message}")]
    Remote { kind: ErrorKind, message: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// The taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::CollectionCreateFailed { .. } => ErrorKind::CollectionCreateFailed,
            StoreError::CollectionDropFailed { .. } => ErrorKind::CollectionDropFailed,
            StoreError::CollectionNotFound(_) => ErrorKind::CollectionNotFound,
            StoreError::PutConflict { .. } => ErrorKind::PutConflict,
            StoreError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            StoreError::PutFailed { .. } => ErrorKind::PutFailed,
            StoreError::GetFailed { .. } => ErrorKind::GetFailed,
            StoreError::UpdateFailed { .. } => ErrorKind::UpdateFailed,
            StoreError::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            StoreError::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            StoreError::Io(_) => ErrorKind::Io,
            StoreError::Protocol(_) => ErrorKind::Protocol,
            StoreError::Remote { kind, .. } => *kind,
            StoreError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for the "record or collection is simply not there" kinds
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::KeyNotFound | ErrorKind::CollectionNotFound
        )
    }
}
