//! Error types for ctx_store operations.

use thiserror::Error;

/// Core error type for ctx_store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An atomic write or append failed after all retries.
    ///
    /// The message is sanitized: error kind plus the first line of the
    /// underlying message, without full paths.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Serialization error while encoding an event or cache file.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A context id tried to escape the storage root.
    #[error("path traversal rejected in context id: {0:?}")]
    PathTraversal(String),

    /// A context id could not be sanitized into a valid slug.
    #[error("invalid context id: {0:?}")]
    InvalidContextId(String),

    /// A required argument was empty or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No event log exists for this context.
    #[error("context not found: {0}")]
    ContextNotFound(String),

    /// No task with this id exists in the context.
    #[error("task not found in {context_id}: {task_id}")]
    TaskNotFound {
        /// Owning context
        context_id: String,
        /// Requested task id
        task_id: String,
    },

    /// The target of a create, archive or restore already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Invalid in-flight mode transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source mode
        from: String,
        /// Target mode
        to: String,
    },

    /// Archive requires a completed context.
    #[error("context {0} is not completed")]
    NotCompleted(String),

    /// Moving a context directory between areas failed.
    #[error("archive move failed for {context_id}: {reason}")]
    ArchiveFailed {
        /// Context being moved
        context_id: String,
        /// Sanitized failure reason
        reason: String,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A cache file could not be parsed.
    #[error("cache corrupted: {message}. Run 'ctx-store rebuild' to repair.")]
    CacheCorrupted {
        /// Description of the corruption
        message: String,
    },
}

impl StoreError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CacheCorrupted { .. } => Some("Run 'ctx-store rebuild' to regenerate caches from the event logs."),
            Self::ContextNotFound(_) => {
                Some("Check 'ctx-store list'. If the folder exists but is missing from the list, run 'ctx-store rebuild'.")
            }
            Self::ArchiveFailed { .. } => {
                Some("Check that both contexts/<id> and contexts/archive/<id> are intact, then retry.")
            }
            Self::AlreadyExists(_) => Some("Pick a different id or reopen the existing context."),
            Self::NotCompleted(_) => Some("Complete the context with 'ctx-store complete <id>' first."),
            Self::WriteFailed(_) => Some("Check free disk space and permissions on the store root."),
            Self::PathTraversal(_) | Self::InvalidContextId(_) => {
                Some("Context ids are 1-64 chars of lowercase letters, digits, '-' and '_'.")
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience Result type for ctx_store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
