//! Error types for Sage.

use std::fmt;

use thiserror::Error;

use crate::catalog::PuzzleType;

/// What kind of reference could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Topic,
    Path,
    Puzzle,
    Ledger,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotFoundKind::Topic => "Topic",
            NotFoundKind::Path => "Path",
            NotFoundKind::Puzzle => "Puzzle",
            NotFoundKind::Ledger => "Progress ledger",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum SageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: NotFoundKind, id: String },

    #[error("Puzzle type '{0}' cannot be judged")]
    ValidationUnsupported(PuzzleType),

    #[error("Conflicting ledger write for {user} (expected {expected:?}, found {actual:?})")]
    PersistenceConflict {
        user: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("Storage unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SageError {
    pub fn not_found(kind: NotFoundKind, id: impl Into<String>) -> Self {
        SageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            SageError::NotFound { .. } => -32004,
            SageError::ValidationUnsupported(_) => -32010,
            SageError::PersistenceConflict { .. } => -32020,
            SageError::PersistenceUnavailable(_) => -32021,
            SageError::InvalidInput(_) => -32602,
            SageError::Io(_) => -32006,
            SageError::Json(_) => -32700,
        }
    }

    /// Whether the client may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SageError::PersistenceConflict { .. }
                | SageError::PersistenceUnavailable(_)
                | SageError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SageError>;
