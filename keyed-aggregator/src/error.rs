//! Aggregator error taxonomy.
//!
//! | Variant                 | Raised by                          | Fatal |
//! |-------------------------|------------------------------------|-------|
//! | InvalidArgument         | construction, config validation    | no    |
//! | InvalidOperationState   | `stop` on a stopped engine         | no    |
//! | Cancelled               | delay, lock or stream I/O          | no    |
//! | InternalInconsistency   | debounce task missing its group    | yes   |

use thiserror::Error;

/// Result type alias for aggregator operations
pub type AggregatorResult<T> = Result<T, AggregatorError>;

/// Errors surfaced by the aggregator engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    /// A construction parameter or config value is out of range or missing.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// The operation is not valid in the engine's current lifecycle state.
    #[error("Invalid operation state: {0}")]
    InvalidOperationState(String),

    /// The shared cancellation token fired while the caller was suspended.
    #[error("Operation cancelled")]
    Cancelled,

    /// A debounce window fired but its pending group was gone.
    #[error("Internal inconsistency: pending group for key {key} not found")]
    InternalInconsistency { key: String },
}

impl AggregatorError {
    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid operation state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidOperationState(message.into())
    }

    /// Create an internal inconsistency error for `key`
    pub fn inconsistency(key: &impl std::fmt::Debug) -> Self {
        Self::InternalInconsistency {
            key: format!("{key:?}"),
        }
    }

    /// Whether this error came from the cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error indicates a broken engine invariant.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInconsistency { .. })
    }
}
