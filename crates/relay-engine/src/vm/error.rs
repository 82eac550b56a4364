//! Runtime failures of an entry routine
//!
//! Assertion and value failures belong to the user program and halt only the
//! offending actor. `Internal` is a trap: the lowered code or the scheduler
//! broke the frame protocol.

use super::value::ValueError;
use thiserror::Error;

/// Why an entry routine stopped without a continuation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeFailure {
    /// An `assert` (or a lowered non-null check) failed
    #[error("{message}")]
    AssertionFailed {
        /// Source-located message
        message: String,
    },

    /// A value operation failed
    #[error(transparent)]
    Value(#[from] ValueError),

    /// The frame protocol was violated
    #[error("internal error in {function}: {message}")]
    Internal {
        /// Function that trapped
        function: String,
        /// What went wrong
        message: String,
    },

    /// Synchronous call nesting exceeded the configured limit
    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded {
        /// Configured limit
        limit: usize,
    },
}

impl RuntimeFailure {
    /// Build an internal trap
    pub fn internal(function: &str, message: impl Into<String>) -> Self {
        RuntimeFailure::Internal {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// Whether this failure is the user program's fault
    pub fn is_program_error(&self) -> bool {
        matches!(self, RuntimeFailure::AssertionFailed { .. } | RuntimeFailure::Value(_))
    }
}

/// Result alias for entry routines
pub type RuntimeResult<T> = Result<T, RuntimeFailure>;
