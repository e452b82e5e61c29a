//! # conflux-error
//!
//! Unified error types for the Conflux federation connector.
//!
//! Every failure that crosses a crate boundary is a [`ConfluxError`] carrying:
//! - a numeric error code (`CONFLUX-XXXX`)
//! - structured JSON context
//! - an optional operator-facing hint
//!
//! The code also decides the wire status that terminates a response stream.

mod code;
mod context;
mod convert;

pub use code::{ErrorCategory, ErrorCode, StatusCode};
pub use context::ErrorContext;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all connector operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluxError {
    /// Numeric error code (e.g., "CONFLUX-2002")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Suggestion for the operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Correlation ID of the request that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ConfluxError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            trace_id: None,
        }
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add a hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Add trace ID for correlation
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Prefix the message with the operation that was running, keeping code and context.
    pub fn wrap(mut self, operation: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", operation, self.message);
        self
    }

    /// Wire status reported in the terminal message of a stream.
    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    /// True for conditions a retry policy may re-attempt.
    pub fn is_retriable(&self) -> bool {
        self.code == ErrorCode::RetriableConnectionError
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize ConfluxError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for ConfluxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfluxError {}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConfluxError>;

/// Builds the message used when a state machine observes an unreachable state.
///
/// Invariant violations are not recoverable, callers pass the result to `panic!`.
pub fn invariant_violation(message: impl fmt::Display) -> ConfluxError {
    ConfluxError::new(ErrorCode::InvariantViolation, message.to_string())
}
