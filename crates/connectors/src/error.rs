use conflux_error::{ConfluxError, ErrorCode, ErrorContext};
use thiserror::Error;

/// Failures raised while bridging native types and values into canonical ones.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("unsupported native type '{native}'")]
    UnsupportedType { native: String },

    #[error("decimal type '{native}' needs both precision and scale")]
    DecimalParamsMissing { native: String },

    #[error("decimal type '{native}' has invalid parameters: {reason}")]
    InvalidDecimalParams { native: String, reason: String },

    #[error("no codec for tag '{0}'")]
    UnknownTag(String),

    #[error("canonical type {0} has no acceptor")]
    NoAcceptor(String),

    #[error("column '{column}' is not optional but the backend returned NULL")]
    UnexpectedNull { column: String },

    #[error("slot holds {actual}, appender expects {expected}")]
    SlotMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("columnar builder does not match {0}")]
    BuilderMismatch(&'static str),

    #[error("invalid object identifier: {0}")]
    InvalidObjectId(String),
}

impl ConversionError {
    pub fn to_conflux_error(&self, table: &str) -> ConfluxError {
        match self {
            ConversionError::UnsupportedType { native }
            | ConversionError::DecimalParamsMissing { native }
            | ConversionError::InvalidDecimalParams { native, .. } => {
                ConfluxError::new(ErrorCode::UnsupportedType, self.to_string()).with_context(
                    ErrorContext::Schema {
                        table: table.to_string(),
                        column: None,
                        native_type: Some(native.clone()),
                    },
                )
            }
            ConversionError::UnknownTag(_) | ConversionError::NoAcceptor(_) => {
                ConfluxError::new(ErrorCode::UnsupportedType, self.to_string())
            }
            ConversionError::UnexpectedNull { column } => {
                ConfluxError::new(ErrorCode::PermanentBackendError, self.to_string())
                    .with_context(ErrorContext::Schema {
                        table: table.to_string(),
                        column: Some(column.clone()),
                        native_type: None,
                    })
                    .with_hint("The table schema changed or the column was reported as NOT NULL incorrectly")
            }
            ConversionError::SlotMismatch { .. } | ConversionError::BuilderMismatch(_) => {
                ConfluxError::new(ErrorCode::InvariantViolation, self.to_string())
            }
            ConversionError::InvalidObjectId(_) => {
                ConfluxError::new(ErrorCode::PermanentBackendError, self.to_string())
            }
        }
    }
}
