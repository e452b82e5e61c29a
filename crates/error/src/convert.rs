use crate::{ConfluxError, ErrorCode};
use arrow::error::ArrowError;

impl From<ArrowError> for ConfluxError {
    fn from(err: ArrowError) -> Self {
        match &err {
            ArrowError::InvalidArgumentError(msg) | ArrowError::SchemaError(msg) => {
                ConfluxError::new(ErrorCode::InvariantViolation, msg.clone())
                    .with_hint("Columnar builders and schema went out of sync")
            }
            ArrowError::IpcError(msg) => {
                ConfluxError::new(ErrorCode::SerializationFailed, msg.clone())
            }
            _ => ConfluxError::new(ErrorCode::SerializationFailed, err.to_string()),
        }
    }
}

impl From<std::io::Error> for ConfluxError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut => ErrorCode::RetriableConnectionError,
            _ => ErrorCode::PermanentBackendError,
        };
        ConfluxError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for ConfluxError {
    fn from(err: serde_json::Error) -> Self {
        ConfluxError::new(ErrorCode::SerializationFailed, err.to_string())
    }
}
