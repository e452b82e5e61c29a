use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following CONFLUX-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Connection and backend errors
/// - **2000-2999**: Query and pushdown errors
/// - **3000-3999**: Configuration errors
/// - **4000-4999**: Paging and streaming errors
/// - **5000-5999**: Internal errors
///
/// Codes are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Connection Errors (1000-1999) ===
    /// CONFLUX-1001: Transient connection failure, may be retried
    RetriableConnectionError = 1001,
    /// CONFLUX-1002: Backend rejected the operation, or retries were exhausted
    PermanentBackendError = 1002,
    /// CONFLUX-1003: Connection could not be opened in time
    ConnectionTimeout = 1003,
    /// CONFLUX-1004: No data source registered for the requested kind
    UnsupportedSourceType = 1004,

    // === Query Errors (2000-2999) ===
    /// CONFLUX-2001: Native or canonical type cannot be mapped
    UnsupportedType = 2001,
    /// CONFLUX-2002: Expression cannot be pushed down to the backend
    UnsupportedExpression = 2002,
    /// CONFLUX-2003: Predicate kind cannot be pushed down to the backend
    UnsupportedPredicate = 2003,
    /// CONFLUX-2004: Operation is not implemented for the dialect
    UnimplementedOperation = 2004,
    /// CONFLUX-2005: Malformed request
    InvalidRequest = 2005,
    /// CONFLUX-2006: Request names no table
    EmptyTableName = 2006,
    /// CONFLUX-2007: Table does not exist or has no readable columns
    TableNotFound = 2007,

    // === Configuration Errors (3000-3999) ===
    /// CONFLUX-3001: Configuration failed to load or validate
    InvalidConfig = 3001,

    // === Paging Errors (4000-4999) ===
    /// CONFLUX-4001: A single row exceeds the page byte budget
    PageSizeExceeded = 4001,
    /// CONFLUX-4002: Configured row ceiling reached
    ReadLimitExceeded = 4002,
    /// CONFLUX-4003: Stream was cancelled by the client
    StreamCancelled = 4003,

    // === Internal Errors (5000-5999) ===
    /// CONFLUX-5001: Internal state machine reached an impossible state
    InvariantViolation = 5001,
    /// CONFLUX-5002: Serialization/deserialization failed
    SerializationFailed = 5002,
    /// CONFLUX-5003: Feature not implemented
    NotImplemented = 5003,

    /// CONFLUX-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "CONFLUX-2002")
    pub fn as_str(&self) -> String {
        format!("CONFLUX-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Connection,
            2000..=2999 => ErrorCategory::Query,
            3000..=3999 => ErrorCategory::Config,
            4000..=4999 => ErrorCategory::Paging,
            _ => ErrorCategory::Internal,
        }
    }

    /// Status reported to the client for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedType
            | Self::UnsupportedExpression
            | Self::UnsupportedPredicate
            | Self::UnimplementedOperation
            | Self::UnsupportedSourceType
            | Self::NotImplemented => StatusCode::Unsupported,
            Self::InvalidRequest
            | Self::EmptyTableName
            | Self::PageSizeExceeded
            | Self::ReadLimitExceeded => StatusCode::BadRequest,
            Self::TableNotFound => StatusCode::NotFound,
            Self::RetriableConnectionError
            | Self::PermanentBackendError
            | Self::ConnectionTimeout => StatusCode::Unavailable,
            Self::StreamCancelled => StatusCode::Cancelled,
            Self::InvalidConfig
            | Self::InvariantViolation
            | Self::SerializationFailed
            | Self::Unknown => StatusCode::InternalError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("CONFLUX-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::RetriableConnectionError),
            1002 => Ok(Self::PermanentBackendError),
            1003 => Ok(Self::ConnectionTimeout),
            1004 => Ok(Self::UnsupportedSourceType),
            2001 => Ok(Self::UnsupportedType),
            2002 => Ok(Self::UnsupportedExpression),
            2003 => Ok(Self::UnsupportedPredicate),
            2004 => Ok(Self::UnimplementedOperation),
            2005 => Ok(Self::InvalidRequest),
            2006 => Ok(Self::EmptyTableName),
            2007 => Ok(Self::TableNotFound),
            3001 => Ok(Self::InvalidConfig),
            4001 => Ok(Self::PageSizeExceeded),
            4002 => Ok(Self::ReadLimitExceeded),
            4003 => Ok(Self::StreamCancelled),
            5001 => Ok(Self::InvariantViolation),
            5002 => Ok(Self::SerializationFailed),
            5003 => Ok(Self::NotImplemented),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Connection,
    Query,
    Config,
    Paging,
    Internal,
}

/// Status carried by the terminal message of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Success,
    BadRequest,
    Unsupported,
    NotFound,
    Unavailable,
    Cancelled,
    InternalError,
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(
            ErrorCode::RetriableConnectionError.as_str(),
            "CONFLUX-1001"
        );
        assert_eq!(ErrorCode::UnsupportedType.as_str(), "CONFLUX-2001");
        assert_eq!(ErrorCode::Unknown.as_str(), "CONFLUX-9999");
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ErrorCode::try_from("CONFLUX-4001".to_string()).unwrap(),
            ErrorCode::PageSizeExceeded
        );
        assert_eq!(
            ErrorCode::try_from("CONFLUX-9999".to_string()).unwrap(),
            ErrorCode::Unknown
        );
    }

    #[test]
    fn test_error_code_parsing_errors() {
        assert!(ErrorCode::try_from("INVALID".to_string()).is_err());
        assert!(ErrorCode::try_from("CONFLUX-0000".to_string()).is_err());
        assert!(ErrorCode::try_from("CONFLUX-ABC".to_string()).is_err());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::ConnectionTimeout.category(),
            ErrorCategory::Connection
        );
        assert_eq!(
            ErrorCode::UnsupportedExpression.category(),
            ErrorCategory::Query
        );
        assert_eq!(ErrorCode::InvalidConfig.category(), ErrorCategory::Config);
        assert_eq!(
            ErrorCode::ReadLimitExceeded.category(),
            ErrorCategory::Paging
        );
        assert_eq!(
            ErrorCode::InvariantViolation.category(),
            ErrorCategory::Internal
        );
        assert_eq!(ErrorCode::Unknown.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ErrorCode::UnsupportedPredicate.status(),
            StatusCode::Unsupported
        );
        assert_eq!(ErrorCode::TableNotFound.status(), StatusCode::NotFound);
        assert_eq!(
            ErrorCode::PermanentBackendError.status(),
            StatusCode::Unavailable
        );
        assert!(!ErrorCode::StreamCancelled.status().is_success());
    }
}
