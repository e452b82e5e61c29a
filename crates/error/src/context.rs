//! # Error Contexts
//!
//! Structured metadata attached to errors for programmatic handling.

use serde::{Deserialize, Serialize};

/// Structured context attached to a [`crate::ConfluxError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for CONFLUX-2002..2004 (pushdown failures)
    Pushdown {
        operation: String,
        dialect: String,
        reason: String,
    },

    /// Context for CONFLUX-2001 raised while resolving a table schema
    Schema {
        table: String,
        column: Option<String>,
        native_type: Option<String>,
    },

    /// Context for connection errors (CONFLUX-1001..1003)
    Connection {
        source_kind: String,
        host: Option<String>,
        port: Option<u16>,
        attempts: Option<u32>,
    },

    /// Context for CONFLUX-4001 (PageSizeExceeded)
    PageBudget {
        row_bytes: u64,
        bytes_per_page: u64,
    },

    /// Context for CONFLUX-4002 (ReadLimitExceeded)
    ReadLimit { rows_read: u64, limit: u64 },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_budget_context_serde_roundtrip() {
        let ctx = ErrorContext::PageBudget {
            row_bytes: 2048,
            bytes_per_page: 1024,
        };

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"type\":\"page_budget\""));
        let de: ErrorContext = serde_json::from_str(&json).unwrap();

        match de {
            ErrorContext::PageBudget {
                row_bytes,
                bytes_per_page,
            } => {
                assert_eq!(row_bytes, 2048);
                assert_eq!(bytes_per_page, 1024);
            }
            _ => panic!("Wrong variant"),
        }
    }
}
