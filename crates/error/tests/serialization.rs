use conflux_error::{ConfluxError, ErrorCode, ErrorContext, StatusCode};
use serde_json::Value;

#[test]
fn test_json_serialization() {
    let error = ConfluxError::new(
        ErrorCode::UnsupportedExpression,
        "arithmetic expressions are not supported",
    )
    .with_context(ErrorContext::Pushdown {
        operation: "format where clause".to_string(),
        dialect: "postgresql".to_string(),
        reason: "arithmetic".to_string(),
    })
    .with_hint("Use OPTIONAL filtering to let the engine filter rows itself");

    let json = error.to_json();

    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["code"], "CONFLUX-2002");
    assert_eq!(v["message"], "arithmetic expressions are not supported");
    assert_eq!(v["context"]["type"], "pushdown");
    assert_eq!(v["context"]["dialect"], "postgresql");
}

#[test]
fn test_error_code_parsing() {
    let code: ErrorCode = "CONFLUX-1002".to_string().try_into().unwrap();
    assert_eq!(code, ErrorCode::PermanentBackendError);
}

#[test]
fn test_error_roundtrip_keeps_status() {
    let error = ConfluxError::new(ErrorCode::ReadLimitExceeded, "limit of 10 rows reached")
        .with_context(ErrorContext::ReadLimit {
            rows_read: 10,
            limit: 10,
        });

    let decoded: ConfluxError = serde_json::from_str(&error.to_json()).unwrap();
    assert_eq!(decoded.code, ErrorCode::ReadLimitExceeded);
    assert_eq!(decoded.status(), StatusCode::BadRequest);
}
