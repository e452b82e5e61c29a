use conflux_error::{ConfluxError, ErrorCode, ErrorContext};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PushdownError {
    #[error("expression is not supported: {0}")]
    UnsupportedExpression(String),

    #[error("unimplemented typed value: {0}")]
    UnimplementedTypedValue(String),

    #[error("unimplemented expression: {0}")]
    UnimplementedExpression(String),

    #[error("unimplemented operation: {0}")]
    UnimplementedOperation(String),

    #[error("unimplemented predicate type: {0}")]
    UnimplementedPredicate(String),

    #[error("unimplemented arithmetical expression: {0}")]
    UnimplementedArithmetic(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("empty table name")]
    EmptyTableName,

    #[error("{operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: Box<PushdownError>,
    },
}

impl PushdownError {
    /// Prefixes the error with the step that was running.
    pub fn context(self, operation: impl Into<String>) -> Self {
        PushdownError::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, without context layers.
    pub fn root(&self) -> &PushdownError {
        match self {
            PushdownError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Errors that OPTIONAL filtering may swallow, leaving filtering to the engine.
    pub fn is_acceptable(&self) -> bool {
        matches!(
            self.root(),
            PushdownError::UnsupportedExpression(_)
                | PushdownError::UnimplementedTypedValue(_)
                | PushdownError::UnimplementedExpression(_)
                | PushdownError::UnimplementedOperation(_)
                | PushdownError::UnimplementedPredicate(_)
                | PushdownError::UnimplementedArithmetic(_)
        )
    }

    pub fn to_conflux_error(&self, dialect_name: &str) -> ConfluxError {
        let (code, reason, hint): (ErrorCode, String, Option<&str>) = match self.root() {
            PushdownError::UnsupportedExpression(r) => (
                ErrorCode::UnsupportedExpression,
                r.clone(),
                Some("Use OPTIONAL filtering to let the engine evaluate this expression"),
            ),
            PushdownError::UnimplementedTypedValue(r) => (
                ErrorCode::UnsupportedType,
                r.clone(),
                Some("The literal's type has no binding for this backend"),
            ),
            PushdownError::UnimplementedExpression(r)
            | PushdownError::UnimplementedArithmetic(r) => {
                (ErrorCode::UnsupportedExpression, r.clone(), None)
            }
            PushdownError::UnimplementedOperation(r) => (
                ErrorCode::UnimplementedOperation,
                r.clone(),
                Some("This operation has no rendering in the target dialect"),
            ),
            PushdownError::UnimplementedPredicate(r) => (ErrorCode::UnsupportedPredicate, r.clone(), None),
            PushdownError::InvalidRequest(r) => (ErrorCode::InvalidRequest, r.clone(), None),
            PushdownError::EmptyTableName => (
                ErrorCode::EmptyTableName,
                String::new(),
                Some("Specify the table to read"),
            ),
            PushdownError::Context { .. } => (ErrorCode::Unknown, String::new(), None),
        };

        let mut error = ConfluxError::new(code, self.to_string()).with_context(
            ErrorContext::Pushdown {
                operation: self.operation_path(),
                dialect: dialect_name.to_string(),
                reason,
            },
        );
        if let Some(hint) = hint {
            error = error.with_hint(hint);
        }
        error
    }

    fn operation_path(&self) -> String {
        let mut steps = Vec::new();
        let mut current = self;
        while let PushdownError::Context { operation, source } = current {
            steps.push(operation.as_str());
            current = source.as_ref();
        }
        steps.join(" / ")
    }
}
