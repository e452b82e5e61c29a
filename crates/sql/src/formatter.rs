use crate::error::PushdownError;
use crate::expr::{Comparison, Expression};
use crate::query::{SelectQueryParts, SplitDescription};
use crate::types::CanonicalType;

/// Dialect capabilities the predicate compiler and query builder rely on.
///
/// Hooks with a default body return `UnimplementedOperation` unless the
/// dialect knows how to render the construct.
pub trait SqlFormatter: Send + Sync {
    fn dialect_name(&self) -> &'static str;

    /// Whether `expression` (not its children) can be rendered for this backend.
    fn supports_expression(&self, expression: &Expression) -> bool;

    /// Placeholder for the argument at zero-based index `n`.
    fn placeholder(&self, n: usize) -> String;

    fn sanitise_identifier(&self, ident: &str) -> String;

    fn format_from(&self, table_name: &str) -> String {
        self.sanitise_identifier(table_name)
    }

    fn format_starts_with(&self, _left: &str, _right: &str) -> Result<String, PushdownError> {
        Err(unimplemented_operation(self, "STARTS_WITH"))
    }

    fn format_ends_with(&self, _left: &str, _right: &str) -> Result<String, PushdownError> {
        Err(unimplemented_operation(self, "ENDS_WITH"))
    }

    fn format_contains(&self, _left: &str, _right: &str) -> Result<String, PushdownError> {
        Err(unimplemented_operation(self, "CONTAINS"))
    }

    fn format_regexp(&self, _value: &str, _pattern: &str) -> Result<String, PushdownError> {
        Err(unimplemented_operation(self, "REGEXP"))
    }

    fn format_if(
        &self,
        _condition: &str,
        _then: &str,
        _otherwise: &str,
    ) -> Result<String, PushdownError> {
        Err(unimplemented_operation(self, "IF"))
    }

    fn format_cast(&self, _value: &str, _to: &CanonicalType) -> Result<String, PushdownError> {
        Err(unimplemented_operation(self, "CAST"))
    }

    fn render_between(
        &self,
        value: &str,
        least: &str,
        greatest: &str,
    ) -> Result<String, PushdownError> {
        Ok(format!("({} BETWEEN {} AND {})", value, least, greatest))
    }

    /// Gives the dialect a chance to rewrite a comparison before rendering.
    fn transform_predicate_comparison(
        &self,
        comparison: Comparison,
    ) -> Result<Comparison, PushdownError> {
        Ok(comparison)
    }

    /// Assembles the final statement. Dialects that understand split bounds override this.
    fn render_select_query_text(
        &self,
        parts: &SelectQueryParts,
        split: &SplitDescription,
    ) -> Result<String, PushdownError> {
        match split {
            SplitDescription::Single => Ok(parts.render_default()),
            other => Err(PushdownError::InvalidRequest(format!(
                "{} cannot read split {:?}",
                self.dialect_name(),
                other
            ))),
        }
    }
}

fn unimplemented_operation<F: SqlFormatter + ?Sized>(formatter: &F, op: &str) -> PushdownError {
    PushdownError::UnimplementedOperation(format!("{} in {}", op, formatter.dialect_name()))
}
