use super::quote_identifier;
use crate::error::PushdownError;
use crate::expr::Expression;
use crate::formatter::SqlFormatter;
use crate::query::{SelectQueryParts, SplitDescription};
use crate::types::CanonicalType;
use conflux_common::config::PushdownConfig;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgreSqlFormatter {
    config: PushdownConfig,
}

impl PostgreSqlFormatter {
    pub fn new(config: PushdownConfig) -> Self {
        Self { config }
    }

    fn supports_type(&self, ty: &CanonicalType) -> bool {
        match ty {
            CanonicalType::Bool
            | CanonicalType::Int8
            | CanonicalType::Int16
            | CanonicalType::Int32
            | CanonicalType::Int64
            | CanonicalType::Float32
            | CanonicalType::Float64
            | CanonicalType::Utf8
            | CanonicalType::Decimal { .. } => true,
            CanonicalType::Timestamp => self.config.enable_timestamp_pushdown,
            CanonicalType::Optional(inner) => self.supports_type(inner),
            _ => false,
        }
    }

    fn type_name(ty: &CanonicalType) -> Option<String> {
        let name = match ty.strip_optional() {
            CanonicalType::Bool => "boolean".to_string(),
            CanonicalType::Int8 | CanonicalType::Int16 => "smallint".to_string(),
            CanonicalType::Int32 => "integer".to_string(),
            CanonicalType::Int64 => "bigint".to_string(),
            CanonicalType::Float32 => "real".to_string(),
            CanonicalType::Float64 => "double precision".to_string(),
            CanonicalType::Utf8 => "text".to_string(),
            CanonicalType::Json => "jsonb".to_string(),
            CanonicalType::Bytes => "bytea".to_string(),
            CanonicalType::Date => "date".to_string(),
            CanonicalType::Datetime | CanonicalType::Timestamp => "timestamp".to_string(),
            CanonicalType::Decimal { precision, scale } => {
                format!("numeric({}, {})", precision, scale)
            }
            _ => return None,
        };
        Some(name)
    }

    fn render_bounds(
        &self,
        column: &str,
        lower: Option<i64>,
        upper: Option<i64>,
    ) -> Result<String, PushdownError> {
        if column.is_empty() {
            return Err(PushdownError::InvalidRequest(
                "histogram bounds without a column name".to_string(),
            ));
        }
        let column = self.sanitise_identifier(column);
        match (lower, upper) {
            (None, None) => Err(PushdownError::InvalidRequest(
                "histogram bounds need a lower bound, an upper bound or both".to_string(),
            )),
            (None, Some(upper)) => Ok(format!("{} < {}", column, upper)),
            (Some(lower), None) => Ok(format!("{} >= {}", column, lower)),
            (Some(lower), Some(upper)) => Ok(format!(
                "({} >= {} AND {} < {})",
                column, lower, column, upper
            )),
        }
    }
}

impl SqlFormatter for PostgreSqlFormatter {
    fn dialect_name(&self) -> &'static str {
        "postgresql"
    }

    fn supports_expression(&self, expression: &Expression) -> bool {
        match expression {
            Expression::Column(_) | Expression::Null => true,
            Expression::TypedValue(typed) => self.supports_type(&typed.ty),
            Expression::Arithmetic { .. } => false,
            Expression::Coalesce(_) | Expression::Cast { .. } | Expression::If { .. } => true,
        }
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${}", n + 1)
    }

    fn sanitise_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '"')
    }

    fn format_starts_with(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!("starts_with({}, {})", left, right))
    }

    fn format_contains(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!("(strpos({}, {}) > 0)", left, right))
    }

    fn format_regexp(&self, value: &str, pattern: &str) -> Result<String, PushdownError> {
        Ok(format!("({} ~ {})", value, pattern))
    }

    fn format_if(
        &self,
        condition: &str,
        then: &str,
        otherwise: &str,
    ) -> Result<String, PushdownError> {
        Ok(format!(
            "CASE WHEN {} THEN {} ELSE {} END",
            condition, then, otherwise
        ))
    }

    fn format_cast(&self, value: &str, to: &CanonicalType) -> Result<String, PushdownError> {
        Self::type_name(to)
            .map(|name| format!("CAST({} AS {})", value, name))
            .ok_or_else(|| {
                PushdownError::UnimplementedOperation(format!("CAST to {} in postgresql", to))
            })
    }

    fn render_select_query_text(
        &self,
        parts: &SelectQueryParts,
        split: &SplitDescription,
    ) -> Result<String, PushdownError> {
        match split {
            SplitDescription::Single => Ok(parts.render_default()),
            SplitDescription::HistogramBounds {
                column,
                lower,
                upper,
            } => {
                let bounds = self.render_bounds(column, *lower, *upper)?;
                let mut text = format!(
                    "SELECT {} FROM {} WHERE ",
                    parts.select_clause, parts.from_clause
                );
                if let Some(where_clause) = &parts.where_clause {
                    text.push_str(where_clause);
                    text.push_str(" AND ");
                }
                text.push_str(&bounds);
                Ok(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ComparisonOp, Predicate};
    use crate::predicate::compile_predicate;

    fn formatter(enable_timestamp_pushdown: bool) -> PostgreSqlFormatter {
        PostgreSqlFormatter::new(PushdownConfig {
            enable_timestamp_pushdown,
        })
    }

    #[test]
    fn test_placeholders_are_numbered() {
        let f = formatter(false);
        assert_eq!(f.placeholder(0), "$1");
        assert_eq!(f.placeholder(9), "$10");
    }

    #[test]
    fn test_timestamp_support_follows_config() {
        let literal = Expression::typed(CanonicalType::Timestamp, crate::expr::Value::Int64(0));
        assert!(!formatter(false).supports_expression(&literal));
        assert!(formatter(true).supports_expression(&literal));
    }

    #[test]
    fn test_unsigned_literals_unsupported() {
        assert!(!formatter(false).supports_expression(&Expression::uint64(1)));
    }

    #[test]
    fn test_like_hooks() {
        let f = formatter(false);
        let starts = Predicate::compare(
            ComparisonOp::StartsWith,
            Expression::column("name"),
            Expression::text("ab"),
        );
        assert_eq!(
            compile_predicate(&starts, &f).unwrap().text,
            r#"starts_with("name", $1)"#
        );

        let contains = Predicate::compare(
            ComparisonOp::Contains,
            Expression::column("name"),
            Expression::text("ab"),
        );
        assert_eq!(
            compile_predicate(&contains, &f).unwrap().text,
            r#"(strpos("name", $1) > 0)"#
        );

        let ends = Predicate::compare(
            ComparisonOp::EndsWith,
            Expression::column("name"),
            Expression::text("ab"),
        );
        let err = compile_predicate(&ends, &f).unwrap_err();
        assert!(matches!(err.root(), PushdownError::UnimplementedOperation(_)));
    }

    #[test]
    fn test_cast_and_if() {
        let f = formatter(false);
        let predicate = Predicate::equal(
            Expression::cast(Expression::column("a"), CanonicalType::Int64),
            Expression::if_then_else(
                Predicate::IsNull(Expression::column("b")),
                Expression::int64(0),
                Expression::int64(1),
            ),
        );
        assert_eq!(
            compile_predicate(&predicate, &f).unwrap().text,
            r#"(CAST("a" AS bigint) = CASE WHEN ("b" IS NULL) THEN $1 ELSE $2 END)"#
        );
    }
}
