use super::quote_identifier;
use crate::error::PushdownError;
use crate::expr::Expression;
use crate::formatter::SqlFormatter;
use crate::types::CanonicalType;
use conflux_common::config::PushdownConfig;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseSqlFormatter {
    config: PushdownConfig,
}

impl ClickHouseSqlFormatter {
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
            | CanonicalType::UInt8
            | CanonicalType::UInt16
            | CanonicalType::UInt32
            | CanonicalType::UInt64
            | CanonicalType::Float32
            | CanonicalType::Float64
            | CanonicalType::Utf8 => true,
            CanonicalType::Timestamp => self.config.enable_timestamp_pushdown,
            CanonicalType::Optional(inner) => self.supports_type(inner),
            _ => false,
        }
    }

    fn type_name(ty: &CanonicalType) -> Option<String> {
        let name = match ty {
            CanonicalType::Bool => "Bool".to_string(),
            CanonicalType::Int8 => "Int8".to_string(),
            CanonicalType::Int16 => "Int16".to_string(),
            CanonicalType::Int32 => "Int32".to_string(),
            CanonicalType::Int64 => "Int64".to_string(),
            CanonicalType::UInt8 => "UInt8".to_string(),
            CanonicalType::UInt16 => "UInt16".to_string(),
            CanonicalType::UInt32 => "UInt32".to_string(),
            CanonicalType::UInt64 => "UInt64".to_string(),
            CanonicalType::Float32 => "Float32".to_string(),
            CanonicalType::Float64 => "Float64".to_string(),
            CanonicalType::Utf8 | CanonicalType::Bytes | CanonicalType::Json => {
                "String".to_string()
            }
            CanonicalType::Date => "Date32".to_string(),
            CanonicalType::Datetime => "DateTime".to_string(),
            CanonicalType::Timestamp => "DateTime64(6)".to_string(),
            CanonicalType::Decimal { precision, scale } => {
                format!("Decimal({}, {})", precision, scale)
            }
            CanonicalType::Optional(inner) => format!("Nullable({})", Self::type_name(inner)?),
            _ => return None,
        };
        Some(name)
    }
}

impl SqlFormatter for ClickHouseSqlFormatter {
    fn dialect_name(&self) -> &'static str {
        "clickhouse"
    }

    fn supports_expression(&self, expression: &Expression) -> bool {
        match expression {
            Expression::Column(_) | Expression::Null => true,
            Expression::TypedValue(typed) => self.supports_type(&typed.ty),
            Expression::Arithmetic { .. } => false,
            Expression::Coalesce(_) | Expression::Cast { .. } | Expression::If { .. } => true,
        }
    }

    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn sanitise_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '"')
    }

    fn format_starts_with(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!("startsWith({}, {})", left, right))
    }

    fn format_ends_with(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!("endsWith({}, {})", left, right))
    }

    fn format_contains(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!("(position({}, {}) > 0)", left, right))
    }

    fn format_regexp(&self, value: &str, pattern: &str) -> Result<String, PushdownError> {
        Ok(format!("match({}, {})", value, pattern))
    }

    fn format_if(
        &self,
        condition: &str,
        then: &str,
        otherwise: &str,
    ) -> Result<String, PushdownError> {
        Ok(format!("if({}, {}, {})", condition, then, otherwise))
    }

    fn format_cast(&self, value: &str, to: &CanonicalType) -> Result<String, PushdownError> {
        Self::type_name(to)
            .map(|name| format!("CAST({} AS {})", value, name))
            .ok_or_else(|| {
                PushdownError::UnimplementedOperation(format!("CAST to {} in clickhouse", to))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ComparisonOp, Predicate, Value};
    use crate::predicate::compile_predicate;

    #[test]
    fn test_question_mark_placeholders() {
        let f = ClickHouseSqlFormatter::default();
        let predicate = Predicate::and(vec![
            Predicate::equal(
                Expression::column("a"),
                Expression::typed(CanonicalType::UInt8, Value::UInt32(7)),
            ),
            Predicate::compare(
                ComparisonOp::EndsWith,
                Expression::column("b"),
                Expression::text(".log"),
            ),
        ]);
        let compiled = compile_predicate(&predicate, &f).unwrap();
        assert_eq!(compiled.text, r#"(("a" = ?) AND endsWith("b", ?))"#);
        assert_eq!(compiled.args.count(), 2);
    }

    #[test]
    fn test_nullable_cast() {
        let f = ClickHouseSqlFormatter::default();
        assert_eq!(
            f.format_cast("x", &CanonicalType::optional(CanonicalType::Int32))
                .unwrap(),
            "CAST(x AS Nullable(Int32))"
        );
    }
}
