use super::quote_identifier;
use crate::error::PushdownError;
use crate::expr::Expression;
use crate::formatter::SqlFormatter;
use crate::types::CanonicalType;

/// MySQL dialect. LIKE patterns are built server-side so wildcard characters
/// inside the bound argument are escaped before matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlFormatter;

impl MySqlFormatter {
    pub fn new() -> Self {
        Self
    }

    fn supports_type(ty: &CanonicalType) -> bool {
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
            CanonicalType::Optional(inner) => Self::supports_type(inner),
            _ => false,
        }
    }

    fn escape_like(value: &str) -> String {
        format!(
            r"REPLACE(REPLACE(REPLACE({}, '\\', '\\\\'), '%', '\\%'), '_', '\\_')",
            value
        )
    }
}

impl SqlFormatter for MySqlFormatter {
    fn dialect_name(&self) -> &'static str {
        "mysql"
    }

    fn supports_expression(&self, expression: &Expression) -> bool {
        match expression {
            Expression::Column(_) | Expression::Null => true,
            Expression::TypedValue(typed) => Self::supports_type(&typed.ty),
            Expression::Coalesce(_) | Expression::If { .. } | Expression::Cast { .. } => true,
            Expression::Arithmetic { .. } => false,
        }
    }

    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn sanitise_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '`')
    }

    fn format_starts_with(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!(
            "({} LIKE CONCAT({}, '%'))",
            left,
            Self::escape_like(right)
        ))
    }

    fn format_ends_with(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!(
            "({} LIKE CONCAT('%', {}))",
            left,
            Self::escape_like(right)
        ))
    }

    fn format_contains(&self, left: &str, right: &str) -> Result<String, PushdownError> {
        Ok(format!(
            "({} LIKE CONCAT('%', {}, '%'))",
            left,
            Self::escape_like(right)
        ))
    }

    fn format_regexp(&self, value: &str, pattern: &str) -> Result<String, PushdownError> {
        Ok(format!("({} REGEXP {})", value, pattern))
    }

    fn format_if(
        &self,
        condition: &str,
        then: &str,
        otherwise: &str,
    ) -> Result<String, PushdownError> {
        Ok(format!("IF({}, {}, {})", condition, then, otherwise))
    }

    fn format_cast(&self, value: &str, to: &CanonicalType) -> Result<String, PushdownError> {
        let target = match to.strip_optional() {
            CanonicalType::Int8
            | CanonicalType::Int16
            | CanonicalType::Int32
            | CanonicalType::Int64 => "SIGNED".to_string(),
            CanonicalType::UInt8
            | CanonicalType::UInt16
            | CanonicalType::UInt32
            | CanonicalType::UInt64 => "UNSIGNED".to_string(),
            CanonicalType::Utf8 => "CHAR".to_string(),
            CanonicalType::Bytes => "BINARY".to_string(),
            CanonicalType::Date => "DATE".to_string(),
            CanonicalType::Datetime | CanonicalType::Timestamp => "DATETIME".to_string(),
            CanonicalType::Decimal { precision, scale } => {
                format!("DECIMAL({}, {})", precision, scale)
            }
            other => {
                return Err(PushdownError::UnimplementedOperation(format!(
                    "CAST to {} in mysql",
                    other
                )))
            }
        };
        Ok(format!("CAST({} AS {})", value, target))
    }
}
