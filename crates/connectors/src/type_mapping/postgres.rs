use super::{make_decimal, NativeType, TypeMapper, TypeMappingSettings};
use crate::error::ConversionError;
use conflux_sql::types::CanonicalType;

/// PostgreSQL catalog types. Columns are always optional since
/// `information_schema` type names carry no nullability.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgreSqlTypeMapper;

impl TypeMapper for PostgreSqlTypeMapper {
    fn to_canonical(
        &self,
        native: &NativeType,
        settings: &TypeMappingSettings,
    ) -> Result<CanonicalType, ConversionError> {
        let ty = match native.name.as_str() {
            "boolean" | "bool" => CanonicalType::Bool,
            "smallint" | "int2" | "smallserial" | "serial2" => CanonicalType::Int16,
            "integer" | "int" | "int4" | "serial" | "serial4" => CanonicalType::Int32,
            "bigint" | "int8" | "bigserial" | "serial8" => CanonicalType::Int64,
            "real" | "float4" => CanonicalType::Float32,
            "double precision" | "float8" => CanonicalType::Float64,
            "bytea" => CanonicalType::Bytes,
            "character" | "character varying" | "text" => CanonicalType::Utf8,
            "json" | "jsonb" => CanonicalType::Json,
            "date" => settings.temporal(CanonicalType::Date),
            "timestamp without time zone" => settings.temporal(CanonicalType::Timestamp),
            // Parameters are never parsed out of the name: information_schema
            // reports them in numeric_precision / numeric_scale.
            "numeric" | "decimal" => make_decimal(native, native.precision, native.scale)?,
            _ => {
                return Err(ConversionError::UnsupportedType {
                    native: native.name.clone(),
                })
            }
        };
        Ok(CanonicalType::optional(ty))
    }
}
