use super::{make_decimal, split_parameters, NativeType, TypeMapper, TypeMappingSettings};
use crate::error::ConversionError;
use conflux_sql::types::CanonicalType;

/// MySQL column types as reported by `information_schema.columns.column_type`,
/// e.g. `int(11) unsigned` or `decimal(10,2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTypeMapper;

impl TypeMapper for MySqlTypeMapper {
    fn to_canonical(
        &self,
        native: &NativeType,
        settings: &TypeMappingSettings,
    ) -> Result<CanonicalType, ConversionError> {
        let lowered = native.name.to_ascii_lowercase();
        let unsigned = lowered.split_whitespace().any(|w| w == "unsigned");
        let base = lowered.split_whitespace().next().unwrap_or_default();
        let (name, params) = split_parameters(base);

        let ty = match (name, unsigned) {
            ("tinyint", _) if params.first() == Some(&"1") => CanonicalType::Bool,
            ("bool" | "boolean", _) => CanonicalType::Bool,
            ("tinyint", false) => CanonicalType::Int8,
            ("tinyint", true) => CanonicalType::UInt8,
            ("smallint", false) => CanonicalType::Int16,
            ("smallint", true) => CanonicalType::UInt16,
            ("mediumint" | "int" | "integer", false) => CanonicalType::Int32,
            ("mediumint" | "int" | "integer", true) => CanonicalType::UInt32,
            ("bigint", false) => CanonicalType::Int64,
            ("bigint", true) => CanonicalType::UInt64,
            ("float", _) => CanonicalType::Float32,
            ("double", _) => CanonicalType::Float64,
            ("decimal", _) => {
                let parse = |i: usize| params.get(i).and_then(|p| p.parse::<u32>().ok());
                let precision = parse(0).or(native.precision);
                let scale = parse(1).or(native.scale);
                make_decimal(native, precision, scale)?
            }
            ("char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext", _) => {
                CanonicalType::Utf8
            }
            ("binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob", _) => {
                CanonicalType::Bytes
            }
            ("json", _) => CanonicalType::Json,
            ("date", _) => settings.temporal(CanonicalType::Date),
            ("datetime" | "timestamp", _) => settings.temporal(CanonicalType::Timestamp),
            _ => {
                return Err(ConversionError::UnsupportedType {
                    native: native.name.clone(),
                })
            }
        };
        Ok(CanonicalType::optional(ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(name: &str) -> Result<CanonicalType, ConversionError> {
        MySqlTypeMapper.to_canonical(&NativeType::new(name), &TypeMappingSettings::default())
    }

    #[test]
    fn test_unsigned_integers() {
        assert_eq!(
            map("int(10) unsigned").unwrap(),
            CanonicalType::optional(CanonicalType::UInt32)
        );
        assert_eq!(
            map("bigint").unwrap(),
            CanonicalType::optional(CanonicalType::Int64)
        );
    }

    #[test]
    fn test_tinyint_one_is_bool() {
        assert_eq!(
            map("tinyint(1)").unwrap(),
            CanonicalType::optional(CanonicalType::Bool)
        );
    }

    #[test]
    fn test_decimal() {
        assert_eq!(
            map("decimal(12,3)").unwrap(),
            CanonicalType::optional(CanonicalType::Decimal {
                precision: 12,
                scale: 3
            })
        );
    }

    #[test]
    fn test_unsupported() {
        assert!(map("geometry").is_err());
    }
}
