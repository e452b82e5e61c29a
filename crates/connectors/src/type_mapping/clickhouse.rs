use super::{make_decimal, split_parameters, DateTimeFormat, NativeType, TypeMapper, TypeMappingSettings};
use crate::error::ConversionError;
use conflux_sql::types::CanonicalType;
use once_cell::sync::Lazy;
use regex::Regex;

static NULLABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Nullable\((.+)\)$").expect("invalid nullable regex"));
static FIXED_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FixedString\(\d+\)$").expect("invalid fixed string regex"));
static DATE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^DateTime(\('[\w,/]+'\))?$").expect("invalid datetime regex"));
static DATE_TIME_64: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^DateTime64\(\d(, ?'[\w,/]+')?\)$").expect("invalid datetime64 regex")
});

/// ClickHouse column types. Only `Nullable(T)` columns are optional, except
/// that canonical date/time columns always are: values outside the canonical
/// range are read as NULL.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseTypeMapper;

impl TypeMapper for ClickHouseTypeMapper {
    fn to_canonical(
        &self,
        native: &NativeType,
        settings: &TypeMappingSettings,
    ) -> Result<CanonicalType, ConversionError> {
        let unsupported = || ConversionError::UnsupportedType {
            native: native.name.clone(),
        };

        let mut type_name = native.name.trim();
        let mut nullable = false;
        if let Some(captures) = NULLABLE.captures(type_name) {
            nullable = true;
            type_name = captures.get(1).map(|m| m.as_str()).ok_or_else(unsupported)?;
        }

        let temporal_nullable = settings.date_time_format == DateTimeFormat::Canonical;
        let ty = match type_name {
            "Bool" => CanonicalType::Bool,
            "Int8" => CanonicalType::Int8,
            "Int16" => CanonicalType::Int16,
            "Int32" => CanonicalType::Int32,
            "Int64" => CanonicalType::Int64,
            "UInt8" => CanonicalType::UInt8,
            "UInt16" => CanonicalType::UInt16,
            "UInt32" => CanonicalType::UInt32,
            "UInt64" => CanonicalType::UInt64,
            "Float32" => CanonicalType::Float32,
            "Float64" => CanonicalType::Float64,
            "String" => CanonicalType::Bytes,
            t if FIXED_STRING.is_match(t) => CanonicalType::Bytes,
            "Date" | "Date32" => {
                nullable |= temporal_nullable;
                settings.temporal(CanonicalType::Date)
            }
            t if DATE_TIME_64.is_match(t) => {
                nullable |= temporal_nullable;
                settings.temporal(CanonicalType::Timestamp)
            }
            t if DATE_TIME.is_match(t) => {
                nullable |= temporal_nullable;
                settings.temporal(CanonicalType::Datetime)
            }
            t if t.starts_with("Decimal") => {
                let (_, params) = split_parameters(t);
                let parse = |s: &str| s.parse::<u32>().ok();
                match params.as_slice() {
                    [p, s] => make_decimal(native, parse(p), parse(s))?,
                    _ => {
                        return Err(ConversionError::DecimalParamsMissing {
                            native: native.name.clone(),
                        })
                    }
                }
            }
            _ => return Err(unsupported()),
        };

        Ok(if nullable {
            CanonicalType::optional(ty)
        } else {
            ty
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(name: &str) -> Result<CanonicalType, ConversionError> {
        ClickHouseTypeMapper.to_canonical(&NativeType::new(name), &TypeMappingSettings::default())
    }

    #[test]
    fn test_nullable_wrapper() {
        assert_eq!(map("Int32").unwrap(), CanonicalType::Int32);
        assert_eq!(
            map("Nullable(UInt64)").unwrap(),
            CanonicalType::optional(CanonicalType::UInt64)
        );
    }

    #[test]
    fn test_strings_are_bytes() {
        assert_eq!(map("String").unwrap(), CanonicalType::Bytes);
        assert_eq!(map("FixedString(16)").unwrap(), CanonicalType::Bytes);
    }

    #[test]
    fn test_temporal_types_are_optional() {
        assert_eq!(
            map("DateTime64(6, 'UTC')").unwrap(),
            CanonicalType::optional(CanonicalType::Timestamp)
        );
        assert_eq!(
            map("DateTime").unwrap(),
            CanonicalType::optional(CanonicalType::Datetime)
        );
        assert_eq!(
            map("Date32").unwrap(),
            CanonicalType::optional(CanonicalType::Date)
        );
    }

    #[test]
    fn test_decimal_params_parsed_from_name() {
        assert_eq!(
            map("Nullable(Decimal(18, 4))").unwrap(),
            CanonicalType::optional(CanonicalType::Decimal {
                precision: 18,
                scale: 4
            })
        );
        assert!(map("Decimal").is_err());
    }

    #[test]
    fn test_arrays_unsupported() {
        assert!(map("Array(Int32)").is_err());
    }
}
