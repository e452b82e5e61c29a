use super::{NativeType, TypeMapper, TypeMappingSettings};
use crate::error::ConversionError;
use conflux_sql::types::{CanonicalType, OBJECT_ID_TAG};

/// BSON type aliases as reported by `$type`. Documents are schemaless, so
/// every field is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDbTypeMapper;

impl TypeMapper for MongoDbTypeMapper {
    fn to_canonical(
        &self,
        native: &NativeType,
        settings: &TypeMappingSettings,
    ) -> Result<CanonicalType, ConversionError> {
        let ty = match native.name.as_str() {
            "bool" => CanonicalType::Bool,
            "int" => CanonicalType::Int32,
            "long" => CanonicalType::Int64,
            "double" => CanonicalType::Float64,
            "string" => CanonicalType::Utf8,
            "binData" => CanonicalType::Bytes,
            "date" => settings.temporal(CanonicalType::Timestamp),
            "objectId" => CanonicalType::tagged(OBJECT_ID_TAG, CanonicalType::Utf8),
            _ => {
                return Err(ConversionError::UnsupportedType {
                    native: native.name.clone(),
                })
            }
        };
        Ok(CanonicalType::optional(ty))
    }
}
