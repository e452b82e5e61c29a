//! Canonical, backend-agnostic type system and its Arrow projection.

use arrow::datatypes::{DataType, Field, Fields, Schema, TimeUnit};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field metadata key carrying the semantic marker of a tagged column.
pub const TAG_METADATA_KEY: &str = "conflux.tag";

/// Tag used for document-store object identifiers.
pub const OBJECT_ID_TAG: &str = "ObjectId";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bytes,
    Utf8,
    Json,
    /// Days since the Unix epoch.
    Date,
    /// Second precision.
    Datetime,
    /// Microsecond precision.
    Timestamp,
    Decimal {
        precision: u8,
        scale: i8,
    },
    Tagged {
        tag: String,
        inner: Box<CanonicalType>,
    },
    Optional(Box<CanonicalType>),
    Struct(Vec<Column>),
    List(Box<CanonicalType>),
}

impl CanonicalType {
    /// Wraps `inner` in `Optional` unless it already is one.
    pub fn optional(inner: CanonicalType) -> Self {
        match inner {
            CanonicalType::Optional(_) => inner,
            other => CanonicalType::Optional(Box::new(other)),
        }
    }

    pub fn tagged(tag: impl Into<String>, inner: CanonicalType) -> Self {
        CanonicalType::Tagged {
            tag: tag.into(),
            inner: Box::new(inner),
        }
    }

    pub fn list(item: CanonicalType) -> Self {
        CanonicalType::List(Box::new(item))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, CanonicalType::Optional(_))
    }

    /// The type under an `Optional` wrapper, or `self`.
    pub fn strip_optional(&self) -> &CanonicalType {
        match self {
            CanonicalType::Optional(inner) => inner,
            other => other,
        }
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            CanonicalType::Bool => DataType::Boolean,
            CanonicalType::Int8 => DataType::Int8,
            CanonicalType::Int16 => DataType::Int16,
            CanonicalType::Int32 => DataType::Int32,
            CanonicalType::Int64 => DataType::Int64,
            CanonicalType::UInt8 => DataType::UInt8,
            CanonicalType::UInt16 => DataType::UInt16,
            CanonicalType::UInt32 => DataType::UInt32,
            CanonicalType::UInt64 => DataType::UInt64,
            CanonicalType::Float32 => DataType::Float32,
            CanonicalType::Float64 => DataType::Float64,
            CanonicalType::Bytes => DataType::Binary,
            CanonicalType::Utf8 | CanonicalType::Json => DataType::Utf8,
            CanonicalType::Date => DataType::Date32,
            CanonicalType::Datetime => DataType::Timestamp(TimeUnit::Second, None),
            CanonicalType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            CanonicalType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
            CanonicalType::Tagged { inner, .. } => inner.to_arrow(),
            CanonicalType::Optional(inner) => inner.to_arrow(),
            CanonicalType::Struct(members) => {
                DataType::Struct(members.iter().map(Column::to_field).collect::<Fields>())
            }
            CanonicalType::List(item) => {
                DataType::List(Arc::new(item.to_field("item")))
            }
        }
    }

    /// Arrow field for a value of this type; nullability follows `Optional`.
    pub fn to_field(&self, name: &str) -> Field {
        let field = Field::new(name, self.to_arrow(), self.is_optional());
        match self.strip_optional() {
            CanonicalType::Tagged { tag, .. } => field.with_metadata(HashMap::from([(
                TAG_METADATA_KEY.to_string(),
                tag.clone(),
            )])),
            _ => field,
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Decimal { precision, scale } => {
                write!(f, "Decimal({}, {})", precision, scale)
            }
            CanonicalType::Tagged { tag, inner } => write!(f, "Tagged<{}, {}>", tag, inner),
            CanonicalType::Optional(inner) => write!(f, "Optional<{}>", inner),
            CanonicalType::List(item) => write!(f, "List<{}>", item),
            CanonicalType::Struct(members) => {
                write!(f, "Struct<")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", m.name, m.ty)?;
                }
                write!(f, ">")
            }
            other => write!(f, "{:?}", other),
        }
    }
}

/// A named, typed column. Position in the owning slice is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: CanonicalType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: CanonicalType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn to_field(&self) -> Field {
        self.ty.to_field(&self.name)
    }
}

pub fn to_arrow_schema(columns: &[Column]) -> Schema {
    Schema::new(columns.iter().map(Column::to_field).collect::<Fields>())
}

/// First representable calendar date.
pub fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// First calendar date past the representable range.
pub fn max_date_exclusive() -> NaiveDate {
    NaiveDate::from_ymd_opt(2106, 1, 1).unwrap_or(NaiveDate::MAX)
}

pub fn date_in_bounds(date: NaiveDate) -> bool {
    date >= min_date() && date < max_date_exclusive()
}

pub fn datetime_in_bounds(value: NaiveDateTime) -> bool {
    date_in_bounds(value.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_never_nests() {
        let once = CanonicalType::optional(CanonicalType::Int32);
        let twice = CanonicalType::optional(once.clone());
        assert_eq!(once, twice);
        assert_eq!(twice.strip_optional(), &CanonicalType::Int32);
    }

    #[test]
    fn test_arrow_mapping() {
        assert_eq!(CanonicalType::Json.to_arrow(), DataType::Utf8);
        assert_eq!(
            CanonicalType::Datetime.to_arrow(),
            DataType::Timestamp(TimeUnit::Second, None)
        );
        assert_eq!(
            CanonicalType::Decimal {
                precision: 10,
                scale: 2
            }
            .to_arrow(),
            DataType::Decimal128(10, 2)
        );
    }

    #[test]
    fn test_field_nullability_and_tag() {
        let ty = CanonicalType::optional(CanonicalType::tagged(OBJECT_ID_TAG, CanonicalType::Utf8));
        let field = ty.to_field("_id");
        assert!(field.is_nullable());
        assert_eq!(field.data_type(), &DataType::Utf8);
        assert_eq!(
            field.metadata().get(TAG_METADATA_KEY).map(String::as_str),
            Some(OBJECT_ID_TAG)
        );

        let field = CanonicalType::Int64.to_field("id");
        assert!(!field.is_nullable());
        assert!(field.metadata().is_empty());
    }

    #[test]
    fn test_list_and_struct() {
        let list = CanonicalType::list(CanonicalType::optional(CanonicalType::Int32));
        match list.to_arrow() {
            DataType::List(item) => {
                assert_eq!(item.data_type(), &DataType::Int32);
                assert!(item.is_nullable());
            }
            other => panic!("unexpected {:?}", other),
        }

        let st = CanonicalType::Struct(vec![
            Column::new("a", CanonicalType::Bool),
            Column::new("b", CanonicalType::optional(CanonicalType::Utf8)),
        ]);
        match st.to_arrow() {
            DataType::Struct(fields) => assert_eq!(fields.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_date_bounds() {
        assert!(date_in_bounds(min_date()));
        assert!(!date_in_bounds(max_date_exclusive()));
        assert!(!date_in_bounds(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()));
    }
}
