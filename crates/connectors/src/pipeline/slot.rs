use crate::error::ConversionError;
use chrono::{NaiveDate, NaiveDateTime};
use conflux_sql::types::{CanonicalType, Column, OBJECT_ID_TAG};
use rust_decimal::Decimal;

/// A reusable single-value cell a native driver writes one column value into.
///
/// Every signed integer width shares [`Slot::Int`], every unsigned width
/// shares [`Slot::UInt`]. Narrowing happens in the appender.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Bool(Option<bool>),
    Int(Option<i64>),
    UInt(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Bytes(Option<Vec<u8>>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Datetime(Option<NaiveDateTime>),
    Decimal(Option<Decimal>),
}

impl Slot {
    pub fn is_null(&self) -> bool {
        match self {
            Slot::Bool(v) => v.is_none(),
            Slot::Int(v) => v.is_none(),
            Slot::UInt(v) => v.is_none(),
            Slot::Float32(v) => v.is_none(),
            Slot::Float64(v) => v.is_none(),
            Slot::Bytes(v) => v.is_none(),
            Slot::Text(v) => v.is_none(),
            Slot::Date(v) => v.is_none(),
            Slot::Datetime(v) => v.is_none(),
            Slot::Decimal(v) => v.is_none(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Slot::Bool(_) => "bool",
            Slot::Int(_) => "int",
            Slot::UInt(_) => "uint",
            Slot::Float32(_) => "float32",
            Slot::Float64(_) => "float64",
            Slot::Bytes(_) => "bytes",
            Slot::Text(_) => "text",
            Slot::Date(_) => "date",
            Slot::Datetime(_) => "datetime",
            Slot::Decimal(_) => "decimal",
        }
    }

    /// Content length of a variable-size cell, `None` for fixed-size kinds.
    pub fn variable_len(&self) -> Option<usize> {
        match self {
            Slot::Bytes(v) => Some(v.as_ref().map_or(0, Vec::len)),
            Slot::Text(v) => Some(v.as_ref().map_or(0, String::len)),
            _ => None,
        }
    }

    /// Estimated size of a fixed-size cell, `None` for variable-size kinds.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Slot::Bool(_) => Some(1),
            Slot::Int(_) | Slot::UInt(_) | Slot::Float64(_) | Slot::Datetime(_) => Some(8),
            Slot::Float32(_) | Slot::Date(_) => Some(4),
            Slot::Decimal(_) => Some(16),
            Slot::Bytes(_) | Slot::Text(_) => None,
        }
    }
}

/// Slot selection by canonical type.
pub struct Acceptors;

impl Acceptors {
    pub fn for_type(ty: &CanonicalType) -> Result<Slot, ConversionError> {
        Ok(match ty.strip_optional() {
            CanonicalType::Bool => Slot::Bool(None),
            CanonicalType::Int8
            | CanonicalType::Int16
            | CanonicalType::Int32
            | CanonicalType::Int64 => Slot::Int(None),
            CanonicalType::UInt8
            | CanonicalType::UInt16
            | CanonicalType::UInt32
            | CanonicalType::UInt64 => Slot::UInt(None),
            CanonicalType::Float32 => Slot::Float32(None),
            CanonicalType::Float64 => Slot::Float64(None),
            CanonicalType::Bytes => Slot::Bytes(None),
            CanonicalType::Utf8 | CanonicalType::Json => Slot::Text(None),
            CanonicalType::Date => Slot::Date(None),
            CanonicalType::Datetime | CanonicalType::Timestamp => Slot::Datetime(None),
            CanonicalType::Decimal { .. } => Slot::Decimal(None),
            CanonicalType::Tagged { tag, .. } if tag == OBJECT_ID_TAG => Slot::Bytes(None),
            CanonicalType::Tagged { tag, .. } => {
                return Err(ConversionError::UnknownTag(tag.clone()))
            }
            other => return Err(ConversionError::NoAcceptor(other.to_string())),
        })
    }

    /// One slot per column, in column order.
    pub fn for_columns(columns: &[Column]) -> Result<Vec<Slot>, ConversionError> {
        columns.iter().map(|c| Self::for_type(&c.ty)).collect()
    }
}
