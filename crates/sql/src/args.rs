//! Arguments bound to placeholders of a generated query.

use crate::types::CanonicalType;
use chrono::{NaiveDate, NaiveDateTime};
use conflux_common::scrubber::scrub_argument;
use rust_decimal::Decimal;
use std::fmt;

/// Native value handed to the backend driver. `Null` keeps the declared type
/// on the owning [`QueryArg`] so the driver still learns the parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Null,
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(v) => write!(f, "{}", v),
            ArgValue::Int8(v) => write!(f, "{}", v),
            ArgValue::Int16(v) => write!(f, "{}", v),
            ArgValue::Int32(v) => write!(f, "{}", v),
            ArgValue::Int64(v) => write!(f, "{}", v),
            ArgValue::UInt8(v) => write!(f, "{}", v),
            ArgValue::UInt16(v) => write!(f, "{}", v),
            ArgValue::UInt32(v) => write!(f, "{}", v),
            ArgValue::UInt64(v) => write!(f, "{}", v),
            ArgValue::Float32(v) => write!(f, "{}", v),
            ArgValue::Float64(v) => write!(f, "{}", v),
            ArgValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            ArgValue::Text(v) => write!(f, "'{}'", scrub_argument(v)),
            ArgValue::Decimal(v) => write!(f, "{}", v),
            ArgValue::Date(v) => write!(f, "{}", v),
            ArgValue::Datetime(v) => write!(f, "{}", v),
            ArgValue::Null => write!(f, "NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryArg {
    pub ty: CanonicalType,
    pub value: ArgValue,
}

/// Arguments in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryArgs {
    args: Vec<QueryArg>,
}

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_typed(&mut self, ty: CanonicalType, value: ArgValue) {
        self.args.push(QueryArg { ty, value });
    }

    pub fn count(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Drops every argument bound after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.args.truncate(len);
    }

    pub fn get(&self, index: usize) -> Option<&QueryArg> {
        self.args.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryArg> {
        self.args.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &ArgValue> {
        self.args.iter().map(|a| &a.value)
    }

    pub fn types(&self) -> impl Iterator<Item = &CanonicalType> {
        self.args.iter().map(|a| &a.ty)
    }

    /// Scrubbed rendering for the query log.
    pub fn to_log_string(&self) -> String {
        let rendered: Vec<String> = self
            .args
            .iter()
            .enumerate()
            .map(|(i, a)| format!("#{} {}={}", i, a.ty, a.value))
            .collect();
        format!("[{}]", rendered.join(", "))
    }
}

impl IntoIterator for QueryArgs {
    type Item = QueryArg;
    type IntoIter = std::vec::IntoIter<QueryArg>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.into_iter()
    }
}
