//! Type bridge: native column descriptors to canonical types.
//!
//! Each backend owns one immutable lookup table implementing [`TypeMapper`].
//! Schema resolution goes through [`SchemaBuilder`], which drops columns the
//! bridge cannot represent instead of failing the whole table.

use crate::error::ConversionError;
use conflux_error::{ConfluxError, ErrorCode, ErrorContext};
use conflux_sql::types::{CanonicalType, Column};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub mod clickhouse;
pub mod mongodb;
pub mod mysql;
pub mod postgres;

pub use clickhouse::ClickHouseTypeMapper;
pub use mongodb::MongoDbTypeMapper;
pub use mysql::MySqlTypeMapper;
pub use postgres::PostgreSqlTypeMapper;

/// Native column descriptor as reported by the backend catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeType {
    pub name: String,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl NativeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precision: None,
            scale: None,
        }
    }

    pub fn with_precision_scale(mut self, precision: Option<u32>, scale: Option<u32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// How date and time columns are exposed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateTimeFormat {
    /// Canonical `Date`, `Datetime` and `Timestamp` types.
    #[default]
    Canonical,
    /// ISO-8601 strings.
    String,
}

/// Per-request knobs for the type bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeMappingSettings {
    #[serde(default)]
    pub date_time_format: DateTimeFormat,
}

impl TypeMappingSettings {
    /// Applies the date/time format to a canonical temporal type.
    pub fn temporal(&self, ty: CanonicalType) -> CanonicalType {
        match self.date_time_format {
            DateTimeFormat::Canonical => ty,
            DateTimeFormat::String => CanonicalType::Utf8,
        }
    }
}

pub trait TypeMapper: Send + Sync {
    fn to_canonical(
        &self,
        native: &NativeType,
        settings: &TypeMappingSettings,
    ) -> Result<CanonicalType, ConversionError>;
}

/// Builds a canonical decimal, rejecting parameters the canonical type cannot hold.
pub(crate) fn make_decimal(
    native: &NativeType,
    precision: Option<u32>,
    scale: Option<u32>,
) -> Result<CanonicalType, ConversionError> {
    let (Some(precision), Some(scale)) = (precision, scale) else {
        return Err(ConversionError::DecimalParamsMissing {
            native: native.name.clone(),
        });
    };
    let invalid = |reason: String| ConversionError::InvalidDecimalParams {
        native: native.name.clone(),
        reason,
    };
    if precision == 0 || precision > 38 {
        return Err(invalid(format!("precision {} is outside 1..=38", precision)));
    }
    if scale > precision {
        return Err(invalid(format!(
            "scale {} exceeds precision {}",
            scale, precision
        )));
    }
    Ok(CanonicalType::Decimal {
        precision: precision as u8,
        scale: scale as i8,
    })
}

/// Splits `Name(arg1, arg2)` into the name and its trimmed arguments.
pub(crate) fn split_parameters(type_name: &str) -> (&str, Vec<&str>) {
    match (type_name.find('('), type_name.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let args = type_name[open + 1..close]
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            (type_name[..open].trim(), args)
        }
        _ => (type_name.trim(), Vec::new()),
    }
}

/// Collects the columns of one table, dropping those the bridge cannot map.
pub struct SchemaBuilder<'a> {
    table: String,
    mapper: &'a dyn TypeMapper,
    settings: TypeMappingSettings,
    columns: Vec<(Column, usize)>,
    unsupported: Vec<(String, String)>,
    seen: usize,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(
        table: impl Into<String>,
        mapper: &'a dyn TypeMapper,
        settings: TypeMappingSettings,
    ) -> Self {
        Self {
            table: table.into(),
            mapper,
            settings,
            columns: Vec::new(),
            unsupported: Vec::new(),
            seen: 0,
        }
    }

    pub fn add_column(&mut self, name: impl Into<String>, native: &NativeType) {
        let name = name.into();
        let ordinal = self.seen;
        self.seen += 1;

        match self.mapper.to_canonical(native, &self.settings) {
            Ok(ty) => self.columns.push((Column::new(name, ty), ordinal)),
            Err(e) => {
                tracing::debug!(column = %name, native_type = %native, error = %e, "Column type is not supported");
                self.unsupported.push((name, native.name.clone()));
            }
        }
    }

    /// Names of the columns that were dropped, with their native type.
    pub fn unsupported(&self) -> &[(String, String)] {
        &self.unsupported
    }

    /// Surviving columns in catalog order, each with its original ordinal.
    pub fn build(self) -> Result<Vec<(Column, usize)>, ConfluxError> {
        if self.seen == 0 {
            return Err(ConfluxError::new(
                ErrorCode::TableNotFound,
                format!("table '{}' does not exist or has no columns", self.table),
            )
            .with_context(ErrorContext::Schema {
                table: self.table,
                column: None,
                native_type: None,
            }));
        }

        if !self.unsupported.is_empty() {
            let dropped: Vec<String> = self
                .unsupported
                .iter()
                .map(|(name, ty)| format!("{} {}", name, ty))
                .collect();
            warn!(
                table = %self.table,
                dropped = %dropped.join(", "),
                "Some columns were dropped from the schema because their types are not supported"
            );
        }

        Ok(self.columns)
    }

    /// Surviving columns only.
    pub fn build_columns(self) -> Result<Vec<Column>, ConfluxError> {
        Ok(self.build()?.into_iter().map(|(c, _)| c).collect())
    }
}
