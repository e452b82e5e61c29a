use super::object_id;
use super::slot::Slot;
use crate::error::ConversionError;
use arrow::array::{
    ArrayBuilder, BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder,
    Float32Builder, Float64Builder, Int16Builder, Int32Builder, Int64Builder, Int8Builder,
    StringBuilder, TimestampMicrosecondBuilder, TimestampSecondBuilder, UInt16Builder,
    UInt32Builder, UInt64Builder, UInt8Builder,
};
use conflux_sql::decimal::to_unscaled_i128;
use conflux_sql::types::{date_in_bounds, datetime_in_bounds, min_date, CanonicalType, Column, OBJECT_ID_TAG};

/// What an appender did with the current slot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Null,
    /// The value was present but the canonical type cannot hold it; a null was appended.
    OutOfBounds,
}

pub type Appender =
    Box<dyn Fn(&Slot, &mut dyn ArrayBuilder) -> Result<AppendOutcome, ConversionError> + Send + Sync>;

fn downcast<'b, B: ArrayBuilder>(
    builder: &'b mut dyn ArrayBuilder,
    expected: &'static str,
) -> Result<&'b mut B, ConversionError> {
    builder
        .as_any_mut()
        .downcast_mut::<B>()
        .ok_or(ConversionError::BuilderMismatch(expected))
}

fn mismatch(expected: &'static str, slot: &Slot) -> ConversionError {
    ConversionError::SlotMismatch {
        expected,
        actual: slot.kind_name(),
    }
}

/// Appender for a slot kind that maps onto the builder without conversion.
macro_rules! direct {
    ($variant:ident, $builder:ty, $expected:literal) => {
        Box::new(|slot: &Slot, builder: &mut dyn ArrayBuilder| {
            let Slot::$variant(value) = slot else {
                return Err(mismatch($expected, slot));
            };
            let builder = downcast::<$builder>(builder, $expected)?;
            Ok(match value {
                Some(v) => {
                    builder.append_value(v.clone());
                    AppendOutcome::Appended
                }
                None => {
                    builder.append_null();
                    AppendOutcome::Null
                }
            })
        })
    };
}

/// Appender narrowing a 64-bit integer slot into a smaller builder.
macro_rules! narrowing {
    ($variant:ident, $builder:ty, $native:ty, $expected:literal) => {
        Box::new(|slot: &Slot, builder: &mut dyn ArrayBuilder| {
            let Slot::$variant(value) = slot else {
                return Err(mismatch($expected, slot));
            };
            let builder = downcast::<$builder>(builder, $expected)?;
            Ok(match value.map(<$native>::try_from) {
                Some(Ok(v)) => {
                    builder.append_value(v);
                    AppendOutcome::Appended
                }
                Some(Err(_)) => {
                    builder.append_null();
                    AppendOutcome::OutOfBounds
                }
                None => {
                    builder.append_null();
                    AppendOutcome::Null
                }
            })
        })
    };
}

fn date_appender() -> Appender {
    Box::new(|slot: &Slot, builder: &mut dyn ArrayBuilder| {
        let Slot::Date(value) = slot else {
            return Err(mismatch("date", slot));
        };
        let builder = downcast::<Date32Builder>(builder, "date")?;
        Ok(match value {
            Some(date) if date_in_bounds(*date) => {
                let days = date.signed_duration_since(min_date()).num_days();
                builder.append_value(days as i32);
                AppendOutcome::Appended
            }
            Some(_) => {
                builder.append_null();
                AppendOutcome::OutOfBounds
            }
            None => {
                builder.append_null();
                AppendOutcome::Null
            }
        })
    })
}

fn datetime_appender() -> Appender {
    Box::new(|slot: &Slot, builder: &mut dyn ArrayBuilder| {
        let Slot::Datetime(value) = slot else {
            return Err(mismatch("datetime", slot));
        };
        let builder = downcast::<TimestampSecondBuilder>(builder, "datetime")?;
        Ok(match value {
            Some(v) if datetime_in_bounds(*v) => {
                builder.append_value(v.and_utc().timestamp());
                AppendOutcome::Appended
            }
            Some(_) => {
                builder.append_null();
                AppendOutcome::OutOfBounds
            }
            None => {
                builder.append_null();
                AppendOutcome::Null
            }
        })
    })
}

fn timestamp_appender() -> Appender {
    Box::new(|slot: &Slot, builder: &mut dyn ArrayBuilder| {
        let Slot::Datetime(value) = slot else {
            return Err(mismatch("datetime", slot));
        };
        let builder = downcast::<TimestampMicrosecondBuilder>(builder, "timestamp")?;
        Ok(match value {
            Some(v) if datetime_in_bounds(*v) => {
                builder.append_value(v.and_utc().timestamp_micros());
                AppendOutcome::Appended
            }
            Some(_) => {
                builder.append_null();
                AppendOutcome::OutOfBounds
            }
            None => {
                builder.append_null();
                AppendOutcome::Null
            }
        })
    })
}

fn decimal_appender(precision: u8, scale: i8) -> Appender {
    Box::new(move |slot: &Slot, builder: &mut dyn ArrayBuilder| {
        let Slot::Decimal(value) = slot else {
            return Err(mismatch("decimal", slot));
        };
        let builder = downcast::<Decimal128Builder>(builder, "decimal")?;
        Ok(match value.map(|v| to_unscaled_i128(&v, precision, scale)) {
            Some(Some(unscaled)) => {
                builder.append_value(unscaled);
                AppendOutcome::Appended
            }
            Some(None) => {
                builder.append_null();
                AppendOutcome::OutOfBounds
            }
            None => {
                builder.append_null();
                AppendOutcome::Null
            }
        })
    })
}

fn object_id_appender() -> Appender {
    Box::new(|slot: &Slot, builder: &mut dyn ArrayBuilder| {
        let Slot::Bytes(value) = slot else {
            return Err(mismatch("bytes", slot));
        };
        let builder = downcast::<StringBuilder>(builder, "object id")?;
        Ok(match value {
            Some(raw) => {
                builder.append_value(object_id::encode(raw)?);
                AppendOutcome::Appended
            }
            None => {
                builder.append_null();
                AppendOutcome::Null
            }
        })
    })
}

/// Binds the appender for one canonical type. Resolved once per query.
pub fn appender_for(ty: &CanonicalType) -> Result<Appender, ConversionError> {
    let appender: Appender = match ty.strip_optional() {
        CanonicalType::Bool => direct!(Bool, BooleanBuilder, "bool"),
        CanonicalType::Int8 => narrowing!(Int, Int8Builder, i8, "int"),
        CanonicalType::Int16 => narrowing!(Int, Int16Builder, i16, "int"),
        CanonicalType::Int32 => narrowing!(Int, Int32Builder, i32, "int"),
        CanonicalType::Int64 => direct!(Int, Int64Builder, "int"),
        CanonicalType::UInt8 => narrowing!(UInt, UInt8Builder, u8, "uint"),
        CanonicalType::UInt16 => narrowing!(UInt, UInt16Builder, u16, "uint"),
        CanonicalType::UInt32 => narrowing!(UInt, UInt32Builder, u32, "uint"),
        CanonicalType::UInt64 => direct!(UInt, UInt64Builder, "uint"),
        CanonicalType::Float32 => direct!(Float32, Float32Builder, "float32"),
        CanonicalType::Float64 => direct!(Float64, Float64Builder, "float64"),
        CanonicalType::Bytes => direct!(Bytes, BinaryBuilder, "bytes"),
        CanonicalType::Utf8 | CanonicalType::Json => direct!(Text, StringBuilder, "text"),
        CanonicalType::Date => date_appender(),
        CanonicalType::Datetime => datetime_appender(),
        CanonicalType::Timestamp => timestamp_appender(),
        CanonicalType::Decimal { precision, scale } => decimal_appender(*precision, *scale),
        CanonicalType::Tagged { tag, .. } if tag == OBJECT_ID_TAG => object_id_appender(),
        CanonicalType::Tagged { tag, .. } => return Err(ConversionError::UnknownTag(tag.clone())),
        other => return Err(ConversionError::NoAcceptor(other.to_string())),
    };
    Ok(appender)
}

/// The appender of one output column together with its nullability.
pub struct ColumnAppender {
    pub name: String,
    pub nullable: bool,
    append: Appender,
}

impl ColumnAppender {
    pub fn new(column: &Column) -> Result<Self, ConversionError> {
        Ok(Self {
            name: column.name.clone(),
            nullable: column.ty.is_optional(),
            append: appender_for(&column.ty)?,
        })
    }

    pub fn append(
        &self,
        slot: &Slot,
        builder: &mut dyn ArrayBuilder,
    ) -> Result<AppendOutcome, ConversionError> {
        if !self.nullable && slot.is_null() {
            return Err(ConversionError::UnexpectedNull {
                column: self.name.clone(),
            });
        }
        (self.append)(slot, builder)
    }
}
