//! Fixed-point decimal wire codec.
//!
//! A decimal literal travels as the 128-bit two's complement of its unscaled
//! integer, little-endian. The scale is not part of the payload and has to come
//! from the declared type.

use rust_decimal::Decimal;

pub const DECIMAL_WIRE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    #[error("decimal payload must be 16 bytes, got {0}")]
    InvalidLength(usize),

    #[error("decimal with scale {scale} is out of range: {reason}")]
    OutOfRange { scale: u32, reason: String },
}

/// Decodes an unscaled little-endian integer against `scale`.
pub fn decode_decimal(bytes: &[u8], scale: u32) -> Result<Decimal, DecimalError> {
    let raw: [u8; DECIMAL_WIRE_LEN] = bytes
        .try_into()
        .map_err(|_| DecimalError::InvalidLength(bytes.len()))?;
    let unscaled = i128::from_le_bytes(raw);
    Decimal::try_from_i128_with_scale(unscaled, scale).map_err(|e| DecimalError::OutOfRange {
        scale,
        reason: e.to_string(),
    })
}

/// Largest number of decimal digits an Arrow `Decimal128` holds.
pub const MAX_DECIMAL128_PRECISION: u8 = 38;

/// Unscaled integer of `value` at `scale`, as stored by Arrow `Decimal128(precision, scale)`.
///
/// Dropped fractional digits round half away from zero. Returns `None` when the
/// result needs more than `precision` digits.
pub fn to_unscaled_i128(value: &Decimal, precision: u8, scale: i8) -> Option<i128> {
    if precision == 0 || precision > MAX_DECIMAL128_PRECISION {
        return None;
    }
    let mantissa = value.mantissa();
    let shift = i64::from(scale) - i64::from(value.scale());

    let unscaled = if shift >= 0 {
        let factor = 10_i128.checked_pow(u32::try_from(shift).ok()?)?;
        mantissa.checked_mul(factor)?
    } else {
        match 10_i128.checked_pow(u32::try_from(-shift).ok()?) {
            Some(divisor) => {
                let quotient = mantissa / divisor;
                let remainder = mantissa % divisor;
                if remainder.unsigned_abs() * 2 >= divisor.unsigned_abs() {
                    quotient + mantissa.signum()
                } else {
                    quotient
                }
            }
            // |mantissa| < 2^96 is far below half of any divisor this large.
            None => 0,
        }
    };

    let bound = 10_i128.pow(u32::from(precision));
    (unscaled.unsigned_abs() < bound.unsigned_abs()).then_some(unscaled)
}
