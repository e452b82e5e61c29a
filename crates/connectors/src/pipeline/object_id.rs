//! Codec for document-store object identifiers: 12 raw bytes on the driver
//! side, 24 lowercase hex characters on the wire.

use crate::error::ConversionError;

pub const OBJECT_ID_LEN: usize = 12;

pub fn encode(raw: &[u8]) -> Result<String, ConversionError> {
    if raw.len() != OBJECT_ID_LEN {
        return Err(ConversionError::InvalidObjectId(format!(
            "expected {} bytes, got {}",
            OBJECT_ID_LEN,
            raw.len()
        )));
    }
    Ok(hex::encode(raw))
}

pub fn decode(text: &str) -> Result<[u8; OBJECT_ID_LEN], ConversionError> {
    let mut raw = [0u8; OBJECT_ID_LEN];
    hex::decode_to_slice(text, &mut raw)
        .map_err(|e| ConversionError::InvalidObjectId(format!("'{}': {}", text, e)))?;
    Ok(raw)
}
