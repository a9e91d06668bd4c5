//! Wire-format framing.
//!
//! Layout (bytes): `0x00 || be-u32 schema-id || payload`. The leading
//! magic byte must be zero and the total length at least five bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use keel_core::{Code, Error, Result, Severity};

/// The magic byte opening every framed record.
pub const WIRE_MAGIC: u8 = 0x00;

/// Length of the magic + schema-id prefix.
pub const WIRE_HEADER_LEN: usize = 5;

/// Identifier of a schema in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u32);

impl SchemaId {
    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for SchemaId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frames `payload` with the wire-format prefix.
#[must_use]
pub fn encode_wire(schema_id: SchemaId, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WIRE_HEADER_LEN + payload.len());
    out.push(WIRE_MAGIC);
    out.extend_from_slice(&schema_id.0.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Splits a framed record into its schema id and payload slice.
///
/// # Errors
///
/// Returns a `DECODE_ERROR` of severity `input` when the input is shorter
/// than five bytes or its first byte is not the zero magic.
pub fn decode_wire(bytes: &[u8]) -> Result<(SchemaId, &[u8])> {
    if bytes.len() < WIRE_HEADER_LEN {
        return Err(Error::build()
            .op("wire.decode")
            .code(Code::DECODE_ERROR)
            .severity(Severity::Input)
            .kv("length", bytes.len())
            .msg("wire format needs at least 5 bytes")
            .finish()
            .unwrap_or_else(|| Error::decode("wire format needs at least 5 bytes")));
    }
    if bytes[0] != WIRE_MAGIC {
        return Err(Error::build()
            .op("wire.decode")
            .code(Code::DECODE_ERROR)
            .severity(Severity::Input)
            .kv("magic", bytes[0])
            .msg("unknown wire-format magic byte")
            .finish()
            .unwrap_or_else(|| Error::decode("unknown wire-format magic byte")));
    }
    let id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok((SchemaId(id), &bytes[WIRE_HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_ids_and_payloads() {
        for id in [0u32, 1, 42, u32::MAX] {
            let payload = b"record bytes";
            let framed = encode_wire(SchemaId(id), payload);
            let (decoded_id, decoded_payload) = decode_wire(&framed).unwrap();
            assert_eq!(decoded_id, SchemaId(id));
            assert_eq!(decoded_payload, payload);
        }
    }

    #[test]
    fn five_zero_bytes_decode_to_id_zero_and_empty_payload() {
        let (id, payload) = decode_wire(&[0, 0, 0, 0, 0]).unwrap();
        assert_eq!(id, SchemaId(0));
        assert!(payload.is_empty());
    }

    #[test]
    fn short_input_is_rejected() {
        for len in 0..5 {
            let bytes = vec![0u8; len];
            let err = decode_wire(&bytes).unwrap_err();
            assert_eq!(err.code(), &keel_core::Code::DECODE_ERROR);
            assert_eq!(err.severity(), keel_core::Severity::Input);
        }
    }

    #[test]
    fn non_zero_magic_is_rejected() {
        let err = decode_wire(&[1, 0, 0, 0, 1, 9]).unwrap_err();
        assert_eq!(err.code(), &keel_core::Code::DECODE_ERROR);
    }

    #[test]
    fn schema_id_is_big_endian() {
        let framed = encode_wire(SchemaId(0x0102_0304), &[]);
        assert_eq!(framed, vec![0, 1, 2, 3, 4]);
    }
}
