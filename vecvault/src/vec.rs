//! Vector-search support: float32 embedding serialization and extension
//! registration.
//!
//! The bundled sqlite-vec extension stores embeddings in `vec0` virtual
//! tables as compact blobs: a float32 vector of N elements is exactly
//! `4 * N` bytes, each element's IEEE-754 bit pattern in little-endian
//! order, with no header, length prefix, or padding. [`serialize_f32`]
//! produces that layout and [`deserialize_f32`] reads it back.
//!
//! [`VecBlob`] pairs serialized bytes with the wire subtype tag
//! [`FLOAT32_SUBTYPE`] for callers that transmit typed vector payloads over
//! their own protocol. When bound as a statement parameter the bytes travel
//! as a plain blob, which is the layout `vec0` columns accept directly.

use std::fmt;

use super::error::{DbError, DbResult};
use super::ffi;
use super::value::Value;

/// Wire subtype tag identifying a blob as a float32 vector.
pub const FLOAT32_SUBTYPE: u32 = 223;

/// Serializes a float32 vector into the compact binary layout `vec0`
/// columns accept: `4 * N` bytes, little-endian IEEE-754 bit patterns.
///
/// Every input serializes, including NaN, infinities, and negative zero;
/// bit patterns are preserved exactly.
#[must_use]
pub fn serialize_f32(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Reads a compact float32 vector blob back into its elements.
///
/// Fails when the blob length is not a multiple of 4.
pub fn deserialize_f32(bytes: &[u8]) -> DbResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(DbError::new(
            ffi::SQLITE_MISMATCH,
            format!("blob length {} is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// A serialized float32 vector paired with its wire subtype tag.
///
/// Binding a `VecBlob` as a statement parameter sends the bytes as a plain
/// blob; the subtype is carried for protocols that transmit the tag
/// alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecBlob {
    /// Compact little-endian float32 bytes.
    pub data: Vec<u8>,
    /// Wire subtype tag, [`FLOAT32_SUBTYPE`] for float32 vectors.
    pub subtype: u32,
}

impl VecBlob {
    /// Serializes `values` and tags the result as a float32 vector.
    #[must_use]
    pub fn from_f32(values: &[f32]) -> Self {
        Self {
            data: serialize_f32(values),
            subtype: FLOAT32_SUBTYPE,
        }
    }
}

impl fmt::Display for VecBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VecBlob(len={}, subtype={})", self.data.len(), self.subtype)
    }
}

impl From<VecBlob> for Value {
    fn from(blob: VecBlob) -> Self {
        Self::Blob(blob.data)
    }
}

/// Registers the vector extension for every connection opened after this
/// call, process-wide.
///
/// [`Connection::open`](super::Connection::open) calls this automatically;
/// call it yourself only when foreign code in the same process opens its
/// own `SQLite` handles and should see the `vec0` module too. Safe to call
/// any number of times; registration happens once.
pub fn auto_register() {
    ffi::register_vec_extension();
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_serialize_f32_layout() {
        let bytes = serialize_f32(&[1.0, -1.0]);
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x80, 0xBF]
        );
    }

    #[test_case(1.0_f32, [0x00, 0x00, 0x80, 0x3F] ; "one")]
    #[test_case(-1.0_f32, [0x00, 0x00, 0x80, 0xBF] ; "minus one")]
    #[test_case(-0.0_f32, [0x00, 0x00, 0x00, 0x80] ; "negative zero")]
    #[test_case(f32::INFINITY, [0x00, 0x00, 0x80, 0x7F] ; "positive infinity")]
    #[test_case(f32::NEG_INFINITY, [0x00, 0x00, 0x80, 0xFF] ; "negative infinity")]
    fn test_serialize_f32_bit_pattern(value: f32, expected: [u8; 4]) {
        assert_eq!(serialize_f32(&[value]), expected);
    }

    #[test]
    fn test_serialize_f32_empty() {
        assert!(serialize_f32(&[]).is_empty());
    }

    #[test]
    fn test_serialize_f32_length_and_determinism() {
        let values = [0.1_f32, 0.2, 0.3, 0.4, 0.5];
        let first = serialize_f32(&values);
        let second = serialize_f32(&values);
        assert_eq!(first.len(), 4 * values.len());
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialize_f32_preserves_nan_bits() {
        let payload_nan = f32::from_bits(0x7FC0_1234);
        let bytes = serialize_f32(&[payload_nan, f32::NAN]);
        assert_eq!(bytes.len(), 8);
        let round = deserialize_f32(&bytes).expect("deserialize");
        assert_eq!(round[0].to_bits(), 0x7FC0_1234);
        assert!(round[1].is_nan());
    }

    #[test]
    fn test_deserialize_f32_round_trip() {
        let values = [0.25_f32, -0.0, 3.5, f32::INFINITY];
        let round = deserialize_f32(&serialize_f32(&values)).expect("deserialize");
        assert_eq!(round.len(), 4);
        assert_eq!(round[0].to_bits(), 0.25_f32.to_bits());
        assert!(round[1].is_sign_negative());
        assert_eq!(round[1].to_bits(), (-0.0_f32).to_bits());
        assert_eq!(round[3].to_bits(), f32::INFINITY.to_bits());
    }

    #[test]
    fn test_deserialize_f32_rejects_bad_length() {
        let err = deserialize_f32(&[0x00, 0x01, 0x02]).expect_err("bad length");
        assert!(err.message.contains("multiple of 4"));
    }

    #[test]
    fn test_vec_blob_from_f32() {
        let blob = VecBlob::from_f32(&[1.0, 2.0]);
        assert_eq!(blob.data, serialize_f32(&[1.0, 2.0]));
        assert_eq!(blob.subtype, FLOAT32_SUBTYPE);
        assert_eq!(blob.subtype, 223);
    }

    #[test]
    fn test_vec_blob_display() {
        let blob = VecBlob::from_f32(&[1.0, 2.0]);
        assert_eq!(format!("{blob}"), "VecBlob(len=8, subtype=223)");
    }

    #[test]
    fn test_vec_blob_empty_input() {
        let blob = VecBlob::from_f32(&[]);
        assert!(blob.data.is_empty());
        assert_eq!(blob.subtype, FLOAT32_SUBTYPE);
        assert_eq!(format!("{blob}"), "VecBlob(len=0, subtype=223)");
    }

    #[test]
    fn test_vec_blob_into_value() {
        let blob = VecBlob::from_f32(&[0.5]);
        let bytes = blob.data.clone();
        assert_eq!(Value::from(blob), Value::Blob(bytes));
    }
}
