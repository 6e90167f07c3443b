//! CBOR helpers for durable payloads.
//!
//! Everything the store persists goes through these two functions so the
//! on-disk encoding stays in one place.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|e| StoreError::encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR bytes.
///
/// `slot` names the origin of the bytes for the error message; decode
/// failures are reported as [`StoreError::Corrupted`].
pub fn decode<T: DeserializeOwned>(slot: &str, bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::corrupted(slot, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn roundtrip() {
        let sample = Sample {
            name: "feed".into(),
            count: 7,
        };
        let bytes = encode(&sample).unwrap();
        let decoded: Sample = decode("test", &bytes).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn decode_garbage_is_corrupted() {
        let result: StoreResult<Sample> = decode("slot-a", &[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn json_value_roundtrip() {
        let value = serde_json::json!({"id": "p1", "liked": true, "count": 3});
        let bytes = encode(&value).unwrap();
        let decoded: serde_json::Value = decode("test", &bytes).unwrap();
        assert_eq!(decoded, value);
    }
}
