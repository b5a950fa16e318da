//! Canonical binary encoding.
//!
//! Everything that is hashed or signed goes through these two functions so
//! that the byte layout has a single definition.

use crate::errors::EncodingError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value to its canonical bytes.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    bincode::serialize(value).map_err(|e| EncodingError::Encode(e.to_string()))
}

/// Decode a value from canonical bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EncodingError> {
    bincode::deserialize(bytes).map_err(|e| EncodingError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<(u64, String), _> = decode(&[0xFF, 0x01]);
        assert!(matches!(result, Err(EncodingError::Decode(_))));
    }

    #[test]
    fn test_encode_is_stable() {
        let a = encode(&(1u32, "x")).unwrap();
        let b = encode(&(1u32, "x")).unwrap();
        assert_eq!(a, b);
    }
}
