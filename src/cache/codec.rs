//! Value Codec Module
//!
//! Encodes cache values into node payloads and back, using JSON.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

/// Serializes a value into a node payload.
pub fn encode<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(CacheError::Encode)
}

/// Decodes a node payload.
///
/// An empty payload (a node created but never written) decodes as `None`.
pub fn decode<V: DeserializeOwned>(path: &str, payload: &[u8]) -> Result<Option<V>> {
    if payload.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(payload)
        .map(Some)
        .map_err(|source| CacheError::Decode {
            path: path.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Principal {
        name: String,
        roles: Vec<String>,
    }

    #[test]
    fn test_encode_then_decode_struct() {
        let value = Principal {
            name: "admin".to_string(),
            roles: vec!["ops".to_string()],
        };
        let payload = encode(&value).unwrap();
        let decoded: Option<Principal> = decode("/c/admin", &payload).unwrap();
        assert_eq!(decoded, Some(value));
    }

    #[test]
    fn test_empty_payload_is_absent() {
        let decoded: Option<String> = decode("/c/k", &[]).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_decode_failure_names_path() {
        let result: Result<Option<u64>> = decode("/c/k", b"not json");
        match result {
            Err(CacheError::Decode { path, .. }) => assert_eq!(path, "/c/k"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
