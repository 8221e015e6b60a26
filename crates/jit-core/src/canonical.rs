//! # Canonical Serialization: Signing Input
//!
//! `CanonicalBytes` is the only accepted input for token signatures. It is
//! produced by serializing a value to JSON, rejecting floats, and rendering
//! the result with `serde_jcs` (RFC 8785): sorted keys, compact separators,
//! deterministic bytes.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private and the only constructor is
//! [`CanonicalBytes::new()`], so a signature can never be computed over a
//! non-canonical rendering of a request. A verifier re-derives the same
//! bytes from the decoded payload regardless of field order on the wire.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains
    /// a non-integer number, `SerializationFailed` if serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Floats have non-deterministic JCS rendering edge cases; timestamps and
/// durations are carried as integers or strings instead.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Object(map) => map.values().try_for_each(reject_floats),
        Value::Array(arr) => arr.iter().try_for_each(reject_floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_sorted() {
        let data = serde_json::json!({"exp": 2, "iat": 1, "iss": "jit"});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        assert_eq!(cb.as_bytes(), br#"{"exp":2,"iat":1,"iss":"jit"}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let data = serde_json::json!({
            "request": {"user": "a@example.com", "id": "1"},
            "reviewers": ["b@example.com", "a@example.com"]
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(
            s,
            r#"{"request":{"id":"1","user":"a@example.com"},"reviewers":["b@example.com","a@example.com"]}"#
        );
    }

    #[test]
    fn test_float_rejection() {
        let data = serde_json::json!({"outer": [{"lifetime": 1.5}]});
        match CanonicalBytes::new(&data) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 1.5),
            other => panic!("expected FloatRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_integers_and_unicode_accepted() {
        let data = serde_json::json!({"n": -42, "justification": "d\u{00e9}ploiement"});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert!(!cb.is_empty());
        assert!(std::str::from_utf8(cb.as_bytes()).unwrap().contains('\u{00e9}'));
    }
}
