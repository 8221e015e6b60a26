//! # Signed Token Envelope
//!
//! Compact, URL-safe encoding of a signed JSON payload:
//!
//! ```text
//! base64url(header) "." base64url(payload) "." base64url(signature)
//! ```
//!
//! The header is `{"alg":"EdDSA","kid":<key id>}`. The signature is
//! Ed25519 over the canonical bytes of `{"header": <header>, "payload":
//! <payload>}`, so a verifier recomputes the signing input from the decoded
//! JSON values rather than from the encoded segments.
//!
//! The envelope knows nothing about what the payload means; claim checks
//! such as expiry belong to the caller.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jit_core::{CanonicalBytes, CryptoError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Signature algorithm name carried in every header.
pub const ALGORITHM: &str = "EdDSA";

/// Token header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Always [`ALGORITHM`].
    pub alg: String,
    /// Key id of the signing key.
    pub kid: String,
}

/// Verifying keys accepted when opening tokens, indexed by key id.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: BTreeMap<String, Ed25519PublicKey>,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept tokens signed by `key`. Returns its key id.
    pub fn register(&mut self, key: Ed25519PublicKey) -> String {
        let kid = key.key_id();
        self.keys.insert(kid.clone(), key);
        kid
    }

    /// Stop accepting tokens signed by the key with this id.
    pub fn revoke(&mut self, kid: &str) -> bool {
        self.keys.remove(kid).is_some()
    }

    /// Look up a verifying key by id.
    pub fn get(&self, kid: &str) -> Option<&Ed25519PublicKey> {
        self.keys.get(kid)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Serialize)]
struct SigningInput<'a> {
    header: &'a Value,
    payload: &'a Value,
}

fn signing_input(header: &Value, payload: &Value) -> Result<CanonicalBytes, CryptoError> {
    Ok(CanonicalBytes::new(&SigningInput { header, payload })?)
}

fn encode_segment(value: &Value) -> Result<String, CryptoError> {
    let canonical = CanonicalBytes::new(value)?;
    Ok(URL_SAFE_NO_PAD.encode(canonical.as_bytes()))
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CryptoError::Malformed(format!("{name} is not base64url: {e}")))
}

fn decode_json(segment: &str, name: &str) -> Result<Value, CryptoError> {
    let bytes = decode_segment(segment, name)?;
    serde_json::from_slice(&bytes).map_err(|e| CryptoError::Malformed(format!("{name} is not JSON: {e}")))
}

/// Sign `payload` with `key` and encode it as a token.
pub fn seal<T: Serialize>(payload: &T, key: &Ed25519KeyPair) -> Result<String, CryptoError> {
    let header = serde_json::to_value(TokenHeader {
        alg: ALGORITHM.to_string(),
        kid: key.public_key().key_id(),
    })
    .map_err(|e| CryptoError::Malformed(e.to_string()))?;
    let payload = serde_json::to_value(payload).map_err(|e| CryptoError::Malformed(e.to_string()))?;

    let signature = key.sign(&signing_input(&header, &payload)?);

    Ok(format!(
        "{}.{}.{}",
        encode_segment(&header)?,
        encode_segment(&payload)?,
        URL_SAFE_NO_PAD.encode(signature.as_bytes())
    ))
}

/// Decode a token, verify its signature against `keys`, and return the
/// header together with the decoded payload.
pub fn open<T: DeserializeOwned>(token: &str, keys: &KeyRegistry) -> Result<(TokenHeader, T), CryptoError> {
    let mut segments = token.trim().split('.');
    let (Some(header_seg), Some(payload_seg), Some(sig_seg), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(CryptoError::Malformed("expected three segments".into()));
    };

    let header_value = decode_json(header_seg, "header")?;
    let header: TokenHeader = serde_json::from_value(header_value.clone())
        .map_err(|e| CryptoError::Malformed(format!("invalid header: {e}")))?;
    if header.alg != ALGORITHM {
        return Err(CryptoError::Malformed(format!("unsupported algorithm {:?}", header.alg)));
    }

    let key = keys
        .get(&header.kid)
        .ok_or_else(|| CryptoError::UnknownKey(header.kid.clone()))?;

    let payload_value = decode_json(payload_seg, "payload")?;
    let signature = Ed25519Signature::from_slice(&decode_segment(sig_seg, "signature")?)?;

    key.verify(&signing_input(&header_value, &payload_value)?, &signature)?;

    let payload = serde_json::from_value(payload_value)
        .map_err(|e| CryptoError::Malformed(format!("invalid payload: {e}")))?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    fn claims() -> Claims {
        Claims { sub: "alice@example.com".into(), exp: 1_900_000_000 }
    }

    fn registry_for(key: &Ed25519KeyPair) -> KeyRegistry {
        let mut keys = KeyRegistry::new();
        keys.register(key.public_key());
        keys
    }

    #[test]
    fn seal_then_open() {
        let key = Ed25519KeyPair::generate();
        let token = seal(&claims(), &key).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let (header, opened): (TokenHeader, Claims) = open(&token, &registry_for(&key)).unwrap();
        assert_eq!(header.kid, key.public_key().key_id());
        assert_eq!(opened, claims());
    }

    #[test]
    fn open_rejects_unknown_key() {
        let token = seal(&claims(), &Ed25519KeyPair::generate()).unwrap();
        let other = registry_for(&Ed25519KeyPair::generate());
        assert!(matches!(open::<Claims>(&token, &other), Err(CryptoError::UnknownKey(_))));
    }

    #[test]
    fn open_rejects_tampered_payload() {
        let key = Ed25519KeyPair::generate();
        let token = seal(&claims(), &key).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims { sub: "mallory@example.com".into(), exp: 1_900_000_000 };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            open::<Claims>(&forged_token, &registry_for(&key)),
            Err(CryptoError::VerificationFailed(_))
        ));
    }

    #[test]
    fn open_rejects_malformed_tokens() {
        let keys = registry_for(&Ed25519KeyPair::generate());
        for token in ["", "a.b", "a.b.c.d", "!!!.???.***", "eySAMPLE"] {
            assert!(open::<Claims>(token, &keys).is_err(), "{token:?}");
        }
    }

    #[test]
    fn revoked_keys_are_rejected() {
        let key = Ed25519KeyPair::generate();
        let mut keys = registry_for(&key);
        let token = seal(&claims(), &key).unwrap();

        assert!(keys.revoke(&key.public_key().key_id()));
        assert!(keys.is_empty());
        assert!(open::<Claims>(&token, &keys).is_err());
    }
}
