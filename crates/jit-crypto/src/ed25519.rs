//! # Ed25519 Signing and Verification
//!
//! Key generation, signing, and verification for activation request tokens.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&CanonicalBytes`; raw bytes cannot be signed.
//! - Private keys are never serialized or logged. `Ed25519KeyPair` does not
//!   implement `Serialize` and its `Debug` output is redacted. The seed is
//!   only exposed through [`Ed25519KeyPair::seed_hex()`] for writing key
//!   files.
//!
//! ## Key ids
//!
//! A key is referenced in token headers by its key id: the first 8 bytes of
//! the SHA-256 of the public key, hex-encoded.

use ed25519_dalek::{Signer, Verifier};
use jit_core::{CanonicalBytes, CryptoError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// An Ed25519 public key (32 bytes). Serializes as a hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

/// An Ed25519 signature (64 bytes). Serializes as a hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; 64]);

/// An Ed25519 key pair for signing tokens.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// Ed25519PublicKey impls
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the public key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a public key from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = fixed_from_hex::<32>(hex).map_err(CryptoError::KeyError)?;
        Ok(Self(bytes))
    }

    /// Key id used in token headers.
    pub fn key_id(&self) -> String {
        let digest = Sha256::digest(self.0);
        to_hex(&digest[..8])
    }

    /// Verify a signature over canonical bytes.
    pub fn verify(&self, data: &CanonicalBytes, signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        vk.verify(data.as_bytes(), &sig)
            .map_err(|e| CryptoError::VerificationFailed(format!("Ed25519 verification failed: {e}")))
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", to_hex(&self.0[..4]))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature impls
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    /// Create a signature from raw bytes, which must be exactly 64 long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::VerificationFailed(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Render the signature as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", to_hex(&self.0[..4]))
    }
}

// ---------------------------------------------------------------------------
// Ed25519KeyPair impls
// ---------------------------------------------------------------------------

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Create a key pair from a 64-character hex seed, as written by
    /// [`Ed25519KeyPair::seed_hex()`].
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        let seed = fixed_from_hex::<32>(hex).map_err(CryptoError::KeyError)?;
        Ok(Self::from_seed(&seed))
    }

    /// The hex-encoded seed, for key files.
    pub fn seed_hex(&self) -> String {
        to_hex(&self.signing_key.to_bytes())
    }

    /// Get the public key from this key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign canonical bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn fixed_from_hex<const N: usize>(hex: &str) -> Result<[u8; N], String> {
    let hex = hex.trim().to_lowercase();
    if hex.len() != N * 2 {
        return Err(format!("expected {} hex chars, got {}", N * 2, hex.len()));
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        let pair = hex.get(i * 2..i * 2 + 2).ok_or_else(|| format!("invalid hex at position {}", i * 2))?;
        *byte = u8::from_str_radix(pair, 16).map_err(|e| format!("invalid hex at position {}: {e}", i * 2))?;
    }
    Ok(out)
}
