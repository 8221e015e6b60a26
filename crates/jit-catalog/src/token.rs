//! # Request Tokens
//!
//! Signed tokens carry an activation request from the requester to its
//! reviewers, so a reviewer can act on the request without the server
//! keeping session state.
//!
//! The payload is
//!
//! ```json
//! {"iss": "<issuer>", "iat": <epoch secs>, "exp": <epoch secs>, "request": { ... }}
//! ```
//!
//! sealed with the envelope from [`jit_crypto::token`]. A token is accepted
//! iff its signature verifies against a registered key, its issuer matches,
//! `iat` is not further in the future than the allowed clock skew, and
//! `now <= exp`. The request inside is re-validated on decoding.

use chrono::Duration;
use jit_core::{CryptoError, JitError, Timestamp};
use jit_crypto::{Ed25519KeyPair, Ed25519PublicKey, KeyRegistry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::ActivationRequest;

/// Why a token was rejected.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The envelope could not be decoded or its signature is invalid.
    #[error(transparent)]
    Envelope(#[from] CryptoError),

    /// The token's validity ended.
    #[error("token expired at {0}")]
    Expired(Timestamp),

    /// The token claims to be issued in the future.
    #[error("token not valid before {0}")]
    NotYetValid(Timestamp),

    /// The token was issued by someone else.
    #[error("token issued by {0:?}")]
    WrongIssuer(String),

    /// A claim is out of range.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
}

impl From<TokenError> for JitError {
    fn from(e: TokenError) -> Self {
        Self::InvalidToken(e.to_string())
    }
}

/// Signs requests into tokens and verifies them.
pub trait TokenSigner: Send + Sync {
    /// Encode `request` as a signed token.
    fn sign(&self, request: &ActivationRequest) -> Result<String, JitError>;

    /// Verify `token` as of `now` and decode the request it carries.
    fn verify_at(&self, token: &str, now: Timestamp) -> Result<ActivationRequest, JitError>;

    /// Verify `token` as of the current time.
    fn verify(&self, token: &str) -> Result<ActivationRequest, JitError> {
        self.verify_at(token, Timestamp::now())
    }
}

/// Signer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOptions {
    /// How long a token stays valid. Tokens never outlive their request.
    pub lifetime: Duration,
    /// Issuer name written to and expected in tokens.
    pub issuer: String,
    /// Tolerated clock difference for `iat`.
    pub clock_skew: Duration,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            lifetime: Duration::hours(1),
            issuer: "jit-access".to_string(),
            clock_skew: Duration::minutes(1),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
    request: ActivationRequest,
}

/// Ed25519-backed token signer.
#[derive(Debug)]
pub struct Ed25519TokenSigner {
    key: Ed25519KeyPair,
    accepted: KeyRegistry,
    options: TokenOptions,
}

impl Ed25519TokenSigner {
    /// Create a signer that accepts its own tokens.
    pub fn new(key: Ed25519KeyPair, options: TokenOptions) -> Self {
        let mut accepted = KeyRegistry::new();
        accepted.register(key.public_key());
        Self { key, accepted, options }
    }

    /// Also accept tokens signed by `key`, e.g. a previous signing key.
    pub fn accept(&mut self, key: Ed25519PublicKey) -> String {
        self.accepted.register(key)
    }

    /// Stop accepting tokens signed by the key with id `kid`.
    pub fn revoke(&mut self, kid: &str) -> bool {
        self.accepted.revoke(kid)
    }

    /// The public half of the signing key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.key.public_key()
    }

    /// Sign as of `now`.
    pub fn sign_at(&self, request: &ActivationRequest, now: Timestamp) -> Result<String, TokenError> {
        let exp = now
            .checked_add(self.options.lifetime)
            .map_err(|e| TokenError::InvalidClaims(e.to_string()))?
            .min(request.end_time().max(now));
        let claims = Claims {
            iss: self.options.issuer.clone(),
            iat: now.epoch_secs(),
            exp: exp.epoch_secs(),
            request: request.clone(),
        };
        Ok(jit_crypto::seal(&claims, &self.key)?)
    }

    /// Decode and check a token as of `now`.
    pub fn decode_at(&self, token: &str, now: Timestamp) -> Result<ActivationRequest, TokenError> {
        let (header, claims): (_, Claims) = jit_crypto::open(token, &self.accepted)?;

        if claims.iss != self.options.issuer {
            return Err(TokenError::WrongIssuer(claims.iss));
        }
        let iat = Timestamp::from_epoch_secs(claims.iat).map_err(|e| TokenError::InvalidClaims(e.to_string()))?;
        let exp = Timestamp::from_epoch_secs(claims.exp).map_err(|e| TokenError::InvalidClaims(e.to_string()))?;
        if iat.since(&now) > self.options.clock_skew {
            return Err(TokenError::NotYetValid(iat));
        }
        if now > exp {
            return Err(TokenError::Expired(exp));
        }

        tracing::debug!(kid = %header.kid, request = %claims.request.id(), "verified request token");
        Ok(claims.request)
    }
}

impl TokenSigner for Ed25519TokenSigner {
    fn sign(&self, request: &ActivationRequest) -> Result<String, JitError> {
        Ok(self.sign_at(request, Timestamp::now())?)
    }

    fn verify_at(&self, token: &str, now: Timestamp) -> Result<ActivationRequest, JitError> {
        self.decode_at(token, now).map_err(|e| {
            tracing::warn!(error = %e, "rejected request token");
            JitError::from(e)
        })
    }
}
