//! # Error Types: Access Error Taxonomy
//!
//! Defines the error types shared by every crate in the workspace. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Malformed eligibility markers are never errors: a binding that does not
//!   match a marker is simply not classified.
//! - `AccessDenied` and `InvalidToken` are kept apart from every business
//!   error so that a boundary can map them to an authorization failure.
//! - Collaborator failures are carried through uninterpreted.

use thiserror::Error;

/// Top-level error type for just-in-time access operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JitError {
    /// Condition text is malformed, references unknown symbols, or does not
    /// evaluate to a boolean.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// A request or identifier was constructed from invalid input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller lacks rights to inspect a resource, group, or request.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Transport or collaborator failure.
    #[error("io failure: {0}")]
    Io(String),

    /// A token failed signature or validity checks.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The operation is not available with this discovery strategy.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl JitError {
    /// Whether this error must be reported as an authorization failure
    /// rather than a generic error.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::InvalidToken(_))
    }
}

impl From<std::io::Error> for JitError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// A token envelope could not be decoded.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No verifying key is registered under the token's key id.
    #[error("unknown signing key: {0}")]
    UnknownKey(String),

    /// The signing input could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl From<CryptoError> for JitError {
    fn from(e: CryptoError) -> Self {
        Self::InvalidToken(e.to_string())
    }
}
