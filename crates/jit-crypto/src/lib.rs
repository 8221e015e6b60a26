//! # jit-crypto: Cryptographic Primitives
//!
//! Provides the cryptographic building blocks for activation tokens:
//!
//! - **Ed25519** signing and verification over `CanonicalBytes` (the only
//!   accepted signing input).
//! - **Key registry** mapping key ids to accepted verifying keys, so signing
//!   keys can be rotated without invalidating tokens already in flight.
//! - **Token envelope**: a compact `header.payload.signature` encoding of a
//!   signed JSON payload.
//!
//! ## Crate Policy
//!
//! - Depends only on `jit-core` internally.
//! - No mocking of cryptographic operations in tests; all tests use real
//!   Ed25519 keys.
//! - `unsafe` prohibited.

pub mod ed25519;
pub mod token;

pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use token::{open, seal, KeyRegistry, TokenHeader};
