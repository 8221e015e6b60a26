//! # jit-core: Foundational Types for Just-in-Time Access
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! value types every other crate builds on.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `UserId`, `GroupId`,
//!    `ResourceId`, `Role`, `RequestId`. Emails are lower-cased at
//!    construction so comparisons are case-insensitive everywhere.
//!
//! 2. **`ConditionExpression` is immutable.** Splitting, combining and
//!    reformatting return new values; the text a policy carries is never
//!    rewritten behind the caller's back.
//!
//! 3. **One CEL engine per process.** The engine in [`cel`] is lazily
//!    initialized and holds no per-call state.
//!
//! 4. **`CanonicalBytes` is the only signing input.** Token payloads are
//!    canonicalized with JCS before they are signed or verified.
//!
//! 5. **UTC-only timestamps** with seconds precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `jit-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod cel;
pub mod condition;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use condition::ConditionExpression;
pub use error::{CanonicalizationError, CryptoError, JitError};
pub use identity::{GroupId, PrincipalId, RequestId, ResourceId, Role, UserId, GROUP_PREFIX, USER_PREFIX};
pub use temporal::Timestamp;
