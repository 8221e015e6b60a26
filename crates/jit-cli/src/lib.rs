//! # jit-cli: Just-In-Time Access Command-Line Interface
//!
//! Operator tooling around the entitlement catalog. Directory and policy
//! data come from a YAML snapshot (see [`snapshot`]), so every command runs
//! offline.
//!
//! ## Subcommands
//!
//! - `keygen`: Generate the token signing key
//! - `condition`: Split, reformat, and evaluate binding conditions
//! - `entitlements`: List a user's entitlements on a resource
//! - `holders`: List the users holding an entitlement
//! - `request`: Create and sign a JIT or MPA activation request
//! - `introspect`: Show a signed request as seen by an involved user
//!
//! ## Crate Policy
//!
//! - CLI construction (argument parsing) is separated from business logic.
//! - Handler functions delegate to `jit-catalog`; no access decisions here.
//! - Handlers return their output as a string so tests can inspect it.

pub mod condition;
pub mod config;
pub mod entitlements;
pub mod introspect;
pub mod keygen;
pub mod request;
pub mod snapshot;

use std::future::Future;

use anyhow::{Context, Result};

/// Run a catalog future to completion on a single-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
