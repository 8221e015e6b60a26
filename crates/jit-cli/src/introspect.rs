//! # Introspect Subcommand
//!
//! Verifies a request token and prints the request as seen by the caller.
//! Only the beneficiary and the named reviewers may introspect a request.

use anyhow::{Context, Result};
use clap::Args;

use jit_catalog::introspect_token;
use jit_core::{Timestamp, UserId};

use crate::config::CliConfig;

/// Arguments for `jit introspect`.
#[derive(Args, Debug)]
pub struct IntrospectArgs {
    /// User asking to see the request.
    #[arg(long)]
    pub caller: String,

    /// Token printed by `jit request`.
    #[arg(long)]
    pub token: String,
}

/// Execute the introspect subcommand.
pub fn run_introspect(args: &IntrospectArgs, config: &CliConfig) -> Result<u8> {
    println!("{}", cmd_introspect(args, config)?);
    Ok(0)
}

/// Verify the token and render the introspection as JSON.
pub fn cmd_introspect(args: &IntrospectArgs, config: &CliConfig) -> Result<String> {
    let caller = UserId::new(&args.caller)?;
    let signer = config.token_signer()?;
    let view = introspect_token(&signer, args.token.trim(), &caller, Timestamp::now())?;
    serde_json::to_string_pretty(&view).context("failed to serialize introspection")
}
