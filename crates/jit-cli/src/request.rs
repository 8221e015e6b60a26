//! # Request Subcommand
//!
//! Creates an activation request for one entitlement and prints it as a
//! signed token. The entitlement's activation type decides the request
//! type: JIT entitlements take no reviewers, MPA entitlements need at least
//! one, and every reviewer must hold the same entitlement.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use clap::Args;

use jit_catalog::{ActivationRequest, ActivationType, ResourceRole, TokenSigner};
use jit_core::{ResourceId, Role, Timestamp, UserId};

use crate::block_on;
use crate::config::{minutes, CliConfig};

/// Arguments for `jit request`.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Requesting user.
    #[arg(long)]
    pub user: String,

    /// Resource (project id).
    #[arg(long)]
    pub resource: String,

    /// Role to activate.
    #[arg(long)]
    pub role: String,

    /// Reviewer for an MPA request. Repeat for several reviewers.
    #[arg(long = "reviewer")]
    pub reviewers: Vec<String>,

    /// Why the access is needed.
    #[arg(long)]
    pub justification: String,

    /// Activation length in minutes.
    #[arg(long)]
    pub minutes: i64,

    /// Start of the activation (RFC 3339); defaults to now.
    #[arg(long)]
    pub start: Option<String>,
}

/// Execute the request subcommand.
pub fn run_request(args: &RequestArgs, config: &CliConfig) -> Result<u8> {
    println!("{}", cmd_request(args, config)?);
    Ok(0)
}

/// Build, validate, and sign a request. Returns the token.
pub fn cmd_request(args: &RequestArgs, config: &CliConfig) -> Result<String> {
    let request = build_request(args, config)?;
    let signer = config.token_signer()?;
    let token = signer.sign(&request)?;
    tracing::info!(
        request = %request.id(),
        activation_type = %request.activation_type(),
        user = %request.requesting_user(),
        "signed activation request"
    );
    Ok(token)
}

fn build_request(args: &RequestArgs, config: &CliConfig) -> Result<ActivationRequest> {
    let user = UserId::new(&args.user)?;
    let resource_role = ResourceRole::new(ResourceId::new(&args.resource)?, Role::new(&args.role)?);
    let reviewers = args
        .reviewers
        .iter()
        .map(|r| UserId::new(r))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let start = match &args.start {
        Some(start) => Timestamp::parse_lenient(start)?,
        None => Timestamp::now(),
    };

    let resolver = config.resolver()?;
    let entitlements =
        block_on(resolver.find_entitlements_at(&user, &resource_role.resource, &ActivationType::ALL, start))??;
    let Some(entitlement) = entitlements.find_available(&resource_role).cloned() else {
        bail!("{user} is not eligible for {resource_role}");
    };

    let factory = config.request_factory()?;
    let duration = minutes(args.minutes, "--minutes")?;
    let request = match entitlement.activation_type {
        ActivationType::Jit => {
            if !reviewers.is_empty() {
                bail!("{resource_role} is a JIT entitlement and takes no reviewers");
            }
            factory.create_jit_request(&user, &[entitlement], &args.justification, start, duration)?
        }
        ActivationType::Mpa => {
            if reviewers.is_empty() {
                bail!("{resource_role} requires approval; name at least one --reviewer");
            }
            let holders = block_on(resolver.find_entitlement_holders(&resource_role, ActivationType::Mpa))??;
            if let Some(outsider) = reviewers.iter().find(|r| !holders.contains(*r)) {
                bail!("{outsider} cannot approve {resource_role}");
            }
            factory.create_mpa_request(&user, &[entitlement], &reviewers, &args.justification, start, duration)?
        }
    };
    Ok(request)
}
