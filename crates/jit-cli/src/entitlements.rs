//! # Entitlements and Holders Subcommands
//!
//! `entitlements` prints the [`EntitlementSet`](jit_catalog::EntitlementSet)
//! of a user on a resource. `holders` prints who may activate, or approve,
//! a role on a resource. Both print JSON.

use anyhow::{Context, Result};
use clap::Args;

use jit_catalog::{ActivationType, ResourceRole};
use jit_core::{ResourceId, Role, Timestamp, UserId};

use crate::block_on;
use crate::config::CliConfig;

/// Arguments for `jit entitlements`.
#[derive(Args, Debug)]
pub struct EntitlementsArgs {
    /// User to look up.
    #[arg(long)]
    pub user: String,

    /// Resource (project id).
    #[arg(long)]
    pub resource: String,

    /// Activation types to include.
    #[arg(long, value_delimiter = ',', default_value = "jit,mpa")]
    pub types: Vec<ActivationType>,

    /// Evaluate activations at this time (RFC 3339) instead of now.
    #[arg(long)]
    pub at: Option<String>,
}

/// Arguments for `jit holders`.
#[derive(Args, Debug)]
pub struct HoldersArgs {
    /// Resource (project id).
    #[arg(long)]
    pub resource: String,

    /// Role name, e.g. `roles/compute.admin`.
    #[arg(long)]
    pub role: String,

    /// Activation type of the entitlement.
    #[arg(long = "type", default_value = "mpa")]
    pub activation_type: ActivationType,
}

/// Execute the entitlements subcommand.
pub fn run_entitlements(args: &EntitlementsArgs, config: &CliConfig) -> Result<u8> {
    println!("{}", cmd_entitlements(args, config)?);
    Ok(0)
}

/// Resolve entitlements and render them as JSON.
pub fn cmd_entitlements(args: &EntitlementsArgs, config: &CliConfig) -> Result<String> {
    let user = UserId::new(&args.user)?;
    let resource = ResourceId::new(&args.resource)?;
    let now = match &args.at {
        Some(at) => Timestamp::parse_lenient(at)?,
        None => Timestamp::now(),
    };

    let resolver = config.resolver()?;
    let set = block_on(resolver.find_entitlements_at(&user, &resource, &args.types, now))??;
    serde_json::to_string_pretty(&set).context("failed to serialize entitlements")
}

/// Execute the holders subcommand.
pub fn run_holders(args: &HoldersArgs, config: &CliConfig) -> Result<u8> {
    println!("{}", cmd_holders(args, config)?);
    Ok(0)
}

/// Find entitlement holders and render them as a JSON array.
pub fn cmd_holders(args: &HoldersArgs, config: &CliConfig) -> Result<String> {
    let resource_role = ResourceRole::new(ResourceId::new(&args.resource)?, Role::new(&args.role)?);
    let resolver = config.resolver()?;
    let holders = block_on(resolver.find_entitlement_holders(&resource_role, args.activation_type))??;
    serde_json::to_string_pretty(&holders).context("failed to serialize holders")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    pub(crate) const SNAPSHOT: &str = r#"
groups:
  eng@example.com: ["alice@example.com", "bob@example.com"]
  partners@other.com: ["carol@other.com"]
external_groups: ["partners@other.com"]
policies:
  project-1:
    - attached_resource: projects/project-1
      bindings:
        - role: roles/compute.admin
          members: ["group:eng@example.com", "group:partners@other.com"]
          condition: has({}.multiPartyApprovalConstraint)
        - role: roles/compute.viewer
          members: ["user:alice@example.com"]
          condition: has({}.jitAccessConstraint)
        - role: roles/compute.viewer
          members: ["user:alice@example.com"]
          condition: (request.time >= timestamp("2030-01-01T00:00:00Z") && request.time < timestamp("2030-01-01T01:00:00Z"))
"#;

    pub(crate) fn config_in(dir: &Path) -> CliConfig {
        std::fs::write(dir.join("snapshot.yaml"), SNAPSHOT).unwrap();
        CliConfig { snapshot: dir.join("snapshot.yaml"), key_file: dir.join("signing.key"), ..Default::default() }
    }

    #[test]
    fn lists_available_and_current_entitlements() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let args = EntitlementsArgs {
            user: "alice@example.com".into(),
            resource: "project-1".into(),
            types: vec![ActivationType::Jit, ActivationType::Mpa],
            at: Some("2030-01-01T00:30:00Z".into()),
        };

        let json: serde_json::Value = serde_json::from_str(&cmd_entitlements(&args, &config).unwrap()).unwrap();
        let available = json["available"].as_array().unwrap();
        assert_eq!(available.len(), 2);
        assert_eq!(json["current"].as_array().unwrap().len(), 1);
        assert!(json["expired"].as_array().unwrap().is_empty());
    }

    #[test]
    fn type_filter_limits_entitlements() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let args = EntitlementsArgs {
            user: "bob@example.com".into(),
            resource: "project-1".into(),
            types: vec![ActivationType::Jit],
            at: None,
        };

        let json: serde_json::Value = serde_json::from_str(&cmd_entitlements(&args, &config).unwrap()).unwrap();
        assert!(json["available"].as_array().unwrap().is_empty());
    }

    #[test]
    fn holders_skip_hidden_groups() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let args = HoldersArgs {
            resource: "project-1".into(),
            role: "roles/compute.admin".into(),
            activation_type: ActivationType::Mpa,
        };

        let holders: Vec<String> = serde_json::from_str(&cmd_holders(&args, &config).unwrap()).unwrap();
        assert_eq!(holders, vec!["alice@example.com", "bob@example.com"]);
    }

    #[test]
    fn unknown_resource_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let args = EntitlementsArgs {
            user: "alice@example.com".into(),
            resource: "project-9".into(),
            types: vec![ActivationType::Jit],
            at: None,
        };
        assert!(cmd_entitlements(&args, &config).is_err());
    }
}
