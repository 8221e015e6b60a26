//! # jit CLI entry point
//!
//! Parses command-line arguments, loads the configuration, and dispatches
//! to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jit_cli::condition::{run_condition, ConditionArgs};
use jit_cli::config::CliConfig;
use jit_cli::entitlements::{run_entitlements, run_holders, EntitlementsArgs, HoldersArgs};
use jit_cli::introspect::{run_introspect, IntrospectArgs};
use jit_cli::keygen::{run_keygen, KeygenArgs};
use jit_cli::request::{run_request, RequestArgs};

/// Just-in-time access toolchain.
///
/// Discovers entitlements in a policy snapshot, creates signed activation
/// requests, and inspects binding conditions.
#[derive(Parser, Debug)]
#[command(name = "jit", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the token signing key.
    Keygen(KeygenArgs),

    /// Split, reformat, or evaluate a binding condition.
    Condition(ConditionArgs),

    /// List a user's entitlements on a resource.
    Entitlements(EntitlementsArgs),

    /// List the users holding an entitlement.
    Holders(HoldersArgs),

    /// Create and sign an activation request.
    Request(RequestArgs),

    /// Show a signed request to an involved user.
    Introspect(IntrospectArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = CliConfig::load(cli.config.as_deref()).and_then(|config| match &cli.command {
        Commands::Keygen(args) => run_keygen(args),
        Commands::Condition(args) => run_condition(args),
        Commands::Entitlements(args) => run_entitlements(args, &config),
        Commands::Holders(args) => run_holders(args, &config),
        Commands::Request(args) => run_request(args, &config),
        Commands::Introspect(args) => run_introspect(args, &config),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
