//! # Condition Subcommand
//!
//! Tooling for the CEL conditions carried by role bindings.
//!
//! ## Subcommands
//!
//! - `split`: Print each top-level `&&` clause on its own line.
//! - `reformat`: Print the canonical rendering of a condition.
//! - `eval`: Evaluate a condition with `request.time` bound to now or `--at`.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use jit_core::{ConditionExpression, Timestamp};

/// Arguments for `jit condition`.
#[derive(Args, Debug)]
pub struct ConditionArgs {
    #[command(subcommand)]
    pub command: ConditionCommand,
}

/// Condition subcommands.
#[derive(Subcommand, Debug)]
pub enum ConditionCommand {
    /// Split a condition on top-level `&&`.
    Split {
        /// Condition text.
        expression: String,
    },

    /// Render a condition canonically.
    Reformat {
        /// Condition text.
        expression: String,
    },

    /// Evaluate a condition.
    Eval {
        /// Condition text.
        expression: String,
        /// Evaluation time (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
}

/// Execute the condition subcommand.
pub fn run_condition(args: &ConditionArgs) -> Result<u8> {
    let output = cmd_condition(&args.command)?;
    println!("{output}");
    Ok(0)
}

/// Run a condition subcommand and return its output.
pub fn cmd_condition(command: &ConditionCommand) -> Result<String> {
    match command {
        ConditionCommand::Split { expression } => Ok(ConditionExpression::new(expression.as_str())
            .split_and()
            .iter()
            .map(ConditionExpression::to_string)
            .collect::<Vec<_>>()
            .join("\n")),

        ConditionCommand::Reformat { expression } => {
            Ok(ConditionExpression::new(expression.as_str()).reformat().to_string())
        }

        ConditionCommand::Eval { expression, at } => {
            let time = match at {
                Some(at) => Timestamp::parse_lenient(at)?,
                None => Timestamp::now(),
            };
            let result = ConditionExpression::new(expression.as_str())
                .evaluate_at(time)
                .with_context(|| format!("failed to evaluate {expression:?}"))?;
            Ok(result.to_string())
        }
    }
}
