//! # CLI Configuration
//!
//! YAML configuration shared by all subcommands. Every field has a
//! default, so an empty file (or no file at all) is a valid configuration:
//!
//! ```yaml
//! scope: organizations/123
//! snapshot: snapshot.yaml
//! key_file: keys/signing.key
//! request:
//!   max_reviewers: 10
//!   min_minutes: 5
//!   max_minutes: 120
//!   justification_min_length: 1
//!   justification_hint: Describe why you need this access
//! token:
//!   issuer: jit-access
//!   lifetime_minutes: 60
//!   clock_skew_seconds: 60
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use jit_catalog::{
    Ed25519TokenSigner, EntitlementResolver, MinimumLengthPolicy, RequestFactory, RequestOptions, ResolverOptions,
    TokenOptions,
};

use crate::keygen::load_signing_key;
use crate::snapshot::Snapshot;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Scope for effective policy queries.
    pub scope: String,
    /// Path to the policy snapshot.
    pub snapshot: PathBuf,
    /// Path to the token signing key (hex seed).
    pub key_file: PathBuf,
    /// Request limits.
    pub request: RequestConfig,
    /// Token settings.
    pub token: TokenConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            scope: "organizations/0".to_string(),
            snapshot: PathBuf::from("snapshot.yaml"),
            key_file: PathBuf::from("signing.key"),
            request: RequestConfig::default(),
            token: TokenConfig::default(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestConfig {
    /// Maximum reviewers per MPA request.
    pub max_reviewers: usize,
    /// Shortest activation, in minutes.
    pub min_minutes: i64,
    /// Longest activation, in minutes.
    pub max_minutes: i64,
    /// Minimum justification length.
    pub justification_min_length: usize,
    /// Hint shown when a justification is rejected.
    pub justification_hint: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        let options = RequestOptions::default();
        let policy = MinimumLengthPolicy::default();
        Self {
            max_reviewers: options.max_reviewers,
            min_minutes: options.min_duration.num_minutes(),
            max_minutes: options.max_duration.num_minutes(),
            justification_min_length: policy.min_length,
            justification_hint: policy.hint,
        }
    }
}

/// Token settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    /// Issuer written to and expected in tokens.
    pub issuer: String,
    /// Token lifetime, in minutes.
    pub lifetime_minutes: i64,
    /// Tolerated clock skew, in seconds.
    pub clock_skew_seconds: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        let options = TokenOptions::default();
        Self {
            issuer: options.issuer,
            lifetime_minutes: options.lifetime.num_minutes(),
            clock_skew_seconds: options.clock_skew.num_seconds(),
        }
    }
}

impl CliConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    ///
    /// Relative paths inside the file are resolved against the file's
    /// directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.snapshot = base.join(&config.snapshot);
            config.key_file = base.join(&config.key_file);
        }
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolver over the configured snapshot.
    pub fn resolver(&self) -> Result<EntitlementResolver> {
        let snapshot = Arc::new(Snapshot::load(&self.snapshot)?);
        Ok(EntitlementResolver::new(
            snapshot.directory(),
            snapshot.policy(),
            ResolverOptions::new(self.scope.clone()),
        ))
    }

    /// Request factory with the configured limits.
    pub fn request_factory(&self) -> Result<RequestFactory> {
        let policy = MinimumLengthPolicy {
            min_length: self.request.justification_min_length,
            hint: self.request.justification_hint.clone(),
        };
        let options = RequestOptions {
            max_reviewers: self.request.max_reviewers,
            min_duration: minutes(self.request.min_minutes, "request.min_minutes")?,
            max_duration: minutes(self.request.max_minutes, "request.max_minutes")?,
        };
        Ok(RequestFactory::new(Arc::new(policy), options))
    }

    /// Token options from the configuration.
    pub fn token_options(&self) -> Result<TokenOptions> {
        let clock_skew = Duration::try_seconds(self.token.clock_skew_seconds)
            .with_context(|| format!("token.clock_skew_seconds out of range: {}", self.token.clock_skew_seconds))?;
        Ok(TokenOptions {
            lifetime: minutes(self.token.lifetime_minutes, "token.lifetime_minutes")?,
            issuer: self.token.issuer.clone(),
            clock_skew,
        })
    }

    /// Signer using the configured key file.
    pub fn token_signer(&self) -> Result<Ed25519TokenSigner> {
        let key = load_signing_key(&self.key_file)?;
        Ok(Ed25519TokenSigner::new(key, self.token_options()?))
    }
}

/// A duration in minutes, rejecting values chrono cannot represent.
pub fn minutes(value: i64, name: &str) -> Result<Duration> {
    Duration::try_minutes(value).with_context(|| format!("{name} out of range: {value}"))
}
