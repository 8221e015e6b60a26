//! # Keygen Subcommand
//!
//! Generates the Ed25519 key used to sign request tokens. Writes
//! `signing.key` (hex seed) and `signing.pub` (hex public key) to the
//! output directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use jit_crypto::Ed25519KeyPair;

/// File name of the private key.
pub const PRIVATE_KEY_FILE: &str = "signing.key";

/// File name of the public key.
pub const PUBLIC_KEY_FILE: &str = "signing.pub";

/// Arguments for `jit keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Directory to write the key files to.
    #[arg(long)]
    pub output: PathBuf,

    /// Overwrite existing key files.
    #[arg(long)]
    pub force: bool,
}

/// Execute the keygen subcommand.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let kid = cmd_keygen(&args.output, args.force)?;
    println!("{kid}");
    Ok(0)
}

/// Generate and write a key pair. Returns the key id.
pub fn cmd_keygen(output: &Path, force: bool) -> Result<String> {
    let private_path = output.join(PRIVATE_KEY_FILE);
    let public_path = output.join(PUBLIC_KEY_FILE);
    if !force && (private_path.exists() || public_path.exists()) {
        bail!("key files already exist in {}; use --force to replace them", output.display());
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create key directory {}", output.display()))?;

    let key = Ed25519KeyPair::generate();
    let public = key.public_key();
    std::fs::write(&private_path, format!("{}\n", key.seed_hex()))
        .with_context(|| format!("failed to write {}", private_path.display()))?;
    restrict_permissions(&private_path)?;
    std::fs::write(&public_path, format!("{}\n", public.to_hex()))
        .with_context(|| format!("failed to write {}", public_path.display()))?;

    tracing::info!(kid = %public.key_id(), path = %private_path.display(), "generated signing key");
    Ok(public.key_id())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Load a signing key written by `jit keygen`.
pub fn load_signing_key(path: &Path) -> Result<Ed25519KeyPair> {
    let hex = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read signing key {}", path.display()))?;
    Ed25519KeyPair::from_seed_hex(hex.trim())
        .with_context(|| format!("invalid signing key in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let kid = cmd_keygen(dir.path(), false).unwrap();

        let key = load_signing_key(&dir.path().join(PRIVATE_KEY_FILE)).unwrap();
        assert_eq!(key.public_key().key_id(), kid);

        let public = std::fs::read_to_string(dir.path().join(PUBLIC_KEY_FILE)).unwrap();
        assert_eq!(public.trim(), key.public_key().to_hex());
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let first = cmd_keygen(dir.path(), false).unwrap();
        assert!(cmd_keygen(dir.path(), false).is_err());
        let second = cmd_keygen(dir.path(), true).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_garbage_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRIVATE_KEY_FILE);
        std::fs::write(&path, "not a key").unwrap();
        assert!(load_signing_key(&path).is_err());
    }
}
