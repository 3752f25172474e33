// src/recipe/kitchen/signature.rs

//! Detached GPG signature verification for sources
//!
//! A source declared with `signed <url>` is verified against its detached
//! signature. Listed keys that are missing from the local keyring are
//! fetched from the listed keyservers first, and when keys are listed the
//! signature must come from one of them.

use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::{Error, Result};
use crate::recipe::package::SourceEntry;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Verifies detached signatures against a keyring
pub trait SignatureVerifier {
    /// Whether the key is present locally
    fn has_key(&self, key: &str) -> bool;

    /// Fetch a key, from `keyserver` or the tool's default
    fn import_key(&self, key: &str, keyserver: Option<&str>) -> Result<()>;

    /// Verify `signature` over `file`, returning the signer's fingerprint
    fn verify(&self, file: &Path, signature: &Path) -> Result<Option<String>>;
}

/// [`SignatureVerifier`] backed by the `gpg` binary
#[derive(Debug, Clone, Default)]
pub struct GpgVerifier;

/// Fingerprint from a `[GNUPG:] VALIDSIG <fpr> ...` status line
fn parse_validsig(status: &str) -> Option<String> {
    status.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("[GNUPG:]") || fields.next() != Some("VALIDSIG") {
            return None;
        }
        fields.next().map(str::to_string)
    })
}

impl SignatureVerifier for GpgVerifier {
    fn has_key(&self, key: &str) -> bool {
        Command::new("gpg")
            .args(["--batch", "--list-keys", key])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn import_key(&self, key: &str, keyserver: Option<&str>) -> Result<()> {
        let mut cmd = Command::new("gpg");
        cmd.arg("--batch");
        if let Some(server) = keyserver {
            cmd.args(["--keyserver", server]);
        }
        let output = cmd
            .args(["--recv-keys", key])
            .output()
            .map_err(|e| {
                Error::Environment(format!("Failed to run gpg: {}. Is gnupg installed?", e))
            })?;

        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: "gpg --recv-keys".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn verify(&self, file: &Path, signature: &Path) -> Result<Option<String>> {
        let output = Command::new("gpg")
            .args(["--batch", "--status-fd", "1", "--verify"])
            .arg(signature)
            .arg(file)
            .output()
            .map_err(|e| {
                Error::Environment(format!("Failed to run gpg: {}. Is gnupg installed?", e))
            })?;

        if !output.status.success() {
            return Err(Error::GpgVerificationFailed(format!(
                "{}: {}",
                file.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_validsig(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Whether a listed key id (short, long or full) names this fingerprint
fn key_matches(listed: &str, fingerprint: &str) -> bool {
    let listed = listed.trim_start_matches("0x").replace(' ', "").to_ascii_uppercase();
    !listed.is_empty() && fingerprint.to_ascii_uppercase().ends_with(&listed)
}

/// Verify a source file against its downloaded signature
pub fn verify_source(
    verifier: &dyn SignatureVerifier,
    entry: &SourceEntry,
    file: &Path,
    signature: &Path,
    reporter: &Reporter,
) -> Result<()> {
    for key in &entry.gpg_keys {
        if verifier.has_key(key) {
            continue;
        }

        let servers: Vec<Option<&str>> = if entry.keyservers.is_empty() {
            vec![None]
        } else {
            entry.keyservers.iter().map(|s| Some(s.as_str())).collect()
        };

        let imported = servers.into_iter().any(|server| {
            info!("Importing key {} from {}", key, server.unwrap_or("default keyserver"));
            match verifier.import_key(key, server) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Key import failed: {}", e);
                    false
                }
            }
        });
        if !imported {
            reporter.warn(
                Diagnostic::warning(format!("Could not import GPG key {}", key))
                    .with_help("Import it manually with: gpg --recv-keys <key>"),
            );
        }
    }

    let signer = verifier.verify(file, signature)?;

    if !entry.gpg_keys.is_empty() {
        let trusted = signer
            .as_deref()
            .is_some_and(|fpr| entry.gpg_keys.iter().any(|k| key_matches(k, fpr)));
        if !trusted {
            return Err(Error::GpgVerificationFailed(format!(
                "{} is not signed by any of: {}",
                file.display(),
                entry.gpg_keys.join(", ")
            )));
        }
    }

    info!("GPG signature verified for {}", file.display());
    Ok(())
}
