// src/recipe/kitchen/privilege.rs

//! Re-running alpmbuild with simulated root privileges
//!
//! Files in a package must be owned by root. The unprivileged phase
//! re-executes the current binary under a helper such as `fakeroot`, which
//! then installs and assembles the packages.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Flag marking the privileged re-execution
pub const PRIVILEGED_FLAG: &str = "--fakeroot";

/// Runs a program with elevated (or simulated) privileges
pub trait PrivilegeHelper {
    /// Run `program` with `args` and return its exit status
    fn run(&self, program: &Path, args: &[OsString]) -> Result<i32>;
}

/// [`PrivilegeHelper`] using `fakeroot`
#[derive(Debug, Clone, Default)]
pub struct Fakeroot;

impl PrivilegeHelper for Fakeroot {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<i32> {
        let fakeroot = which::which("fakeroot").map_err(|_| {
            Error::NotFound("fakeroot (install it with: pacman -S fakeroot)".to_string())
        })?;

        info!("Re-executing {} under {}", program.display(), fakeroot.display());
        let status = Command::new(&fakeroot)
            .arg("--")
            .arg(program)
            .args(args)
            .status()
            .map_err(|e| Error::IoError(format!("Failed to run fakeroot: {}", e)))?;

        // Killed by a signal
        Ok(status.code().unwrap_or(1))
    }
}

/// Arguments for the privileged re-execution
pub fn privileged_args(original: &[OsString]) -> Vec<OsString> {
    let mut args: Vec<OsString> = original
        .iter()
        .filter(|a| a.as_os_str() != PRIVILEGED_FLAG)
        .cloned()
        .collect();
    args.push(OsString::from(PRIVILEGED_FLAG));
    args
}
