// src/packages/pacman_query.rs

//! Query pacman's sync and local databases
//!
//! This module shells out to the `pacman` command-line tool. Sync database
//! listings are used for name linting; `pacman -T` answers whether a
//! dependency, including its version constraint, is satisfied locally.

use crate::error::{Error, Result};
use crate::packages::PackageIndex;
use std::process::Command;
use tracing::debug;

/// [`PackageIndex`] backed by the `pacman` binary
#[derive(Debug, Clone, Default)]
pub struct PacmanIndex;

impl PacmanIndex {
    pub fn new() -> Self {
        Self
    }
}

fn run_pacman(args: &[&str]) -> Result<String> {
    let output = Command::new("pacman")
        .args(args)
        .output()
        .map_err(|e| {
            Error::Environment(format!("Failed to run pacman: {}. Is pacman installed?", e))
        })?;

    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool: format!("pacman {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `pacman -Sl` output ("repo name version [installed]") into names
fn parse_sync_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

/// Parse `pacman -Sg` output (one group per line) into names
fn parse_group_list(output: &str) -> Vec<String> {
    let mut groups: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect();
    groups.sort();
    groups.dedup();
    groups
}

impl PackageIndex for PacmanIndex {
    fn package_names(&self) -> Result<Vec<String>> {
        debug!("Listing sync repository packages");
        let packages = parse_sync_list(&run_pacman(&["-Sl"])?);
        debug!("Found {} packages in sync repositories", packages.len());
        Ok(packages)
    }

    fn group_names(&self) -> Result<Vec<String>> {
        debug!("Listing sync repository groups");
        Ok(parse_group_list(&run_pacman(&["-Sg"])?))
    }

    fn is_installed(&self, dependency: &str) -> bool {
        // -T prints the unsatisfied dependencies and exits non-zero
        Command::new("pacman")
            .args(["-T", dependency])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// Check if pacman is available on this system
pub fn is_pacman_available() -> bool {
    Command::new("pacman")
        .args(["--version"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
