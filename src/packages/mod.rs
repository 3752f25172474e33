// src/packages/mod.rs

//! Host package database access
//!
//! The linter asks the host which packages and groups exist, and the build
//! orchestrator asks whether build dependencies are installed. Both go
//! through [`PackageIndex`] so tests can supply a fixed index.

pub mod pacman_query;

use crate::error::Result;
use std::collections::BTreeSet;

pub use pacman_query::PacmanIndex;

/// A dependency split into its package name and version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub name: String,
    /// Constraint including the operator, e.g. `>=1.0`
    pub constraint: Option<String>,
}

impl DependencyInfo {
    /// Parse a dependency string like `glibc>=2.17`
    pub fn parse(dep: &str) -> Self {
        // Format: "package[op version]" (no spaces)
        if let Some(pos) = dep.find(['>', '<', '=']) {
            let constraint = &dep[pos..];
            Self {
                name: dep[..pos].to_string(),
                constraint: (!constraint.is_empty()).then(|| constraint.to_string()),
            }
        } else {
            Self {
                name: dep.to_string(),
                constraint: None,
            }
        }
    }
}

/// Read access to the host's package repositories
pub trait PackageIndex {
    /// Names of every package in the sync repositories
    fn package_names(&self) -> Result<Vec<String>>;

    /// Names of every package group in the sync repositories
    fn group_names(&self) -> Result<Vec<String>>;

    /// Whether `dependency` (possibly version-constrained) is satisfied locally
    fn is_installed(&self, dependency: &str) -> bool;
}

/// A fixed in-memory index
///
/// Used when dependency checks are disabled, and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIndex {
    packages: Vec<String>,
    groups: Vec<String>,
    installed: BTreeSet<String>,
}

impl StaticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_groups<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_installed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.installed.extend(names.into_iter().map(Into::into));
        self
    }
}

impl PackageIndex for StaticIndex {
    fn package_names(&self) -> Result<Vec<String>> {
        Ok(self.packages.clone())
    }

    fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.groups.clone())
    }

    fn is_installed(&self, dependency: &str) -> bool {
        let dep = DependencyInfo::parse(dependency);
        self.installed.contains(&dep.name)
    }
}
