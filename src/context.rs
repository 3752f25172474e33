// src/context.rs

//! Per-run state shared by the parser, linter and build stages
//!
//! A [`BuildContext`] is created once per process and passed explicitly to
//! every component. Both the unprivileged and the fakeroot phase build their
//! own context from the same options.

use crate::config::BuildOptions;
use crate::diagnostics::Reporter;
use crate::error::{Error, Result};
use crate::packages::{PackageIndex, PacmanIndex, StaticIndex, pacman_query};
use crate::recipe::lint::Linter;
use crate::recipe::macros::MacroTable;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Architecture name of the build host, in pacman's spelling
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i686",
        "arm" => "armv7h",
        other => other,
    }
}

/// Directory layout under the working area root
///
/// ```text
/// <root>/
///   sources/            downloaded and local sources
///   build/              unpacked sources, build commands run here
///   package/            install staging root, main package contents
///   subpackages/<name>/ contents relocated for each subpackage
///   packages/           finished .pkg.tar.* archives
///   srcpackages/        finished .alpmsrc.pkg.tar.* archives
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingArea {
    pub root: PathBuf,
    pub sources: PathBuf,
    pub build: PathBuf,
    pub package: PathBuf,
    pub subpackages: PathBuf,
    pub packages: PathBuf,
    pub srcpackages: PathBuf,
}

impl WorkingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            sources: root.join("sources"),
            build: root.join("build"),
            package: root.join("package"),
            subpackages: root.join("subpackages"),
            packages: root.join("packages"),
            srcpackages: root.join("srcpackages"),
            root,
        }
    }

    /// `$HOME/alpmbuild`
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| {
                Error::Environment("Could not determine the home directory".to_string())
            })?;
        Ok(Self::new(home.join("alpmbuild")))
    }

    /// Staging root for a subpackage
    pub fn subpackage_root(&self, name: &str) -> PathBuf {
        self.subpackages.join(name)
    }

    /// Create every directory of the layout
    pub fn create(&self) -> Result<()> {
        for dir in [
            &self.root,
            &self.sources,
            &self.build,
            &self.package,
            &self.subpackages,
            &self.packages,
            &self.srcpackages,
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                Error::IoError(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Empty the build and staging trees, keeping cached sources and results
    pub fn reset_build_trees(&self) -> Result<()> {
        for dir in [&self.build, &self.package, &self.subpackages] {
            remove_dir_if_exists(dir)?;
        }
        self.create()
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        debug!("Removing {}", dir.display());
        fs::remove_dir_all(dir)
            .map_err(|e| Error::IoError(format!("Failed to remove {}: {}", dir.display(), e)))?;
    }
    Ok(())
}

/// State for one alpmbuild process
pub struct BuildContext {
    pub options: BuildOptions,
    pub area: WorkingArea,
    pub macros: MacroTable,
    pub reporter: Reporter,
    pub linter: Linter,
    /// Target architecture, normally the host's
    pub arch: String,
}

impl BuildContext {
    /// Build a context from options, seeding the macro table
    ///
    /// Uses the host's pacman for linting when dependency checks are on and
    /// pacman is available.
    pub fn new(mut options: BuildOptions) -> Result<Self> {
        let area = match &options.work_dir {
            Some(dir) => WorkingArea::new(dir),
            None => WorkingArea::from_home()?,
        };

        if options.check_deps && !options.privileged && !pacman_query::is_pacman_available() {
            warn!("pacman not found, dependency checks are disabled");
            options.check_deps = false;
        }

        let index: Box<dyn PackageIndex> = if options.check_deps && !options.privileged {
            Box::new(PacmanIndex::new())
        } else {
            debug!("Package index disabled, existence lints are skipped");
            Box::new(StaticIndex::new())
        };

        Self::with_parts(options, area, index)
    }

    /// Build a context with an explicit working area and package index
    pub fn with_parts(
        options: BuildOptions,
        area: WorkingArea,
        index: Box<dyn PackageIndex>,
    ) -> Result<Self> {
        let arch = host_arch().to_string();

        let mut macros = MacroTable::with_builtins(&area, &arch);
        for (name, value) in &options.config_macros {
            macros.define(name, value);
        }
        for definition in &options.macro_definitions {
            macros.define_from_cli(definition)?;
        }

        let reporter = Reporter::new(options.color, options.privileged);

        Ok(Self {
            options,
            area,
            macros,
            reporter,
            linter: Linter::new(index),
            arch,
        })
    }

    /// Replace the reporter, e.g. with [`Reporter::capture`] in tests
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Whether existence lints and host dependency checks should run
    pub fn checks_host_packages(&self) -> bool {
        self.options.check_deps && !self.options.privileged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let area = WorkingArea::new("/tmp/ab");
        assert_eq!(area.sources, PathBuf::from("/tmp/ab/sources"));
        assert_eq!(
            area.subpackage_root("foo-devel"),
            PathBuf::from("/tmp/ab/subpackages/foo-devel")
        );
    }

    #[test]
    fn test_reset_keeps_sources() {
        let dir = tempfile::tempdir().unwrap();
        let area = WorkingArea::new(dir.path());
        area.create().unwrap();
        fs::write(area.sources.join("foo.tar.gz"), b"x").unwrap();
        fs::write(area.package.join("stale"), b"x").unwrap();

        area.reset_build_trees().unwrap();
        assert!(area.sources.join("foo.tar.gz").exists());
        assert!(!area.package.join("stale").exists());
        assert!(area.package.is_dir());
    }

    #[test]
    fn test_context_applies_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::for_recipe("x.spec");
        options.macro_definitions.push("with_docs 1".to_string());
        options.config_macros.insert("_vendor".to_string(), "example".to_string());
        let ctx = BuildContext::with_parts(
            options,
            WorkingArea::new(dir.path()),
            Box::new(StaticIndex::new()),
        )
        .unwrap();
        assert_eq!(ctx.macros.get("with_docs"), Some("1"));
        assert_eq!(ctx.macros.get("_vendor"), Some("example"));
        assert_eq!(ctx.arch, host_arch());
    }
}
