// src/config.rs

//! Build options and the optional user configuration file
//!
//! Options come from three layers, later ones winning:
//! built-in defaults, `$XDG_CONFIG_HOME/alpmbuild/config.toml`, and the
//! command line.

use crate::compression::CompressionMethod;
use crate::diagnostics::ColorMode;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Packager string used when none is configured
pub const DEFAULT_PACKAGER: &str = "Unknown Packager";

/// Everything that influences one alpmbuild run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Specfile to build
    pub recipe_path: PathBuf,
    /// Fail when staged files are not listed in `%files`
    pub strict_files: bool,
    /// Send build script output to /dev/null
    pub hide_command_output: bool,
    pub color: ColorMode,
    /// Also produce a `.alpmsrc` source package
    pub generate_source_package: bool,
    /// Check dependencies against the host package database
    pub check_deps: bool,
    pub compression: CompressionMethod,
    /// `-D "name value"` definitions, applied after the built-in macros
    pub macro_definitions: Vec<String>,
    /// Macros from the user configuration file
    pub config_macros: BTreeMap<String, String>,
    /// Running as the fakeroot re-exec
    pub privileged: bool,
    pub packager: String,
    /// Override for the working area root
    pub work_dir: Option<PathBuf>,
    /// Arguments to forward when re-executing under fakeroot
    pub reexec_args: Vec<OsString>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            recipe_path: PathBuf::new(),
            strict_files: false,
            hide_command_output: false,
            color: ColorMode::Auto,
            generate_source_package: true,
            check_deps: true,
            compression: CompressionMethod::default(),
            macro_definitions: Vec::new(),
            config_macros: BTreeMap::new(),
            privileged: false,
            packager: DEFAULT_PACKAGER.to_string(),
            work_dir: None,
            reexec_args: Vec::new(),
        }
    }
}

impl BuildOptions {
    /// Options for building `path` with defaults everywhere else
    pub fn for_recipe(path: impl Into<PathBuf>) -> Self {
        Self {
            recipe_path: path.into(),
            ..Self::default()
        }
    }

    /// Layer a user configuration file over these options
    pub fn apply_user_config(&mut self, config: UserConfig) {
        if let Some(packager) = config.packager {
            self.packager = packager;
        }
        if let Some(compression) = config.compression {
            self.compression = compression;
        }
        if let Some(strict) = config.strict_files {
            self.strict_files = strict;
        }
        if let Some(dir) = config.work_dir {
            self.work_dir = Some(dir);
        }
        self.config_macros.extend(config.macros);
    }
}

/// Contents of `config.toml`
///
/// ```toml
/// packager = "Jane Doe <jane@example.org>"
/// compression = "xz"
/// strict_files = true
///
/// [macros]
/// _vendor = "example"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub packager: Option<String>,
    pub compression: Option<CompressionMethod>,
    pub strict_files: Option<bool>,
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
}

impl UserConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("alpmbuild").join("config.toml"))
    }

    /// Parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load the default configuration file if it exists
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!("Loading user configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
