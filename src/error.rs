// src/error.rs

//! Error types for alpmbuild
//!
//! Every failure in the pipeline is fatal. The variants mirror the classes a
//! build can fail in: recipe parsing, source verification, script execution,
//! external tools and the environment.

use crate::diagnostics::Diagnostic;
use std::io;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unrecognized specfile line
    #[error("{0}")]
    Parse(Box<Diagnostic>),

    #[error("{algorithm} checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("GPG signature verification failed: {0}")]
    GpgVerificationFailed(String),

    #[error("Package {package} cannot be built on {host} (supported: {supported})")]
    ArchitectureMismatch {
        package: String,
        host: String,
        supported: String,
    },

    #[error("File {path} in package {package} is not listed in %files")]
    FileNotListed { package: String, path: String },

    #[error("Package {package} has a path with a newline: {path}")]
    InvalidFileName { package: String, path: String },

    #[error("Missing build dependencies: {0}")]
    MissingDependencies(String),

    #[error("{phase} script failed with exit code {}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ScriptFailed { phase: String, code: Option<i32> },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a parse error from a diagnostic
    pub fn parse(diagnostic: Diagnostic) -> Self {
        Self::Parse(Box::new(diagnostic))
    }

    /// The diagnostic attached to a parse error, if any
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Parse(diag) => Some(diag),
            _ => None,
        }
    }
}
