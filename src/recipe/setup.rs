// src/recipe/setup.rs

//! `%setup` synthesis
//!
//! `%setup` is not a real macro: it becomes a shell script that recreates
//! the build subdirectory and unpacks the package's sources into it.
//!
//! Flags:
//! - `-c` create the subdirectory and unpack inside it
//! - `-D` do not delete the subdirectory first
//! - `-q` quiet extraction
//! - `-T` only unpack the first source
//! - `-n <dir>` subdirectory name (default `%{buildsubdir}`)

use crate::recipe::package::PackageDefinition;
use tracing::debug;

/// Parsed `%setup` flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupFlags {
    pub create_dir: bool,
    pub keep_dir: bool,
    pub quiet: bool,
    pub skip_default: bool,
    pub dir_name: Option<String>,
}

impl SetupFlags {
    /// Parse a line whose first token is `%setup`
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("%setup") {
            return None;
        }

        let mut flags = Self::default();
        while let Some(token) = tokens.next() {
            match token {
                "-c" => flags.create_dir = true,
                "-D" => flags.keep_dir = true,
                "-q" => flags.quiet = true,
                "-T" => flags.skip_default = true,
                "-n" => flags.dir_name = tokens.next().map(str::to_string),
                other => debug!("Ignoring unsupported %setup flag {}", other),
            }
        }
        Some(flags)
    }
}

/// Archive families %setup knows how to unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Zip,
}

const TAR_SUFFIXES: &[&str] = &[
    ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tbz", ".tar.xz", ".txz", ".tar.zst",
    ".tzst", ".tar.lz", ".tar.lzma",
];
const ZIP_SUFFIXES: &[&str] = &[".zip", ".jar"];

impl ArchiveKind {
    /// Classify a file by its name
    pub fn detect(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if TAR_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            Some(Self::Tar)
        } else if ZIP_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            Some(Self::Zip)
        } else {
            None
        }
    }

    fn command(self, path: &str, quiet: bool) -> String {
        match (self, quiet) {
            (Self::Tar, true) => format!("tar -xf {}", path),
            (Self::Tar, false) => format!("tar -xvf {}", path),
            (Self::Zip, true) => format!("unzip -qo {}", path),
            (Self::Zip, false) => format!("unzip -o {}", path),
        }
    }
}

/// Single-quote a string for sh, keeping `%{...}` references expandable
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Build the shell script a `%setup` line stands for
///
/// Paths are written with `%{_builddir}` so the result still needs macro
/// expansion.
pub fn synthesize(flags: &SetupFlags, pkg: &PackageDefinition) -> String {
    let dir = flags
        .dir_name
        .clone()
        .unwrap_or_else(|| "%{buildsubdir}".to_string());
    let quoted_dir = shell_quote(&dir);

    let mut lines = vec!["cd '%{_builddir}'".to_string()];
    if !flags.keep_dir {
        lines.push(format!("rm -rf {}", quoted_dir));
    }
    if flags.create_dir {
        lines.push(format!("mkdir -p {}", quoted_dir));
        lines.push(format!("cd {}", quoted_dir));
    }

    for (index, source) in pkg.sources.iter().enumerate() {
        if index > 0 && flags.skip_default {
            break;
        }
        let name = source.local_name();
        match ArchiveKind::detect(&name) {
            Some(kind) => {
                let path = shell_quote(&format!("%{{_builddir}}/{}", name));
                lines.push(kind.command(&path, flags.quiet));
            }
            None => debug!("%setup: {} is not an archive, leaving it in place", name),
        }
    }

    lines.push(format!("cd {}", shell_quote(&format!("%{{_builddir}}/{}", dir))));
    lines.join("\n")
}
