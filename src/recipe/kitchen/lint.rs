// src/recipe/kitchen/lint.rs

//! Checks over a finished package root before it is archived

use super::files::collect_files;
use super::metadata::METADATA_FILES;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Lint the package rooted at `root`
///
/// Files referencing `build_path` and dot-files at the top level are warned
/// about. A path containing a newline is an [`Error::InvalidFileName`].
pub fn lint_package(
    package: &str,
    root: &Path,
    build_path: &Path,
    reporter: &Reporter,
) -> Result<()> {
    debug!("Linting package {} in {}", package, root.display());
    let needle = build_path.to_string_lossy();

    for relative in collect_files(root)? {
        let shown = format!("/{}", relative.display());

        if relative.to_string_lossy().contains('\n') {
            return Err(Error::InvalidFileName {
                package: package.to_string(),
                path: shown.escape_debug().to_string(),
            });
        }

        let top_level = relative.components().count() == 1;
        if top_level {
            let name = relative.to_string_lossy();
            if METADATA_FILES.contains(&name.as_ref()) {
                continue;
            }
            if name.starts_with('.') {
                reporter.warn(Diagnostic::warning(format!(
                    "Package {} has a dotfile in its root: {}",
                    package, shown
                )));
            }
        }

        let path = root.join(&relative);
        if fs::symlink_metadata(&path)?.file_type().is_symlink() {
            continue;
        }
        let contents = fs::read(&path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        if contains(&contents, needle.as_bytes()) {
            reporter.warn(
                Diagnostic::warning(format!(
                    "Package {} has a reference to the build directory in {}",
                    package, shown
                ))
                .with_help(format!("{} will not exist on the installed system", needle)),
            );
        }
    }

    // Directory names
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = entry
            .map_err(|e| Error::IoError(format!("Failed to walk {}: {}", root.display(), e)))?;
        if entry.file_type().is_dir() && entry.file_name().to_string_lossy().contains('\n') {
            let shown = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .display()
                .to_string();
            return Err(Error::InvalidFileName {
                package: package.to_string(),
                path: format!("/{}", shown).escape_debug().to_string(),
            });
        }
    }

    Ok(())
}
