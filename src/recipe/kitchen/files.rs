// src/recipe/kitchen/files.rs

//! `%files` patterns over staging trees
//!
//! Patterns are shell-style globs where `*` matches any sequence, including
//! `/`, and everything else is literal. A pattern owns the path it names and
//! everything beneath it, so listing a directory claims its contents.

use super::metadata::METADATA_FILES;
use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Convert a `%files` glob to an anchored regex over root-relative paths
pub fn glob_to_regex(pattern: &str) -> String {
    let trimmed = pattern.trim().trim_start_matches('/').trim_end_matches('/');
    let body = trimmed
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}(/.*)?$", body)
}

/// Compiled set of `%files` patterns
#[derive(Debug, Clone, Default)]
pub struct FileMatcher {
    patterns: Vec<Regex>,
}

impl FileMatcher {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                Regex::new(&glob_to_regex(p))
                    .map_err(|e| Error::Config(format!("Invalid file pattern {}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether a root-relative path is claimed by any pattern
    pub fn matches(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.patterns.iter().any(|re| re.is_match(&path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Files and symlinks under `root`, relative to it and sorted
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to walk {}: {}", root.display(), e))
        })?;

        // Directories are implied by their children
        if entry.file_type().is_dir() {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}

fn is_metadata(relative: &Path) -> bool {
    relative.components().count() == 1
        && relative
            .to_str()
            .is_some_and(|name| METADATA_FILES.contains(&name))
}

/// Move every file under `from` claimed by `matcher` to the same place under `to`
///
/// Directories left empty by the move are removed. Returns the number of
/// files moved.
pub fn relocate(from: &Path, to: &Path, matcher: &FileMatcher) -> Result<usize> {
    let mut moved = 0;

    for relative in collect_files(from)? {
        if is_metadata(&relative) || !matcher.matches(&relative) {
            continue;
        }

        let source = from.join(&relative);
        let dest = to.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::rename(&source, &dest).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                dest.display(),
                e
            ))
        })?;
        debug!("Relocated {}", relative.display());
        moved += 1;

        prune_empty_parents(from, &source);
    }

    Ok(moved)
}

fn prune_empty_parents(root: &Path, removed: &Path) {
    let mut dir = removed.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // Fails when the directory still has entries
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

/// Non-metadata files under `root` that no pattern claims
pub fn unlisted_files(root: &Path, matcher: &FileMatcher) -> Result<Vec<PathBuf>> {
    Ok(collect_files(root)?
        .into_iter()
        .filter(|relative| !is_metadata(relative) && !matcher.matches(relative))
        .collect())
}

/// Fail with [`Error::FileNotListed`] on the first unclaimed file
pub fn verify_coverage(package: &str, root: &Path, matcher: &FileMatcher) -> Result<()> {
    if let Some(path) = unlisted_files(root, matcher)?.into_iter().next() {
        return Err(Error::FileNotListed {
            package: package.to_string(),
            path: format!("/{}", path.display()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("/usr/bin/foo"), r"^usr/bin/foo(/.*)?$");
        assert_eq!(glob_to_regex("/usr/lib/*.so.*"), r"^usr/lib/.*\.so\..*(/.*)?$");
    }

    #[test]
    fn test_matcher() {
        let matcher = FileMatcher::new(["/usr/include", "/usr/lib/*.a", "/etc/foo.conf"]).unwrap();
        assert!(matcher.matches(Path::new("usr/include/foo.h")));
        assert!(matcher.matches(Path::new("usr/include/foo/bar.h")));
        assert!(matcher.matches(Path::new("usr/lib/libfoo.a")));
        assert!(matcher.matches(Path::new("etc/foo.conf")));
        assert!(!matcher.matches(Path::new("usr/includes/foo.h")));
        assert!(!matcher.matches(Path::new("usr/lib/libfoo.so")));
        assert!(!matcher.matches(Path::new("etc/fooXconf")));
    }

    #[test]
    fn test_relocate_moves_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("package");
        let to = dir.path().join("sub");
        touch(&from, "usr/bin/foo");
        touch(&from, "usr/include/foo/a.h");
        touch(&from, "usr/include/foo/b.h");
        touch(&from, ".PKGINFO");

        let matcher = FileMatcher::new(["/usr/include"]).unwrap();
        assert_eq!(relocate(&from, &to, &matcher).unwrap(), 2);

        assert!(to.join("usr/include/foo/a.h").exists());
        assert!(!from.join("usr/include").exists());
        assert!(from.join("usr/bin/foo").exists());
        assert!(from.join(".PKGINFO").exists());
    }

    #[test]
    fn test_coverage() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "usr/bin/foo");
        touch(dir.path(), "usr/share/doc/foo/README");
        touch(dir.path(), ".PKGINFO");

        let matcher = FileMatcher::new(["/usr/bin/foo"]).unwrap();
        let unlisted = unlisted_files(dir.path(), &matcher).unwrap();
        assert_eq!(unlisted, vec![PathBuf::from("usr/share/doc/foo/README")]);

        let err = verify_coverage("foo", dir.path(), &matcher).unwrap_err();
        assert!(err.to_string().contains("/usr/share/doc/foo/README"));

        let all = FileMatcher::new(["/usr"]).unwrap();
        verify_coverage("foo", dir.path(), &all).unwrap();
    }
}
