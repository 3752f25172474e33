// src/recipe/kitchen/archive.rs

//! Writing package archives
//!
//! A package archive is a compressed tarball of the package root with the
//! metadata files first. The `.MTREE` manifest is produced by `bsdtar`, which
//! is the only external tool involved; everything else is written in-process.

use super::metadata::{METADATA_FILES, MTREE};
use super::sources::{file_url_path, is_remote};
use crate::compression::{CompressionMethod, Encoder};
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::recipe::package::{Recipe, url_basename};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::{Builder as TarBuilder, Header, HeaderMode};
use tracing::{debug, info};
use walkdir::WalkDir;

/// mtree keywords recorded for every entry
const MTREE_OPTIONS: &str = "!all,use-set,type,uid,gid,mode,time,size,md5,sha256,link";

/// Produces the `.MTREE` file of a package root
pub trait ManifestTool {
    fn write_mtree(&self, root: &Path) -> Result<()>;
}

/// [`ManifestTool`] running `bsdtar --format=mtree`
#[derive(Debug, Clone, Default)]
pub struct Bsdtar;

fn top_level_entries(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name != MTREE {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl ManifestTool for Bsdtar {
    fn write_mtree(&self, root: &Path) -> Result<()> {
        let bsdtar = which::which("bsdtar").map_err(|_| {
            Error::NotFound("bsdtar (install it with: pacman -S libarchive)".to_string())
        })?;

        let output = Command::new(bsdtar)
            .env("LANG", "C")
            .current_dir(root)
            .args(["-czf", MTREE, "--format=mtree"])
            .arg(format!("--options={}", MTREE_OPTIONS))
            .args(["--exclude", MTREE])
            .args(top_level_entries(root)?)
            .output()
            .map_err(|e| Error::IoError(format!("Failed to run bsdtar: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: "bsdtar".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!("Wrote {}", root.join(MTREE).display());
        Ok(())
    }
}

/// Timestamp every entry under `root` gets, `SOURCE_DATE_EPOCH` or 0
pub fn reproducible_mtime() -> FileTime {
    let seconds = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    FileTime::from_unix_time(seconds, 0)
}

/// Set the access and modification time of every entry under `root`
pub fn reset_timestamps(root: &Path, mtime: FileTime) -> Result<()> {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to walk {}: {}", root.display(), e))
        })?;
        filetime::set_symlink_file_times(entry.path(), mtime, mtime).map_err(|e| {
            Error::IoError(format!(
                "Failed to set timestamps on {}: {}",
                entry.path().display(),
                e
            ))
        })?;
    }
    Ok(())
}

fn is_top_level_metadata(relative: &Path) -> bool {
    relative.components().count() == 1
        && relative
            .to_str()
            .is_some_and(|name| METADATA_FILES.contains(&name))
}

fn archive_error(dest: &Path, e: std::io::Error) -> Error {
    Error::IoError(format!("Failed to write {}: {}", dest.display(), e))
}

/// Archive `root` into `dest`, metadata files first
pub fn write_package(root: &Path, dest: &Path, method: CompressionMethod) -> Result<()> {
    let file = File::create(dest).map_err(|e| archive_error(dest, e))?;
    let encoder = Encoder::new(BufWriter::new(file), method).map_err(|e| archive_error(dest, e))?;
    let mut archive = TarBuilder::new(encoder);
    archive.follow_symlinks(false);
    archive.mode(HeaderMode::Complete);

    for name in METADATA_FILES {
        let path = root.join(name);
        if path.exists() {
            archive
                .append_path_with_name(&path, name)
                .map_err(|e| archive_error(dest, e))?;
        }
    }

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to walk {}: {}", root.display(), e))
        })?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if is_top_level_metadata(relative) {
            continue;
        }

        if entry.file_type().is_dir() {
            archive
                .append_dir(relative, entry.path())
                .map_err(|e| archive_error(dest, e))?;
        } else {
            archive
                .append_path_with_name(entry.path(), relative)
                .map_err(|e| archive_error(dest, e))?;
        }
    }

    let mut writer = archive
        .into_inner()
        .and_then(Encoder::finish)
        .map_err(|e| archive_error(dest, e))?;
    writer.flush().map_err(|e| archive_error(dest, e))?;

    info!("Wrote package {}", dest.display());
    Ok(())
}

/// File name of a source package
pub fn source_package_name(recipe: &Recipe, arch: &str, method: CompressionMethod) -> String {
    format!("{}.alpmsrc.pkg.tar.{}", recipe.root().nevra(arch), method.suffix())
}

/// Archive the specfile and every local source into `srcpackages/`
pub fn write_source_package(ctx: &BuildContext, recipe: &Recipe) -> Result<PathBuf> {
    let method = ctx.options.compression;
    let dest = ctx
        .area
        .srcpackages
        .join(source_package_name(recipe, &ctx.arch, method));
    ctx.reporter.status(format!(
        "Generating source package {}...",
        dest.file_name().unwrap_or_default().to_string_lossy()
    ));

    let file = File::create(&dest).map_err(|e| archive_error(&dest, e))?;
    let encoder =
        Encoder::new(BufWriter::new(file), method).map_err(|e| archive_error(&dest, e))?;
    let mut archive = TarBuilder::new(encoder);
    archive.mode(HeaderMode::Deterministic);

    let spec_name = ctx
        .options
        .recipe_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.spec", recipe.root().name));
    let mut header = Header::new_gnu();
    header.set_size(recipe.text.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(reproducible_mtime().unix_seconds().max(0) as u64);
    header.set_cksum();
    archive
        .append_data(&mut header, &spec_name, recipe.text.as_bytes())
        .map_err(|e| archive_error(&dest, e))?;

    let root = recipe.root();
    for entry in root.sources.iter().chain(root.patches.iter()) {
        if is_remote(&entry.url) {
            continue;
        }
        let (path, name) = match file_url_path(&entry.url) {
            Some(path) => (path, url_basename(&entry.url)),
            None => (ctx.area.sources.join(&entry.url), entry.url.clone()),
        };
        archive
            .append_path_with_name(&path, &name)
            .map_err(|e| archive_error(&dest, e))?;
        debug!("Added local source {}", entry.url);
    }

    let mut writer = archive
        .into_inner()
        .and_then(Encoder::finish)
        .map_err(|e| archive_error(&dest, e))?;
    writer.flush().map_err(|e| archive_error(&dest, e))?;

    info!("Wrote source package {}", dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entries(archive: &Path) -> Vec<String> {
        let decoder = zstd::Decoder::new(File::open(archive).unwrap()).unwrap();
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_metadata_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("package");
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/foo"), b"#!/bin/sh\n").unwrap();
        fs::write(root.join(".PKGINFO"), b"pkgname = foo\n").unwrap();
        fs::write(root.join(".INSTALL"), b"").unwrap();

        let dest = dir.path().join("foo-1.0-1-x86_64.pkg.tar.zst");
        write_package(&root, &dest, CompressionMethod::Zstd).unwrap();

        let names = entries(&dest);
        assert_eq!(names[0], ".PKGINFO");
        assert_eq!(names[1], ".INSTALL");
        assert!(names.contains(&"usr/bin/foo".to_string()));
        assert_eq!(names.iter().filter(|n| *n == ".PKGINFO").count(), 1);
    }

    #[test]
    fn test_reset_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b"), b"x").unwrap();

        reset_timestamps(dir.path(), FileTime::from_unix_time(0, 0)).unwrap();

        for path in [dir.path().join("a"), dir.path().join("a/b")] {
            let meta = fs::metadata(&path).unwrap();
            assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 0);
        }
    }

    #[test]
    fn test_archive_contents_readable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("package");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("hello.txt"), b"hello").unwrap();

        let dest = dir.path().join("out.pkg.tar.zst");
        write_package(&root, &dest, CompressionMethod::Zstd).unwrap();

        let decoder = zstd::Decoder::new(File::open(&dest).unwrap()).unwrap();
        let mut tar = tar::Archive::new(decoder);
        let mut entry = tar.entries().unwrap().next().unwrap().unwrap();
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
    }
}
