// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use alpmbuild::config::BuildOptions;
use alpmbuild::context::{BuildContext, WorkingArea};
use alpmbuild::diagnostics::Reporter;
use alpmbuild::packages::StaticIndex;
use alpmbuild::recipe::Recipe;
use alpmbuild::recipe::kitchen::ManifestTool;
use alpmbuild::{Result, parse_recipe};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Header shared by most test specfiles
pub const HEADER: &str = "Name: foo\nVersion: 1.0\nRelease: 1\nSummary: Test package\nLicense: MIT\n";

/// Create a context whose working area lives in a fresh temp dir.
///
/// Returns (TempDir, BuildContext) - keep the TempDir alive to prevent cleanup.
pub fn setup_context(options: BuildOptions) -> (TempDir, BuildContext) {
    setup_context_with_index(options, StaticIndex::new())
}

pub fn setup_context_with_index(
    options: BuildOptions,
    index: StaticIndex,
) -> (TempDir, BuildContext) {
    let temp_dir = tempfile::tempdir().unwrap();
    let area = WorkingArea::new(temp_dir.path().join("alpmbuild"));
    area.create().unwrap();

    let ctx = BuildContext::with_parts(options, area, Box::new(index))
        .unwrap()
        .with_reporter(Reporter::capture());
    (temp_dir, ctx)
}

/// Parse `body` appended to [`HEADER`]
pub fn parse_with_header(ctx: &BuildContext, body: &str) -> Result<Recipe> {
    parse_recipe(&format!("{}{}", HEADER, body), ctx)
}

/// Write `content` to `rel` under the staging root
pub fn stage_file(ctx: &BuildContext, rel: &str, content: &str) {
    let path = ctx.area.package.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Manifest tool that writes an empty `.MTREE` without bsdtar
pub struct EmptyManifest;

impl ManifestTool for EmptyManifest {
    fn write_mtree(&self, root: &Path) -> Result<()> {
        fs::write(root.join(".MTREE"), b"")?;
        Ok(())
    }
}
