// src/recipe/kitchen/plate.rs

//! Package assembly
//!
//! After the install script has filled the staging root, each subpackage
//! takes the files its `%files` patterns claim into its own root. Then every
//! package root is linted, gets its metadata files and is archived into
//! `packages/`. Subpackages are assembled in declaration order, the main
//! package last.

use super::archive::{ManifestTool, reproducible_mtime, reset_timestamps, write_package};
use super::files::{FileMatcher, collect_files, relocate, verify_coverage};
use super::lint::lint_package;
use super::metadata::write_metadata;
use crate::compression::CompressionMethod;
use crate::context::BuildContext;
use crate::error::Result;
use crate::recipe::package::{PackageDefinition, PackageId, Recipe};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `<nevra>.pkg.tar.<suffix>`
pub fn package_file_name(
    pkg: &PackageDefinition,
    arch: &str,
    method: CompressionMethod,
) -> String {
    format!("{}.pkg.tar.{}", pkg.nevra(arch), method.suffix())
}

/// Move a subpackage's files out of the staging root into its own root
///
/// Returns the number of files moved.
pub fn split_subpackage(ctx: &BuildContext, recipe: &mut Recipe, id: PackageId) -> Result<usize> {
    recipe.packages.resolve_inherited(id);
    let pkg = recipe.packages.get(id);

    let root = ctx.area.subpackage_root(&pkg.name);
    fs::create_dir_all(&root)?;

    let matcher = FileMatcher::new(pkg.file_patterns())?;
    let moved = relocate(&ctx.area.package, &root, &matcher)?;
    debug!("Moved {} files into {}", moved, root.display());
    Ok(moved)
}

/// Lint, describe and archive one package root
pub fn assemble_package(
    ctx: &BuildContext,
    recipe: &Recipe,
    id: PackageId,
    root: &Path,
    manifest: &dyn ManifestTool,
) -> Result<PathBuf> {
    let tree = &recipe.packages;
    let pkg = tree.get(id);
    let parent = tree.parent(id);
    let nevra = pkg.nevra(&ctx.arch);

    ctx.reporter.status(format!("Assembling {}...", nevra));
    fs::create_dir_all(root)?;

    lint_package(&pkg.name, root, &ctx.area.root, &ctx.reporter)?;

    write_metadata(ctx, &recipe.text, pkg, parent, root)?;

    // mtree records times, so they are reset before and after it is written
    let mtime = reproducible_mtime();
    reset_timestamps(root, mtime)?;
    manifest.write_mtree(root)?;

    if ctx.options.strict_files && recipe.file_check {
        let patterns = pkg.file_patterns().chain(
            pkg.subpackages
                .iter()
                .flat_map(|sub| tree.get(*sub).file_patterns()),
        );
        verify_coverage(&pkg.name, root, &FileMatcher::new(patterns)?)?;
    }

    reset_timestamps(root, mtime)?;

    let dest = ctx
        .area
        .packages
        .join(package_file_name(pkg, &ctx.arch, ctx.options.compression));
    ctx.reporter.status(format!(
        "Compressing {} with {}...",
        nevra, ctx.options.compression
    ));
    write_package(root, &dest, ctx.options.compression)?;

    Ok(dest)
}

/// Split and assemble every package of the recipe
///
/// Returns the archives written, subpackages first.
pub fn assemble_all(
    ctx: &BuildContext,
    recipe: &mut Recipe,
    manifest: &dyn ManifestTool,
) -> Result<Vec<PathBuf>> {
    let staged = collect_files(&ctx.area.package)?.len();
    debug!("{} files staged", staged);

    let mut archives = Vec::new();
    for id in recipe.packages.subpackage_ids() {
        let moved = split_subpackage(ctx, recipe, id)?;
        let pkg = recipe.packages.get(id);
        info!("Subpackage {} takes {} files", pkg.name, moved);

        let root = ctx.area.subpackage_root(&pkg.name);
        archives.push(assemble_package(ctx, recipe, id, &root, manifest)?);
    }

    archives.push(assemble_package(
        ctx,
        recipe,
        PackageId::ROOT,
        &ctx.area.package,
        manifest,
    )?);

    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;
    use crate::context::WorkingArea;
    use crate::diagnostics::Reporter;
    use crate::packages::StaticIndex;

    struct NoManifest;

    impl ManifestTool for NoManifest {
        fn write_mtree(&self, root: &Path) -> Result<()> {
            fs::write(root.join(".MTREE"), b"")?;
            Ok(())
        }
    }

    fn context(root: &Path, strict: bool) -> BuildContext {
        let mut options = BuildOptions::for_recipe("foo.spec");
        options.strict_files = strict;
        let area = WorkingArea::new(root);
        area.create().unwrap();
        BuildContext::with_parts(options, area, Box::new(StaticIndex::new()))
            .unwrap()
            .with_reporter(Reporter::capture())
    }

    fn recipe() -> Recipe {
        let mut recipe = Recipe::new("Name: foo\n");
        let root = recipe.packages.root_mut();
        root.name = "foo".to_string();
        root.version = "1.0".to_string();
        root.release = "1".to_string();
        root.files = vec!["/usr/bin/foo".to_string()];
        let sub = recipe.packages.declare_subpackage("foo-devel");
        recipe.packages.get_mut(sub).files = vec!["/usr/include".to_string()];
        recipe
    }

    fn stage(ctx: &BuildContext, files: &[&str]) {
        for file in files {
            let path = ctx.area.package.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
    }

    #[test]
    fn test_package_file_name() {
        let mut pkg = PackageDefinition::new("foo");
        pkg.version = "1.0".to_string();
        pkg.release = "1".to_string();
        assert_eq!(
            package_file_name(&pkg, "x86_64", CompressionMethod::Zstd),
            "foo-1.0-1-x86_64.pkg.tar.zst"
        );
        pkg.epoch = "2".to_string();
        assert_eq!(
            package_file_name(&pkg, "x86_64", CompressionMethod::Xz),
            "foo-2:1.0-1-x86_64.pkg.tar.xz"
        );
    }

    #[test]
    fn test_split_inherits_version() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), false);
        stage(&ctx, &["usr/bin/foo", "usr/include/foo.h"]);
        let mut recipe = recipe();
        let sub = recipe.packages.find_subpackage("foo-devel").unwrap();

        assert_eq!(split_subpackage(&ctx, &mut recipe, sub).unwrap(), 1);
        assert_eq!(recipe.packages.get(sub).nevr(), "foo-devel-1.0-1");
        assert!(ctx.area.subpackage_root("foo-devel").join("usr/include/foo.h").exists());
    }

    #[test]
    fn test_assemble_all() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), true);
        stage(&ctx, &["usr/bin/foo", "usr/include/foo.h"]);
        let mut recipe = recipe();

        let archives = assemble_all(&ctx, &mut recipe, &NoManifest).unwrap();
        let names: Vec<String> = archives
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let arch = ctx.arch.clone();
        assert_eq!(
            names,
            vec![
                format!("foo-devel-1.0-1-{}.pkg.tar.zst", arch),
                format!("foo-1.0-1-{}.pkg.tar.zst", arch),
            ]
        );
        assert!(ctx.area.package.join(".PKGINFO").exists());
    }
}
