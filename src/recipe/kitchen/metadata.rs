// src/recipe/kitchen/metadata.rs

//! Package metadata files
//!
//! Each package root gets, next to its contents:
//!
//! - `.PKGINFO`: `key = value` lines read by pacman
//! - `.ALPMBUILD_BUILDINFO`: JSON record of how the package was built
//! - `.MTREE`: file tree digest (see [`super::archive`])
//! - `.INSTALL`: scriptlet functions, only when a scriptlet exists
//! - `.CHANGELOG`: `%changelog` lines, only when present

use super::files::collect_files;
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::packages::DependencyInfo;
use crate::recipe::keys::{ListField, ScalarField};
use crate::recipe::package::{PackageDefinition, Scriptlets, ScriptletHook};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::debug;

pub const PKGINFO: &str = ".PKGINFO";
pub const BUILDINFO: &str = ".ALPMBUILD_BUILDINFO";
pub const MTREE: &str = ".MTREE";
pub const INSTALL: &str = ".INSTALL";
pub const CHANGELOG: &str = ".CHANGELOG";

/// Metadata files in archive order
pub const METADATA_FILES: &[&str] = &[PKGINFO, BUILDINFO, MTREE, INSTALL, CHANGELOG];

/// List fields in `.PKGINFO` order
const PKGINFO_LISTS: [ListField; 9] = [
    ListField::Replaces,
    ListField::Groups,
    ListField::Conflicts,
    ListField::Provides,
    ListField::Backup,
    ListField::Requires,
    ListField::Recommends,
    ListField::BuildRequires,
    ListField::CheckRequires,
];

/// `.INSTALL` contents, `None` when there are no scriptlets
pub fn render_install(scriptlets: &Scriptlets) -> Option<String> {
    if scriptlets.is_empty() {
        return None;
    }

    let mut out = String::new();
    for hook in ScriptletHook::iter() {
        let lines = scriptlets.get(hook);
        if lines.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}() {{", hook.function_name());
        for line in lines {
            let _ = writeln!(out, "\t{}", line);
        }
        out.push_str("}\n\n");
    }
    Some(out)
}

/// `.CHANGELOG` contents, `None` when the changelog is empty
pub fn render_changelog(changelog: &[String]) -> Option<String> {
    if changelog.iter().all(|l| l.trim().is_empty()) {
        return None;
    }
    let mut out = changelog.join("\n");
    out.push('\n');
    Some(out)
}

/// Build time for `.PKGINFO`, honouring `SOURCE_DATE_EPOCH`
pub fn build_date() -> i64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| chrono::Utc::now().timestamp())
}

/// Sum of the sizes of the package's files, metadata excluded
pub fn installed_size(root: &Path) -> Result<u64> {
    let mut size = 0;
    for relative in collect_files(root)? {
        if relative.components().count() == 1
            && relative.to_str().is_some_and(|n| METADATA_FILES.contains(&n))
        {
            continue;
        }
        let meta = fs::symlink_metadata(root.join(&relative))?;
        size += meta.len();
    }
    Ok(size)
}

/// Values for `.PKGINFO` that do not come from the package itself
#[derive(Debug, Clone)]
pub struct PkgInfoContext<'a> {
    /// Name of the main package
    pub base: &'a str,
    pub arch: &'a str,
    pub packager: &'a str,
    pub builddate: i64,
    pub size: u64,
}

/// Reason attached to an optional dependency, own reasons first
fn reason_for<'a>(
    item: &str,
    pkg: &'a PackageDefinition,
    parent: Option<&'a PackageDefinition>,
) -> Option<&'a str> {
    let name = DependencyInfo::parse(item).name;
    pkg.reasons
        .get(&name)
        .or_else(|| parent.and_then(|p| p.reasons.get(&name)))
        .map(String::as_str)
}

/// `.PKGINFO` contents
pub fn render_pkginfo(
    pkg: &PackageDefinition,
    parent: Option<&PackageDefinition>,
    info: &PkgInfoContext<'_>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by alpmbuild {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "pkgname = {}", pkg.name);
    let _ = writeln!(out, "pkgbase = {}", info.base);
    let _ = writeln!(out, "pkgver = {}", pkg.full_version());

    let scalar = |field: ScalarField, out: &mut String| {
        let value = field.get(pkg);
        if let Some(key) = field.pkginfo_key()
            && !value.is_empty()
        {
            let _ = writeln!(out, "{} = {}", key, value);
        }
    };
    scalar(ScalarField::Summary, &mut out);
    scalar(ScalarField::Url, &mut out);

    let _ = writeln!(out, "builddate = {}", info.builddate);
    let _ = writeln!(out, "packager = {}", info.packager);
    let _ = writeln!(out, "size = {}", info.size);
    let _ = writeln!(out, "arch = {}", info.arch);
    scalar(ScalarField::License, &mut out);

    for field in PKGINFO_LISTS {
        let Some(key) = field.pkginfo_key() else {
            continue;
        };
        for item in field.get(pkg) {
            match (field, reason_for(item, pkg, parent)) {
                (ListField::Recommends, Some(reason)) => {
                    let _ = writeln!(out, "{} = {}: {}", key, item, reason);
                }
                _ => {
                    let _ = writeln!(out, "{} = {}", key, item);
                }
            }
        }
    }

    out
}

/// Host details recorded in build info
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub arch: String,
    pub os: String,
    pub tool_version: String,
}

/// `.ALPMBUILD_BUILDINFO` document
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo<'a> {
    pub system: SystemInfo,
    pub spec_file: &'a str,
    pub package: &'a PackageDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_package: Option<&'a PackageDefinition>,
}

pub fn render_buildinfo(
    recipe_text: &str,
    pkg: &PackageDefinition,
    parent: Option<&PackageDefinition>,
) -> Result<String> {
    let info = BuildInfo {
        system: SystemInfo {
            arch: std::env::consts::ARCH.to_string(),
            os: std::env::consts::OS.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        spec_file: recipe_text,
        package: pkg,
        parent_package: parent,
    };
    serde_json::to_string_pretty(&info)
        .map_err(|e| Error::IoError(format!("Failed to serialize build info: {}", e)))
}

fn write_file(root: &Path, name: &str, contents: &str) -> Result<()> {
    let path = root.join(name);
    fs::write(&path, contents)
        .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Write `.INSTALL`, `.CHANGELOG`, `.PKGINFO` and build info into `root`
///
/// `pkg` must already carry inherited values.
pub fn write_metadata(
    ctx: &BuildContext,
    recipe_text: &str,
    pkg: &PackageDefinition,
    parent: Option<&PackageDefinition>,
    root: &Path,
) -> Result<()> {
    fs::create_dir_all(root)?;

    if let Some(install) = render_install(&pkg.scriptlets) {
        write_file(root, INSTALL, &install)?;
    }

    if let Some(changelog) = render_changelog(&pkg.changelog) {
        write_file(root, CHANGELOG, &changelog)?;
    }

    let base = parent.map_or(pkg.name.as_str(), |p| p.name.as_str());
    let info = PkgInfoContext {
        base,
        arch: &ctx.arch,
        packager: &ctx.options.packager,
        builddate: build_date(),
        size: installed_size(root)?,
    };
    ctx.reporter
        .status(format!("Generating package info for {}...", pkg.nevra(&ctx.arch)));
    write_file(root, PKGINFO, &render_pkginfo(pkg, parent, &info))?;

    ctx.reporter
        .status(format!("Generating build info for {}...", pkg.nevra(&ctx.arch)));
    write_file(root, BUILDINFO, &render_buildinfo(recipe_text, pkg, parent)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> PackageDefinition {
        PackageDefinition {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            release: "1".to_string(),
            summary: "The foo tool".to_string(),
            license: "MIT".to_string(),
            requires: vec!["glibc>=2.17".to_string()],
            recommends: vec!["bash".to_string(), "zsh".to_string()],
            ..Default::default()
        }
    }

    fn info() -> PkgInfoContext<'static> {
        PkgInfoContext {
            base: "foo",
            arch: "x86_64",
            packager: "Test <test@example.org>",
            builddate: 1700000000,
            size: 42,
        }
    }

    #[test]
    fn test_pkginfo() {
        let mut pkg = package();
        pkg.reasons.insert("bash".to_string(), "for completions".to_string());
        let out = render_pkginfo(&pkg, None, &info());
        let lines: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(
            lines,
            vec![
                "pkgname = foo",
                "pkgbase = foo",
                "pkgver = 1.0-1",
                "pkgdesc = The foo tool",
                "builddate = 1700000000",
                "packager = Test <test@example.org>",
                "size = 42",
                "arch = x86_64",
                "license = MIT",
                "depend = glibc>=2.17",
                "optdepend = bash: for completions",
                "optdepend = zsh",
            ]
        );
    }

    #[test]
    fn test_pkginfo_subpackage_uses_parent_reasons() {
        let mut parent = package();
        parent.epoch = "2".to_string();
        parent.reasons.insert("zsh".to_string(), "shell".to_string());
        let mut sub = PackageDefinition::new("foo-extras");
        sub.epoch = "2".to_string();
        sub.version = "1.0".to_string();
        sub.release = "1".to_string();
        sub.recommends = vec!["zsh".to_string()];

        let out = render_pkginfo(&sub, Some(&parent), &info());
        assert!(out.contains("pkgver = 2:1.0-1\n"));
        assert!(out.contains("optdepend = zsh: shell\n"));
        assert!(!out.contains("pkgdesc"));
    }

    #[test]
    fn test_install_only_non_empty_hooks() {
        let mut scriptlets = Scriptlets::default();
        assert!(render_install(&scriptlets).is_none());

        scriptlets.post_install.push("echo installed".to_string());
        let out = render_install(&scriptlets).unwrap();
        assert_eq!(out, "post_install() {\n\techo installed\n}\n\n");
    }

    #[test]
    fn test_changelog() {
        assert!(render_changelog(&[]).is_none());
        let lines = vec!["* Mon Jan 01 2024 Dev".to_string(), "- Initial".to_string()];
        assert_eq!(render_changelog(&lines).unwrap(), "* Mon Jan 01 2024 Dev\n- Initial\n");
    }

    #[test]
    fn test_buildinfo_json() {
        let pkg = package();
        let json = render_buildinfo("Name: foo\n", &pkg, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["package"]["name"], "foo");
        assert_eq!(value["spec_file"], "Name: foo\n");
        assert!(value.get("parent_package").is_none());
    }
}
