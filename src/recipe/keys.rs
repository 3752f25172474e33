// src/recipe/keys.rs

//! Recognized specfile keys
//!
//! Every `Key: value` line is looked up in [`RECIPE_KEYS`], a static table
//! mapping the key to the field it fills, whether values are linted, and the
//! `.PKGINFO` key the field is written under.

use crate::recipe::package::PackageDefinition;
use strum_macros::EnumIter;

/// Single-valued fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ScalarField {
    Name,
    Summary,
    License,
    Url,
    Epoch,
    Version,
    Release,
}

impl ScalarField {
    pub fn get(self, pkg: &PackageDefinition) -> &str {
        match self {
            Self::Name => &pkg.name,
            Self::Summary => &pkg.summary,
            Self::License => &pkg.license,
            Self::Url => &pkg.url,
            Self::Epoch => &pkg.epoch,
            Self::Version => &pkg.version,
            Self::Release => &pkg.release,
        }
    }

    pub fn set(self, pkg: &mut PackageDefinition, value: String) {
        match self {
            Self::Name => pkg.name = value,
            Self::Summary => pkg.summary = value,
            Self::License => pkg.license = value,
            Self::Url => pkg.url = value,
            Self::Epoch => pkg.epoch = value,
            Self::Version => pkg.version = value,
            Self::Release => pkg.release = value,
        }
    }

    /// `.PKGINFO` key, when the field is written directly
    ///
    /// Name and the version triple are written as `pkgname` and `pkgver`.
    pub fn pkginfo_key(self) -> Option<&'static str> {
        match self {
            Self::Summary => Some("pkgdesc"),
            Self::Url => Some("url"),
            Self::License => Some("license"),
            Self::Name | Self::Epoch | Self::Version | Self::Release => None,
        }
    }
}

/// How values of a list field are linted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLint {
    None,
    /// Identifier charset only
    Identifier,
    /// Identifier charset and existence in the sync repositories
    Package,
    /// Identifier charset and existence as a package group
    Group,
}

/// Multi-valued fields, filled from whitespace-separated values
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ListField {
    Requires,
    BuildRequires,
    CheckRequires,
    Recommends,
    Provides,
    Conflicts,
    Replaces,
    Groups,
    ExclusiveArch,
    Backup,
}

impl ListField {
    pub fn get(self, pkg: &PackageDefinition) -> &[String] {
        match self {
            Self::Requires => &pkg.requires,
            Self::BuildRequires => &pkg.build_requires,
            Self::CheckRequires => &pkg.check_requires,
            Self::Recommends => &pkg.recommends,
            Self::Provides => &pkg.provides,
            Self::Conflicts => &pkg.conflicts,
            Self::Replaces => &pkg.replaces,
            Self::Groups => &pkg.groups,
            Self::ExclusiveArch => &pkg.exclusive_arch,
            Self::Backup => &pkg.backup,
        }
    }

    pub fn get_mut(self, pkg: &mut PackageDefinition) -> &mut Vec<String> {
        match self {
            Self::Requires => &mut pkg.requires,
            Self::BuildRequires => &mut pkg.build_requires,
            Self::CheckRequires => &mut pkg.check_requires,
            Self::Recommends => &mut pkg.recommends,
            Self::Provides => &mut pkg.provides,
            Self::Conflicts => &mut pkg.conflicts,
            Self::Replaces => &mut pkg.replaces,
            Self::Groups => &mut pkg.groups,
            Self::ExclusiveArch => &mut pkg.exclusive_arch,
            Self::Backup => &mut pkg.backup,
        }
    }

    pub fn lint(self) -> ListLint {
        match self {
            Self::Requires | Self::BuildRequires | Self::CheckRequires | Self::Recommends => {
                ListLint::Package
            }
            Self::Provides | Self::Conflicts | Self::Replaces => ListLint::Identifier,
            Self::Groups => ListLint::Group,
            Self::ExclusiveArch | Self::Backup => ListLint::None,
        }
    }

    pub fn pkginfo_key(self) -> Option<&'static str> {
        match self {
            Self::Requires => Some("depend"),
            Self::BuildRequires => Some("makedepend"),
            Self::CheckRequires => Some("checkdepend"),
            Self::Recommends => Some("optdepend"),
            Self::Provides => Some("provides"),
            Self::Conflicts => Some("conflict"),
            Self::Replaces => Some("replaces"),
            Self::Groups => Some("group"),
            Self::Backup => Some("backup"),
            Self::ExclusiveArch => None,
        }
    }
}

/// What a key fills in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    Scalar(ScalarField),
    List(ListField),
    /// `epoch:version-release` in one value
    EpochVersionRelease,
    Source,
    Patch,
}

/// A recognized key
#[derive(Debug, Clone, Copy)]
pub struct KeyEntry {
    /// Key as written in specfiles, matched case-insensitively
    pub key: &'static str,
    pub target: KeyTarget,
}

impl KeyEntry {
    const fn new(key: &'static str, target: KeyTarget) -> Self {
        Self { key, target }
    }

    const fn scalar(key: &'static str, field: ScalarField) -> Self {
        Self::new(key, KeyTarget::Scalar(field))
    }

    const fn list(key: &'static str, field: ListField) -> Self {
        Self::new(key, KeyTarget::List(field))
    }
}

pub const RECIPE_KEYS: &[KeyEntry] = &[
    KeyEntry::scalar("Name", ScalarField::Name),
    KeyEntry::scalar("Summary", ScalarField::Summary),
    KeyEntry::scalar("License", ScalarField::License),
    KeyEntry::scalar("URL", ScalarField::Url),
    KeyEntry::scalar("Epoch", ScalarField::Epoch),
    KeyEntry::scalar("Version", ScalarField::Version),
    KeyEntry::scalar("Release", ScalarField::Release),
    KeyEntry::new("EpochVersionRelease", KeyTarget::EpochVersionRelease),
    KeyEntry::new("EpoVerRel", KeyTarget::EpochVersionRelease),
    KeyEntry::new("EVR", KeyTarget::EpochVersionRelease),
    KeyEntry::list("Requires", ListField::Requires),
    KeyEntry::list("BuildRequires", ListField::BuildRequires),
    KeyEntry::list("CheckRequires", ListField::CheckRequires),
    KeyEntry::list("Recommends", ListField::Recommends),
    KeyEntry::list("Provides", ListField::Provides),
    KeyEntry::list("Conflicts", ListField::Conflicts),
    KeyEntry::list("Replaces", ListField::Replaces),
    KeyEntry::list("Groups", ListField::Groups),
    KeyEntry::list("ExclusiveArch", ListField::ExclusiveArch),
    KeyEntry::list("Backup", ListField::Backup),
];

/// Look up a key token, with or without its trailing colon
///
/// `SourceN` and `PatchN` accept any suffix after the prefix.
pub fn lookup(token: &str) -> Option<KeyTarget> {
    let key = token.strip_suffix(':').unwrap_or(token);
    let lower = key.to_ascii_lowercase();
    if lower.starts_with("source") {
        return Some(KeyTarget::Source);
    }
    if lower.starts_with("patch") {
        return Some(KeyTarget::Patch);
    }
    RECIPE_KEYS
        .iter()
        .find(|entry| entry.key.eq_ignore_ascii_case(key))
        .map(|entry| entry.target)
}

/// Key names offered as suggestions for unknown keys
pub fn key_names() -> impl Iterator<Item = &'static str> {
    RECIPE_KEYS
        .iter()
        .map(|entry| entry.key)
        .chain(["Source", "Patch"])
}
