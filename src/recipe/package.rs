// src/recipe/package.rs

//! Package definitions produced by the specfile parser
//!
//! A specfile always describes one main package and any number of
//! subpackages. All definitions live in a [`PackageTree`]; the main package
//! is the first entry and subpackages refer to their parent by
//! [`PackageId`].

use crate::hash::HashAlgorithm;
use serde::Serialize;
use std::collections::BTreeMap;
use strum_macros::EnumIter;

/// Index of a package in its [`PackageTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId(usize);

impl PackageId {
    /// The main package
    pub const ROOT: PackageId = PackageId(0);
}

/// A source or patch declared with `SourceN:` / `PatchN:`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    /// Remote URL or path relative to the sources directory
    pub url: String,
    /// Local file name override (`renamed <name>`)
    pub rename: Option<String>,
    /// Expected digests (`with <algo> <hex>`), lowercase hex
    pub digests: BTreeMap<HashAlgorithm, String>,
    /// Detached signature location (`signed <url>`)
    pub signature: Option<String>,
    /// Fingerprints of keys allowed to sign (`key <id>`)
    pub gpg_keys: Vec<String>,
    /// Keyservers to import missing keys from (`keyserver <host>`)
    pub keyservers: Vec<String>,
}

impl SourceEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// File name of the source inside the build directory
    pub fn local_name(&self) -> String {
        if let Some(rename) = &self.rename {
            return rename.clone();
        }
        url_basename(&self.url)
    }
}

/// Last path segment of a URL or path, without query string or fragment
pub fn url_basename(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let trimmed = trimmed.trim_end_matches('/');
    trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Command sections that run as part of the build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Commands {
    pub prepare: Vec<String>,
    pub build: Vec<String>,
    pub install: Vec<String>,
    pub check: Vec<String>,
}

/// Install-time hooks written to `.INSTALL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ScriptletHook {
    PreInstall,
    PostInstall,
    PreUpgrade,
    PostUpgrade,
    PreRemove,
    PostRemove,
}

impl ScriptletHook {
    /// Shell function name in `.INSTALL`
    pub fn function_name(self) -> &'static str {
        match self {
            Self::PreInstall => "pre_install",
            Self::PostInstall => "post_install",
            Self::PreUpgrade => "pre_upgrade",
            Self::PostUpgrade => "post_upgrade",
            Self::PreRemove => "pre_remove",
            Self::PostRemove => "post_remove",
        }
    }

    /// Section marker in the specfile
    pub fn marker(self) -> &'static str {
        match self {
            Self::PreInstall => "%pre_install",
            Self::PostInstall => "%post_install",
            Self::PreUpgrade => "%pre_upgrade",
            Self::PostUpgrade => "%post_upgrade",
            Self::PreRemove => "%pre_remove",
            Self::PostRemove => "%post_remove",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scriptlets {
    pub pre_install: Vec<String>,
    pub post_install: Vec<String>,
    pub pre_upgrade: Vec<String>,
    pub post_upgrade: Vec<String>,
    pub pre_remove: Vec<String>,
    pub post_remove: Vec<String>,
}

impl Scriptlets {
    pub fn get(&self, hook: ScriptletHook) -> &[String] {
        match hook {
            ScriptletHook::PreInstall => &self.pre_install,
            ScriptletHook::PostInstall => &self.post_install,
            ScriptletHook::PreUpgrade => &self.pre_upgrade,
            ScriptletHook::PostUpgrade => &self.post_upgrade,
            ScriptletHook::PreRemove => &self.pre_remove,
            ScriptletHook::PostRemove => &self.post_remove,
        }
    }

    pub fn get_mut(&mut self, hook: ScriptletHook) -> &mut Vec<String> {
        match hook {
            ScriptletHook::PreInstall => &mut self.pre_install,
            ScriptletHook::PostInstall => &mut self.post_install,
            ScriptletHook::PreUpgrade => &mut self.pre_upgrade,
            ScriptletHook::PostUpgrade => &mut self.post_upgrade,
            ScriptletHook::PreRemove => &mut self.pre_remove,
            ScriptletHook::PostRemove => &mut self.post_remove,
        }
    }

    pub fn is_empty(&self) -> bool {
        use strum::IntoEnumIterator;
        ScriptletHook::iter().all(|hook| self.get(hook).is_empty())
    }
}

/// One package built from the specfile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDefinition {
    pub name: String,
    pub summary: String,
    pub license: String,
    pub url: String,
    pub epoch: String,
    pub version: String,
    pub release: String,

    pub requires: Vec<String>,
    pub build_requires: Vec<String>,
    pub check_requires: Vec<String>,
    pub recommends: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub replaces: Vec<String>,
    pub groups: Vec<String>,
    pub exclusive_arch: Vec<String>,
    /// Configuration files preserved across upgrades, without leading slash
    pub backup: Vec<String>,

    pub sources: Vec<SourceEntry>,
    pub patches: Vec<SourceEntry>,

    pub commands: Commands,
    pub scriptlets: Scriptlets,

    /// `%files` glob patterns
    pub files: Vec<String>,
    pub changelog: Vec<String>,
    pub description: Vec<String>,

    /// Reasons attached to optional dependencies (`ReasonFor`)
    pub reasons: BTreeMap<String, String>,

    #[serde(skip)]
    pub parent: Option<PackageId>,
    /// Subpackages in declaration order
    #[serde(skip)]
    pub subpackages: Vec<PackageId>,
}

impl PackageDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// `[epoch:]version-release`
    pub fn full_version(&self) -> String {
        if self.epoch.is_empty() {
            format!("{}-{}", self.version, self.release)
        } else {
            format!("{}:{}-{}", self.epoch, self.version, self.release)
        }
    }

    /// `name-[epoch:]version-release`
    pub fn nevr(&self) -> String {
        format!("{}-{}", self.name, self.full_version())
    }

    /// `name-[epoch:]version-release-arch`
    pub fn nevra(&self, arch: &str) -> String {
        format!("{}-{}", self.nevr(), arch)
    }

    /// Patterns that claim staged files: `%files` entries plus backups
    pub fn file_patterns(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .chain(self.backup.iter())
            .map(String::as_str)
    }
}

/// Main package and subpackages of one specfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTree {
    packages: Vec<PackageDefinition>,
}

impl Default for PackageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageTree {
    /// A tree holding an empty main package
    pub fn new() -> Self {
        Self {
            packages: vec![PackageDefinition::default()],
        }
    }

    pub fn root(&self) -> &PackageDefinition {
        &self.packages[PackageId::ROOT.0]
    }

    pub fn root_mut(&mut self) -> &mut PackageDefinition {
        &mut self.packages[PackageId::ROOT.0]
    }

    pub fn get(&self, id: PackageId) -> &PackageDefinition {
        &self.packages[id.0]
    }

    pub fn get_mut(&mut self, id: PackageId) -> &mut PackageDefinition {
        &mut self.packages[id.0]
    }

    /// Parent of a subpackage, `None` for the main package
    pub fn parent(&self, id: PackageId) -> Option<&PackageDefinition> {
        self.get(id).parent.map(|p| self.get(p))
    }

    /// Find a declared subpackage by name
    pub fn find_subpackage(&self, name: &str) -> Option<PackageId> {
        self.root()
            .subpackages
            .iter()
            .copied()
            .find(|id| self.get(*id).name == name)
    }

    /// Declare a subpackage of the main package, reusing an earlier declaration
    pub fn declare_subpackage(&mut self, name: &str) -> PackageId {
        if let Some(id) = self.find_subpackage(name) {
            return id;
        }
        let id = PackageId(self.packages.len());
        let mut package = PackageDefinition::new(name);
        package.parent = Some(PackageId::ROOT);
        self.packages.push(package);
        self.root_mut().subpackages.push(id);
        id
    }

    /// Subpackages of the main package in declaration order
    pub fn subpackage_ids(&self) -> Vec<PackageId> {
        self.root().subpackages.clone()
    }

    /// All packages, main package first
    pub fn ids(&self) -> impl Iterator<Item = PackageId> {
        (0..self.packages.len()).map(PackageId)
    }

    /// Copy epoch, version, release and license from the parent where unset
    pub fn resolve_inherited(&mut self, id: PackageId) {
        let Some(parent_id) = self.get(id).parent else {
            return;
        };
        let parent = self.get(parent_id).clone();
        let package = self.get_mut(id);
        for (field, inherited) in [
            (&mut package.epoch, &parent.epoch),
            (&mut package.version, &parent.version),
            (&mut package.release, &parent.release),
            (&mut package.license, &parent.license),
        ] {
            if field.is_empty() {
                field.clone_from(inherited);
            }
        }
    }

    /// Total number of packages, main package included
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// A parsed specfile
#[derive(Debug, Clone)]
pub struct Recipe {
    pub packages: PackageTree,
    /// `false` when the specfile opts out with `#!alpmbuild NoFileCheck`
    pub file_check: bool,
    /// The specfile text as read, for the source package and build info
    pub text: String,
}

impl Recipe {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            packages: PackageTree::new(),
            file_check: true,
            text: text.into(),
        }
    }

    pub fn root(&self) -> &PackageDefinition {
        self.packages.root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(epoch: &str) -> PackageDefinition {
        PackageDefinition {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            release: "1".to_string(),
            epoch: epoch.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_nevra() {
        assert_eq!(sample("").nevra("x86_64"), "foo-1.0-1-x86_64");
        assert_eq!(sample("2").nevra("x86_64"), "foo-2:1.0-1-x86_64");
        assert_eq!(sample("2").full_version(), "2:1.0-1");
    }

    #[test]
    fn test_local_name() {
        let mut entry = SourceEntry::new("https://example.org/dl/foo-1.0.tar.gz?raw=1");
        assert_eq!(entry.local_name(), "foo-1.0.tar.gz");
        entry.rename = Some("foo.tgz".to_string());
        assert_eq!(entry.local_name(), "foo.tgz");
        assert_eq!(SourceEntry::new("local.patch").local_name(), "local.patch");
    }

    #[test]
    fn test_declare_subpackage_once() {
        let mut tree = PackageTree::new();
        tree.root_mut().name = "foo".to_string();
        let a = tree.declare_subpackage("foo-devel");
        let b = tree.declare_subpackage("foo-doc");
        let again = tree.declare_subpackage("foo-devel");
        assert_eq!(a, again);
        assert_eq!(tree.subpackage_ids(), vec![a, b]);
        assert_eq!(tree.parent(b).map(|p| p.name.as_str()), Some("foo"));
        assert!(tree.root().parent.is_none());
    }

    #[test]
    fn test_resolve_inherited() {
        let mut tree = PackageTree::new();
        *tree.root_mut() = sample("1");
        tree.root_mut().license = "MIT".to_string();
        let sub = tree.declare_subpackage("foo-devel");
        tree.get_mut(sub).version = "9.9".to_string();

        tree.resolve_inherited(sub);
        let pkg = tree.get(sub);
        assert_eq!(pkg.epoch, "1");
        assert_eq!(pkg.version, "9.9");
        assert_eq!(pkg.release, "1");
        assert_eq!(pkg.license, "MIT");
    }

    #[test]
    fn test_scriptlets_empty() {
        let mut scripts = Scriptlets::default();
        assert!(scripts.is_empty());
        scripts.get_mut(ScriptletHook::PostRemove).push("true".to_string());
        assert!(!scripts.is_empty());
        assert_eq!(scripts.post_remove, vec!["true"]);
    }
}
