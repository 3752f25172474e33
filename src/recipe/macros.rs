// src/recipe/macros.rs

//! Macro expansion for specfile text
//!
//! Specfiles reference macros as `%{name}`. Lookup checks the package's own
//! fields first (`%{name}`, `%{version}`, ...) and then the macro table.
//! Unknown references are left verbatim so the parser can warn about them;
//! `%{?name}` expands to nothing when `name` is undefined.
//!
//! Expansion repeats until a pass changes nothing, bounded by
//! [`MAX_EXPANSION_PASSES`] so self-referential macros terminate. A pass
//! whose result would exceed [`MAX_EXPANDED_LEN`] is discarded.
//!
//! A line starting with `%setup` is replaced by the synthesized extraction
//! script before expansion (see [`crate::recipe::setup`]).

use crate::context::WorkingArea;
use crate::error::{Error, Result};
use crate::recipe::package::PackageDefinition;
use crate::recipe::setup::{self, SetupFlags};
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on substitution passes
pub const MAX_EXPANSION_PASSES: usize = 256;

/// Upper bound on the length of expanded text, in bytes
pub const MAX_EXPANDED_LEN: usize = 64 * 1024;

/// Built-in path macros, in definition order
const BUILTIN_MACROS: &[(&str, &str)] = &[
    ("_sysconfdir", "/etc"),
    ("_prefix", "/usr"),
    ("_exec_prefix", "%{_prefix}"),
    ("_datarootdir", "%{_prefix}/share"),
    ("_includedir", "%{_prefix}/include"),
    ("_lib", "lib"),
    ("_bindir", "%{_exec_prefix}/bin"),
    ("_libdir", "%{_exec_prefix}/%{_lib}"),
    ("_libexecdir", "%{_exec_prefix}/libexec"),
    ("_sbindir", "%{_exec_prefix}/sbin"),
    ("_datadir", "%{_datarootdir}"),
    ("_infodir", "%{_datarootdir}/info"),
    ("_mandir", "%{_datarootdir}/man"),
    ("_docdir", "%{_datadir}/doc"),
    ("_rundir", "/run"),
    ("_localstatedir", "/var"),
    ("_sharedstatedir", "/var/lib"),
    // Language helpers
    ("alp_cargo_build", "cargo build --release --locked"),
    ("alp_cargo_test", "cargo test --release --locked"),
    ("alpm_go_build", "go build -trimpath -buildmode=pie -mod=readonly -modcacherw"),
];

/// Name to value mapping for `%{...}` references
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, String>,
}

impl MacroTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the built-in path macros and working-area paths
    pub fn with_builtins(area: &WorkingArea, arch: &str) -> Self {
        let mut table = Self::new();
        for (name, value) in BUILTIN_MACROS {
            table.define(name, value);
        }
        table.define("_arch", arch);
        table.define("alpmbuild", env!("CARGO_PKG_VERSION"));
        table.define("_topdir", &area.root.to_string_lossy());
        table.define("_sourcedir", &area.sources.to_string_lossy());
        table.define("_builddir", &area.build.to_string_lossy());
        table.define("buildroot", &area.package.to_string_lossy());
        table
    }

    pub fn define(&mut self, name: &str, value: &str) {
        debug!("Defining macro {} = {}", name, value);
        self.macros.insert(name.to_string(), value.to_string());
    }

    /// Apply a `-D "name value"` definition
    ///
    /// The name ends at the first whitespace; a leading `%` is dropped.
    pub fn define_from_cli(&mut self, definition: &str) -> Result<()> {
        let definition = definition.trim();
        let (name, value) = definition
            .split_once(char::is_whitespace)
            .unwrap_or((definition, ""));
        let name = name.strip_prefix('%').unwrap_or(name);
        if name.is_empty() {
            return Err(Error::Config(format!(
                "Invalid macro definition '{}': expected \"<name> <value>\"",
                definition
            )));
        }
        self.define(name, value.trim_start());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    /// Defined macro names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, name: &str, pkg: &PackageDefinition) -> Option<String> {
        package_macro(name, pkg).or_else(|| self.get(name).map(str::to_string))
    }

    /// Expand all macro references in `text` using `pkg` as context
    pub fn expand(&self, text: &str, pkg: &PackageDefinition) -> String {
        let text = match SetupFlags::parse(text) {
            Some(flags) => setup::synthesize(&flags, pkg),
            None => text.to_string(),
        };
        self.expand_macros(&text, pkg)
    }

    fn expand_macros(&self, text: &str, pkg: &PackageDefinition) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_EXPANSION_PASSES {
            let (next, changed) = self.expand_once(&current, pkg);
            if !changed {
                break;
            }
            if next.len() > MAX_EXPANDED_LEN {
                debug!(
                    "Expansion of {} stopped at {} bytes",
                    text.lines().next().unwrap_or_default(),
                    current.len()
                );
                break;
            }
            current = next;
        }
        current
    }

    /// Substitute every resolvable reference once
    fn expand_once(&self, text: &str, pkg: &PackageDefinition) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        let mut rest = text;

        while let Some(start) = rest.find("%{") {
            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let Some(end) = body.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let token = &body[..end];
            let (optional, name) = match token.strip_prefix('?') {
                Some(name) => (true, name),
                None => (false, token),
            };
            match self.lookup(name, pkg) {
                Some(value) => {
                    out.push_str(&value);
                    changed = true;
                }
                None if optional => changed = true,
                None => out.push_str(&rest[start..start + 2 + end + 1]),
            }
            rest = &body[end + 1..];
        }
        out.push_str(rest);

        (out, changed)
    }
}

/// Macros answered from the package itself
fn package_macro(name: &str, pkg: &PackageDefinition) -> Option<String> {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    match name {
        "name" => non_empty(&pkg.name),
        "version" => non_empty(&pkg.version),
        "release" => non_empty(&pkg.release),
        "epoch" => non_empty(&pkg.epoch),
        "summary" => non_empty(&pkg.summary),
        "license" => non_empty(&pkg.license),
        "url" => non_empty(&pkg.url),
        "buildsubdir" if !pkg.name.is_empty() && !pkg.version.is_empty() => {
            Some(format!("{}-{}", pkg.name, pkg.version))
        }
        _ => None,
    }
}

/// `%{...}` references left in already expanded text, with byte offsets
pub fn unresolved_references(text: &str) -> Vec<(usize, &str)> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(start) = text[offset..].find("%{") {
        let start = offset + start;
        match text[start..].find('}') {
            Some(end) => {
                found.push((start, &text[start..start + end + 1]));
                offset = start + end + 1;
            }
            None => break,
        }
    }
    found
}
