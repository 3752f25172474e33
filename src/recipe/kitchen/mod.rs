// src/recipe/kitchen/mod.rs

//! Kitchen: where specfiles are cooked into packages
//!
//! A build runs in two processes. The unprivileged phase checks the host,
//! fetches and verifies sources and runs `%prep`, `%build` and `%check`.
//! It then re-executes alpmbuild under a [`PrivilegeHelper`], and that
//! privileged phase runs `%install` and assembles the archives so that every
//! file is owned by root. Nothing is shared between the two phases except
//! the specfile and the working area on disk.

pub mod archive;
pub mod files;
pub mod lint;
pub mod metadata;
pub mod plate;
pub mod privilege;
pub mod script;
pub mod signature;
pub mod sources;

pub use archive::{Bsdtar, ManifestTool};
pub use privilege::{Fakeroot, PrivilegeHelper};
pub use signature::{GpgVerifier, SignatureVerifier};

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::recipe::package::Recipe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// The Kitchen: runs both build phases
pub struct Kitchen {
    privilege: Arc<dyn PrivilegeHelper>,
    manifest: Arc<dyn ManifestTool>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl Default for Kitchen {
    fn default() -> Self {
        Self::new()
    }
}

impl Kitchen {
    /// A kitchen using fakeroot, bsdtar and gpg
    pub fn new() -> Self {
        Self {
            privilege: Arc::new(Fakeroot),
            manifest: Arc::new(Bsdtar),
            verifier: Arc::new(GpgVerifier),
        }
    }

    pub fn with_privilege_helper(mut self, helper: Arc<dyn PrivilegeHelper>) -> Self {
        self.privilege = helper;
        self
    }

    pub fn with_manifest_tool(mut self, tool: Arc<dyn ManifestTool>) -> Self {
        self.manifest = tool;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Run the phase selected by the context's options
    pub fn run(&self, ctx: &BuildContext, recipe: &mut Recipe) -> Result<i32> {
        if ctx.options.privileged {
            self.run_privileged(ctx, recipe)
        } else {
            self.run_unprivileged(ctx, recipe)
        }
    }

    /// Check the main package's `ExclusiveArch` against the context's architecture
    pub fn check_architecture(&self, ctx: &BuildContext, recipe: &Recipe) -> Result<()> {
        let root = recipe.root();
        if root.exclusive_arch.is_empty() || root.exclusive_arch.iter().any(|a| *a == ctx.arch) {
            return Ok(());
        }
        Err(Error::ArchitectureMismatch {
            package: root.name.clone(),
            host: ctx.arch.clone(),
            supported: root.exclusive_arch.join(", "),
        })
    }

    /// Fail when a `Requires` or `BuildRequires` entry is not installed
    pub fn check_dependencies(&self, ctx: &BuildContext, recipe: &Recipe) -> Result<()> {
        if !ctx.checks_host_packages() {
            debug!("Dependency check disabled");
            return Ok(());
        }

        let root = recipe.root();
        let missing: Vec<&str> = root
            .requires
            .iter()
            .chain(root.build_requires.iter())
            .map(String::as_str)
            .filter(|dep| !ctx.linter.is_installed(dep))
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::MissingDependencies(missing.join(" ")))
    }

    /// Unprivileged phase: everything up to `%install`, then re-execute
    pub fn run_unprivileged(&self, ctx: &BuildContext, recipe: &Recipe) -> Result<i32> {
        let root = recipe.root();

        self.check_architecture(ctx, recipe)?;
        self.check_dependencies(ctx, recipe)?;

        ctx.reporter.status("Preparing working directories...");
        ctx.area.reset_build_trees()?;

        ctx.reporter.status("Acquiring sources...");
        sources::acquire_sources(ctx, recipe, self.verifier.as_ref())?;

        ctx.reporter.status(format!("Building {}...", root.nevr()));
        let commands = &root.commands;
        let lines: Vec<String> = commands
            .prepare
            .iter()
            .chain(commands.build.iter())
            .chain(commands.check.iter())
            .cloned()
            .collect();
        script::run_script(ctx, "build", &lines, &ctx.area.build, root)?;

        ctx.reporter.status("Entering fakeroot environment...");
        let program = std::env::current_exe()?;
        let args = privilege::privileged_args(&ctx.options.reexec_args);
        let code = self.privilege.run(&program, &args)?;
        info!("Privileged phase exited with {}", code);
        Ok(code)
    }

    /// Privileged phase: `%install` and package assembly
    pub fn run_privileged(&self, ctx: &BuildContext, recipe: &mut Recipe) -> Result<i32> {
        ctx.area.create()?;

        let root = recipe.root();
        let build_subdir = ctx.area.build.join(format!("{}-{}", root.name, root.version));
        let workdir = if build_subdir.is_dir() {
            build_subdir
        } else {
            ctx.area.build.clone()
        };

        ctx.reporter
            .status(format!("Installing {} into the package root...", root.nevr()));
        script::run_script(ctx, "install", &root.commands.install, &workdir, root)?;

        let mut written: Vec<PathBuf> = plate::assemble_all(ctx, recipe, self.manifest.as_ref())?;

        if ctx.options.generate_source_package {
            written.push(archive::write_source_package(ctx, recipe)?);
        }

        for path in &written {
            ctx.reporter.status(format!("Wrote {}", path.display()));
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;
    use crate::context::WorkingArea;
    use crate::diagnostics::Reporter;
    use crate::packages::StaticIndex;
    use crate::recipe::package::SourceEntry;
    use std::ffi::OsString;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHelper {
        calls: Mutex<Vec<Vec<OsString>>>,
    }

    impl PrivilegeHelper for RecordingHelper {
        fn run(&self, _program: &Path, args: &[OsString]) -> Result<i32> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(0)
        }
    }

    /// Accepts every signature as made by `signer`
    struct FixedSigner {
        signer: String,
        verified: Mutex<Vec<PathBuf>>,
    }

    impl FixedSigner {
        fn new(signer: &str) -> Self {
            Self {
                signer: signer.to_string(),
                verified: Mutex::new(Vec::new()),
            }
        }
    }

    impl SignatureVerifier for FixedSigner {
        fn has_key(&self, _key: &str) -> bool {
            true
        }

        fn import_key(&self, _key: &str, _keyserver: Option<&str>) -> Result<()> {
            Ok(())
        }

        fn verify(&self, file: &Path, _signature: &Path) -> Result<Option<String>> {
            self.verified.lock().unwrap().push(file.to_path_buf());
            Ok(Some(self.signer.clone()))
        }
    }

    struct EmptyMtree;

    impl ManifestTool for EmptyMtree {
        fn write_mtree(&self, root: &Path) -> Result<()> {
            fs::write(root.join(".MTREE"), b"")?;
            Ok(())
        }
    }

    fn context(root: &Path, index: StaticIndex) -> BuildContext {
        let mut options = BuildOptions::for_recipe("foo.spec");
        options.hide_command_output = true;
        options.reexec_args = vec![OsString::from("foo.spec")];
        BuildContext::with_parts(options, WorkingArea::new(root), Box::new(index))
            .unwrap()
            .with_reporter(Reporter::capture())
    }

    fn recipe() -> Recipe {
        let mut recipe = Recipe::new("Name: foo\n");
        let root = recipe.packages.root_mut();
        root.name = "foo".to_string();
        root.version = "1.0".to_string();
        root.release = "1".to_string();
        root.commands.build = vec!["echo built > built.txt".to_string()];
        recipe
    }

    #[test]
    fn test_unprivileged_builds_then_reexecutes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), StaticIndex::new());
        let helper = Arc::new(RecordingHelper::default());
        let kitchen = Kitchen::new().with_privilege_helper(helper.clone());

        assert_eq!(kitchen.run(&ctx, &mut recipe()).unwrap(), 0);
        assert!(ctx.area.build.join("built.txt").exists());

        let calls = helper.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![OsString::from("foo.spec"), OsString::from("--fakeroot")]);
    }

    fn signed_recipe(ctx: &BuildContext) -> Recipe {
        ctx.area.create().unwrap();
        fs::write(ctx.area.sources.join("foo-1.0.tar.gz"), b"tarball").unwrap();
        fs::write(ctx.area.sources.join("foo-1.0.tar.gz.sig"), b"sig").unwrap();

        let mut source = SourceEntry::new("foo-1.0.tar.gz");
        source.signature = Some("foo-1.0.tar.gz.sig".to_string());
        source.gpg_keys = vec!["0xDEADBEEF".to_string()];
        let mut recipe = recipe();
        recipe.packages.root_mut().sources = vec![source];
        recipe
    }

    #[test]
    fn test_signed_source_uses_injected_verifier() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), StaticIndex::new());
        let verifier = Arc::new(FixedSigner::new("0123456789ABCDEF0123456789ABCDEFDEADBEEF"));
        let kitchen = Kitchen::new()
            .with_privilege_helper(Arc::new(RecordingHelper::default()))
            .with_verifier(verifier.clone());

        assert_eq!(kitchen.run(&ctx, &mut signed_recipe(&ctx)).unwrap(), 0);
        assert_eq!(
            *verifier.verified.lock().unwrap(),
            vec![ctx.area.sources.join("foo-1.0.tar.gz")]
        );
        assert!(ctx.area.build.join("foo-1.0.tar.gz").exists());
    }

    #[test]
    fn test_untrusted_signer_stops_build() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), StaticIndex::new());
        let helper = Arc::new(RecordingHelper::default());
        let kitchen = Kitchen::new()
            .with_privilege_helper(helper.clone())
            .with_verifier(Arc::new(FixedSigner::new("0123456789ABCDEF01234567")));

        let err = kitchen.run(&ctx, &mut signed_recipe(&ctx)).unwrap_err();
        assert!(matches!(err, Error::GpgVerificationFailed(_)));
        assert!(helper.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_privileged_phase_with_manifest_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), StaticIndex::new());
        ctx.options.privileged = true;
        ctx.area.create().unwrap();
        let mut recipe = recipe();
        recipe.packages.root_mut().commands.install = vec![format!(
            "mkdir -p {0}/usr/bin && echo hi > {0}/usr/bin/foo",
            ctx.area.package.display()
        )];

        let kitchen = Kitchen::new().with_manifest_tool(Arc::new(EmptyMtree));
        assert_eq!(kitchen.run(&ctx, &mut recipe).unwrap(), 0);
        assert!(ctx.area.package.join(".MTREE").exists());
        assert!(
            ctx.area
                .packages
                .join(format!("foo-1.0-1-{}.pkg.tar.zst", ctx.arch))
                .exists()
        );
    }

    #[test]
    fn test_architecture_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), StaticIndex::new());
        let mut recipe = recipe();
        recipe.packages.root_mut().exclusive_arch = vec!["not-a-real-arch".to_string()];

        let err = Kitchen::new().run(&ctx, &mut recipe).unwrap_err();
        assert!(matches!(err, Error::ArchitectureMismatch { .. }));

        recipe.packages.root_mut().exclusive_arch.push(ctx.arch.clone());
        Kitchen::new().check_architecture(&ctx, &recipe).unwrap();
    }

    #[test]
    fn test_missing_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), StaticIndex::new().with_installed(["glibc"]));
        let mut recipe = recipe();
        recipe.packages.root_mut().requires = vec!["glibc".to_string()];
        recipe.packages.root_mut().build_requires = vec!["cmake".to_string()];

        let err = Kitchen::new().check_dependencies(&ctx, &recipe).unwrap_err();
        assert_eq!(err.to_string(), "Missing build dependencies: cmake");
    }

    #[test]
    fn test_failed_build_does_not_reexecute() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), StaticIndex::new());
        let helper = Arc::new(RecordingHelper::default());
        let mut recipe = recipe();
        recipe.packages.root_mut().commands.build = vec!["exit 3".to_string()];

        let err = Kitchen::new()
            .with_privilege_helper(helper.clone())
            .run(&ctx, &mut recipe)
            .unwrap_err();
        assert!(matches!(err, Error::ScriptFailed { code: Some(3), .. }));
        assert!(helper.calls.lock().unwrap().is_empty());
    }
}
