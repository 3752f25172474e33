// src/cli.rs
//! CLI definitions for alpmbuild
//!
//! alpmbuild has a single action, building a specfile, so there are no
//! subcommands. The build itself lives in the `commands` module.

use alpmbuild::compression::CompressionMethod;
use alpmbuild::config::BuildOptions;
use alpmbuild::diagnostics::ColorMode;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "alpmbuild")]
#[command(author = "alpmbuild Contributors")]
#[command(version)]
#[command(about = "Build Arch Linux packages from RPM-style specfiles", long_about = None)]
pub struct Cli {
    /// Specfile to build
    #[arg(value_name = "SPECFILE", required_unless_present_any = ["file", "ba"])]
    pub specfile: Option<PathBuf>,

    /// Specfile to build (alternative to the positional argument)
    #[arg(long, value_name = "SPECFILE", conflicts_with = "specfile")]
    pub file: Option<PathBuf>,

    /// Build binary and source packages from SPECFILE (rpmbuild -ba)
    #[arg(long, value_name = "SPECFILE", conflicts_with_all = ["specfile", "file"])]
    pub ba: Option<PathBuf>,

    /// Fail when the package root holds files not listed in %files
    #[arg(long)]
    pub strict_files: bool,

    /// Hide the output of build scripts
    #[arg(long)]
    pub hide_command_output: bool,

    /// When to use colors: auto, always, never
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Do not build a source package
    #[arg(long)]
    pub no_source_package: bool,

    /// Skip dependency checks against the host package database
    #[arg(long)]
    pub ignore_deps: bool,

    /// Compression for package archives [default: zstd]
    #[arg(long, value_enum)]
    pub compression: Option<CompressionMethod>,

    /// Define a macro, e.g. -D "_with_docs 1" (repeatable)
    #[arg(short = 'D', long = "define", value_name = "NAME VALUE")]
    pub define: Vec<String>,

    /// Internal flag marking the fakeroot phase. Do not set.
    #[arg(long, hide = true)]
    pub fakeroot: bool,
}

impl Cli {
    /// The specfile named by whichever argument was given
    pub fn recipe_path(&self) -> Option<&PathBuf> {
        self.ba
            .as_ref()
            .or(self.file.as_ref())
            .or(self.specfile.as_ref())
    }

    /// Layer the command line over `options`
    ///
    /// `args` are the raw arguments, kept for the fakeroot re-exec.
    pub fn apply(&self, options: &mut BuildOptions, args: Vec<OsString>) {
        if let Some(path) = self.recipe_path() {
            options.recipe_path = path.clone();
        }
        options.strict_files |= self.strict_files;
        options.hide_command_output = self.hide_command_output;
        options.color = self.color;
        options.generate_source_package = self.ba.is_some() || !self.no_source_package;
        options.check_deps = !self.ignore_deps;
        if let Some(method) = self.compression {
            options.compression = method;
        }
        options.macro_definitions = self.define.clone();
        options.privileged = self.fakeroot;
        options.reexec_args = args;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("alpmbuild").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["hello.spec"]);
        let mut options = BuildOptions::default();
        cli.apply(&mut options, vec![OsString::from("hello.spec")]);

        assert_eq!(options.recipe_path, PathBuf::from("hello.spec"));
        assert!(options.generate_source_package);
        assert!(options.check_deps);
        assert!(!options.privileged);
        assert_eq!(options.compression, CompressionMethod::Zstd);
    }

    #[test]
    fn test_flags() {
        let cli = parse(&[
            "--file",
            "foo.spec",
            "--strict-files",
            "--no-source-package",
            "--ignore-deps",
            "--compression",
            "xz",
            "-D",
            "with_docs 1",
            "--define",
            "_vendor example",
            "--fakeroot",
        ]);
        let mut options = BuildOptions::default();
        cli.apply(&mut options, Vec::new());

        assert_eq!(options.recipe_path, PathBuf::from("foo.spec"));
        assert!(options.strict_files);
        assert!(!options.generate_source_package);
        assert!(!options.check_deps);
        assert!(options.privileged);
        assert_eq!(options.compression, CompressionMethod::Xz);
        assert_eq!(options.macro_definitions, vec!["with_docs 1", "_vendor example"]);
    }

    #[test]
    fn test_ba_forces_source_package() {
        let cli = parse(&["--ba", "foo.spec", "--no-source-package"]);
        let mut options = BuildOptions::default();
        cli.apply(&mut options, Vec::new());
        assert_eq!(options.recipe_path, PathBuf::from("foo.spec"));
        assert!(options.generate_source_package);
    }

    #[test]
    fn test_specfile_required() {
        assert!(Cli::try_parse_from(["alpmbuild"]).is_err());
    }

    #[test]
    fn test_config_compression_kept_without_flag() {
        let cli = parse(&["foo.spec"]);
        let mut options = BuildOptions {
            compression: CompressionMethod::Gz,
            strict_files: true,
            ..BuildOptions::default()
        };
        cli.apply(&mut options, Vec::new());
        assert_eq!(options.compression, CompressionMethod::Gz);
        assert!(options.strict_files);
    }
}
