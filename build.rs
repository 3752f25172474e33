// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("alpmbuild")
        .version(env!("CARGO_PKG_VERSION"))
        .author("alpmbuild Contributors")
        .about("Build Arch Linux packages from RPM-style specfiles")
        .arg(Arg::new("specfile").value_name("SPECFILE").help("Specfile to build"))
        .arg(
            Arg::new("file")
                .long("file")
                .value_name("SPECFILE")
                .help("Specfile to build (alternative to the positional argument)"),
        )
        .arg(
            Arg::new("ba")
                .long("ba")
                .value_name("SPECFILE")
                .help("Build binary and source packages from SPECFILE (rpmbuild -ba)"),
        )
        .arg(flag(
            "strict-files",
            "Fail when the package root holds files not listed in %files",
        ))
        .arg(flag("hide-command-output", "Hide the output of build scripts"))
        .arg(
            Arg::new("color")
                .long("color")
                .value_parser(["auto", "always", "never"])
                .default_value("auto")
                .help("When to use colors"),
        )
        .arg(flag("no-source-package", "Do not build a source package"))
        .arg(flag(
            "ignore-deps",
            "Skip dependency checks against the host package database",
        ))
        .arg(
            Arg::new("compression")
                .long("compression")
                .value_parser(["gz", "xz", "zstd", "bz2"])
                .default_value("zstd")
                .help("Compression for package archives"),
        )
        .arg(
            Arg::new("define")
                .short('D')
                .long("define")
                .value_name("NAME VALUE")
                .action(ArgAction::Append)
                .help("Define a macro, e.g. -D \"_with_docs 1\" (repeatable)"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("alpmbuild.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
