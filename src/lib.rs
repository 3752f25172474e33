// src/lib.rs

//! alpmbuild: build pacman packages from RPM-style specfiles
//!
//! A specfile is parsed into a [`Recipe`] (a main package plus subpackages),
//! with macros expanded and `%if` blocks evaluated as it is read. The
//! [`Kitchen`] then builds it in two phases: sources are fetched and verified
//! and `%prep`/`%build`/`%check` run as the invoking user, then alpmbuild
//! re-executes itself under fakeroot to run `%install` and assemble the
//! `.pkg.tar.*` archives.
//!
//! # Architecture
//!
//! - One [`BuildContext`] per process carries options, the working area and
//!   the macro table; nothing is global
//! - Packages live in a flat [`recipe::PackageTree`] indexed by
//!   [`recipe::PackageId`]; subpackages refer to their parent by id
//! - External tools (pacman, gpg, bsdtar, fakeroot) sit behind traits

pub mod compression;
pub mod config;
pub mod context;
pub mod diagnostics;
mod error;
pub mod hash;
pub mod packages;
pub mod recipe;
pub mod suggest;

pub use config::{BuildOptions, UserConfig};
pub use context::{BuildContext, WorkingArea};
pub use diagnostics::{ColorMode, Diagnostic, Reporter};
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use recipe::{Kitchen, Recipe, parse_recipe, parse_recipe_file, validate_recipe};
