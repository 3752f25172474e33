// src/recipe/mod.rs

//! Recipe system: RPM-style specfiles
//!
//! A specfile describes a main package and its subpackages, where their
//! sources come from and how to build them:
//!
//! ```text
//! Name:    hello
//! Version: 2.12
//! Release: 1
//! Summary: GNU Hello
//! License: GPL-3.0-or-later
//! Source0: https://ftp.gnu.org/gnu/hello/hello-%{version}.tar.gz
//!
//! %prep
//! %setup -q
//!
//! %build
//! ./configure --prefix=%{_prefix}
//! make
//!
//! %install
//! make install DESTDIR=%{buildroot}
//!
//! %files
//! %{_bindir}/hello
//! %{_datadir}
//! ```
//!
//! # Culinary Terminology
//!
//! - **Recipe**: the parsed specfile
//! - **Kitchen**: runs the build in two phases
//! - **Plate**: assembles the staged files into packages

pub mod conditional;
pub mod keys;
pub mod kitchen;
pub mod lint;
pub mod macros;
pub mod package;
pub mod parser;
pub mod setup;

pub use kitchen::Kitchen;
pub use macros::MacroTable;
pub use package::{PackageDefinition, PackageId, PackageTree, Recipe, SourceEntry};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
