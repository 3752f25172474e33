// src/recipe/lint.rs

//! Name linting for dependency, provide and group values
//!
//! Identifier checks are purely syntactic and always fatal. Existence checks
//! consult the host package index and only produce suggestions.

use crate::packages::PackageIndex;
use crate::suggest;
use std::cell::OnceCell;
use std::fmt;
use tracing::debug;

/// Why a package identifier was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierProblem {
    Empty,
    LeadingHyphen,
    LeadingDot,
    /// Byte outside printable ASCII, at this byte offset
    NonPrintable(usize),
    /// Character outside `[A-Za-z0-9 +_.@-]`, at this byte offset
    InvalidCharacter(usize),
}

impl IdentifierProblem {
    /// Offset of the offending character, if there is one
    pub fn position(self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::LeadingHyphen | Self::LeadingDot => Some(0),
            Self::NonPrintable(pos) | Self::InvalidCharacter(pos) => Some(pos),
        }
    }
}

impl fmt::Display for IdentifierProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "is empty"),
            Self::LeadingHyphen => write!(f, "starts with a hyphen"),
            Self::LeadingDot => write!(f, "starts with a dot"),
            Self::NonPrintable(pos) => {
                write!(f, "has a non-printable character at position {}", pos)
            }
            Self::InvalidCharacter(pos) => {
                write!(f, "has an invalid character at position {}", pos)
            }
        }
    }
}

fn is_allowed(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b' ' | b'+' | b'_' | b'.' | b'@' | b'-')
}

/// Classify a package identifier; `Ok` when it is acceptable
pub fn lint_identifier(name: &str) -> Result<(), IdentifierProblem> {
    let bytes = name.as_bytes();
    match bytes.first() {
        None => return Err(IdentifierProblem::Empty),
        Some(b'-') => return Err(IdentifierProblem::LeadingHyphen),
        Some(b'.') => return Err(IdentifierProblem::LeadingDot),
        Some(_) => {}
    }
    if let Some(pos) = bytes.iter().position(|b| !(0x20..=0x7e).contains(b)) {
        return Err(IdentifierProblem::NonPrintable(pos));
    }
    if let Some(pos) = bytes.iter().position(|b| !is_allowed(*b)) {
        return Err(IdentifierProblem::InvalidCharacter(pos));
    }
    Ok(())
}

/// Result of an existence lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Exists,
    /// Unknown name, with the closest known one
    Missing { suggestion: Option<String> },
}

/// Existence checks against a lazily loaded package index
pub struct Linter {
    index: Box<dyn PackageIndex>,
    packages: OnceCell<Vec<String>>,
    groups: OnceCell<Vec<String>>,
}

impl Linter {
    pub fn new(index: Box<dyn PackageIndex>) -> Self {
        Self {
            index,
            packages: OnceCell::new(),
            groups: OnceCell::new(),
        }
    }

    fn packages(&self) -> &[String] {
        self.packages.get_or_init(|| {
            self.index.package_names().unwrap_or_else(|e| {
                debug!("Package listing unavailable: {}", e);
                Vec::new()
            })
        })
    }

    fn groups(&self) -> &[String] {
        self.groups.get_or_init(|| {
            self.index.group_names().unwrap_or_else(|e| {
                debug!("Group listing unavailable: {}", e);
                Vec::new()
            })
        })
    }

    /// Check a package name; an empty index answers `Exists`
    pub fn check_package(&self, name: &str) -> Existence {
        existence(name, self.packages())
    }

    /// Check a group name; an empty index answers `Exists`
    pub fn check_group(&self, name: &str) -> Existence {
        existence(name, self.groups())
    }

    /// Whether a dependency is satisfied on the host
    pub fn is_installed(&self, dependency: &str) -> bool {
        self.index.is_installed(dependency)
    }
}

fn existence(name: &str, known: &[String]) -> Existence {
    if known.is_empty() || known.iter().any(|k| k == name) {
        return Existence::Exists;
    }
    Existence::Missing {
        suggestion: suggest::closest(name, known.iter().map(String::as_str)).map(str::to_string),
    }
}
