// src/recipe/conditional.rs

//! `%if` / `%elif` / `%else` / `%endif` handling
//!
//! Conditions take one of two forms:
//!
//! ```text
//! %if %{with_docs}            true when the operand is an integer > 0
//! %if %{version} == 1.0       string equality after expansion
//! %if %{_major} >= 2          integer comparison
//! ```
//!
//! Conditionals do not nest: an inner `%if` replaces the current state and
//! the next `%endif` ends the whole block.

use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::recipe::macros::MacroTable;
use crate::recipe::package::PackageDefinition;

/// A conditional marker line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    If,
    Elif,
    Else,
    Endif,
}

impl Directive {
    /// Recognize a marker by the line's first token
    pub fn parse(line: &str) -> Option<Self> {
        match line.split_whitespace().next()? {
            "%if" => Some(Self::If),
            "%elif" => Some(Self::Elif),
            "%else" => Some(Self::Else),
            "%endif" => Some(Self::Endif),
            _ => None,
        }
    }
}

/// Comparison operators accepted in conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(Self::Eq),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            _ => None,
        }
    }
}

/// A line of specfile text a condition is evaluated for
#[derive(Debug, Clone, Copy)]
pub struct ConditionLine<'a> {
    pub number: usize,
    pub text: &'a str,
}

/// Evaluate the condition on a `%if` / `%elif` line
pub fn evaluate(
    line: ConditionLine<'_>,
    macros: &MacroTable,
    pkg: &PackageDefinition,
) -> Result<bool> {
    let fields: Vec<&str> = line.text.split_whitespace().collect();

    match fields.len() {
        2 => {
            let operand = macros.expand(fields[1], pkg);
            Ok(operand.parse::<i64>().is_ok_and(|n| n > 0))
        }
        n if n >= 4 => {
            let (raw_left, op, raw_right) = (fields[1], fields[2], fields[3]);
            let Some(comparison) = Comparison::parse(op) else {
                return Err(Error::parse(
                    Diagnostic::error(format!(
                        "{} is not a valid comparison operator on line {}",
                        op, line.number
                    ))
                    .at_line(line.number, line.text)
                    .highlight(op)
                    .with_help("Valid operands are ==, <=, >=, <, and >"),
                ));
            };

            let left = macros.expand(raw_left, pkg);
            let right = macros.expand(raw_right, pkg);
            if comparison == Comparison::Eq {
                return Ok(left == right);
            }

            let left = parse_integer(raw_left, &left, line)?;
            let right = parse_integer(raw_right, &right, line)?;
            Ok(match comparison {
                Comparison::Le => left <= right,
                Comparison::Ge => left >= right,
                Comparison::Lt => left < right,
                Comparison::Gt => left > right,
                Comparison::Eq => left == right,
            })
        }
        _ => Ok(false),
    }
}

fn parse_integer(raw: &str, expanded: &str, line: ConditionLine<'_>) -> Result<i64> {
    expanded.parse::<i64>().map_err(|_| {
        let diag = if raw == expanded {
            Diagnostic::error(format!(
                "{} is not a valid integer on line {}",
                raw, line.number
            ))
        } else {
            Diagnostic::error(format!(
                "{} does not expand to a valid integer on line {}",
                raw, line.number
            ))
            .with_help(format!("{} -> {}", raw, expanded))
        };
        Error::parse(diag.at_line(line.number, line.text).highlight(raw))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    /// Lines are processed
    Taking,
    /// Lines are skipped; `satisfied` once an earlier branch was taken
    Skipping { satisfied: bool },
}

/// Tracks which lines a conditional block lets through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionalState {
    branch: Option<Branch>,
}

impl ConditionalState {
    /// Whether lines are currently being skipped
    pub fn is_suppressed(&self) -> bool {
        matches!(self.branch, Some(Branch::Skipping { .. }))
    }

    /// Whether a conditional block is open
    pub fn is_open(&self) -> bool {
        self.branch.is_some()
    }

    pub fn enter_if(&mut self, result: bool) {
        self.branch = Some(if result {
            Branch::Taking
        } else {
            Branch::Skipping { satisfied: false }
        });
    }

    /// Handle `%elif`; `condition` only runs when no branch has been taken
    pub fn enter_elif(&mut self, condition: impl FnOnce() -> Result<bool>) -> Result<()> {
        self.branch = Some(match self.branch {
            Some(Branch::Taking) | Some(Branch::Skipping { satisfied: true }) => {
                Branch::Skipping { satisfied: true }
            }
            Some(Branch::Skipping { satisfied: false }) | None => {
                if condition()? {
                    Branch::Taking
                } else {
                    Branch::Skipping { satisfied: false }
                }
            }
        });
        Ok(())
    }

    pub fn enter_else(&mut self) {
        self.branch = Some(match self.branch {
            Some(Branch::Skipping { satisfied: false }) | None => Branch::Taking,
            Some(Branch::Taking) | Some(Branch::Skipping { satisfied: true }) => {
                Branch::Skipping { satisfied: true }
            }
        });
    }

    pub fn exit(&mut self) {
        self.branch = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Result<bool> {
        let mut table = MacroTable::new();
        table.define("five", "5");
        table.define("word", "abc");
        evaluate(
            ConditionLine { number: 7, text },
            &table,
            &PackageDefinition::default(),
        )
    }

    #[test]
    fn test_integer_comparisons() {
        assert!(eval("%if 5 > 3").unwrap());
        assert!(!eval("%if 3 > 5").unwrap());
        assert!(eval("%if %{five} >= 5").unwrap());
        assert!(eval("%if 2 <= 2").unwrap());
        assert!(eval("%if -1 < 0").unwrap());
    }

    #[test]
    fn test_string_equality() {
        assert!(eval("%if A == A").unwrap());
        assert!(!eval("%if A == B").unwrap());
        assert!(eval("%if %{word} == abc").unwrap());
    }

    #[test]
    fn test_single_operand() {
        assert!(eval("%if 1").unwrap());
        assert!(eval("%if %{five}").unwrap());
        assert!(!eval("%if 0").unwrap());
        assert!(!eval("%if abc").unwrap());
        assert!(!eval("%if %{undefined}").unwrap());
    }

    #[test]
    fn test_malformed_is_false() {
        assert!(!eval("%if").unwrap());
        assert!(!eval("%if 1 ==").unwrap());
    }

    #[test]
    fn test_invalid_integer_names_operand() {
        let err = eval("%if abc < 2").unwrap_err();
        let diag = err.diagnostic().unwrap();
        assert!(diag.message.contains("abc is not a valid integer on line 7"));
        assert_eq!(diag.span, Some((4, 3)));
    }

    #[test]
    fn test_expanded_integer_error_shows_expansion() {
        let err = eval("%if %{word} > 1").unwrap_err();
        let diag = err.diagnostic().unwrap();
        assert!(diag.message.contains("does not expand to a valid integer"));
        assert_eq!(diag.help.as_deref(), Some("%{word} -> abc"));
    }

    #[test]
    fn test_unknown_operator() {
        let err = eval("%if 1 != 2").unwrap_err();
        let diag = err.diagnostic().unwrap();
        assert!(diag.help.as_deref().unwrap().contains("==, <=, >=, <, and >"));
    }

    #[test]
    fn test_directive_parse() {
        assert_eq!(Directive::parse("%if 1"), Some(Directive::If));
        assert_eq!(Directive::parse("  %endif"), Some(Directive::Endif));
        assert_eq!(Directive::parse("%ifarch x86_64"), None);
    }

    #[test]
    fn test_elif_after_taken_branch() {
        let mut state = ConditionalState::default();
        state.enter_if(true);
        assert!(!state.is_suppressed());
        state.enter_elif(|| panic!("condition must not run")).unwrap();
        assert!(state.is_suppressed());
        state.enter_else();
        assert!(state.is_suppressed());
        state.exit();
        assert!(!state.is_suppressed());
        assert!(!state.is_open());
    }

    #[test]
    fn test_elif_chain() {
        let mut state = ConditionalState::default();
        state.enter_if(false);
        assert!(state.is_suppressed());
        state.enter_elif(|| Ok(false)).unwrap();
        assert!(state.is_suppressed());
        state.enter_elif(|| Ok(true)).unwrap();
        assert!(!state.is_suppressed());
        state.enter_else();
        assert!(state.is_suppressed());
    }

    #[test]
    fn test_else_after_false_if() {
        let mut state = ConditionalState::default();
        state.enter_if(false);
        state.enter_else();
        assert!(!state.is_suppressed());
    }
}
