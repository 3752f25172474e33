// src/diagnostics.rs

//! User-facing build output
//!
//! Status lines, warnings and errors are printed with the `==> ` family of
//! prefixes. Diagnostics that point into the specfile repeat the offending
//! line and underline the culprit with carets.
//!
//! Warnings are also collected so callers (and tests) can inspect them after
//! a parse. In the privileged re-exec the reporter is quiet: warnings and
//! status lines were already shown by the unprivileged phase.

use clap::ValueEnum;
use serde::Deserialize;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Color mode for terminal output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Always use colors
    Always,
    /// Never use colors
    Never,
    /// Auto-detect terminal capabilities
    #[default]
    Auto,
}

impl ColorMode {
    /// Resolve to a termcolor ColorChoice
    pub fn to_color_choice(self) -> ColorChoice {
        // NO_COLOR always wins (https://no-color.org)
        if std::env::var_os("NO_COLOR").is_some() {
            return ColorChoice::Never;
        }
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto => ColorChoice::Auto,
        }
    }
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Error => "ERROR ==> ",
            Level::Warning => "WARNING ==> ",
        }
    }

    fn color(self) -> Color {
        match self {
            Level::Error => Color::Red,
            Level::Warning => Color::Yellow,
        }
    }
}

/// A message about the specfile or the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    /// 1-based line number in the specfile
    pub line_number: Option<usize>,
    /// The offending logical line, as written
    pub source_line: Option<String>,
    /// Byte offset and length of the highlighted region in `source_line`
    pub span: Option<(usize, usize)>,
    pub help: Option<String>,
}

impl Diagnostic {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            line_number: None,
            source_line: None,
            span: None,
            help: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    /// Attach the specfile line this diagnostic refers to
    pub fn at_line(mut self, number: usize, line: impl Into<String>) -> Self {
        self.line_number = Some(number);
        self.source_line = Some(line.into());
        self
    }

    /// Highlight `len` bytes starting at `start` of the attached line
    pub fn with_span(mut self, start: usize, len: usize) -> Self {
        self.span = Some((start, len.max(1)));
        self
    }

    /// Highlight the first occurrence of `needle` in the attached line
    ///
    /// Leaves the span unset when the needle does not appear verbatim, which
    /// happens when the culprit only exists after macro expansion.
    pub fn highlight(mut self, needle: &str) -> Self {
        if needle.is_empty() {
            return self;
        }
        let found = self.source_line.as_deref().and_then(|line| line.find(needle));
        if let Some(start) = found {
            self.span = Some((start, needle.len()));
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render without colors, exactly as it would appear on a terminal
    pub fn render_plain(&self) -> String {
        let mut buf = termcolor::NoColor::new(Vec::new());
        // Writing into a Vec cannot fail
        let _ = write_diagnostic(&mut buf, self);
        String::from_utf8_lossy(&buf.into_inner()).into_owned()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Widen a byte range of `line` outwards to the nearest char boundaries
fn char_bounds(line: &str, start: usize, end: usize) -> (usize, usize) {
    let mut start = start.min(line.len());
    while !line.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = end.clamp(start, line.len());
    while !line.is_char_boundary(end) {
        end += 1;
    }
    (start, end)
}

/// Write a diagnostic with its prefix, source line and caret underline
pub fn write_diagnostic(w: &mut impl WriteColor, diag: &Diagnostic) -> io::Result<()> {
    let prefix = diag.level.prefix();

    w.set_color(ColorSpec::new().set_fg(Some(diag.level.color())).set_bold(true))?;
    write!(w, "{}", prefix)?;
    w.reset()?;
    w.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(w, "{}", diag.message)?;
    w.reset()?;

    let indent = " ".repeat(prefix.len());
    if let Some(line) = &diag.source_line {
        match diag.span {
            Some((start, len)) if start <= line.len() => {
                let (start, end) = char_bounds(line, start, start + len);
                write!(w, "{}{}", indent, &line[..start])?;
                w.set_color(ColorSpec::new().set_fg(Some(diag.level.color())).set_bold(true))?;
                write!(w, "{}", &line[start..end])?;
                w.reset()?;
                writeln!(w, "{}", &line[end..])?;

                let pad = line[..start].chars().count();
                let carets = line[start..end].chars().count().max(1);
                w.set_color(ColorSpec::new().set_fg(Some(diag.level.color())))?;
                writeln!(w, "{}{}{}", indent, " ".repeat(pad), "^".repeat(carets))?;
                w.reset()?;
            }
            _ => writeln!(w, "{}{}", indent, line)?,
        }
    }

    if let Some(help) = &diag.help {
        w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(w, "{}{}", indent, help)?;
        w.reset()?;
    }

    Ok(())
}

/// Prints build progress and diagnostics to the terminal
pub struct Reporter {
    color: ColorChoice,
    quiet: bool,
    echo: bool,
    warnings: RefCell<Vec<Diagnostic>>,
}

impl Reporter {
    /// Create a reporter printing to stdout/stderr
    ///
    /// A quiet reporter still prints errors but drops status lines and does
    /// not print warnings.
    pub fn new(color: ColorMode, quiet: bool) -> Self {
        Self {
            color: color.to_color_choice(),
            quiet,
            echo: true,
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Create a reporter that records warnings without printing anything
    pub fn capture() -> Self {
        Self {
            color: ColorChoice::Never,
            quiet: false,
            echo: false,
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Print a `==> ` status line
    pub fn status(&self, message: impl AsRef<str>) {
        if self.quiet || !self.echo {
            return;
        }
        let mut out = StandardStream::stdout(self.color);
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = write!(out, "==> ");
        let _ = out.reset();
        let _ = writeln!(out, "{}", message.as_ref());
    }

    /// Record and print a warning
    pub fn warn(&self, diag: Diagnostic) {
        tracing::debug!("warning: {}", diag.message);
        if self.quiet {
            return;
        }
        if self.echo {
            let mut err = StandardStream::stderr(self.color);
            let _ = write_diagnostic(&mut err, &diag);
        }
        self.warnings.borrow_mut().push(diag);
    }

    /// Print an error diagnostic
    pub fn error(&self, diag: &Diagnostic) {
        if !self.echo {
            return;
        }
        let mut err = StandardStream::stderr(self.color);
        let _ = write_diagnostic(&mut err, diag);
    }

    /// Warnings recorded so far
    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.warnings.borrow().clone()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ColorMode::Auto, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_caret() {
        let diag = Diagnostic::error("bad name")
            .at_line(3, "Name: pkg!")
            .with_span(9, 1)
            .with_help("Use only alphanumerics");
        let out = diag.render_plain();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ERROR ==> bad name");
        assert_eq!(lines[1], "          Name: pkg!");
        assert_eq!(lines[2], "                   ^");
        assert_eq!(lines[3], "          Use only alphanumerics");
    }

    #[test]
    fn test_span_inside_multibyte_char_is_widened() {
        let diag = Diagnostic::error("bad name")
            .at_line(6, "Requires: café")
            .with_span(14, 1);
        let out = diag.render_plain();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "          Requires: café");
        assert_eq!(lines[2], "                       ^");
    }

    #[test]
    fn test_highlight_missing_needle() {
        let diag = Diagnostic::warning("x").at_line(1, "abc").highlight("zzz");
        assert!(diag.span.is_none());
        let diag = Diagnostic::warning("x").at_line(1, "abc").highlight("bc");
        assert_eq!(diag.span, Some((1, 2)));
    }

    #[test]
    fn test_capture_collects_warnings() {
        let reporter = Reporter::capture();
        reporter.warn(Diagnostic::warning("one"));
        reporter.warn(Diagnostic::warning("two"));
        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[1].message, "two");
    }

    #[test]
    fn test_quiet_reporter_drops_warnings() {
        let reporter = Reporter::new(ColorMode::Never, true);
        reporter.warn(Diagnostic::warning("hidden"));
        assert!(reporter.warnings().is_empty());
    }
}
