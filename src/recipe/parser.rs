// src/recipe/parser.rs

//! Specfile parsing
//!
//! The parser reads the specfile one logical line at a time (backslash
//! continuations joined) and classifies each line before acting on it:
//!
//! 1. conditional markers, always honoured, even in skipped branches
//! 2. `#!alpmbuild` meta-directives
//! 3. `Key: value` lines
//! 4. `%package`
//! 5. section markers (`%prep`, `%files -n foo`, `%post_install devel`, ...)
//! 6. content of the current section
//! 7. comments
//!
//! Anything else is a fatal error pointing at the line.

use crate::context::BuildContext;
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::packages::DependencyInfo;
use crate::recipe::conditional::{self, ConditionLine, ConditionalState, Directive};
use crate::recipe::keys::{self, KeyTarget, ListField, ListLint};
use crate::recipe::lint::{Existence, lint_identifier};
use crate::recipe::macros::unresolved_references;
use crate::recipe::package::{PackageId, Recipe, ScriptletHook, SourceEntry};
use crate::suggest;
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::debug;

/// Meta-directive prefix
pub const DIRECTIVE_PREFIX: &str = "#!alpmbuild";

/// Directives understood after [`DIRECTIVE_PREFIX`]
const DIRECTIVES: [&str; 2] = ["NoFileCheck", "ReasonFor"];

/// A specfile line after joining continuations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based physical line the logical line starts on
    pub number: usize,
    pub text: String,
}

/// Split specfile text into logical lines
pub fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;

    for (index, physical) in text.lines().enumerate() {
        let (content, continues) = match physical.strip_suffix('\\') {
            Some(content) => (content, true),
            None => (physical, false),
        };
        let line = pending.get_or_insert_with(|| LogicalLine {
            number: index + 1,
            text: String::new(),
        });
        line.text.push_str(content);
        if !continues {
            lines.extend(pending.take());
        }
    }
    lines.extend(pending.take());

    lines
}

/// Section the parser is currently collecting lines for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    None,
    Prepare,
    Build,
    Install,
    Check,
    Scriptlet(ScriptletHook),
    Files,
    Changelog,
    Description,
}

impl Stage {
    fn from_marker(token: &str) -> Option<Self> {
        let stage = match token {
            "%prep" => Self::Prepare,
            "%build" => Self::Build,
            "%install" => Self::Install,
            "%check" => Self::Check,
            "%files" => Self::Files,
            "%changelog" => Self::Changelog,
            "%description" => Self::Description,
            other => {
                return ScriptletHook::iter()
                    .find(|h| h.marker() == other)
                    .map(Self::Scriptlet);
            }
        };
        Some(stage)
    }

    /// Build sections always belong to the main package
    fn is_scoped(self) -> bool {
        !matches!(self, Self::None | Self::Prepare | Self::Build | Self::Install | Self::Check)
    }
}

/// How a logical line is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Conditional(Directive),
    Meta,
    KeyValue,
    Package,
    Marker(Stage),
    Content,
    Comment,
    Unknown,
}

/// First whitespace-separated token and the trimmed remainder
fn split_first_token(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim()),
        None => (text, ""),
    }
}

fn is_key_token(token: &str) -> bool {
    token.len() > 1 && token.ends_with(':') && !token.starts_with(['%', '#'])
}

struct Parser<'a> {
    ctx: &'a BuildContext,
    recipe: Recipe,
    stage: Stage,
    /// Package receiving section content
    target: PackageId,
    /// Package receiving `Key: value` lines, the latest `%package`
    active: PackageId,
    conditional: ConditionalState,
}

impl<'a> Parser<'a> {
    fn new(ctx: &'a BuildContext, text: &str) -> Self {
        Self {
            ctx,
            recipe: Recipe::new(text),
            stage: Stage::None,
            target: PackageId::ROOT,
            active: PackageId::ROOT,
            conditional: ConditionalState::default(),
        }
    }

    /// Expand macros with the main package as context
    fn expand(&self, text: &str) -> String {
        self.ctx.macros.expand(text, self.recipe.packages.root())
    }

    fn classify(&self, line: &LogicalLine) -> LineKind {
        let (token, _) = split_first_token(&line.text);
        if token.is_empty() {
            return LineKind::Blank;
        }
        if let Some(directive) = Directive::parse(&line.text) {
            return LineKind::Conditional(directive);
        }
        if token == DIRECTIVE_PREFIX {
            return LineKind::Meta;
        }
        if is_key_token(token) {
            return LineKind::KeyValue;
        }
        if token == "%package" {
            return LineKind::Package;
        }
        if let Some(stage) = Stage::from_marker(token) {
            return LineKind::Marker(stage);
        }
        if self.stage != Stage::None {
            return LineKind::Content;
        }
        if token.starts_with('#') {
            return LineKind::Comment;
        }
        LineKind::Unknown
    }

    fn parse_line(&mut self, line: &LogicalLine) -> Result<()> {
        let kind = self.classify(line);
        if kind == LineKind::Blank {
            return Ok(());
        }

        if let LineKind::Conditional(directive) = kind {
            self.warn_unresolved(line);
            return self.handle_conditional(directive, line);
        }
        // Lines in a branch not taken are neither parsed nor checked for
        // unresolved macros
        if self.conditional.is_suppressed() {
            return Ok(());
        }
        // Changelog text is kept verbatim
        if !(kind == LineKind::Content && self.stage == Stage::Changelog) {
            self.warn_unresolved(line);
        }

        match kind {
            LineKind::Meta => self.handle_meta(line),
            LineKind::KeyValue => self.handle_key_value(line),
            LineKind::Package => self.handle_package(line),
            LineKind::Marker(stage) => self.handle_marker(stage, line),
            LineKind::Content => self.handle_content(line),
            LineKind::Comment => Ok(()),
            LineKind::Unknown => Err(Error::parse(
                Diagnostic::error(format!("Could not parse line {}", line.number))
                    .at_line(line.number, line.text.as_str())
                    .with_help("Expected a key, a section marker or a command inside a section"),
            )),
            LineKind::Blank | LineKind::Conditional(_) => Ok(()),
        }
    }

    fn warn_unresolved(&self, line: &LogicalLine) {
        let expanded = self.expand(&line.text);
        for (_, reference) in unresolved_references(&expanded) {
            let name = reference.trim_start_matches("%{").trim_end_matches('}');
            let mut diag = Diagnostic::warning(format!(
                "Macro {} is not defined on line {}",
                reference, line.number
            ))
            .at_line(line.number, line.text.as_str())
            .highlight(reference);
            if let Some(closest) = suggest::closest(name, self.ctx.macros.names()) {
                diag = diag.with_help(format!("Did you mean %{{{}}}?", closest));
            }
            self.ctx.reporter.warn(diag);
        }
    }

    fn require_open_block(&self, marker: &str, line: &LogicalLine) -> Result<()> {
        if self.conditional.is_open() {
            return Ok(());
        }
        Err(Error::parse(
            Diagnostic::error(format!("{} without a matching %if on line {}", marker, line.number))
                .at_line(line.number, line.text.as_str())
                .highlight(marker),
        ))
    }

    fn handle_conditional(&mut self, directive: Directive, line: &LogicalLine) -> Result<()> {
        let condition = ConditionLine { number: line.number, text: &line.text };
        let macros = &self.ctx.macros;
        let root = self.recipe.packages.root();

        match directive {
            Directive::If => {
                let result = conditional::evaluate(condition, macros, root)?;
                self.conditional.enter_if(result);
            }
            Directive::Elif => {
                self.require_open_block("%elif", line)?;
                self.conditional
                    .enter_elif(|| conditional::evaluate(condition, macros, root))?;
            }
            Directive::Else => {
                self.require_open_block("%else", line)?;
                self.conditional.enter_else();
            }
            Directive::Endif => {
                self.require_open_block("%endif", line)?;
                self.conditional.exit();
            }
        }
        Ok(())
    }

    fn handle_meta(&mut self, line: &LogicalLine) -> Result<()> {
        let (_, rest) = split_first_token(&line.text);
        let (directive, args) = split_first_token(rest);

        match directive {
            "NoFileCheck" => {
                debug!("File coverage check disabled by directive");
                self.recipe.file_check = false;
            }
            "ReasonFor" => {
                let parsed = args.split_once(':').and_then(|(name, reason)| {
                    let name = name.split_whitespace().last()?;
                    let reason = reason.trim();
                    (!reason.is_empty()).then_some((name, reason))
                });
                let Some((name, reason)) = parsed else {
                    return Err(Error::parse(
                        Diagnostic::error(format!(
                            "Malformed ReasonFor directive on line {}",
                            line.number
                        ))
                        .at_line(line.number, line.text.as_str())
                        .with_help(format!(
                            "Use: {} ReasonFor <package>: <reason>",
                            DIRECTIVE_PREFIX
                        )),
                    ));
                };
                let reason = self.expand(reason);
                self.recipe
                    .packages
                    .root_mut()
                    .reasons
                    .insert(name.to_string(), reason);
            }
            other => {
                let mut diag = Diagnostic::warning(format!(
                    "Unknown directive {} on line {}",
                    other, line.number
                ))
                .at_line(line.number, line.text.as_str())
                .highlight(other);
                if let Some(closest) = suggest::closest(other, DIRECTIVES) {
                    diag = diag.with_help(format!("Did you mean to use {}?", closest));
                }
                self.ctx.reporter.warn(diag);
            }
        }
        Ok(())
    }

    fn handle_key_value(&mut self, line: &LogicalLine) -> Result<()> {
        let (token, raw_value) = split_first_token(&line.text);
        let Some(target) = keys::lookup(token) else {
            let key = token.trim_end_matches(':');
            let mut diag = Diagnostic::error(format!(
                "{} is not a valid key on line {}",
                key, line.number
            ))
            .at_line(line.number, line.text.as_str())
            .highlight(key);
            if let Some(closest) = suggest::closest(key, keys::key_names()) {
                diag = diag.with_help(format!("Did you mean to use {}?", closest));
            }
            return Err(Error::parse(diag));
        };

        if raw_value.is_empty() {
            debug!("Ignoring empty value for {} on line {}", token, line.number);
            return Ok(());
        }

        match target {
            KeyTarget::Scalar(field) => {
                let value = self.expand(raw_value);
                field.set(self.recipe.packages.get_mut(self.active), value);
            }
            KeyTarget::List(field) => {
                let value = self.expand(raw_value);
                for item in value.split_whitespace() {
                    self.lint_list_item(field, item, line)?;
                    field
                        .get_mut(self.recipe.packages.get_mut(self.active))
                        .push(item.to_string());
                }
            }
            KeyTarget::EpochVersionRelease => {
                let value = self.expand(raw_value);
                let parts: Vec<&str> = value.split(['-', ':']).filter(|s| !s.is_empty()).collect();
                if parts.len() < 3 {
                    return Err(Error::parse(
                        Diagnostic::error(format!(
                            "{} is not a valid epoch:version-release on line {}",
                            value, line.number
                        ))
                        .at_line(line.number, line.text.as_str())
                        .highlight(raw_value)
                        .with_help("Use the form <epoch>:<version>-<release>, e.g. 1:2.0-3"),
                    ));
                }
                let pkg = self.recipe.packages.get_mut(self.active);
                pkg.epoch = parts[0].to_string();
                pkg.version = parts[1].to_string();
                pkg.release = parts[2].to_string();
            }
            KeyTarget::Source => {
                let entry = self.parse_source(raw_value, line)?;
                self.recipe.packages.root_mut().sources.push(entry);
            }
            KeyTarget::Patch => {
                let entry = self.parse_source(raw_value, line)?;
                self.recipe.packages.root_mut().patches.push(entry);
            }
        }
        Ok(())
    }

    fn lint_list_item(&self, field: ListField, item: &str, line: &LogicalLine) -> Result<()> {
        let lint = field.lint();
        if lint == ListLint::None {
            return Ok(());
        }

        let name = DependencyInfo::parse(item).name;
        if let Err(problem) = lint_identifier(&name) {
            let mut diag = Diagnostic::error(format!(
                "Package name '{}' {} on line {}",
                item, problem, line.number
            ))
            .at_line(line.number, line.text.as_str())
            .with_help("Package names may contain alphanumerics and any of +_.@-");
            if let Some(start) = line.text.find(item) {
                diag = match problem.position() {
                    Some(pos) => {
                        let width = line.text[start..]
                            .get(pos..)
                            .and_then(|rest| rest.chars().next())
                            .map_or(1, char::len_utf8);
                        diag.with_span(start + pos, width)
                    }
                    None => diag.with_span(start, item.len()),
                };
            }
            return Err(Error::parse(diag));
        }

        if !self.ctx.checks_host_packages() {
            return Ok(());
        }

        let (existence, what) = match lint {
            ListLint::Package => (self.ctx.linter.check_package(&name), "Package"),
            ListLint::Group => (self.ctx.linter.check_group(&name), "Group"),
            ListLint::Identifier | ListLint::None => return Ok(()),
        };
        if let Existence::Missing { suggestion } = existence {
            let mut diag = Diagnostic::warning(format!(
                "{} {} does not exist in the repositories on line {}",
                what, name, line.number
            ))
            .at_line(line.number, line.text.as_str())
            .highlight(&name);
            if let Some(suggestion) = suggestion {
                diag = diag.with_help(format!("Did you mean to use {}?", suggestion));
            }
            self.ctx.reporter.warn(diag);
        }
        Ok(())
    }

    fn parse_source(&self, raw: &str, line: &LogicalLine) -> Result<SourceEntry> {
        let words: Vec<&str> = raw.split_whitespace().collect();
        let mut entry = SourceEntry::new(self.expand(words[0]));

        let modifier_value = |index: usize, modifier: &str, what: &str| -> Result<String> {
            words.get(index).map(|w| self.expand(w)).ok_or_else(|| {
                Error::parse(
                    Diagnostic::error(format!(
                        "'{}' needs {} on line {}",
                        modifier, what, line.number
                    ))
                    .at_line(line.number, line.text.as_str())
                    .highlight(modifier),
                )
            })
        };

        let mut i = 1;
        while i < words.len() {
            match words[i] {
                "with" => {
                    let Some(algorithm) = words.get(i + 1) else {
                        return Err(Error::parse(
                            Diagnostic::error(format!(
                                "Incomplete hash directive on line {}",
                                line.number
                            ))
                            .at_line(line.number, line.text.as_str())
                            .highlight("with")
                            .with_help(format!(
                                "Valid hash types are: {}",
                                HashAlgorithm::names().join(", ")
                            )),
                        ));
                    };
                    let algorithm = algorithm.parse::<HashAlgorithm>().map_err(|_| {
                        let mut diag = Diagnostic::error(format!(
                            "{} is not a valid hash type on line {}",
                            algorithm, line.number
                        ))
                        .at_line(line.number, line.text.as_str())
                        .highlight(algorithm);
                        if let Some(closest) = suggest::closest(algorithm, HashAlgorithm::names()) {
                            diag = diag.with_help(format!("Did you mean to use {}?", closest));
                        }
                        Error::parse(diag)
                    })?;
                    let digest = modifier_value(i + 2, "with", "a hash after the hash type")?;
                    entry.digests.insert(algorithm, digest.to_ascii_lowercase());
                    i += 3;
                }
                "renamed" => {
                    entry.rename = Some(modifier_value(i + 1, "renamed", "a file name")?);
                    i += 2;
                }
                "signed" => {
                    entry.signature = Some(modifier_value(i + 1, "signed", "a signature URL")?);
                    i += 2;
                }
                "key" => {
                    entry.gpg_keys.push(modifier_value(i + 1, "key", "a key fingerprint")?);
                    i += 2;
                }
                "keyserver" => {
                    entry.keyservers.push(modifier_value(i + 1, "keyserver", "a keyserver host")?);
                    i += 2;
                }
                other => {
                    return Err(Error::parse(
                        Diagnostic::error(format!(
                            "Unexpected '{}' in source declaration on line {}",
                            other, line.number
                        ))
                        .at_line(line.number, line.text.as_str())
                        .highlight(other)
                        .with_help(
                            "Sources accept: with <algo> <digest>, renamed <name>, signed <url>, \
                             key <fingerprint>, keyserver <host>",
                        ),
                    ));
                }
            }
        }

        Ok(entry)
    }

    /// Package named by `-n <name>` or a suffix after a marker
    fn scoped_name(&self, line: &LogicalLine) -> Result<Option<String>> {
        let tokens: Vec<&str> = line.text.split_whitespace().collect();
        match tokens.get(1) {
            None => Ok(None),
            Some(&"-n") => match tokens.get(2) {
                Some(name) => Ok(Some(self.expand(name))),
                None => Err(Error::parse(
                    Diagnostic::error(format!("-n needs a package name on line {}", line.number))
                        .at_line(line.number, line.text.as_str())
                        .highlight("-n"),
                )),
            },
            Some(suffix) => Ok(Some(format!(
                "{}-{}",
                self.recipe.packages.root().name,
                self.expand(suffix)
            ))),
        }
    }

    fn handle_package(&mut self, line: &LogicalLine) -> Result<()> {
        let Some(name) = self.scoped_name(line)? else {
            return Err(Error::parse(
                Diagnostic::error(format!("%package needs a name on line {}", line.number))
                    .at_line(line.number, line.text.as_str())
                    .with_help("Use %package <suffix> or %package -n <name>"),
            ));
        };
        debug!("Declaring subpackage {}", name);
        self.active = self.recipe.packages.declare_subpackage(&name);
        self.stage = Stage::None;
        Ok(())
    }

    fn handle_marker(&mut self, stage: Stage, line: &LogicalLine) -> Result<()> {
        let target = if stage.is_scoped() {
            match self.scoped_name(line)? {
                None => PackageId::ROOT,
                Some(name) if name == self.recipe.packages.root().name => PackageId::ROOT,
                Some(name) => self.recipe.packages.find_subpackage(&name).ok_or_else(|| {
                    let (marker, _) = split_first_token(&line.text);
                    Error::parse(
                        Diagnostic::error(format!(
                            "{} refers to subpackage {} which has not been declared on line {}",
                            marker, name, line.number
                        ))
                        .at_line(line.number, line.text.as_str())
                        .with_help(format!("Declare it first with %package -n {}", name)),
                    )
                })?,
            }
        } else {
            PackageId::ROOT
        };

        self.stage = stage;
        self.target = target;
        Ok(())
    }

    fn handle_content(&mut self, line: &LogicalLine) -> Result<()> {
        let target = self.target;

        match self.stage {
            Stage::Files => {
                let trimmed = line.text.trim();
                if trimmed.starts_with('#') {
                    return Ok(());
                }
                if let Some(config) = trimmed.strip_prefix("%config") {
                    let value = self.expand(config.trim());
                    let value = value.strip_prefix('/').unwrap_or(&value).to_string();
                    self.recipe.packages.get_mut(target).backup.push(value);
                } else {
                    let value = self.expand(trimmed);
                    self.recipe.packages.get_mut(target).files.push(value);
                }
            }
            Stage::Changelog => {
                // Kept verbatim, %-signs in changelogs are not macros
                self.recipe
                    .packages
                    .get_mut(target)
                    .changelog
                    .push(line.text.clone());
            }
            stage => {
                let value = self.expand(&line.text);
                let pkg = self.recipe.packages.get_mut(target);
                match stage {
                    Stage::Prepare => pkg.commands.prepare.push(value),
                    Stage::Build => pkg.commands.build.push(value),
                    Stage::Install => pkg.commands.install.push(value),
                    Stage::Check => pkg.commands.check.push(value),
                    Stage::Scriptlet(hook) => pkg.scriptlets.get_mut(hook).push(value),
                    Stage::Description => pkg.description.push(value),
                    Stage::Files | Stage::Changelog | Stage::None => {}
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Recipe {
        if self.conditional.is_open() {
            self.ctx
                .reporter
                .warn(Diagnostic::warning("Specfile ends inside an %if block"));
        }

        if self.recipe.packages.root().commands.prepare.is_empty() {
            self.ctx.reporter.status("Automatically setting up package...");
            let setup = self.expand("%setup -q");
            self.recipe.packages.root_mut().commands.prepare.push(setup);
        }

        self.recipe
    }
}

/// Parse specfile text into a [`Recipe`]
pub fn parse_recipe(text: &str, ctx: &BuildContext) -> Result<Recipe> {
    let mut parser = Parser::new(ctx, text);
    for line in logical_lines(text) {
        parser.parse_line(&line)?;
    }
    Ok(parser.finish())
}

/// Parse a specfile from disk
pub fn parse_recipe_file(path: &Path, ctx: &BuildContext) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read specfile {}: {}", path.display(), e))
    })?;

    parse_recipe(&content, ctx)
}

/// Validate a recipe for completeness
///
/// Missing identity fields are fatal; missing descriptive fields are
/// returned as warnings.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let root = recipe.root();
    for (key, value) in [
        ("Name", &root.name),
        ("Version", &root.version),
        ("Release", &root.release),
    ] {
        if value.is_empty() {
            return Err(Error::parse(
                Diagnostic::error(format!("Specfile does not declare {}", key))
                    .with_help(format!("Add a line like '{}: ...' before the first section", key)),
            ));
        }
    }

    let mut warnings = Vec::new();
    for id in recipe.packages.ids() {
        let pkg = recipe.packages.get(id);
        if pkg.summary.is_empty() {
            warnings.push(format!("Package {} has no Summary", pkg.name));
        }
    }
    if root.license.is_empty() {
        warnings.push(format!("Package {} has no License", root.name));
    }

    Ok(warnings)
}
