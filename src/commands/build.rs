// src/commands/build.rs

//! Build command - turn a specfile into pacman packages

use alpmbuild::config::BuildOptions;
use alpmbuild::context::BuildContext;
use alpmbuild::diagnostics::{Diagnostic, Reporter};
use alpmbuild::recipe::{Kitchen, parse_recipe_file, validate_recipe};
use anyhow::{Context, Result};
use tracing::info;

/// Build the specfile named in `options`
///
/// Returns the process exit code. In the unprivileged phase this is the exit
/// code of the fakeroot re-exec.
pub fn cmd_build(options: BuildOptions) -> Result<i32> {
    let recipe_path = options.recipe_path.clone();
    let color = options.color;
    let privileged = options.privileged;

    let ctx = BuildContext::new(options).context("Failed to set up the build environment")?;

    ctx.reporter.status("Parsing package...");
    let mut recipe = parse_recipe_file(&recipe_path, &ctx)
        .with_context(|| format!("Failed to parse specfile: {}", recipe_path.display()))?;

    for warning in validate_recipe(&recipe).context("Specfile validation failed")? {
        ctx.reporter.warn(Diagnostic::warning(warning));
    }

    info!(
        "Parsed {} ({} packages)",
        recipe.root().nevr(),
        recipe.packages.len()
    );

    // Parse output is only shown once; the fakeroot phase reports its own steps
    let ctx = if privileged {
        ctx.with_reporter(Reporter::new(color, false))
    } else {
        ctx
    };

    let code = Kitchen::new()
        .run(&ctx, &mut recipe)
        .with_context(|| format!("Failed to build {}", recipe.root().nevr()))?;

    Ok(code)
}
