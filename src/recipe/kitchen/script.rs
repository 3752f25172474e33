// src/recipe/kitchen/script.rs

//! Running specfile command sections through the shell

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::recipe::package::PackageDefinition;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Environment exported to every build script
pub fn script_env(ctx: &BuildContext, pkg: &PackageDefinition) -> Vec<(&'static str, String)> {
    vec![
        ("BUILDROOT", ctx.area.package.to_string_lossy().into_owned()),
        ("SRCDIR", ctx.area.build.to_string_lossy().into_owned()),
        ("PKGNAME", pkg.name.clone()),
        ("PKGVER", pkg.version.clone()),
    ]
}

/// Run `lines` as one `sh -e` script in `workdir`
///
/// An empty script is skipped. A non-zero exit is a [`Error::ScriptFailed`].
pub fn run_script(
    ctx: &BuildContext,
    phase: &str,
    lines: &[String],
    workdir: &Path,
    pkg: &PackageDefinition,
) -> Result<()> {
    let script = lines.join("\n");
    if script.trim().is_empty() {
        debug!("No commands for {} phase", phase);
        return Ok(());
    }

    info!("Running {} phase in {}", phase, workdir.display());
    debug!("{} script:\n{}", phase, script);

    let (stdout, stderr) = if ctx.options.hide_command_output {
        (Stdio::null(), Stdio::null())
    } else {
        (Stdio::inherit(), Stdio::inherit())
    };

    let status = Command::new("sh")
        .arg("-e")
        .arg("-c")
        .arg(&script)
        .current_dir(workdir)
        .envs(script_env(ctx, pkg))
        .stdout(stdout)
        .stderr(stderr)
        .status()
        .map_err(|e| Error::IoError(format!("Failed to run {} phase: {}", phase, e)))?;

    if !status.success() {
        return Err(Error::ScriptFailed {
            phase: phase.to_string(),
            code: status.code(),
        });
    }

    Ok(())
}
