// src/main.rs

mod cli;
mod commands;

use alpmbuild::config::{BuildOptions, UserConfig};
use alpmbuild::diagnostics::{Diagnostic, Reporter};
use anyhow::Result;
use clap::Parser;
use cli::Cli;
use std::process::ExitCode;

/// Find the crate error behind an anyhow chain and render it
fn report(err: &anyhow::Error, reporter: &Reporter) {
    let diagnostic = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<alpmbuild::Error>())
        .and_then(alpmbuild::Error::diagnostic);

    match diagnostic {
        Some(diag) => reporter.error(diag),
        None => reporter.error(&Diagnostic::error(format!("{:#}", err))),
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let mut options = BuildOptions::default();
    options.apply_user_config(UserConfig::load_default()?);
    cli.apply(&mut options, std::env::args_os().skip(1).collect());
    commands::cmd_build(options)
}

fn main() -> ExitCode {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            report(&err, &Reporter::new(cli.color, false));
            ExitCode::FAILURE
        }
    }
}
