//! @acp:module "Check Command"
//! @acp:summary "Parse an application and report every diagnostic"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;
use console::style;

use super::{print_diagnostics, run_parser};
use crate::config::Config;
use crate::diag::Severity;

/// Options for the check command
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Application root
    pub root: PathBuf,
}

/// Execute the check command. Returns whether the application is free of failures.
pub fn execute_check(options: CheckOptions, config: Config) -> Result<bool> {
    let result = run_parser(&options.root, &config)?;
    let diags = &result.diagnostics;
    print_diagnostics(diags, &config);

    let errors = diags
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diags.len() - errors;
    let app = &result.app;

    if config.is_failure(diags) {
        eprintln!(
            "{} {} error(s), {} warning(s) in {} package(s)",
            style("✗").red(),
            errors,
            warnings,
            app.packages.len()
        );
        return Ok(false);
    }

    println!(
        "{} {} package(s): {} endpoint(s), {} resource(s){}",
        style("✓").green(),
        app.packages.len(),
        app.rpcs.len(),
        app.resources.len(),
        if warnings > 0 {
            format!(", {} warning(s)", warnings)
        } else {
            String::new()
        }
    );
    Ok(true)
}
