//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Each command is in its own submodule; both share [`run_parser`].

pub mod check;
pub mod dump;

pub use check::{execute_check, CheckOptions};
pub use dump::{execute_dump, DumpFormat, DumpOptions};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::app::{AppParser, ParseResult};
use crate::config::Config;
use crate::diag::{Diagnostic, Severity};
use crate::loader::{PackageLoader, Workspace};

/// Load the application under `root` and parse it, with a spinner on interactive terminals.
///
/// Loader diagnostics come first in the returned list.
pub fn run_parser(root: &Path, config: &Config) -> Result<ParseResult> {
    if let Some(workers) = config.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .ok(); // Already initialized
    }

    let ws = Workspace::from_dir(root, config)
        .with_context(|| format!("failed to load application at {}", root.display()))?;
    let loader_diags = ws.diagnostics().to_vec();
    let total = ws.packages().len() as u64;
    debug!(packages = total, "workspace loaded");

    let spinner = Term::stderr().is_term().then(|| {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let mut parser = AppParser::new(Arc::new(ws));
    if let Some(pb) = &spinner {
        let pb = pb.clone();
        parser = parser.on_package(move |pkg| {
            pb.inc(1);
            pb.set_message(pkg.to_string());
        });
    }
    let mut result = parser.parse()?;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let mut diagnostics = loader_diags;
    diagnostics.append(&mut result.diagnostics);
    result.diagnostics = diagnostics;
    Ok(result)
}

/// Print diagnostics to stderr, honoring the configured cap.
pub fn print_diagnostics(diags: &[Diagnostic], config: &Config) {
    let cap = match config.error_handling.max_errors {
        0 => diags.len(),
        n => n.min(diags.len()),
    };
    for diag in &diags[..cap] {
        let label = match diag.severity {
            Severity::Error => style("error").red().bold(),
            Severity::Warning => style("warning").yellow().bold(),
        };
        match &diag.pos {
            Some(pos) => eprintln!("{}: {}: {}", style(pos).bold(), label, diag.message),
            None => eprintln!("{}: {}", label, diag.message),
        }
    }
    if cap < diags.len() {
        eprintln!(
            "{} {} more diagnostics not shown",
            style("…").dim(),
            diags.len() - cap
        );
    }
}
