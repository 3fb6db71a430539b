//! @acp:module "Dump Command"
//! @acp:summary "Print the parsed application model"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;
use clap::ValueEnum;

use super::{print_diagnostics, run_parser};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    Json,
    Yaml,
}

/// Options for the dump command
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Application root
    pub root: PathBuf,
    pub format: DumpFormat,
}

/// Execute the dump command. Returns whether the application is free of failures.
pub fn execute_dump(options: DumpOptions, config: Config) -> Result<bool> {
    let result = run_parser(&options.root, &config)?;
    print_diagnostics(&result.diagnostics, &config);

    let out = match options.format {
        DumpFormat::Json => serde_json::to_string_pretty(&result.app)?,
        DumpFormat::Yaml => serde_yaml::to_string(&result.app)?,
    };
    println!("{}", out);
    Ok(!config.is_failure(&result.diagnostics))
}
