#![forbid(unsafe_code)]
//! Encore Parser Command Line Interface

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use encore_parser::commands::{
    execute_check, execute_dump, CheckOptions, DumpFormat, DumpOptions,
};
use encore_parser::Config;

#[derive(Parser)]
#[command(name = "encore-parse")]
#[command(about = "Parse Encore directives and infrastructure resources in a Go application")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to .encore-parse.json in the application root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the application and report diagnostics
    Check {
        /// Application root (the directory holding go.mod)
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Print the parsed application model
    Dump {
        /// Application root (the directory holding go.mod)
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: DumpFormat,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>, root: &Path) -> anyhow::Result<Config> {
    Ok(match explicit {
        Some(path) => Config::load(path)?,
        None => Config::load_for_root(root)?,
    })
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Check { root } => {
            let config = load_config(cli.config.as_deref(), &root)?;
            execute_check(CheckOptions { root }, config)
        }
        Commands::Dump { root, format } => {
            let config = load_config(cli.config.as_deref(), &root)?;
            execute_dump(DumpOptions { root, format }, config)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red(), e);
            ExitCode::FAILURE
        }
    }
}
