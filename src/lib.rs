#![forbid(unsafe_code)]

//! @acp:module "Encore Parser Library"
//! @acp:summary "Directive-driven declaration parser and infrastructure resource recognizer for Go applications"
//! @acp:domain parser
//! @acp:layer api
//! @acp:stability experimental
//!
//! # Encore Parser
//!
//! Static analysis front-end for Encore applications written in Go.
//!
//! ## Features
//!
//! - **Directives**: `//encore:api`, `//encore:authhandler`, `//encore:middleware`
//!   and `//encore:service` comments bound to the declarations they annotate
//! - **Resources**: pub/sub topics and subscriptions, cache clusters and keyspaces,
//!   cron jobs, config loads, metrics and SQL databases recognized from their constructor calls
//! - **Diagnostics**: every problem is reported with its source position and
//!   parsing keeps going, producing a best-effort model
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use encore_parser::{AppParser, Config, Workspace};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_for_root(".")?;
//!     let ws = Workspace::from_dir(".", &config)?;
//!     let result = AppParser::new(Arc::new(ws)).parse()?;
//!
//!     for diag in &result.diagnostics {
//!         eprintln!("{}", diag);
//!     }
//!     println!("{}", serde_json::to_string_pretty(&result.app)?);
//!     Ok(())
//! }
//! ```

pub mod apis;
pub mod app;
pub mod ast;
pub mod commands;
pub mod config;
pub mod diag;
pub mod directive;
pub mod error;
pub mod literals;
pub mod loader;
pub mod locations;
pub mod paths;
pub mod resources;
pub mod schema;

// Re-exports
pub use apis::{AuthHandler, Middleware, PackageApis, Rpc, ServiceStruct};
pub use app::{App, AppParser, PackageStatus, ParseResult};
pub use config::Config;
pub use diag::{Bailout, Diagnostic, ErrorList, Position, Severity};
pub use directive::{Directive, SelectorSet};
pub use error::{ParserError, Result};
pub use loader::{PackageLoader, Workspace};
pub use paths::{Path, PathSet, PathStyle};
pub use resources::{Resource, ResourceKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
