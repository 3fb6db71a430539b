//! @acp:module "Errors"
//! @acp:summary "Crate-level error type for fallible I/O and setup operations"
//! @acp:domain parser
//! @acp:layer core
//!
//! Source-level problems are diagnostics (see [`crate::diag`]), not errors.
//! This type covers everything that stops a run before analysis starts.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParserError>;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("failed to load Go grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("no go.mod found in {0} (set modulePath in the config)")]
    ModuleNotFound(PathBuf),

    #[error("syntax tree could not be built for {0}")]
    Syntax(String),

    #[error("{0}")]
    Other(String),
}
