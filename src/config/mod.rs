//! @acp:module "Configuration"
//! @acp:summary "Parser configuration loading and defaults"
//! @acp:domain parser
//! @acp:layer config

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diag::{Diagnostic, Severity};

/// Default config file name, looked up in the application root.
pub const CONFIG_FILE: &str = ".encore-parse.json";

/// @acp:summary "Main parser configuration structure"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// File patterns to include (glob syntax, relative to the app root)
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// File patterns to exclude (glob syntax)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Go module path; read from go.mod when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,

    /// Number of parallel workers (defaults to the number of CPUs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Error handling configuration
    #[serde(default)]
    pub error_handling: ErrorHandling,

    /// Implementation limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            module_path: None,
            workers: None,
            error_handling: ErrorHandling::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// @acp:summary "Load config from a JSON file"
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `.encore-parse.json` from `root`, falling back to defaults.
    pub fn load_for_root<P: AsRef<Path>>(root: P) -> crate::Result<Self> {
        let path = root.as_ref().join(CONFIG_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Whether a run that produced `diags` counts as failed.
    pub fn is_failure(&self, diags: &[Diagnostic]) -> bool {
        diags.iter().any(|d| match d.severity {
            Severity::Error => true,
            Severity::Warning => self.error_handling.strictness == Strictness::Strict,
        })
    }
}

fn default_include() -> Vec<String> {
    vec!["**/*.go".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        // Dependencies
        "**/vendor/**".to_string(),
        "**/node_modules/**".to_string(),
        // Test-only code
        "**/testdata/**".to_string(),
        "**/*_test.go".to_string(),
        // Generated code
        "**/encore.gen.go".to_string(),
        "**/encore.gen.cue".to_string(),
        // VCS
        "**/.git/**".to_string(),
    ]
}

/// @acp:summary "Error handling configuration"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandling {
    /// Whether warnings fail the run
    #[serde(default = "default_strictness")]
    pub strictness: Strictness,

    /// Maximum number of diagnostics to print (0 = unlimited)
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            strictness: default_strictness(),
            max_errors: default_max_errors(),
        }
    }
}

fn default_strictness() -> Strictness {
    Strictness::Permissive
}

fn default_max_errors() -> usize {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Permissive,
    Strict,
}

/// @acp:summary "Implementation limits"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Maximum source file size in KB; larger files are skipped
    #[serde(default = "default_max_file_size")]
    pub max_file_size_kb: u64,

    /// Maximum number of source files in the application
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_kb: default_max_file_size(),
            max_files: default_max_files(),
        }
    }
}

fn default_max_file_size() -> u64 {
    2048
}

fn default_max_files() -> usize {
    50_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Position;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"workers": 4}"#).unwrap();
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.include, default_include());
        assert!(config.exclude.contains(&"**/*_test.go".to_string()));
        assert_eq!(config.error_handling.strictness, Strictness::Permissive);
        assert_eq!(config.limits.max_files, 50_000);
    }

    #[test]
    fn test_camel_case_keys() {
        let config: Config = serde_json::from_str(
            r#"{"modulePath": "example.com/app", "errorHandling": {"strictness": "strict", "maxErrors": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.module_path.as_deref(), Some("example.com/app"));
        assert_eq!(config.error_handling.strictness, Strictness::Strict);
        assert_eq!(config.error_handling.max_errors, 5);
    }

    #[test]
    fn test_strict_mode_fails_on_warnings() {
        let warning = Diagnostic {
            pos: Some(Position::new("a.go", 1, 1)),
            message: "file skipped".to_string(),
            severity: Severity::Warning,
        };

        let mut config = Config::default();
        assert!(!config.is_failure(std::slice::from_ref(&warning)));

        config.error_handling.strictness = Strictness::Strict;
        assert!(config.is_failure(&[warning]));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.workers = Some(2);
        config.save(&path).unwrap();

        let loaded = Config::load_for_root(dir.path()).unwrap();
        assert_eq!(loaded.workers, Some(2));
    }
}
