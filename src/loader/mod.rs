//! @acp:module "Package Loader"
//! @acp:summary "Discovers Go source files, parses them in parallel and groups them into packages"
//! @acp:domain parser
//! @acp:layer service
//!
//! The rest of the crate only sees the [`PackageLoader`] trait. [`Workspace`]
//! is the stock implementation, built either from a directory on disk or from
//! in-memory sources (used heavily by tests).

pub mod syntax;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use glob::Pattern;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ast::{File, Package};
use crate::config::Config;
use crate::diag::{Diagnostic, Position, Severity};
use crate::error::{ParserError, Result};

pub use syntax::{parse_go, ParsedFile};

static MODULE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).expect("valid module regex")
});

/// Source of parsed packages for one application.
pub trait PackageLoader: Send + Sync {
    /// Go module path of the application, e.g. `encore.app`.
    fn module_path(&self) -> &str;

    fn package(&self, import_path: &str) -> Option<Arc<Package>>;

    /// Every package of the application, sorted by import path.
    fn packages(&self) -> Vec<Arc<Package>>;
}

/// @acp:summary "All packages of one Go module, parsed up front"
#[derive(Debug, Default)]
pub struct Workspace {
    module_path: String,
    packages: BTreeMap<String, Arc<Package>>,
    diagnostics: Vec<Diagnostic>,
}

impl PackageLoader for Workspace {
    fn module_path(&self) -> &str {
        &self.module_path
    }

    fn package(&self, import_path: &str) -> Option<Arc<Package>> {
        self.packages.get(import_path).cloned()
    }

    fn packages(&self) -> Vec<Arc<Package>> {
        self.packages.values().cloned().collect()
    }
}

impl Workspace {
    /// @acp:summary "Load every matching Go file under root"
    /// @acp:ai-careful "Parses files in parallel"
    pub fn from_dir<P: AsRef<Path>>(root: P, config: &Config) -> Result<Self> {
        let root = root.as_ref();
        let module_path = match &config.module_path {
            Some(path) => path.clone(),
            None => read_module_path(root)?,
        };

        let mut diagnostics = Vec::new();
        let mut files = find_files(root, config)?;
        if files.len() > config.limits.max_files {
            warn!(
                found = files.len(),
                limit = config.limits.max_files,
                "too many source files, truncating"
            );
            diagnostics.push(Diagnostic {
                pos: None,
                message: format!(
                    "application has {} Go files, only the first {} are parsed",
                    files.len(),
                    config.limits.max_files
                ),
                severity: Severity::Warning,
            });
            files.truncate(config.limits.max_files);
        }

        let max_bytes = config.limits.max_file_size_kb.saturating_mul(1024);
        let mut sources = Vec::with_capacity(files.len());
        for rel in files {
            let full = root.join(&rel);
            let size = std::fs::metadata(&full)?.len();
            if size > max_bytes {
                diagnostics.push(Diagnostic {
                    pos: Some(Position::new(rel.as_str(), 1, 1)),
                    message: format!(
                        "file skipped: {} KB exceeds the {} KB limit",
                        size / 1024,
                        config.limits.max_file_size_kb
                    ),
                    severity: Severity::Warning,
                });
                continue;
            }
            sources.push((rel, full));
        }

        let parsed = sources
            .par_iter()
            .map(|(rel, full)| {
                let src = std::fs::read_to_string(full)?;
                parse_go(rel, &src)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(module = %module_path, files = parsed.len(), "parsed workspace");
        let mut ws = Self::assemble(module_path, parsed);
        diagnostics.append(&mut ws.diagnostics);
        ws.diagnostics = diagnostics;
        Ok(ws)
    }

    /// Build a workspace from `(relative path, source)` pairs.
    pub fn from_sources<I, K, V>(module_path: &str, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed = sources
            .into_iter()
            .filter(|(name, _)| is_source_file(name.as_ref()))
            .map(|(name, src)| parse_go(name.as_ref(), src.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(module_path.to_string(), parsed))
    }

    /// Diagnostics produced while loading: syntax errors and skipped files.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn assemble(module_path: String, parsed: Vec<ParsedFile>) -> Self {
        let mut diagnostics = Vec::new();
        let mut by_dir: BTreeMap<String, Vec<Arc<File>>> = BTreeMap::new();

        for ParsedFile {
            file,
            syntax_errors,
        } in parsed
        {
            diagnostics.extend(syntax_errors.into_iter().map(|pos| Diagnostic {
                pos: Some(pos),
                message: "syntax error".to_string(),
                severity: Severity::Error,
            }));
            if file.package_name.name.ends_with("_test") {
                continue;
            }
            let dir = match file.name.rsplit_once('/') {
                Some((dir, _)) => dir.to_string(),
                None => ".".to_string(),
            };
            by_dir.entry(dir).or_default().push(Arc::new(file));
        }

        let mut packages = BTreeMap::new();
        for (rel_dir, mut files) in by_dir {
            files.sort_by(|a, b| a.name.cmp(&b.name));
            let import_path = if rel_dir == "." {
                module_path.clone()
            } else {
                format!("{}/{}", module_path, rel_dir)
            };
            let name = files
                .first()
                .map(|f| f.package_name.name.clone())
                .unwrap_or_default();
            packages.insert(
                import_path.clone(),
                Arc::new(Package {
                    import_path,
                    name,
                    rel_dir,
                    files,
                }),
            );
        }

        Self {
            module_path,
            packages,
            diagnostics,
        }
    }
}

fn is_source_file(name: &str) -> bool {
    name.ends_with(".go") && !name.ends_with("_test.go")
}

/// @acp:summary "Read the module path from go.mod"
pub fn read_module_path(root: &Path) -> Result<String> {
    let gomod = root.join("go.mod");
    if !gomod.exists() {
        return Err(ParserError::ModuleNotFound(root.to_path_buf()));
    }
    let content = std::fs::read_to_string(&gomod)?;
    MODULE_LINE
        .captures(&content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParserError::ModuleNotFound(root.to_path_buf()))
}

/// Go files under `root` matching the config globs, as sorted `/`-separated
/// paths relative to `root`.
fn find_files(root: &Path, config: &Config) -> Result<Vec<String>> {
    let include = config
        .include
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let exclude = config
        .exclude
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let match_opts = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e
                .path()
                .strip_prefix(root)
                .ok()?
                .to_string_lossy()
                .replace('\\', "/");
            if !is_source_file(&relative) {
                return None;
            }
            let included =
                include.is_empty() || include.iter().any(|p| p.matches_with(&relative, match_opts));
            let excluded = exclude.iter().any(|p| p.matches_with(&relative, match_opts));
            (included && !excluded).then_some(relative)
        })
        .collect();
    files.sort();
    Ok(files)
}
