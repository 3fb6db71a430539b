//! @acp:module "Diagnostics"
//! @acp:summary "Position-anchored, append-only error collection with bailout support"
//! @acp:domain parser
//! @acp:layer core
//!
//! Every parser in this crate reports problems through an [`ErrorList`]
//! instead of returning them. The list is shared by all workers of a run and
//! guarded by a mutex. Conditions that make further analysis of a package
//! meaningless are signalled with [`Bailout`], which callers propagate with `?`
//! up to the per-package recovery point.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// A location in a source file. Lines and columns are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Position shifted right by `offset` columns on the same line.
    pub fn offset(&self, offset: usize) -> Self {
        Self {
            file: Arc::clone(&self.file),
            line: self.line,
            column: self.column + offset as u32,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// @acp:summary "A single diagnostic message"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{}: {}", pos, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Marker returned when a package cannot be analyzed any further.
///
/// The diagnostic explaining why has already been recorded by the time a
/// `Bailout` value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bailout: analysis of the current package was aborted")]
pub struct Bailout;

/// @acp:summary "Thread-safe, append-only list of diagnostics for one parse run"
#[derive(Debug, Default)]
pub struct ErrorList {
    inner: Mutex<Vec<Diagnostic>>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        // A poisoned list still holds every diagnostic pushed before the panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, diag: Diagnostic) {
        self.lock().push(diag);
    }

    /// Record an error anchored at `pos`.
    pub fn add(&self, pos: &Position, message: impl Into<String>) {
        self.push(Diagnostic {
            pos: Some(pos.clone()),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    /// Record an error with no meaningful source position.
    pub fn add_unpositioned(&self, message: impl Into<String>) {
        self.push(Diagnostic {
            pos: None,
            message: message.into(),
            severity: Severity::Error,
        });
    }

    pub fn warn(&self, pos: &Position, message: impl Into<String>) {
        self.push(Diagnostic {
            pos: Some(pos.clone()),
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    /// Record an error and return the [`Bailout`] marker for the caller to propagate.
    pub fn bailout(&self, pos: &Position, message: impl Into<String>) -> Bailout {
        self.add(pos, message);
        Bailout
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.lock().iter().any(|d| d.severity == Severity::Error)
    }

    /// Consistent copy of every diagnostic, ordered by position.
    /// Unpositioned diagnostics sort last.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        let mut diags = self.lock().clone();
        sort_by_position(&mut diags);
        diags
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        let mut diags = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        sort_by_position(&mut diags);
        diags
    }
}

fn sort_by_position(diags: &mut [Diagnostic]) {
    diags.sort_by(|a, b| match (&a.pos, &b.pos) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in self.snapshot() {
            writeln!(f, "{}", diag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, column: u32) -> Position {
        Position::new("svc/svc.go", line, column)
    }

    #[test]
    fn test_snapshot_orders_by_position() {
        let errs = ErrorList::new();
        errs.add(&pos(10, 2), "second");
        errs.add_unpositioned("last");
        errs.add(&pos(3, 1), "first");

        let msgs: Vec<_> = errs.snapshot().into_iter().map(|d| d.message).collect();
        assert_eq!(msgs, vec!["first", "second", "last"]);
    }

    #[test]
    fn test_bailout_records_error() {
        let errs = ErrorList::new();
        let res: Result<(), Bailout> = Err(errs.bailout(&pos(1, 1), "nothing to parse"));
        assert!(res.is_err());
        assert!(errs.has_errors());
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_warnings_are_not_errors() {
        let errs = ErrorList::new();
        errs.warn(&pos(1, 1), "large file skipped");
        assert!(!errs.is_empty());
        assert!(!errs.has_errors());
    }

    #[test]
    fn test_display_format() {
        let errs = ErrorList::new();
        errs.add(&pos(4, 7), "duplicate tag \"tag:foo\"");
        assert_eq!(
            errs.to_string(),
            "svc/svc.go:4:7: duplicate tag \"tag:foo\"\n"
        );
    }
}
