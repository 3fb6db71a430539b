//! @acp:module "Selectors"
//! @acp:summary "Tag selectors and insertion-ordered selector sets"
//! @acp:domain parser
//! @acp:layer core

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([-_a-z0-9]*[a-z0-9])?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Tag,
    All,
}

/// A `tag:<name>` selector or the wildcard `all`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub kind: SelectorKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("unknown selector format {0:?} (expected \"tag:<name>\" or \"all\")")]
    Format(String),
    #[error("invalid tag format {0:?}: tags must be lowercase, start with a letter and contain only letters, digits, '-' and '_'")]
    InvalidTag(String),
    #[error("duplicate tag \"{0}\"")]
    Duplicate(String),
}

impl Selector {
    pub fn tag(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::Tag,
            value: value.into(),
        }
    }

    pub fn all() -> Self {
        Self {
            kind: SelectorKind::All,
            value: String::new(),
        }
    }

    /// @acp:summary "Parse `tag:x` or `all`"
    pub fn parse(s: &str) -> Result<Self, SelectorError> {
        if s == "all" {
            return Ok(Self::all());
        }
        match s.strip_prefix("tag:") {
            Some(tag) if TAG_PATTERN.is_match(tag) => Ok(Self::tag(tag)),
            Some(tag) => Err(SelectorError::InvalidTag(tag.to_string())),
            None => Err(SelectorError::Format(s.to_string())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SelectorKind::All => f.write_str("all"),
            SelectorKind::Tag => write!(f, "tag:{}", self.value),
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// @acp:summary "Insertion-ordered set of unique selectors"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectorSet {
    items: Vec<Selector>,
}

impl SelectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sel`; adding a selector already present is an error.
    pub fn add(&mut self, sel: Selector) -> Result<(), SelectorError> {
        if self.items.contains(&sel) {
            return Err(SelectorError::Duplicate(sel.to_string()));
        }
        self.items.push(sel);
        Ok(())
    }

    pub fn contains(&self, sel: &Selector) -> bool {
        self.items.contains(sel)
    }

    /// Whether a set of targets selects something carrying `tags`.
    /// `all` selects everything.
    pub fn selects(&self, tags: &SelectorSet) -> bool {
        self.items
            .iter()
            .any(|s| s.kind == SelectorKind::All || tags.contains(s))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a SelectorSet {
    type Item = &'a Selector;
    type IntoIter = std::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sel) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", sel)?;
        }
        Ok(())
    }
}
