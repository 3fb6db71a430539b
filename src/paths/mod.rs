//! @acp:module "Paths"
//! @acp:summary "Endpoint and cache keyspace path patterns"
//! @acp:domain parser
//! @acp:layer core
//!
//! Two grammars share one segment model. API paths begin with `/` and may end
//! in a named `*wildcard`. Keyspace patterns never begin with `/` and may end
//! in a bare `*`; anything else starting with `*` is an ordinary literal.

mod set;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::diag::Position;
use crate::schema::BuiltinKind;

pub use set::PathSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    Api,
    Keyspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Literal,
    Param,
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: SegmentType,
    pub value: String,
    /// Filled in once the matching parameter's type is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<BuiltinKind>,
}

impl Segment {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentType::Literal,
            value: value.into(),
            value_type: None,
        }
    }

    pub fn param(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentType::Param,
            value: value.into(),
            value_type: None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.kind == SegmentType::Literal
    }

    /// Form used in conflict messages.
    fn describe(&self) -> String {
        match self.kind {
            SegmentType::Literal => self.value.clone(),
            SegmentType::Param => format!("parameter ':{}'", self.value),
            SegmentType::Wildcard => format!("wildcard '*{}'", self.value),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SegmentType::Literal => f.write_str(&self.value),
            SegmentType::Param => write!(f, ":{}", self.value),
            // A keyspace wildcard is stored with an empty name.
            SegmentType::Wildcard => write!(f, "*{}", self.value),
        }
    }
}

/// @acp:summary "A parsed path pattern"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    pub style: PathStyle,
    pub segments: Vec<Segment>,
    #[serde(skip)]
    pub pos: Position,
}

impl Path {
    /// Parameter and wildcard segments, in order.
    pub fn params(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| !s.is_literal())
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.iter_mut().filter(|s| !s.is_literal())
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| s.kind == SegmentType::Wildcard)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.style == PathStyle::Api {
            f.write_str("/")?;
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

/// A malformed path or a routing conflict, anchored at the offending path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PathError {
    pub pos: Position,
    pub message: String,
}

impl PathError {
    fn new(pos: &Position, message: impl Into<String>) -> Self {
        Self {
            pos: pos.clone(),
            message: message.into(),
        }
    }
}

/// @acp:summary "Parse a path pattern in the given style"
pub fn parse(pos: &Position, path: &str, style: PathStyle) -> Result<Path, PathError> {
    if path.is_empty() {
        return Err(PathError::new(pos, "empty path"));
    }

    let rest = match style {
        PathStyle::Api => path
            .strip_prefix('/')
            .ok_or_else(|| PathError::new(pos, "path must begin with '/'"))?,
        PathStyle::Keyspace if path.starts_with('/') => {
            return Err(PathError::new(pos, "path must not begin with '/'"));
        }
        PathStyle::Keyspace => path,
    };

    // "/" alone is the root endpoint.
    if rest.is_empty() {
        return Ok(Path {
            style,
            segments: Vec::new(),
            pos: pos.clone(),
        });
    }
    if rest.ends_with('/') {
        return Err(PathError::new(pos, "path cannot contain trailing slash"));
    }
    if rest.starts_with('/') || rest.contains("//") {
        return Err(PathError::new(pos, "path cannot contain double slash"));
    }

    let parts: Vec<&str> = rest.split('/').collect();
    let last = parts.len() - 1;
    let mut segments = Vec::with_capacity(parts.len());
    for (i, part) in parts.into_iter().enumerate() {
        let segment = if let Some(name) = part.strip_prefix(':') {
            if !is_identifier(name) {
                return Err(PathError::new(
                    pos,
                    format!("invalid path parameter identifier: {:?}", name),
                ));
            }
            Segment::param(name)
        } else if style == PathStyle::Api && part.starts_with('*') {
            let name = &part[1..];
            if i != last {
                return Err(PathError::new(pos, "wildcard must be the last path segment"));
            }
            if !is_identifier(name) {
                return Err(PathError::new(
                    pos,
                    format!("invalid wildcard identifier: {:?}", name),
                ));
            }
            Segment {
                kind: SegmentType::Wildcard,
                value: name.to_string(),
                value_type: None,
            }
        } else if style == PathStyle::Keyspace && part == "*" {
            if i != last {
                return Err(PathError::new(pos, "wildcard must be the last path segment"));
            }
            Segment {
                kind: SegmentType::Wildcard,
                value: String::new(),
                value_type: Some(BuiltinKind::String),
            }
        } else {
            Segment::literal(part)
        };
        segments.push(segment);
    }

    Ok(Path {
        style,
        segments,
        pos: pos.clone(),
    })
}

/// Whether `s` is a valid Go identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new("svc/svc.go", 1, 1)
    }

    fn err(path: &str, style: PathStyle) -> String {
        parse(&pos(), path, style).unwrap_err().message
    }

    #[test]
    fn test_keyspace_boundary_cases() {
        assert_eq!(err("foo/", PathStyle::Keyspace), "path cannot contain trailing slash");
        assert_eq!(err("/foo", PathStyle::Keyspace), "path must not begin with '/'");
        assert_eq!(err("foo//bar", PathStyle::Keyspace), "path cannot contain double slash");
        assert_eq!(err("", PathStyle::Keyspace), "empty path");
    }

    #[test]
    fn test_keyspace_star_prefixed_literal() {
        let path = parse(&pos(), ":foo/*bar", PathStyle::Keyspace).unwrap();
        assert_eq!(
            path.segments,
            vec![Segment::param("foo"), Segment::literal("*bar")]
        );
        assert_eq!(path.to_string(), ":foo/*bar");
    }

    #[test]
    fn test_keyspace_bare_wildcard() {
        let path = parse(&pos(), "user/:id/*", PathStyle::Keyspace).unwrap();
        assert_eq!(path.segments[2].kind, SegmentType::Wildcard);
        assert_eq!(path.segments[2].value_type, Some(BuiltinKind::String));
        assert_eq!(err("*/foo", PathStyle::Keyspace), "wildcard must be the last path segment");
    }

    #[test]
    fn test_api_wildcard_is_named() {
        let path = parse(&pos(), "/:foo/*bar", PathStyle::Api).unwrap();
        assert_eq!(path.segments[0], Segment::param("foo"));
        assert_eq!(path.segments[1].kind, SegmentType::Wildcard);
        assert_eq!(path.segments[1].value, "bar");
        assert_eq!(path.to_string(), "/:foo/*bar");
    }

    #[test]
    fn test_api_path_errors() {
        assert_eq!(err("foo", PathStyle::Api), "path must begin with '/'");
        assert_eq!(err("/foo/", PathStyle::Api), "path cannot contain trailing slash");
        assert_eq!(err("/*rest/x", PathStyle::Api), "wildcard must be the last path segment");
        assert!(err("/:1abc", PathStyle::Api).contains("invalid path parameter identifier"));
    }

    #[test]
    fn test_root_path() {
        let path = parse(&pos(), "/", PathStyle::Api).unwrap();
        assert!(path.segments.is_empty());
        assert_eq!(path.to_string(), "/");
    }
}
