//! @acp:module "Directives"
//! @acp:summary "Lexer and validators for //encore: annotations in doc comments"
//! @acp:domain parser
//! @acp:layer core
//!
//! A directive is one comment line of the form
//! `//encore:<name> [option...] [key=value[,value...]...] [tag:<name>...]`.
//! Lexing is purely syntactic and produces a [`RawDirective`]; each directive
//! kind then validates the options and fields it accepts.

pub mod selector;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::ast::{strip_comment_marker, CommentGroup};
use crate::diag::Position;
use crate::paths::{self, Path, PathStyle};

pub use selector::{Selector, SelectorError, SelectorKind, SelectorSet};

/// Comment prefix that marks a directive line.
pub const DIRECTIVE_PREFIX: &str = "//encore:";

/// A malformed or invalid directive, anchored at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DirectiveError {
    pub pos: Position,
    pub message: String,
}

impl DirectiveError {
    fn new(pos: &Position, message: impl Into<String>) -> Self {
        Self {
            pos: pos.clone(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Lexing
// ============================================================================

/// A bare word with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub pos: Position,
}

/// A `key=value[,value...]` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveField {
    pub key: String,
    pub values: Vec<String>,
    pub pos: Position,
    /// Position of the first character after `=`
    pub value_pos: Position,
}

impl DirectiveField {
    pub fn value(&self) -> String {
        self.values.join(",")
    }
}

/// @acp:summary "A syntactically valid directive, before kind-specific validation"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirective {
    pub name: String,
    pub options: Vec<Token>,
    pub fields: Vec<DirectiveField>,
    pub tags: SelectorSet,
    pub pos: Position,
}

impl fmt::Display for RawDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for opt in &self.options {
            write!(f, " {}", opt.value)?;
        }
        for field in &self.fields {
            write!(f, " {}={}", field.key, field.value())?;
        }
        for tag in &self.tags {
            write!(f, " {}", tag)?;
        }
        Ok(())
    }
}

/// Whitespace-separated words with their byte offsets.
fn words(line: &str) -> impl Iterator<Item = (usize, &str)> {
    let base = line.as_ptr() as usize;
    line.split_whitespace()
        .map(move |w| (w.as_ptr() as usize - base, w))
}

/// @acp:summary "Lex one directive line (prefix already stripped)"
pub fn lex(line: &str, pos: &Position) -> Result<RawDirective, DirectiveError> {
    let mut words = words(line);
    let Some((_, name)) = words.next() else {
        return Err(DirectiveError::new(pos, "empty directive"));
    };

    let mut dir = RawDirective {
        name: name.to_string(),
        options: Vec::new(),
        fields: Vec::new(),
        tags: SelectorSet::new(),
        pos: pos.clone(),
    };

    for (offset, word) in words {
        let word_pos = pos.offset(offset);
        if word.starts_with("tag:") {
            let sel = Selector::parse(word).map_err(|e| {
                DirectiveError::new(&word_pos, format!("invalid tag {:?}: {}", word, e))
            })?;
            dir.tags
                .add(sel)
                .map_err(|e| DirectiveError::new(&word_pos, e.to_string()))?;
        } else if let Some((key, value)) = word.split_once('=') {
            if key.is_empty() {
                return Err(DirectiveError::new(
                    &word_pos,
                    format!("invalid directive field {:?}: missing key", word),
                ));
            }
            let values: Vec<String> = value.split(',').map(str::to_string).collect();
            if values.iter().any(String::is_empty) {
                return Err(DirectiveError::new(
                    &word_pos,
                    format!("empty directive field: {:?}", word),
                ));
            }
            if dir.fields.iter().any(|f| f.key == key) {
                return Err(DirectiveError::new(
                    &word_pos,
                    format!("duplicate field {:?}", key),
                ));
            }
            dir.fields.push(DirectiveField {
                key: key.to_string(),
                values,
                value_pos: word_pos.offset(key.len() + 1),
                pos: word_pos,
            });
        } else {
            if dir.options.iter().any(|o| o.value == word) {
                return Err(DirectiveError::new(
                    &word_pos,
                    format!("duplicate option {:?}", word),
                ));
            }
            dir.options.push(Token {
                value: word.to_string(),
                pos: word_pos,
            });
        }
    }
    Ok(dir)
}

// ============================================================================
// Typed directives
// ============================================================================

/// API access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Private,
    Auth,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
            Access::Auth => "auth",
        }
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Access::Public),
            "private" => Ok(Access::Private),
            "auth" => Ok(Access::Auth),
            _ => Err(format!("unknown access level: {}", s)),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDirective {
    pub access: Access,
    pub raw: bool,
    /// Explicit `method=` values; empty when the field was omitted
    pub methods: Vec<String>,
    pub path: Option<Path>,
    pub tags: SelectorSet,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHandlerDirective {
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareDirective {
    pub global: bool,
    pub target: SelectorSet,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDirective {
    pub pos: Position,
}

/// @acp:summary "A validated directive of one of the known kinds"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Api(ApiDirective),
    AuthHandler(AuthHandlerDirective),
    Middleware(MiddlewareDirective),
    Service(ServiceDirective),
}

impl Directive {
    pub fn pos(&self) -> &Position {
        match self {
            Directive::Api(d) => &d.pos,
            Directive::AuthHandler(d) => &d.pos,
            Directive::Middleware(d) => &d.pos,
            Directive::Service(d) => &d.pos,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Directive::Api(_) => "api",
            Directive::AuthHandler(_) => "authhandler",
            Directive::Middleware(_) => "middleware",
            Directive::Service(_) => "service",
        }
    }
}

/// @acp:summary "Lex and validate one directive line"
pub fn parse(line: &str, pos: &Position) -> Result<Directive, DirectiveError> {
    let raw = lex(line, pos)?;
    match raw.name.as_str() {
        "api" => validate_api(raw).map(Directive::Api),
        "authhandler" => {
            reject_all(&raw)?;
            Ok(Directive::AuthHandler(AuthHandlerDirective { pos: raw.pos }))
        }
        "middleware" => validate_middleware(raw).map(Directive::Middleware),
        "service" => {
            reject_all(&raw)?;
            Ok(Directive::Service(ServiceDirective { pos: raw.pos }))
        }
        other => Err(DirectiveError::new(
            &raw.pos,
            format!("unknown directive {:?}", other),
        )),
    }
}

/// For directives that take no options, fields or tags.
fn reject_all(raw: &RawDirective) -> Result<(), DirectiveError> {
    if let Some(opt) = raw.options.first() {
        return Err(DirectiveError::new(
            &opt.pos,
            format!("unexpected option {:?} on {} directive", opt.value, raw.name),
        ));
    }
    if let Some(field) = raw.fields.first() {
        return Err(DirectiveError::new(
            &field.pos,
            format!("unexpected field {:?} on {} directive", field.key, raw.name),
        ));
    }
    if let Some(tag) = raw.tags.iter().next() {
        return Err(DirectiveError::new(
            &raw.pos,
            format!("unexpected tag \"{}\" on {} directive", tag, raw.name),
        ));
    }
    Ok(())
}

fn missing_value(opt: &Token) -> DirectiveError {
    DirectiveError::new(
        &opt.pos,
        format!(
            "field {:?} requires a value ({}=...)",
            opt.value, opt.value
        ),
    )
}

fn validate_api(raw: RawDirective) -> Result<ApiDirective, DirectiveError> {
    let mut access: Option<Access> = None;
    let mut raw_endpoint = false;

    for opt in &raw.options {
        match opt.value.as_str() {
            "raw" => raw_endpoint = true,
            "path" | "method" => return Err(missing_value(opt)),
            value => {
                let level = value.parse::<Access>().map_err(|_| {
                    DirectiveError::new(&opt.pos, format!("unrecognized api option {:?}", value))
                })?;
                if let Some(prev) = access {
                    return Err(DirectiveError::new(
                        &opt.pos,
                        format!("multiple access options: {} and {}", prev, level),
                    ));
                }
                access = Some(level);
            }
        }
    }

    let mut methods = Vec::new();
    let mut path = None;
    for field in &raw.fields {
        match field.key.as_str() {
            "path" => {
                let parsed = paths::parse(&field.value_pos, &field.value(), PathStyle::Api)
                    .map_err(|e| DirectiveError::new(&e.pos, format!("invalid API path: {}", e)))?;
                path = Some(parsed);
            }
            "method" => {
                for m in &field.values {
                    if !is_http_method(m) {
                        return Err(DirectiveError::new(
                            &field.value_pos,
                            format!(
                                "invalid API method {:?}: methods must be uppercase letters (or \"*\")",
                                m
                            ),
                        ));
                    }
                    methods.push(m.clone());
                }
            }
            other => {
                return Err(DirectiveError::new(
                    &field.pos,
                    format!("unrecognized api field {:?}", other),
                ))
            }
        }
    }

    let access = access.unwrap_or(Access::Private);
    if access == Access::Private && raw_endpoint {
        return Err(DirectiveError::new(
            &raw.pos,
            "private APIs cannot be declared raw",
        ));
    }

    Ok(ApiDirective {
        access,
        raw: raw_endpoint,
        methods,
        path,
        tags: raw.tags,
        pos: raw.pos,
    })
}

fn is_http_method(m: &str) -> bool {
    m == "*" || (!m.is_empty() && m.chars().all(|c| c.is_ascii_uppercase()))
}

fn validate_middleware(raw: RawDirective) -> Result<MiddlewareDirective, DirectiveError> {
    let mut global = false;
    for opt in &raw.options {
        match opt.value.as_str() {
            "global" => global = true,
            "target" => return Err(missing_value(opt)),
            other => {
                return Err(DirectiveError::new(
                    &opt.pos,
                    format!("unrecognized middleware option {:?}", other),
                ))
            }
        }
    }
    if !raw.tags.is_empty() {
        return Err(DirectiveError::new(
            &raw.pos,
            "middleware cannot have tags (use target=tag:<name> to select endpoints)",
        ));
    }

    let mut target = SelectorSet::new();
    for field in &raw.fields {
        if field.key != "target" {
            return Err(DirectiveError::new(
                &field.pos,
                format!("unrecognized middleware field {:?}", field.key),
            ));
        }
        for value in &field.values {
            let sel = Selector::parse(value).map_err(|e| {
                DirectiveError::new(&field.value_pos, format!("invalid middleware target: {}", e))
            })?;
            target
                .add(sel)
                .map_err(|e| DirectiveError::new(&field.value_pos, e.to_string()))?;
        }
    }
    if target.is_empty() {
        return Err(DirectiveError::new(
            &raw.pos,
            "middleware must specify at least one target tag",
        ));
    }

    Ok(MiddlewareDirective {
        global,
        target,
        pos: raw.pos,
    })
}

// ============================================================================
// Doc comments
// ============================================================================

/// Directive found in a doc comment, plus the doc text with the directive line removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDoc {
    pub directive: Option<Directive>,
    pub doc: String,
}

/// @acp:summary "Extract at most one directive from a doc comment group"
pub fn parse_doc(group: Option<&CommentGroup>) -> Result<ParsedDoc, DirectiveError> {
    let Some(group) = group else {
        return Ok(ParsedDoc::default());
    };

    let mut directive: Option<Directive> = None;
    let mut doc_lines = Vec::new();
    for comment in &group.lines {
        let Some(rest) = comment.text.strip_prefix(DIRECTIVE_PREFIX) else {
            doc_lines.push(strip_comment_marker(&comment.text));
            continue;
        };
        let pos = comment.pos.offset(DIRECTIVE_PREFIX.len());
        if directive.is_some() {
            return Err(DirectiveError::new(
                &comment.pos,
                "multiple directives are not allowed on the same declaration",
            ));
        }
        directive = Some(parse(rest.trim_end(), &pos)?);
    }

    Ok(ParsedDoc {
        directive,
        doc: doc_lines.join("\n").trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Comment;

    fn pos() -> Position {
        Position::new("svc/svc.go", 3, 10)
    }

    fn api(line: &str) -> ApiDirective {
        match parse(line, &pos()).unwrap() {
            Directive::Api(d) => d,
            other => panic!("expected api directive, got {:?}", other),
        }
    }

    fn err(line: &str) -> String {
        parse(line, &pos()).unwrap_err().message
    }

    #[test]
    fn test_api_directive_fields() {
        let d = api("api public raw method=GET,POST path=/foo/:id tag:a tag:b");
        assert_eq!(d.access, Access::Public);
        assert!(d.raw);
        assert_eq!(d.methods, vec!["GET", "POST"]);
        assert_eq!(d.path.unwrap().to_string(), "/foo/:id");
        assert_eq!(d.tags.len(), 2);
    }

    #[test]
    fn test_api_defaults_to_private() {
        let d = api("api");
        assert_eq!(d.access, Access::Private);
        assert!(d.methods.is_empty());
        assert!(d.path.is_none());
    }

    #[test]
    fn test_duplicate_tag() {
        assert!(err("api public tag:foo tag:foo").contains("duplicate tag \"tag:foo\""));
        assert_eq!(api("api public tag:foo tag:bar").tags.len(), 2);
    }

    #[test]
    fn test_empty_field() {
        assert!(err("api public path=").contains("empty directive field"));
        assert!(err("api public method=GET,").contains("empty directive field"));
    }

    #[test]
    fn test_bare_field_key() {
        assert_eq!(err("api public path"), "field \"path\" requires a value (path=...)");
    }

    #[test]
    fn test_private_raw() {
        assert_eq!(err("api private raw"), "private APIs cannot be declared raw");
        assert_eq!(err("api raw"), "private APIs cannot be declared raw");
    }

    #[test]
    fn test_method_validation() {
        assert!(err("api public method=get").contains("invalid API method"));
        assert!(err("api public method=G3T").contains("invalid API method"));
        assert_eq!(api("api public raw method=*").methods, vec!["*"]);
    }

    #[test]
    fn test_multiple_access_levels() {
        assert!(err("api public auth").contains("multiple access options"));
    }

    #[test]
    fn test_middleware() {
        let Directive::Middleware(d) = parse("middleware global target=tag:a,all", &pos()).unwrap()
        else {
            panic!("expected middleware");
        };
        assert!(d.global);
        assert_eq!(d.target.to_string(), "tag:a,all");
        assert_eq!(
            err("middleware global"),
            "middleware must specify at least one target tag"
        );
        assert!(err("middleware target=tag:a,tag:a").contains("duplicate tag"));
    }

    #[test]
    fn test_service_rejects_everything() {
        assert!(parse("service", &pos()).is_ok());
        assert_eq!(err("service foo"), "unexpected option \"foo\" on service directive");
        assert_eq!(err("service a=b"), "unexpected field \"a\" on service directive");
        assert_eq!(err("service tag:x"), "unexpected tag \"tag:x\" on service directive");
    }

    #[test]
    fn test_token_positions() {
        let e = parse("api public tag:Bad", &pos()).unwrap_err();
        assert_eq!(e.pos, Position::new("svc/svc.go", 3, 21));
    }

    #[test]
    fn test_lex_round_trip() {
        let line = "api public raw path=/a/*rest method=GET,PUT tag:x tag:y";
        let first = lex(line, &pos()).unwrap();
        let second = lex(&first.to_string(), &pos()).unwrap();
        assert_eq!(first.name, second.name);
        assert_eq!(
            first.options.iter().map(|o| &o.value).collect::<Vec<_>>(),
            second.options.iter().map(|o| &o.value).collect::<Vec<_>>()
        );
        assert_eq!(
            first.fields.iter().map(|f| (&f.key, &f.values)).collect::<Vec<_>>(),
            second.fields.iter().map(|f| (&f.key, &f.values)).collect::<Vec<_>>()
        );
        assert_eq!(first.tags, second.tags);
    }

    #[test]
    fn test_parse_doc_strips_directive() {
        let line = |text: &str, line: u32| Comment {
            text: text.to_string(),
            pos: Position::new("svc/svc.go", line, 1),
        };
        let group = CommentGroup {
            lines: vec![
                line("// Ping checks liveness.", 1),
                line("//encore:api public path=/ping", 2),
            ],
        };
        let parsed = parse_doc(Some(&group)).unwrap();
        assert_eq!(parsed.doc, "Ping checks liveness.");
        let Some(Directive::Api(d)) = parsed.directive else {
            panic!("expected api directive");
        };
        assert_eq!(d.pos, Position::new("svc/svc.go", 2, 10));
        assert_eq!(d.path.unwrap().pos, Position::new("svc/svc.go", 2, 26));
    }

    #[test]
    fn test_parse_doc_multiple_directives() {
        let group = CommentGroup {
            lines: vec![
                Comment {
                    text: "//encore:api public".into(),
                    pos: Position::new("a.go", 1, 1),
                },
                Comment {
                    text: "//encore:service".into(),
                    pos: Position::new("a.go", 2, 1),
                },
            ],
        };
        assert!(parse_doc(Some(&group))
            .unwrap_err()
            .message
            .contains("multiple directives"));
    }
}
