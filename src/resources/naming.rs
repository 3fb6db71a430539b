//! @acp:module "Resource Names"
//! @acp:summary "Name validators for resource identifiers"
//! @acp:domain parser
//! @acp:layer core

use std::sync::LazyLock;

use regex::Regex;

use crate::diag::{ErrorList, Position};

static KEBAB_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").unwrap());

static SNAKE_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").unwrap());

/// Prefix reserved for metrics emitted by the runtime itself.
pub const RESERVED_METRIC_PREFIX: &str = "e_";

/// Validate a kebab-case name such as `user-signups`.
pub fn kebab_case(errs: &ErrorList, pos: &Position, what: &str, name: &str) -> bool {
    if name.is_empty() {
        errs.add(pos, format!("{} name must not be empty", what));
        return false;
    }
    if !KEBAB_CASE.is_match(name) {
        errs.add(
            pos,
            format!("{} name must be in kebab-case, got {:?}", what, name),
        );
        return false;
    }
    true
}

/// Validate a snake_case name that must not use `reserved_prefix`.
pub fn snake_case(
    errs: &ErrorList,
    pos: &Position,
    what: &str,
    name: &str,
    reserved_prefix: &str,
) -> bool {
    if name.is_empty() {
        errs.add(pos, format!("{} name must not be empty", what));
        return false;
    }
    if !SNAKE_CASE.is_match(name) {
        errs.add(
            pos,
            format!("{} name must be in snake_case, got {:?}", what, name),
        );
        return false;
    }
    if name.starts_with(reserved_prefix) {
        errs.add(
            pos,
            format!(
                "{} name must not begin with the reserved prefix {:?}",
                what, reserved_prefix
            ),
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new("svc/svc.go", 1, 1)
    }

    #[test]
    fn test_kebab_case() {
        let errs = ErrorList::new();
        assert!(kebab_case(&errs, &pos(), "topic", "user-signups"));
        assert!(kebab_case(&errs, &pos(), "topic", "v2"));
        assert!(errs.is_empty());

        for bad in ["User", "a--b", "a-", "-a", "a_b", "1a"] {
            assert!(!kebab_case(&errs, &pos(), "topic", bad), "{}", bad);
        }
        assert!(!kebab_case(&errs, &pos(), "topic", ""));
        assert_eq!(errs.snapshot().last().unwrap().message, "topic name must not be empty");
    }

    #[test]
    fn test_snake_case_with_reserved_prefix() {
        let errs = ErrorList::new();
        assert!(snake_case(&errs, &pos(), "metric", "orders_total", RESERVED_METRIC_PREFIX));
        assert!(!snake_case(&errs, &pos(), "metric", "orders-total", RESERVED_METRIC_PREFIX));
        assert!(!snake_case(&errs, &pos(), "metric", "e_requests", RESERVED_METRIC_PREFIX));
        let msgs: Vec<_> = errs.snapshot().into_iter().map(|d| d.message).collect();
        assert_eq!(
            msgs,
            vec![
                "metric name must be in snake_case, got \"orders-total\"",
                "metric name must not begin with the reserved prefix \"e_\"",
            ]
        );
    }
}
