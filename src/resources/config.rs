//! @acp:module "Config Loads"
//! @acp:summary "Recognizes config.Load calls"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::schema::Type;

pub const CONFIG_PKG: &str = "encore.dev/config";

/// @acp:summary "A service's typed configuration"
#[derive(Debug, Clone, Serialize)]
pub struct ConfigLoad {
    pub config_type: Type,
    #[serde(flatten)]
    pub site: ResourceSite,
}

pub struct ConfigParser;

impl ResourceParser for ConfigParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Config
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[CONFIG_PKG]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(cx.errs, cx.pkg, &[(CONFIG_PKG, "Load")], &package_var_filter())
            .iter()
            .filter_map(|u| parse_load(cx, u))
            .map(Resource::Config)
            .collect()
    }
}

fn parse_load(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<ConfigLoad> {
    let args = u.args(cx.errs, 0);
    let type_args = u.type_args(cx.errs, 1)?;
    let config_type = cx.resolve_type(u.file, &type_args[0]);
    if cx.schema.resolve_named_struct(&config_type, false).is_none() {
        cx.errs.add(
            &config_type.pos,
            format!("config type must be a named struct, got {}", config_type),
        );
        return None;
    }
    args?;
    Some(ConfigLoad {
        config_type,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_one;
    use super::*;

    fn loads(body: &str) -> (Vec<ConfigLoad>, Vec<String>) {
        let src = format!(
            "package svc\n\nimport \"encore.dev/config\"\n\ntype Settings struct {{\n    Enabled bool\n}}\n\n{}",
            body
        );
        let (resources, msgs) = parse_one(&src);
        let found = resources
            .into_iter()
            .filter_map(|r| match r {
                Resource::Config(c) => Some(c),
                _ => None,
            })
            .collect();
        (found, msgs)
    }

    #[test]
    fn test_load_named_struct() {
        let (found, msgs) = loads("var cfg = config.Load[*Settings]()\n");
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].site.binding.as_deref(), Some("cfg"));
    }

    #[test]
    fn test_load_rejects_arguments_and_builtins() {
        let (found, msgs) = loads("var a = config.Load[*Settings](\"x\")\nvar b = config.Load[string]()\n");
        assert!(found.is_empty());
        assert_eq!(
            msgs,
            vec![
                "config.Load expects 0 argument(s), got 1",
                "config type must be a named struct, got string",
            ]
        );
    }

    #[test]
    fn test_single_argument_load_inside_function_is_reported() {
        let (found, msgs) = loads("func setup() {\n    config.Load[*Settings](\"x\")\n}\n");
        assert!(found.is_empty());
        assert_eq!(
            msgs,
            vec!["config.Load must be called as the initializer of a package-level variable"]
        );
    }
}
