//! @acp:module "SQL Databases"
//! @acp:summary "Recognizes references to named SQL databases"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};

pub const SQLDB_PKG: &str = "encore.dev/storage/sqldb";

/// @acp:summary "A SQL database referenced by name"
#[derive(Debug, Clone, Serialize)]
pub struct SqlDatabase {
    pub name: String,
    #[serde(flatten)]
    pub site: ResourceSite,
}

pub struct SqlDatabaseParser;

impl ResourceParser for SqlDatabaseParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SqlDatabase
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[SQLDB_PKG]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(cx.errs, cx.pkg, &[(SQLDB_PKG, "Named")], &package_var_filter())
            .iter()
            .filter_map(|u| parse_named(cx, u))
            .map(Resource::SqlDatabase)
            .collect()
    }
}

fn parse_named(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<SqlDatabase> {
    let args = u.args(cx.errs, 1)?;
    let name = cx.const_string(u.file, &args[0], "database name")?;
    if name.is_empty() {
        cx.errs.add(&args[0].pos, "database name must not be empty");
        return None;
    }
    Some(SqlDatabase {
        name,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}
