//! @acp:module "Cache Clusters"
//! @acp:summary "Recognizes cache.NewCluster declarations"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::naming;
use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::literals::{decode, FieldKind, FieldSpec};

pub const CACHE_PKG: &str = "encore.dev/storage/cache";

/// Accepted eviction policies; the first is used when none is set.
pub const EVICTION_POLICIES: &[&str] = &[
    "allkeys-lru",
    "noeviction",
    "allkeys-lfu",
    "allkeys-random",
    "volatile-lru",
    "volatile-lfu",
    "volatile-ttl",
    "volatile-random",
];

/// @acp:summary "A cache cluster"
#[derive(Debug, Clone, Serialize)]
pub struct CacheCluster {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    pub eviction_policy: String,
    #[serde(flatten)]
    pub site: ResourceSite,
}

const CLUSTER_CONFIG: &[FieldSpec] = &[
    FieldSpec::optional("EvictionPolicy", FieldKind::String),
    FieldSpec::dynamic("DefaultExpiry", false),
];

pub struct CacheClusterParser;

impl ResourceParser for CacheClusterParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CacheCluster
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[CACHE_PKG]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(cx.errs, cx.pkg, &[(CACHE_PKG, "NewCluster")], &package_var_filter())
            .iter()
            .filter_map(|u| parse_cluster(cx, u))
            .map(Resource::CacheCluster)
            .collect()
    }
}

fn parse_cluster(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<CacheCluster> {
    let args = u.args(cx.errs, 2)?;
    let name = cx.const_string(u.file, &args[0], "cache cluster name")?;
    let name_ok = naming::kebab_case(cx.errs, &args[0].pos, "cache cluster", &name);

    let lit = cx.struct_lit(u.file, &args[1])?;
    let cfg = decode(cx.errs, &lit, CLUSTER_CONFIG)?;

    let eviction_policy = cfg
        .string("EvictionPolicy")
        .unwrap_or(EVICTION_POLICIES[0])
        .to_string();
    if !EVICTION_POLICIES.contains(&eviction_policy.as_str()) {
        cx.errs.add(
            cfg.pos("EvictionPolicy").unwrap_or(&lit.pos),
            format!(
                "invalid EvictionPolicy {:?}: must be one of {}",
                eviction_policy,
                EVICTION_POLICIES.join(", ")
            ),
        );
        return None;
    }

    name_ok.then(|| CacheCluster {
        name,
        doc: u.doc.clone(),
        eviction_policy,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_one;
    use super::*;

    fn clusters(body: &str) -> (Vec<CacheCluster>, Vec<String>) {
        let src = format!(
            "package svc\n\nimport (\n    \"time\"\n    \"encore.dev/storage/cache\"\n)\n\n{}",
            body
        );
        let (resources, msgs) = parse_one(&src);
        let clusters = resources
            .into_iter()
            .filter_map(|r| match r {
                Resource::CacheCluster(c) => Some(c),
                _ => None,
            })
            .collect();
        (clusters, msgs)
    }

    #[test]
    fn test_default_eviction_policy() {
        let (clusters, msgs) = clusters(
            "var Sessions = cache.NewCluster(\"sessions\", cache.ClusterConfig{DefaultExpiry: cache.ExpireIn(time.Hour)})\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(clusters[0].eviction_policy, "allkeys-lru");
    }

    #[test]
    fn test_policy_constant() {
        let (clusters, msgs) = clusters(
            "var C = cache.NewCluster(\"c\", cache.ClusterConfig{EvictionPolicy: cache.VolatileTTL})\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(clusters[0].eviction_policy, "volatile-ttl");
    }

    #[test]
    fn test_invalid_policy() {
        let (clusters, msgs) = clusters(
            "var C = cache.NewCluster(\"c\", cache.ClusterConfig{EvictionPolicy: \"lru\"})\n",
        );
        assert!(clusters.is_empty());
        assert!(msgs[0].starts_with("invalid EvictionPolicy \"lru\""));
    }
}
