//! @acp:module "Resources"
//! @acp:summary "Recognition of infrastructure resource constructor calls"
//! @acp:domain parser
//! @acp:layer service
//!
//! Each resource kind has a [`ResourceParser`] that finds calls to its
//! constructors in a package, checks where they appear, and decodes their
//! arguments. Parsers declare which other kinds they depend on; [`phases`]
//! orders them so dependents only run once the resources they reference have
//! been published to the [`ResourceIndex`].

pub mod cache_cluster;
pub mod cache_keyspace;
pub mod config;
pub mod cron;
pub mod metrics;
pub mod naming;
pub mod pubsub_subscription;
pub mod pubsub_topic;
pub mod sqldb;
pub mod usage;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::ast::{Expr, ExprKind, File, Package, QualifiedName, TypeExpr};
use crate::diag::{ErrorList, Position};
use crate::error::{ParserError, Result};
use crate::literals::{ConstValue, EvalContext, StructLit};
use crate::loader::PackageLoader;
use crate::schema::{SchemaResolver, Type};

pub use cache_cluster::{CacheCluster, CacheClusterParser};
pub use cache_keyspace::{Keyspace, KeyspaceParser};
pub use config::{ConfigLoad, ConfigParser};
pub use cron::{CronJob, CronJobParser};
pub use metrics::{Metric, MetricParser};
pub use pubsub_subscription::{Subscription, SubscriptionParser};
pub use pubsub_topic::{Topic, TopicParser};
pub use sqldb::{SqlDatabase, SqlDatabaseParser};
pub use usage::{find_usages, Usage};

// ============================================================================
// Resource model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    PubSubTopic,
    PubSubSubscription,
    CacheCluster,
    CacheKeyspace,
    CronJob,
    Config,
    Metric,
    SqlDatabase,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::PubSubTopic => "pubsub topic",
            ResourceKind::PubSubSubscription => "pubsub subscription",
            ResourceKind::CacheCluster => "cache cluster",
            ResourceKind::CacheKeyspace => "cache keyspace",
            ResourceKind::CronJob => "cron job",
            ResourceKind::Config => "config",
            ResourceKind::Metric => "metric",
            ResourceKind::SqlDatabase => "sql database",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// @acp:summary "A recognized resource"
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    PubSubTopic(Topic),
    PubSubSubscription(Subscription),
    CacheCluster(CacheCluster),
    CacheKeyspace(Keyspace),
    CronJob(CronJob),
    Config(ConfigLoad),
    Metric(Metric),
    SqlDatabase(SqlDatabase),
}

/// Where a resource was declared and the variable it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSite {
    pub pkg_path: String,
    /// Package-level variable holding the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    pub pos: Position,
}

impl ResourceSite {
    pub fn from_usage(pkg: &Package, usage: &Usage<'_>) -> Self {
        Self {
            pkg_path: pkg.import_path.clone(),
            binding: usage.binding.clone(),
            pos: usage.call_pos().clone(),
        }
    }

    /// Whether this resource is bound to `pkg_path.name`.
    pub fn is_bound_to(&self, pkg_path: &str, name: &str) -> bool {
        self.pkg_path == pkg_path && self.binding.as_deref() == Some(name)
    }
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::PubSubTopic(_) => ResourceKind::PubSubTopic,
            Resource::PubSubSubscription(_) => ResourceKind::PubSubSubscription,
            Resource::CacheCluster(_) => ResourceKind::CacheCluster,
            Resource::CacheKeyspace(_) => ResourceKind::CacheKeyspace,
            Resource::CronJob(_) => ResourceKind::CronJob,
            Resource::Config(_) => ResourceKind::Config,
            Resource::Metric(_) => ResourceKind::Metric,
            Resource::SqlDatabase(_) => ResourceKind::SqlDatabase,
        }
    }

    pub fn site(&self) -> &ResourceSite {
        match self {
            Resource::PubSubTopic(r) => &r.site,
            Resource::PubSubSubscription(r) => &r.site,
            Resource::CacheCluster(r) => &r.site,
            Resource::CacheKeyspace(r) => &r.site,
            Resource::CronJob(r) => &r.site,
            Resource::Config(r) => &r.site,
            Resource::Metric(r) => &r.site,
            Resource::SqlDatabase(r) => &r.site,
        }
    }

    /// The user-chosen name, for kinds that have one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Resource::PubSubTopic(r) => Some(&r.name),
            Resource::PubSubSubscription(r) => Some(&r.name),
            Resource::CacheCluster(r) => Some(&r.name),
            Resource::CronJob(r) => Some(&r.name),
            Resource::Metric(r) => Some(&r.name),
            Resource::SqlDatabase(r) => Some(&r.name),
            Resource::CacheKeyspace(_) | Resource::Config(_) => None,
        }
    }
}

// ============================================================================
// Index of published resources
// ============================================================================

/// @acp:summary "Immutable snapshot of resources published by completed phases"
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    resources: Vec<Resource>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot extended with `more`.
    pub fn extended(&self, more: impl IntoIterator<Item = Resource>) -> Self {
        let mut resources = self.resources.clone();
        resources.extend(more);
        Self { resources }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The resource of `kind` bound to the variable `pkg_path.name`.
    pub fn bound(&self, kind: ResourceKind, pkg_path: &str, name: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.kind() == kind && r.site().is_bound_to(pkg_path, name))
    }

    pub fn into_vec(self) -> Vec<Resource> {
        self.resources
    }
}

// ============================================================================
// Parser registry
// ============================================================================

/// What a resource parser sees while processing one package.
#[derive(Clone, Copy)]
pub struct ResourceContext<'a> {
    pub errs: &'a ErrorList,
    pub schema: &'a SchemaResolver,
    pub loader: &'a dyn PackageLoader,
    pub pkg: &'a Package,
    /// Resources published by earlier phases
    pub index: &'a ResourceIndex,
}

impl ResourceContext<'_> {
    pub fn eval<'b>(&'b self, file: &'b File) -> EvalContext<'b> {
        EvalContext::new(self.pkg, file).with_loader(self.loader)
    }

    pub fn resolve_type(&self, file: &File, expr: &TypeExpr) -> Type {
        self.schema.resolve_type(self.pkg, file, expr, &[])
    }

    /// Evaluate `expr` as a constant string, reporting `what` on failure.
    pub fn const_string(&self, file: &File, expr: &Expr, what: &str) -> Option<String> {
        match self.eval(file).eval(expr) {
            Some(ConstValue::String(s)) => Some(s),
            _ => {
                self.errs
                    .add(&expr.pos, format!("{} must be a constant string", what));
                None
            }
        }
    }

    pub fn struct_lit(&self, file: &File, expr: &Expr) -> Option<StructLit> {
        StructLit::parse(self.errs, &self.eval(file), expr)
    }

    /// The package-level variable an expression refers to: `x` or `pkg.X`.
    pub fn binding_ref(&self, file: &File, expr: &Expr) -> Option<QualifiedName> {
        match &expr.unparen().kind {
            ExprKind::Ident(name) => Some(QualifiedName::new(
                self.pkg.import_path.clone(),
                name.clone(),
            )),
            ExprKind::Selector { operand, field } => {
                let path = file.resolve_import(operand.ident()?)?;
                Some(QualifiedName::new(path, field.name.clone()))
            }
            _ => None,
        }
    }
}

/// @acp:summary "One resource kind's recognizer"
pub trait ResourceParser: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// The parser is skipped for packages importing none of these.
    fn required_imports(&self) -> &'static [&'static str];

    /// Kinds whose resources must be published before this parser runs.
    fn depends_on(&self) -> &'static [ResourceKind] {
        &[]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource>;
}

/// Every built-in resource parser.
pub fn all_parsers() -> Vec<Arc<dyn ResourceParser>> {
    vec![
        Arc::new(TopicParser),
        Arc::new(SubscriptionParser),
        Arc::new(CacheClusterParser),
        Arc::new(KeyspaceParser),
        Arc::new(CronJobParser),
        Arc::new(ConfigParser),
        Arc::new(MetricParser),
        Arc::new(SqlDatabaseParser),
    ]
}

/// @acp:summary "Group parsers into phases so every dependency runs in an earlier phase"
pub fn phases(parsers: &[Arc<dyn ResourceParser>]) -> Result<Vec<Vec<Arc<dyn ResourceParser>>>> {
    let mut remaining: Vec<Arc<dyn ResourceParser>> = parsers.to_vec();
    let mut done: Vec<ResourceKind> = Vec::new();
    let mut out = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|p| {
            p.depends_on()
                .iter()
                .all(|dep| done.contains(dep) || !parsers.iter().any(|q| q.kind() == *dep))
        });
        if ready.is_empty() {
            let names: Vec<&str> = blocked.iter().map(|p| p.kind().as_str()).collect();
            return Err(ParserError::Other(format!(
                "resource parser dependency cycle between: {}",
                names.join(", ")
            )));
        }
        done.extend(ready.iter().map(|p| p.kind()));
        out.push(ready);
        remaining = blocked;
    }

    Ok(out)
}

/// Run every parser of one phase over a package.
pub fn run_phase(cx: &ResourceContext<'_>, phase: &[Arc<dyn ResourceParser>]) -> Vec<Resource> {
    phase
        .iter()
        .filter(|p| cx.pkg.imports_any(p.required_imports()))
        .flat_map(|p| p.run(cx))
        .collect()
}
