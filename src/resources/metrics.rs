//! @acp:module "Metrics"
//! @acp:summary "Recognizes counter and gauge declarations, grouped or not"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::naming::{self, RESERVED_METRIC_PREFIX};
use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::literals::decode;
use crate::schema::{BuiltinKind, Type};

pub const METRICS_PKG: &str = "encore.dev/metrics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
}

/// Constructor name, metric type, and whether it takes a labels type.
const CONSTRUCTORS: &[(&str, MetricType, bool)] = &[
    ("NewCounter", MetricType::Counter, false),
    ("NewCounterGroup", MetricType::Counter, true),
    ("NewGauge", MetricType::Gauge, false),
    ("NewGaugeGroup", MetricType::Gauge, true),
];

/// @acp:summary "A counter or gauge metric"
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    pub metric_type: MetricType,
    pub value_type: BuiltinKind,
    /// Label struct of a metric group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Type>,
    #[serde(flatten)]
    pub site: ResourceSite,
}

impl Metric {
    pub fn is_group(&self) -> bool {
        self.labels.is_some()
    }
}

pub struct MetricParser;

impl ResourceParser for MetricParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Metric
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[METRICS_PKG]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        let targets: Vec<(&str, &str)> = CONSTRUCTORS
            .iter()
            .map(|(name, _, _)| (METRICS_PKG, *name))
            .collect();
        find_usages(cx.errs, cx.pkg, &targets, &package_var_filter())
            .iter()
            .filter_map(|u| parse_metric(cx, u))
            .map(Resource::Metric)
            .collect()
    }
}

fn parse_metric(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<Metric> {
    let &(_, metric_type, grouped) = CONSTRUCTORS
        .iter()
        .find(|(name, _, _)| *name == u.callee.name)?;
    let args = u.args(cx.errs, 2)?;
    let name = cx.const_string(u.file, &args[0], "metric name")?;
    let mut ok = naming::snake_case(
        cx.errs,
        &args[0].pos,
        "metric",
        &name,
        RESERVED_METRIC_PREFIX,
    );

    let type_args = u.type_args(cx.errs, if grouped { 2 } else { 1 })?;
    let labels = grouped.then(|| cx.resolve_type(u.file, &type_args[0]));
    if let Some(ty) = &labels {
        if cx.schema.resolve_named_struct(ty, false).is_none() {
            cx.errs.add(
                &ty.pos,
                format!("metric labels must be a named struct, got {}", ty),
            );
            ok = false;
        }
    }

    let value = cx.resolve_type(u.file, &type_args[type_args.len() - 1]);
    let value_type = value.builtin();
    if value_type.is_none() {
        cx.errs.add(
            &value.pos,
            format!("metric value type must be a builtin type, got {}", value),
        );
    }

    // No fields are accepted yet; decoding catches unexpected ones.
    let lit = cx.struct_lit(u.file, &args[1])?;
    decode(cx.errs, &lit, &[])?;

    if !ok {
        return None;
    }
    Some(Metric {
        name,
        doc: u.doc.clone(),
        metric_type,
        value_type: value_type?,
        labels,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_one;
    use super::*;

    fn metrics(body: &str) -> (Vec<Metric>, Vec<String>) {
        let src = format!(
            "package svc\n\nimport \"encore.dev/metrics\"\n\ntype Labels struct {{\n    Success bool\n}}\n\n{}",
            body
        );
        let (resources, msgs) = parse_one(&src);
        let found = resources
            .into_iter()
            .filter_map(|r| match r {
                Resource::Metric(m) => Some(m),
                _ => None,
            })
            .collect();
        (found, msgs)
    }

    #[test]
    fn test_counter_and_gauge_group() {
        let (found, msgs) = metrics(
            "// Orders counts placed orders.\nvar Orders = metrics.NewCounter[uint64](\"orders_placed\", metrics.CounterConfig{})\n\nvar Latency = metrics.NewGaugeGroup[Labels, float64](\"request_latency\", metrics.GaugeConfig{})\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].metric_type, MetricType::Counter);
        assert_eq!(found[0].value_type, BuiltinKind::Uint64);
        assert_eq!(found[0].doc, "Orders counts placed orders.");
        assert!(!found[0].is_group());
        assert_eq!(found[1].metric_type, MetricType::Gauge);
        assert!(found[1].is_group());
    }

    #[test]
    fn test_name_rules() {
        let (found, msgs) = metrics(
            "var A = metrics.NewCounter[int64](\"OrdersPlaced\", metrics.CounterConfig{})\nvar B = metrics.NewCounter[int64](\"e_orders\", metrics.CounterConfig{})\n",
        );
        assert!(found.is_empty());
        assert_eq!(
            msgs,
            vec![
                "metric name must be in snake_case, got \"OrdersPlaced\"",
                "metric name must not begin with the reserved prefix \"e_\"",
            ]
        );
    }

    #[test]
    fn test_type_arguments() {
        let (found, msgs) = metrics(
            "var A = metrics.NewGauge[Labels](\"a\", metrics.GaugeConfig{})\nvar B = metrics.NewCounterGroup[string, int64](\"b\", metrics.CounterConfig{})\nvar C = metrics.NewCounterGroup[Labels](\"c\", metrics.CounterConfig{})\n",
        );
        assert!(found.is_empty());
        assert_eq!(
            msgs,
            vec![
                "metric value type must be a builtin type, got app/svc.Labels",
                "metric labels must be a named struct, got string",
                "metrics.NewCounterGroup requires 2 type argument(s), got 1",
            ]
        );
    }

    #[test]
    fn test_config_takes_no_fields() {
        let (found, msgs) = metrics(
            "var A = metrics.NewCounter[int64](\"a\", metrics.CounterConfig{Buckets: 3})\n",
        );
        assert!(found.is_empty());
        assert_eq!(msgs.len(), 1);
    }
}
