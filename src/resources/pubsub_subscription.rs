//! @acp:module "PubSub Subscriptions"
//! @acp:summary "Recognizes pubsub.NewSubscription declarations against published topics"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::naming;
use super::pubsub_topic::PUBSUB_PKG;
use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::ast::QualifiedName;
use crate::literals::{decode, FieldKind, FieldSpec};

/// @acp:summary "A subscription to a pub/sub topic"
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// Name of the subscribed topic
    pub topic: String,
    /// Variable the topic is bound to
    pub topic_ref: QualifiedName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<i64>,
    #[serde(flatten)]
    pub site: ResourceSite,
}

const SUBSCRIPTION_CONFIG: &[FieldSpec] = &[
    FieldSpec::dynamic("Handler", true),
    FieldSpec::optional("MaxConcurrency", FieldKind::Int),
    FieldSpec::dynamic("AckDeadline", false),
    FieldSpec::dynamic("MessageRetention", false),
    FieldSpec::dynamic("RetryPolicy", false),
];

pub struct SubscriptionParser;

impl ResourceParser for SubscriptionParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PubSubSubscription
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[PUBSUB_PKG]
    }

    fn depends_on(&self) -> &'static [ResourceKind] {
        &[ResourceKind::PubSubTopic]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(
            cx.errs,
            cx.pkg,
            &[(PUBSUB_PKG, "NewSubscription")],
            &package_var_filter(),
        )
        .iter()
        .filter_map(|u| parse_subscription(cx, u))
        .map(Resource::PubSubSubscription)
        .collect()
    }
}

fn parse_subscription(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<Subscription> {
    let args = u.args(cx.errs, 3)?;

    let topic = cx.binding_ref(u.file, &args[0]).and_then(|qn| {
        cx.index
            .bound(ResourceKind::PubSubTopic, &qn.pkg_path, &qn.name)
            .and_then(|r| r.name().map(|n| (qn.clone(), n.to_string())))
    });
    let Some((topic_ref, topic)) = topic else {
        cx.errs.add(
            &args[0].pos,
            "first argument of pubsub.NewSubscription must reference a pubsub topic",
        );
        return None;
    };

    let name = cx.const_string(u.file, &args[1], "subscription name")?;
    let name_ok = naming::kebab_case(cx.errs, &args[1].pos, "subscription", &name);

    let lit = cx.struct_lit(u.file, &args[2])?;
    let cfg = decode(cx.errs, &lit, SUBSCRIPTION_CONFIG)?;
    let max_concurrency = cfg.int("MaxConcurrency");

    name_ok.then(|| Subscription {
        name,
        doc: u.doc.clone(),
        topic,
        topic_ref,
        max_concurrency,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_resources;
    use super::*;

    const TOPIC_PKG: &str = "package events\n\nimport \"encore.dev/pubsub\"\n\ntype Event struct{ ID string }\n\nvar Signups = pubsub.NewTopic[*Event](\"signups\", pubsub.TopicConfig{DeliveryGuarantee: pubsub.AtLeastOnce})\n";

    fn subscriptions(src: &str) -> (Vec<Subscription>, Vec<String>) {
        let (resources, msgs) =
            parse_resources(&[("events/events.go", TOPIC_PKG), ("svc/svc.go", src)]);
        let subs = resources
            .into_iter()
            .filter_map(|r| match r {
                Resource::PubSubSubscription(s) => Some(s),
                _ => None,
            })
            .collect();
        (subs, msgs)
    }

    #[test]
    fn test_subscription_to_topic_in_other_package() {
        let (subs, msgs) = subscriptions(
            "package svc\n\nimport (\n    \"encore.dev/pubsub\"\n    \"app/events\"\n)\n\nvar Welcome = pubsub.NewSubscription(events.Signups, \"send-welcome\", pubsub.SubscriptionConfig[*events.Event]{\n    Handler: handle,\n    MaxConcurrency: 10,\n    RetryPolicy: &pubsub.RetryPolicy{MaxRetries: 3},\n})\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(subs[0].topic, "signups");
        assert_eq!(subs[0].topic_ref, QualifiedName::new("app/events", "Signups"));
        assert_eq!(subs[0].max_concurrency, Some(10));
    }

    #[test]
    fn test_unknown_topic_reference() {
        let (subs, msgs) = subscriptions(
            "package svc\n\nimport \"encore.dev/pubsub\"\n\nvar S = pubsub.NewSubscription(other, \"s\", pubsub.SubscriptionConfig[*Event]{Handler: h})\n",
        );
        assert!(subs.is_empty());
        assert_eq!(
            msgs,
            vec!["first argument of pubsub.NewSubscription must reference a pubsub topic"]
        );
    }

    #[test]
    fn test_handler_required() {
        let (subs, msgs) = subscriptions(
            "package svc\n\nimport (\n    \"encore.dev/pubsub\"\n    \"app/events\"\n)\n\nvar S = pubsub.NewSubscription(events.Signups, \"s\", pubsub.SubscriptionConfig[*events.Event]{})\n",
        );
        assert!(subs.is_empty());
        assert_eq!(msgs, vec!["missing required field: Handler"]);
    }
}
