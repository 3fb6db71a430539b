//! @acp:module "PubSub Topics"
//! @acp:summary "Recognizes pubsub.NewTopic declarations"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::naming;
use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::literals::{decode, FieldKind, FieldSpec};
use crate::schema::Type;

pub const PUBSUB_PKG: &str = "encore.dev/pubsub";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuarantee {
    AtLeastOnce,
    ExactlyOnce,
}

/// @acp:summary "A pub/sub topic"
#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    pub message_type: Type,
    pub delivery_guarantee: DeliveryGuarantee,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
    #[serde(flatten)]
    pub site: ResourceSite,
}

const TOPIC_CONFIG: &[FieldSpec] = &[
    FieldSpec::required("DeliveryGuarantee", FieldKind::Int),
    FieldSpec::optional("OrderingKey", FieldKind::String),
];

pub struct TopicParser;

impl ResourceParser for TopicParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PubSubTopic
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[PUBSUB_PKG]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(cx.errs, cx.pkg, &[(PUBSUB_PKG, "NewTopic")], &package_var_filter())
            .iter()
            .filter_map(|u| parse_topic(cx, u))
            .map(Resource::PubSubTopic)
            .collect()
    }
}

fn parse_topic(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<Topic> {
    let args = u.args(cx.errs, 2)?;
    let name = cx.const_string(u.file, &args[0], "topic name")?;
    let mut ok = naming::kebab_case(cx.errs, &args[0].pos, "topic", &name);

    let message_type = u
        .type_args(cx.errs, 1)
        .map(|t| cx.resolve_type(u.file, &t[0]));
    let message_decl = message_type.as_ref().and_then(|ty| {
        let decl = cx.schema.resolve_named_struct(ty, false);
        if decl.is_none() {
            cx.errs.add(
                &ty.pos,
                format!("topic message type must be a named struct, got {}", ty),
            );
        }
        decl
    });
    ok &= message_decl.is_some();

    let lit = cx.struct_lit(u.file, &args[1])?;
    let cfg = decode(cx.errs, &lit, TOPIC_CONFIG)?;

    let delivery_guarantee = match cfg.int("DeliveryGuarantee") {
        Some(1) => DeliveryGuarantee::AtLeastOnce,
        Some(2) => DeliveryGuarantee::ExactlyOnce,
        _ => {
            cx.errs.add(
                cfg.pos("DeliveryGuarantee").unwrap_or(&lit.pos),
                "DeliveryGuarantee must be pubsub.AtLeastOnce or pubsub.ExactlyOnce",
            );
            return None;
        }
    };

    let ordering_key = cfg.string("OrderingKey").map(str::to_string);
    if let (Some(key), Some(decl)) = (&ordering_key, &message_decl) {
        let exported = decl
            .struct_fields()
            .is_some_and(|fields| fields.iter().any(|f| &f.name == key && f.is_exported()));
        if !exported {
            cx.errs.add(
                cfg.pos("OrderingKey").unwrap_or(&lit.pos),
                format!(
                    "OrderingKey {:?} must name an exported field of the message type {}",
                    key, decl.name
                ),
            );
            ok = false;
        }
    }

    if !ok {
        return None;
    }
    Some(Topic {
        name,
        doc: u.doc.clone(),
        message_type: message_type?,
        delivery_guarantee,
        ordering_key,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}
