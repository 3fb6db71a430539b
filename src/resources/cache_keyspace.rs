//! @acp:module "Cache Keyspaces"
//! @acp:summary "Recognizes cache keyspace declarations and checks key patterns against key types"
//! @acp:domain parser
//! @acp:layer service

use serde::Serialize;

use super::cache_cluster::CACHE_PKG;
use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::ast::QualifiedName;
use crate::diag::ErrorList;
use crate::literals::{decode, FieldKind, FieldSpec};
use crate::paths::{self, Path, PathStyle, SegmentType};
use crate::schema::{SchemaResolver, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyspaceValue {
    String,
    Int,
    Float,
    Struct,
    List,
    Set,
}

impl KeyspaceValue {
    fn from_constructor(name: &str) -> Option<Self> {
        Some(match name {
            "NewStringKeyspace" => Self::String,
            "NewIntKeyspace" => Self::Int,
            "NewFloatKeyspace" => Self::Float,
            "NewStructKeyspace" => Self::Struct,
            "NewListKeyspace" => Self::List,
            "NewSetKeyspace" => Self::Set,
            _ => return None,
        })
    }

    /// Whether the constructor takes a value type argument after the key type.
    fn has_value_type(&self) -> bool {
        matches!(self, Self::Struct | Self::List | Self::Set)
    }
}

const CONSTRUCTORS: &[(&str, &str)] = &[
    (CACHE_PKG, "NewStringKeyspace"),
    (CACHE_PKG, "NewIntKeyspace"),
    (CACHE_PKG, "NewFloatKeyspace"),
    (CACHE_PKG, "NewStructKeyspace"),
    (CACHE_PKG, "NewListKeyspace"),
    (CACHE_PKG, "NewSetKeyspace"),
];

/// @acp:summary "A typed keyspace within a cache cluster"
#[derive(Debug, Clone, Serialize)]
pub struct Keyspace {
    pub value_kind: KeyspaceValue,
    /// Name of the cluster the keyspace lives in
    pub cluster: String,
    pub cluster_ref: QualifiedName,
    pub key_type: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Type>,
    pub key_pattern: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(flatten)]
    pub site: ResourceSite,
}

const KEYSPACE_CONFIG: &[FieldSpec] = &[
    FieldSpec::required("KeyPattern", FieldKind::String),
    FieldSpec::dynamic("DefaultExpiry", false),
    FieldSpec::optional("suffix", FieldKind::String).key("EncoreInternal_KeyspaceSuffix"),
];

pub struct KeyspaceParser;

impl ResourceParser for KeyspaceParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CacheKeyspace
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[CACHE_PKG]
    }

    fn depends_on(&self) -> &'static [ResourceKind] {
        &[ResourceKind::CacheCluster]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(cx.errs, cx.pkg, CONSTRUCTORS, &package_var_filter())
            .iter()
            .filter_map(|u| parse_keyspace(cx, u))
            .map(Resource::CacheKeyspace)
            .collect()
    }
}

fn parse_keyspace(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<Keyspace> {
    let value_kind = KeyspaceValue::from_constructor(&u.callee.name)?;
    let args = u.args(cx.errs, 2)?;
    let type_args = u.type_args(cx.errs, if value_kind.has_value_type() { 2 } else { 1 })?;
    let key_type = cx.resolve_type(u.file, &type_args[0]);
    let value_type = type_args.get(1).map(|t| cx.resolve_type(u.file, t));

    let cluster = cx.binding_ref(u.file, &args[0]).and_then(|qn| {
        cx.index
            .bound(ResourceKind::CacheCluster, &qn.pkg_path, &qn.name)
            .and_then(|r| r.name().map(|n| (qn.clone(), n.to_string())))
    });
    let Some((cluster_ref, cluster)) = cluster else {
        cx.errs.add(
            &args[0].pos,
            format!(
                "first argument of {} must reference a cache cluster",
                u.display_name()
            ),
        );
        return None;
    };

    let lit = cx.struct_lit(u.file, &args[1])?;
    let cfg = decode(cx.errs, &lit, KEYSPACE_CONFIG)?;
    let pattern = cfg.string("KeyPattern")?;
    let pattern_pos = cfg.pos("KeyPattern").unwrap_or(&lit.pos);
    let mut key_pattern = match paths::parse(pattern_pos, pattern, PathStyle::Keyspace) {
        Ok(path) => path,
        Err(e) => {
            cx.errs.add(&e.pos, format!("invalid KeyPattern: {}", e.message));
            return None;
        }
    };

    if !check_key_pattern(cx.errs, cx.schema, &key_type, &mut key_pattern) {
        return None;
    }

    Some(Keyspace {
        value_kind,
        cluster,
        cluster_ref,
        key_type,
        value_type,
        key_pattern,
        suffix: cfg.string("suffix").map(str::to_string),
        doc: u.doc.clone(),
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}

/// Unify the key pattern's parameters with the key type, filling in their value types.
fn check_key_pattern(
    errs: &ErrorList,
    schema: &SchemaResolver,
    key_type: &Type,
    pattern: &mut Path,
) -> bool {
    let pos = pattern.pos.clone();

    if let Some(kind) = key_type.builtin() {
        let mut params = pattern
            .segments
            .iter_mut()
            .filter(|s| s.kind == SegmentType::Param);
        return match (params.next(), params.next()) {
            (Some(seg), None) => {
                seg.value_type = Some(kind);
                true
            }
            _ => {
                errs.add(
                    &pos,
                    format!(
                        "KeyPattern must contain exactly one parameter when the key type is {}",
                        kind
                    ),
                );
                false
            }
        };
    }

    let Some(decl) = schema.resolve_named_struct(key_type, false) else {
        errs.add(
            &key_type.pos,
            format!(
                "invalid key type {}: must be a builtin type or a named struct",
                key_type
            ),
        );
        return false;
    };
    let fields = decl.struct_fields().unwrap_or_default();

    let mut ok = true;
    for seg in pattern
        .segments
        .iter_mut()
        .filter(|s| s.kind == SegmentType::Param)
    {
        match fields.iter().find(|f| f.name == seg.value) {
            Some(field) => seg.value_type = field.ty.builtin(),
            None => {
                errs.add(
                    &pos,
                    format!(
                        "KeyPattern parameter ':{}' is not a field of {}",
                        seg.value, decl.name
                    ),
                );
                ok = false;
            }
        }
    }
    for field in fields.iter().filter(|f| f.is_exported()) {
        let used = pattern
            .segments
            .iter()
            .any(|s| s.kind == SegmentType::Param && s.value == field.name);
        if !used {
            errs.add(
                &pos,
                format!(
                    "field {} of key type {} is not used in the KeyPattern",
                    field.name, decl.name
                ),
            );
            ok = false;
        }
    }
    ok
}
