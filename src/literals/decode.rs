//! @acp:module "Literal Decoder"
//! @acp:summary "Decodes a struct literal against a declarative field-spec table"
//! @acp:domain parser
//! @acp:layer core

use std::collections::HashMap;

use super::{ConstValue, LitValue, StructLit};
use crate::ast::Expr;
use crate::diag::{ErrorList, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Float,
    Bool,
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Bool => "bool",
        }
    }

    /// Convert `v` the way an untyped Go constant converts to this kind.
    fn convert(&self, v: &ConstValue) -> Option<ConstValue> {
        match (self, v) {
            (FieldKind::String, ConstValue::String(_))
            | (FieldKind::Int, ConstValue::Int(_))
            | (FieldKind::Float, ConstValue::Float(_))
            | (FieldKind::Bool, ConstValue::Bool(_)) => Some(v.clone()),
            (FieldKind::Int, ConstValue::Float(f)) if f.fract() == 0.0 => {
                Some(ConstValue::Int(*f as i64))
            }
            (FieldKind::Float, ConstValue::Int(i)) => Some(ConstValue::Float(*i as f64)),
            _ => None,
        }
    }
}

/// One field of a configuration struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Literal key when it differs from `name`
    pub key: Option<&'static str>,
    pub kind: FieldKind,
    pub required: bool,
    /// Accepts any expression; the expression is captured instead of a value
    pub dynamic: bool,
    /// A required field may hold its zero value
    pub zero_ok: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            key: None,
            kind,
            required: true,
            dynamic: false,
            zero_ok: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub const fn dynamic(name: &'static str, required: bool) -> Self {
        Self {
            required,
            dynamic: true,
            ..Self::required(name, FieldKind::String)
        }
    }

    pub const fn zero_ok(mut self) -> Self {
        self.zero_ok = true;
        self
    }

    pub const fn key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    fn literal_key(&self) -> &'static str {
        self.key.unwrap_or(self.name)
    }
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Const(ConstValue),
    Dynamic(Expr),
}

/// @acp:summary "Result of a successful decode, keyed by field spec name"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    values: HashMap<&'static str, (FieldValue, Position)>,
}

impl Decoded {
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn pos(&self, name: &str) -> Option<&Position> {
        self.values.get(name).map(|(_, p)| p)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some((FieldValue::Const(ConstValue::String(s)), _)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some((FieldValue::Const(ConstValue::Int(i)), _)) => Some(*i),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some((FieldValue::Const(ConstValue::Float(f)), _)) => Some(*f),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some((FieldValue::Const(ConstValue::Bool(b)), _)) => Some(*b),
            _ => None,
        }
    }

    pub fn expr(&self, name: &str) -> Option<&Expr> {
        match self.values.get(name) {
            Some((FieldValue::Dynamic(e), _)) => Some(e),
            _ => None,
        }
    }
}

/// @acp:summary "Decode a struct literal against specs, reporting every violation"
///
/// Returns `None` if any error was reported.
pub fn decode(errs: &ErrorList, lit: &StructLit, specs: &[FieldSpec]) -> Option<Decoded> {
    let mut out = Decoded::default();
    let mut ok = true;

    for spec in specs {
        let key = spec.literal_key();
        let Some(field) = lit.fields.iter().find(|f| f.name == key) else {
            if spec.required {
                errs.add(&lit.pos, format!("missing required field: {}", key));
                ok = false;
            }
            continue;
        };

        if spec.dynamic {
            out.values.insert(
                spec.name,
                (FieldValue::Dynamic(field.expr.clone()), field.pos.clone()),
            );
            continue;
        }

        let LitValue::Const(value) = &field.value else {
            errs.add(
                &field.pos,
                format!("field {} must be a compile-time constant", key),
            );
            ok = false;
            continue;
        };
        let Some(converted) = spec.kind.convert(value) else {
            errs.add(
                &field.pos,
                format!(
                    "invalid value for field {}: expected {}, got {} {}",
                    key,
                    spec.kind.name(),
                    value.kind_name(),
                    value
                ),
            );
            ok = false;
            continue;
        };
        if spec.required && !spec.zero_ok && converted.is_zero() {
            errs.add(
                &field.pos,
                format!("field {} is required and cannot be the zero value", key),
            );
            ok = false;
            continue;
        }
        out.values
            .insert(spec.name, (FieldValue::Const(converted), field.pos.clone()));
    }

    for field in &lit.fields {
        if !specs.iter().any(|s| s.literal_key() == field.name) {
            errs.add(&field.pos, format!("unexpected field: {}", field.name));
            ok = false;
        }
    }

    ok.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literals::tests::parse_var;

    const TOPIC: &[FieldSpec] = &[
        FieldSpec::required("DeliveryGuarantee", FieldKind::Int),
        FieldSpec::optional("OrderingKey", FieldKind::String),
    ];

    fn decode_src(body: &str, specs: &[FieldSpec]) -> (Option<Decoded>, Vec<String>) {
        let src = format!(
            "package svc\n\nimport \"encore.dev/pubsub\"\n\nvar cfg = pubsub.TopicConfig{{{}}}\n",
            body
        );
        let (lit, errs) = parse_var(&src, "cfg");
        let decoded = decode(&errs, &lit.unwrap(), specs);
        let msgs = errs.snapshot().into_iter().map(|d| d.message).collect();
        (decoded, msgs)
    }

    #[test]
    fn test_required_and_optional() {
        let (decoded, msgs) = decode_src("DeliveryGuarantee: pubsub.AtLeastOnce", TOPIC);
        assert!(msgs.is_empty(), "{:?}", msgs);
        let decoded = decoded.unwrap();
        assert_eq!(decoded.int("DeliveryGuarantee"), Some(1));
        assert!(!decoded.is_set("OrderingKey"));
    }

    #[test]
    fn test_missing_required_field() {
        let (decoded, msgs) = decode_src("OrderingKey: \"Id\"", TOPIC);
        assert!(decoded.is_none());
        assert_eq!(msgs, vec!["missing required field: DeliveryGuarantee"]);
    }

    #[test]
    fn test_unexpected_field() {
        let (_, msgs) = decode_src("DeliveryGuarantee: 1, Bogus: 2", TOPIC);
        assert_eq!(msgs, vec!["unexpected field: Bogus"]);
    }

    #[test]
    fn test_dynamic_field_accepts_constant() {
        let specs = [FieldSpec::dynamic("Handler", true)];
        let (decoded, msgs) = decode_src("Handler: 42", &specs);
        assert!(msgs.is_empty());
        assert!(decoded.unwrap().expr("Handler").is_some());
    }

    #[test]
    fn test_non_constant_rejected() {
        let (_, msgs) = decode_src("DeliveryGuarantee: guarantee()", TOPIC);
        assert_eq!(msgs, vec!["field DeliveryGuarantee must be a compile-time constant"]);
    }

    #[test]
    fn test_type_mismatch() {
        let (_, msgs) = decode_src("DeliveryGuarantee: \"once\"", TOPIC);
        assert!(msgs[0].starts_with("invalid value for field DeliveryGuarantee: expected int"));
    }

    #[test]
    fn test_zero_value_policy() {
        let (_, msgs) = decode_src("DeliveryGuarantee: 0", TOPIC);
        assert_eq!(
            msgs,
            vec!["field DeliveryGuarantee is required and cannot be the zero value"]
        );

        let specs = [FieldSpec::required("DeliveryGuarantee", FieldKind::Int).zero_ok()];
        let (decoded, msgs) = decode_src("DeliveryGuarantee: 0", &specs);
        assert!(msgs.is_empty());
        assert_eq!(decoded.unwrap().int("DeliveryGuarantee"), Some(0));
    }

    #[test]
    fn test_renamed_key() {
        let specs = [FieldSpec::optional("suffix", FieldKind::String).key("EncoreInternal_KeyspaceSuffix")];
        let (decoded, msgs) = decode_src("EncoreInternal_KeyspaceSuffix: \"v2\"", &specs);
        assert!(msgs.is_empty());
        assert_eq!(decoded.unwrap().string("suffix"), Some("v2"));
    }
}
