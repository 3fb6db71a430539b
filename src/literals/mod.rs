//! @acp:module "Literals"
//! @acp:summary "Struct literal model with per-field constness, and its declarative decoder"
//! @acp:domain parser
//! @acp:layer core

mod decode;
pub mod eval;

use crate::ast::{Expr, ExprKind, TypeExpr};
use crate::diag::{ErrorList, Position};

pub use decode::{decode, Decoded, FieldKind, FieldSpec};
pub use eval::{ConstValue, EvalContext};

/// Value of one keyed element of a struct literal.
#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Const(ConstValue),
    /// Not a compile-time constant
    Dynamic,
    /// A nested struct literal
    Struct(StructLit),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LitField {
    pub name: String,
    pub pos: Position,
    pub value: LitValue,
    /// The element's value expression, kept for dynamic fields
    pub expr: Expr,
}

impl LitField {
    pub fn is_constant(&self) -> bool {
        matches!(self.value, LitValue::Const(_))
    }
}

/// @acp:summary "A parsed struct literal"
#[derive(Debug, Clone, PartialEq)]
pub struct StructLit {
    pub ty: Option<TypeExpr>,
    pub pos: Position,
    pub fields: Vec<LitField>,
}

impl StructLit {
    /// @acp:summary "Parse a composite literal (optionally behind &) into a StructLit"
    ///
    /// Reports an error and returns `None` when `expr` is not a keyed struct literal.
    pub fn parse(errs: &ErrorList, cx: &EvalContext<'_>, expr: &Expr) -> Option<Self> {
        let expr = expr.unparen();
        let inner = match &expr.kind {
            ExprKind::Unary { op, operand } if op == "&" => operand.unparen(),
            _ => expr,
        };
        let ExprKind::Composite(lit) = &inner.kind else {
            errs.add(&expr.pos, "expected a struct literal");
            return None;
        };

        let mut fields: Vec<LitField> = Vec::with_capacity(lit.elems.len());
        let mut ok = true;
        for elem in &lit.elems {
            let Some(name) = elem.key.as_ref().and_then(|k| k.ident()) else {
                errs.add(&elem.pos, "struct literal must use field names (Field: value)");
                ok = false;
                continue;
            };
            if fields.iter().any(|f| f.name == name) {
                errs.add(&elem.pos, format!("duplicate field: {}", name));
                ok = false;
                continue;
            }

            let value = match &elem.value.unparen().kind {
                ExprKind::Composite(c) if c.elems.iter().all(|e| e.key.is_some()) => {
                    match Self::parse(errs, cx, &elem.value) {
                        Some(nested) => LitValue::Struct(nested),
                        None => {
                            ok = false;
                            continue;
                        }
                    }
                }
                _ => match cx.eval(&elem.value) {
                    Some(v) => LitValue::Const(v),
                    None => LitValue::Dynamic,
                },
            };
            fields.push(LitField {
                name: name.to_string(),
                pos: elem.pos.clone(),
                value,
                expr: elem.value.clone(),
            });
        }

        ok.then(|| StructLit {
            ty: lit.ty.clone(),
            pos: inner.pos.clone(),
            fields,
        })
    }

    /// Field by dotted path, e.g. `RetryPolicy.MaxRetries`.
    pub fn get(&self, path: &str) -> Option<&LitField> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let field = self.fields.iter().find(|f| f.name == head)?;
        match (rest, &field.value) {
            (None, _) => Some(field),
            (Some(rest), LitValue::Struct(nested)) => nested.get(rest),
            (Some(_), _) => None,
        }
    }

    /// Dotted paths of every leaf field, in source order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for field in &self.fields {
            match &field.value {
                LitValue::Struct(nested) => {
                    out.extend(nested.paths().into_iter().map(|p| format!("{}.{}", field.name, p)))
                }
                _ => out.push(field.name.clone()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, Spec};
    use crate::loader::{PackageLoader, Workspace};

    pub(crate) fn parse_var(src: &str, name: &str) -> (Option<StructLit>, ErrorList) {
        let ws = Workspace::from_sources("app", [("svc/svc.go", src)]).unwrap();
        let pkg = ws.package("app/svc").unwrap();
        let file = &pkg.files[0];
        let expr = file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Gen(g) => g.specs.iter().find_map(|s| match s {
                    Spec::Value(vs) if vs.names[0].name == name => vs.values.first(),
                    _ => None,
                }),
                _ => None,
            })
            .unwrap();
        let errs = ErrorList::new();
        let cx = EvalContext::new(&pkg, file).with_loader(&ws);
        (StructLit::parse(&errs, &cx, expr), errs)
    }

    #[test]
    fn test_constness_per_field() {
        let (lit, errs) = parse_var(
            "package svc\n\nvar cfg = Config{\n    Name: \"a\" + \"b\",\n    Handler: handle,\n    Retry: RetryPolicy{MaxRetries: 3},\n}\n",
            "cfg",
        );
        let lit = lit.unwrap();
        assert!(errs.is_empty());
        assert_eq!(
            lit.get("Name").map(|f| &f.value),
            Some(&LitValue::Const(ConstValue::String("ab".into())))
        );
        assert_eq!(lit.get("Handler").map(|f| &f.value), Some(&LitValue::Dynamic));
        assert_eq!(
            lit.get("Retry.MaxRetries").map(|f| &f.value),
            Some(&LitValue::Const(ConstValue::Int(3)))
        );
        assert_eq!(lit.paths(), vec!["Name", "Handler", "Retry.MaxRetries"]);
    }

    #[test]
    fn test_pointer_literal_accepted() {
        let (lit, _) = parse_var("package svc\n\nvar cfg = &Config{A: 1}\n", "cfg");
        assert_eq!(lit.unwrap().fields.len(), 1);
    }

    #[test]
    fn test_unkeyed_and_non_literal_rejected() {
        let (lit, errs) = parse_var("package svc\n\nvar cfg = Config{1, 2}\n", "cfg");
        assert!(lit.is_none());
        assert!(errs.has_errors());

        let (lit, errs) = parse_var("package svc\n\nvar cfg = makeConfig()\n", "cfg");
        assert!(lit.is_none());
        assert_eq!(errs.snapshot()[0].message, "expected a struct literal");
    }
}
