//! @acp:module "Constructor Usages"
//! @acp:summary "Finds calls to resource constructors and enforces where they may appear"
//! @acp:domain parser
//! @acp:layer service

use std::sync::Arc;

use crate::ast::walk::{walk_file, Ancestor, Visitor};
use crate::ast::{
    default_package_name, CallExpr, Decl, Expr, ExprKind, File, Package, QualifiedName, Spec,
    TypeExpr, ValueSpec,
};
use crate::diag::{ErrorList, Position};
use crate::locations::{classify, Filter, Filters, Location};

/// Resource constructors may only initialize package-level variables.
pub fn package_var_filter() -> Filters {
    Filter::allowed_in(Location::VARIABLE)
        .but_not_in(Location::FUNCTION | Location::FUNC_CALL)
        .into()
}

/// @acp:summary "One call to a resource constructor"
#[derive(Debug, Clone)]
pub struct Usage<'a> {
    pub file: &'a Arc<File>,
    /// The call expression
    pub expr: &'a Expr,
    pub call: &'a CallExpr,
    pub callee: QualifiedName,
    pub type_args: Vec<TypeExpr>,
    /// Variable the result is assigned to; `None` for `_`
    pub binding: Option<String>,
    /// Whether the call initializes a variable declaration
    pub declared: bool,
    /// Doc comment of that variable
    pub doc: String,
    pub location: Location,
}

impl<'a> Usage<'a> {
    pub fn call_pos(&self) -> &Position {
        &self.expr.pos
    }

    /// Callee as written with the default package name, e.g. `pubsub.NewTopic`.
    pub fn display_name(&self) -> String {
        format!(
            "{}.{}",
            default_package_name(&self.callee.pkg_path),
            self.callee.name
        )
    }

    /// The call's arguments, if there are exactly `n`.
    pub fn args(&self, errs: &ErrorList, n: usize) -> Option<&'a [Expr]> {
        let args = self.call.args.as_slice();
        if args.len() != n {
            errs.add(
                self.call_pos(),
                format!(
                    "{} expects {} argument(s), got {}",
                    self.display_name(),
                    n,
                    args.len()
                ),
            );
            return None;
        }
        Some(args)
    }

    /// The call's type arguments, if there are exactly `n`.
    pub fn type_args(&self, errs: &ErrorList, n: usize) -> Option<&[TypeExpr]> {
        if self.type_args.len() != n {
            errs.add(
                self.call_pos(),
                format!(
                    "{} requires {} type argument(s), got {}",
                    self.display_name(),
                    n,
                    self.type_args.len()
                ),
            );
            return None;
        }
        Some(&self.type_args)
    }
}

struct Finder<'a, 't> {
    file: &'a Arc<File>,
    targets: &'t [(&'t str, &'t str)],
    calls: Vec<Usage<'a>>,
    bare: Vec<(&'a Expr, QualifiedName)>,
}

impl<'a> Finder<'a, '_> {
    fn target(&self, expr: &Expr) -> Option<QualifiedName> {
        let (pkg, field) = expr.unparen().as_selector()?;
        let path = self.file.resolve_import(pkg)?;
        self.targets
            .iter()
            .any(|(p, n)| *p == path && *n == field.name)
            .then(|| QualifiedName::new(path, field.name.clone()))
    }
}

impl<'a> Visitor<'a> for Finder<'a, '_> {
    fn visit_expr(&mut self, expr: &'a Expr, stack: &[Ancestor<'a>], callee: bool) {
        match &expr.kind {
            ExprKind::Call(call) => {
                let (fun, type_args) = call.callee();
                let Some(qn) = self.target(fun) else {
                    return;
                };
                let spec = stack.iter().rev().find_map(|a| match a {
                    Ancestor::ValueSpec { spec, index } => Some((*spec, *index)),
                    _ => None,
                });
                let declared = spec.is_some();
                let binding = spec
                    .and_then(|(spec, index)| spec.names.get(index))
                    .map(|n| n.name.clone())
                    .filter(|n| n != "_");
                let doc = spec
                    .map(|(spec, _)| spec_doc(self.file, spec))
                    .unwrap_or_default();
                self.calls.push(Usage {
                    file: self.file,
                    expr,
                    call,
                    callee: qn,
                    type_args,
                    binding,
                    declared,
                    doc,
                    location: classify(stack),
                });
            }
            ExprKind::Selector { .. } if !callee => {
                if let Some(qn) = self.target(expr) {
                    self.bare.push((expr, qn));
                }
            }
            _ => {}
        }
    }
}

/// Doc comment of a package-level value spec, falling back to its
/// declaration's doc for ungrouped declarations.
fn spec_doc(file: &File, spec: &ValueSpec) -> String {
    for decl in &file.decls {
        let Decl::Gen(gen) = decl else { continue };
        for s in &gen.specs {
            if let Spec::Value(vs) = s {
                if std::ptr::eq(vs, spec) {
                    let doc = vs
                        .doc
                        .as_ref()
                        .or_else(|| (!gen.grouped).then_some(gen.doc.as_ref()).flatten());
                    return doc.map(|d| d.text()).unwrap_or_default();
                }
            }
        }
    }
    String::new()
}

/// @acp:summary "Every permitted call to one of `targets` in a package"
///
/// Calls in disallowed locations and references that are not calls are
/// reported and left out of the result.
pub fn find_usages<'a>(
    errs: &ErrorList,
    pkg: &'a Package,
    targets: &[(&str, &str)],
    filter: &Filters,
) -> Vec<Usage<'a>> {
    let mut out = Vec::new();
    for file in &pkg.files {
        let mut finder = Finder {
            file,
            targets,
            calls: Vec::new(),
            bare: Vec::new(),
        };
        walk_file(file, &mut finder);

        for (expr, qn) in finder.bare {
            errs.add(
                &expr.pos,
                format!(
                    "{}.{} must be called",
                    default_package_name(&qn.pkg_path),
                    qn.name
                ),
            );
        }
        for usage in finder.calls {
            if filter.allows(usage.location) && usage.declared {
                out.push(usage);
            } else {
                errs.add(
                    usage.call_pos(),
                    format!(
                        "{} must be called as the initializer of a package-level variable",
                        usage.display_name()
                    ),
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{PackageLoader, Workspace};

    const TARGETS: &[(&str, &str)] = &[("encore.dev/pubsub", "NewTopic")];

    fn find(src: &str) -> (Vec<(Option<String>, String, usize)>, Vec<String>) {
        let ws = Workspace::from_sources("app", [("svc/svc.go", src)]).unwrap();
        let pkg = ws.package("app/svc").unwrap();
        let errs = ErrorList::new();
        let usages = find_usages(&errs, &pkg, TARGETS, &package_var_filter());
        let found = usages
            .iter()
            .map(|u| (u.binding.clone(), u.doc.clone(), u.type_args.len()))
            .collect();
        let msgs = errs.snapshot().into_iter().map(|d| d.message).collect();
        (found, msgs)
    }

    #[test]
    fn test_binding_doc_and_type_args() {
        let (found, msgs) = find(
            "package svc\n\nimport \"encore.dev/pubsub\"\n\n// Signups is published on every signup.\nvar Signups = pubsub.NewTopic[*Event](\"signups\", cfg)\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(
            found,
            vec![(
                Some("Signups".to_string()),
                "Signups is published on every signup.".to_string(),
                1
            )]
        );
    }

    #[test]
    fn test_aliased_import() {
        let (found, _) = find(
            "package svc\n\nimport ps \"encore.dev/pubsub\"\n\nvar T = ps.NewTopic[*Event](\"t\", cfg)\n",
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_bare_reference_must_be_called() {
        let (found, msgs) = find(
            "package svc\n\nimport \"encore.dev/pubsub\"\n\nvar ctor = pubsub.NewTopic\n",
        );
        assert!(found.is_empty());
        assert_eq!(msgs, vec!["pubsub.NewTopic must be called"]);
    }

    #[test]
    fn test_disallowed_placements() {
        let (found, msgs) = find(
            "package svc\n\nimport \"encore.dev/pubsub\"\n\nvar W = wrap(pubsub.NewTopic[*Event](\"a\", cfg))\n\nfunc f() {\n    pubsub.NewTopic[*Event](\"b\", cfg)\n}\n\nvar _ = pubsub.NewTopic[*Event](\"c\", cfg)\n",
        );
        assert_eq!(found, vec![(None, String::new(), 1)]);
        assert_eq!(msgs.len(), 2);
        assert!(msgs
            .iter()
            .all(|m| m == "pubsub.NewTopic must be called as the initializer of a package-level variable"));
    }
}
