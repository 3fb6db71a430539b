//! @acp:module "Service Struct Parser"
//! @acp:summary "Validates //encore:service type declarations and their init functions"
//! @acp:domain parser
//! @acp:layer service

use std::sync::Arc;

use serde::Serialize;

use super::{result_pos, DeclContext};
use crate::ast::{GenDecl, GenKind, Spec};
use crate::diag::{Bailout, Position};
use crate::directive::ServiceDirective;
use crate::schema::{BuiltinKind, FuncDecl, TypeDecl};

/// @acp:summary "A service struct with its optional initializer"
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStruct {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl: Option<TypeDecl>,
    /// The `init<Name>` function, when one is declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<Arc<FuncDecl>>,
    pub pkg_path: String,
    #[serde(skip)]
    pub file: Arc<str>,
    pub pos: Position,
}

/// @acp:summary "Parse the type declaration a service directive is attached to"
/// @acp:ai-careful "An empty declaration group aborts the whole package"
pub fn parse(
    cx: &DeclContext<'_>,
    gen: &GenDecl,
    dir: ServiceDirective,
    doc: String,
) -> Result<Option<ServiceStruct>, Bailout> {
    if gen.kind != GenKind::Type {
        cx.errs.add(
            &dir.pos,
            "service directive must be applied to a type declaration",
        );
        return Ok(None);
    }

    let mut specs = gen.specs.iter().filter_map(|s| match s {
        Spec::Type(ts) => Some(ts),
        Spec::Value(_) => None,
    });
    let Some(ts) = specs.next() else {
        return Err(cx.errs.bailout(
            &dir.pos,
            "service directive must be applied to exactly one type declaration, found none",
        ));
    };
    if specs.next().is_some() {
        cx.errs.add(
            &dir.pos,
            "service directive cannot be applied to a group of type declarations",
        );
    }

    let name = ts.name.name.clone();
    let decl = cx.schema.parse_type_decl(&cx.pkg.import_path, &name);
    if decl.as_ref().and_then(|d| d.struct_fields()).is_none() {
        cx.errs.add(
            &ts.name.pos,
            format!("service {} must be a struct type", name),
        );
    }

    let init = init_func(cx, &name);

    Ok(Some(ServiceStruct {
        name,
        doc,
        decl,
        init,
        pkg_path: cx.pkg.import_path.clone(),
        file: Arc::clone(&cx.file.name),
        pos: ts.name.pos.clone(),
    }))
}

/// Resolve and validate `func init<Name>() (*Name, error)` if the package declares it.
fn init_func(cx: &DeclContext<'_>, name: &str) -> Option<Arc<FuncDecl>> {
    let (file, fd) = cx.pkg.find_func(&format!("init{}", name))?;
    let decl = cx.schema.parse_func_decl(cx.pkg, file, fd);

    let returns_service = decl.results.first().is_some_and(|r| {
        r.ty.pointee()
            .is_some_and(|t| t.is_named(&cx.pkg.import_path, name))
    });
    let valid = decl.type_params.is_empty()
        && decl.params.is_empty()
        && decl.results.len() == 2
        && returns_service
        && decl.results[1].ty.is_builtin(BuiltinKind::Error);
    if !valid {
        cx.errs.add(
            &result_pos(&decl, 0),
            format!(
                "service init function must have the signature func() (*{}, error)",
                name
            ),
        );
    }
    Some(decl)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_src;
    use super::*;

    #[test]
    fn test_service_with_init() {
        let (res, msgs) = parse_src(
            "package svc\n\n//encore:service\ntype Service struct{ n int }\n\nfunc initService() (*Service, error) { return &Service{}, nil }\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        let ss = &res.unwrap().service_structs[0];
        assert_eq!(ss.name, "Service");
        assert!(ss.init.is_some());
        assert!(ss.decl.as_ref().unwrap().struct_fields().is_some());
    }

    #[test]
    fn test_bad_init_signature() {
        let (res, msgs) = parse_src(
            "package svc\n\n//encore:service\ntype Service struct{}\n\nfunc initService(x int) *Service { return nil }\n",
        );
        assert!(res.is_ok());
        assert_eq!(
            msgs,
            vec!["service init function must have the signature func() (*Service, error)"]
        );
    }

    #[test]
    fn test_empty_group_bails_out() {
        let (res, msgs) = parse_src("package svc\n\n//encore:service\ntype ()\n");
        assert_eq!(res.unwrap_err(), Bailout);
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn test_group_and_non_struct() {
        let (res, msgs) = parse_src(
            "package svc\n\n//encore:service\ntype (\n    Service int\n    Other struct{}\n)\n",
        );
        assert_eq!(res.unwrap().service_structs.len(), 1);
        assert_eq!(
            msgs,
            vec![
                "service directive cannot be applied to a group of type declarations",
                "service Service must be a struct type",
            ]
        );
    }
}
