//! @acp:module "APIs"
//! @acp:summary "Directive-driven parsing of endpoints, auth handlers, middleware and service structs"
//! @acp:domain parser
//! @acp:layer service
//!
//! [`parse_package`] walks every declaration of a package, extracts its
//! directive and hands it to the matching declaration parser. Declaration
//! parsers report contract violations and keep going where they can, so one
//! run surfaces as many problems as possible.

pub mod authhandler;
pub mod middleware;
pub mod rpc;
pub mod servicestruct;

use std::sync::Arc;

use serde::Serialize;

use crate::ast::{CommentGroup, Decl, File, GenKind, Package, Spec};
use crate::diag::{Bailout, ErrorList, Position};
use crate::directive::{self, Directive};
use crate::schema::{SchemaResolver, Type};

pub use authhandler::AuthHandler;
pub use middleware::{sort_middleware, Middleware};
pub use rpc::Rpc;
pub use servicestruct::ServiceStruct;

/// Qualified names the declaration contracts refer to.
pub(crate) mod known {
    pub const CONTEXT: (&str, &str) = ("context", "Context");
    pub const RESPONSE_WRITER: (&str, &str) = ("net/http", "ResponseWriter");
    pub const HTTP_REQUEST: (&str, &str) = ("net/http", "Request");
    pub const MW_REQUEST: (&str, &str) = ("encore.dev/middleware", "Request");
    pub const MW_NEXT: (&str, &str) = ("encore.dev/middleware", "Next");
    pub const MW_RESPONSE: (&str, &str) = ("encore.dev/middleware", "Response");
}

/// Everything a declaration parser needs besides the declaration itself.
#[derive(Clone, Copy)]
pub struct DeclContext<'a> {
    pub errs: &'a ErrorList,
    pub schema: &'a SchemaResolver,
    pub pkg: &'a Package,
    pub file: &'a Arc<File>,
}

pub(crate) fn is_named(ty: &Type, name: (&str, &str)) -> bool {
    ty.is_named(name.0, name.1)
}

/// @acp:summary "Directive-bound declarations found in one package"
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageApis {
    pub rpcs: Vec<Rpc>,
    pub auth_handlers: Vec<AuthHandler>,
    pub middleware: Vec<Middleware>,
    pub service_structs: Vec<ServiceStruct>,
}

impl PackageApis {
    pub fn is_empty(&self) -> bool {
        self.rpcs.is_empty()
            && self.auth_handlers.is_empty()
            && self.middleware.is_empty()
            && self.service_structs.is_empty()
    }
}

/// Parse the directive in `doc`, reporting a malformed one.
fn doc_directive(errs: &ErrorList, doc: Option<&CommentGroup>) -> Option<(Directive, String)> {
    match directive::parse_doc(doc) {
        Ok(parsed) => parsed.directive.map(|d| (d, parsed.doc)),
        Err(e) => {
            errs.add(&e.pos, e.message);
            None
        }
    }
}

/// @acp:summary "Parse every directive-annotated declaration in a package"
pub fn parse_package(
    errs: &ErrorList,
    schema: &SchemaResolver,
    pkg: &Package,
) -> Result<PackageApis, Bailout> {
    let mut out = PackageApis::default();

    for file in &pkg.files {
        let cx = DeclContext {
            errs,
            schema,
            pkg,
            file,
        };
        for decl in &file.decls {
            match decl {
                Decl::Func(fd) => {
                    let Some((dir, doc)) = doc_directive(errs, fd.doc.as_ref()) else {
                        continue;
                    };
                    match dir {
                        Directive::Api(d) => {
                            if let Some(rpc) = rpc::parse(&cx, fd, d, doc) {
                                out.rpcs.push(rpc);
                            }
                        }
                        Directive::AuthHandler(d) => {
                            out.auth_handlers.push(authhandler::parse(&cx, fd, d, doc));
                        }
                        Directive::Middleware(d) => {
                            out.middleware.push(middleware::parse(&cx, fd, d, doc));
                        }
                        Directive::Service(d) => errs.add(
                            &d.pos,
                            "service directive must be applied to a type declaration",
                        ),
                    }
                }
                Decl::Gen(gen) => {
                    if let Some((dir, doc)) = doc_directive(errs, gen.doc.as_ref()) {
                        match dir {
                            Directive::Service(d) => {
                                if let Some(ss) = servicestruct::parse(&cx, gen, d, doc)? {
                                    out.service_structs.push(ss);
                                }
                            }
                            other => misplaced(errs, &other, gen.kind),
                        }
                    }
                    // Directives on individual specs of a group.
                    if gen.grouped {
                        for spec in &gen.specs {
                            let doc = match spec {
                                Spec::Type(ts) => ts.doc.as_ref(),
                                Spec::Value(vs) => vs.doc.as_ref(),
                            };
                            if let Some((dir, _)) = doc_directive(errs, doc) {
                                errs.add(
                                    dir.pos(),
                                    format!(
                                        "{} directive cannot be applied inside a declaration group",
                                        dir.name()
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(out)
}

fn misplaced(errs: &ErrorList, dir: &Directive, kind: GenKind) {
    let what = match kind {
        GenKind::Type => "type",
        GenKind::Var => "var",
        GenKind::Const => "const",
    };
    errs.add(
        dir.pos(),
        format!(
            "{} directive must be applied to a function, not a {} declaration",
            dir.name(),
            what
        ),
    );
}

/// Position of the `index`th result, falling back to the parameter list.
pub(crate) fn result_pos(decl: &crate::schema::FuncDecl, index: usize) -> Position {
    decl.results
        .get(index)
        .map(|r| r.pos.clone())
        .unwrap_or_else(|| decl.params_pos.clone())
}
