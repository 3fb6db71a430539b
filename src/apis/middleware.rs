//! @acp:module "Middleware Parser"
//! @acp:summary "Validates //encore:middleware functions and orders middleware deterministically"
//! @acp:domain parser
//! @acp:layer service

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use super::{is_named, known, result_pos, DeclContext};
use crate::ast;
use crate::diag::Position;
use crate::directive::{MiddlewareDirective, SelectorSet};
use crate::schema::Receiver;

/// @acp:summary "A middleware function"
#[derive(Debug, Clone, Serialize)]
pub struct Middleware {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    pub global: bool,
    pub target: SelectorSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recv: Option<Receiver>,
    pub pkg_path: String,
    pub file: Arc<str>,
    pub pos: Position,
}

/// @acp:summary "Validate a middleware signature"
pub fn parse(
    cx: &DeclContext<'_>,
    fd: &ast::FuncDecl,
    dir: MiddlewareDirective,
    doc: String,
) -> Middleware {
    let decl = cx.schema.parse_func_decl(cx.pkg, cx.file, fd);

    let params = &decl.params;
    if params.len() != 2 {
        cx.errs.add(
            &decl.params_pos,
            "middleware must have the signature (req middleware.Request, next middleware.Next)",
        );
    }
    if let Some(p) = params.first() {
        if !is_named(&p.ty, known::MW_REQUEST) {
            cx.errs.add(
                &p.pos,
                format!("first parameter must be middleware.Request, got {}", p.ty),
            );
        }
    }
    if let Some(p) = params.get(1) {
        if !is_named(&p.ty, known::MW_NEXT) {
            cx.errs.add(
                &p.pos,
                format!("second parameter must be middleware.Next, got {}", p.ty),
            );
        }
    }

    match decl.results.as_slice() {
        [r] if is_named(&r.ty, known::MW_RESPONSE) => {}
        [r] => cx.errs.add(
            &r.pos,
            format!("middleware must return middleware.Response, got {}", r.ty),
        ),
        _ => cx.errs.add(
            &result_pos(&decl, 0),
            "middleware must return exactly one middleware.Response",
        ),
    }

    Middleware {
        name: fd.name.name.clone(),
        doc,
        global: dir.global,
        target: dir.target,
        recv: decl.recv.clone(),
        pkg_path: cx.pkg.import_path.clone(),
        file: Arc::clone(&cx.file.name),
        pos: decl.pos.clone(),
    }
}

fn compare(a: &Middleware, b: &Middleware) -> Ordering {
    // Global middleware runs first.
    b.global
        .cmp(&a.global)
        .then_with(|| a.pkg_path.cmp(&b.pkg_path))
        .then_with(|| a.file.cmp(&b.file))
        .then_with(|| (a.pos.line, a.pos.column).cmp(&(b.pos.line, b.pos.column)))
}

/// @acp:summary "Sort middleware into request-pipeline order"
/// @acp:ai-careful "Downstream code generation depends on this order being total and stable"
pub fn sort_middleware(mw: &mut [Middleware]) {
    mw.sort_by(compare);
}
