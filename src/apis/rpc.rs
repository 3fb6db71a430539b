//! @acp:module "RPC Parser"
//! @acp:summary "Validates //encore:api functions and infers endpoint paths, payloads and methods"
//! @acp:domain parser
//! @acp:layer service

use std::sync::Arc;

use serde::Serialize;

use super::{is_named, known, result_pos, DeclContext};
use crate::ast;
use crate::diag::Position;
use crate::directive::{Access, ApiDirective, SelectorSet};
use crate::paths::{Path, PathStyle, Segment, SegmentType};
use crate::schema::{self, BuiltinKind, Receiver, Type};

/// @acp:summary "An API endpoint"
#[derive(Debug, Clone, Serialize)]
pub struct Rpc {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    pub access: Access,
    pub raw: bool,
    pub methods: Vec<String>,
    pub path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Type>,
    #[serde(skip_serializing_if = "SelectorSet::is_empty")]
    pub tags: SelectorSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recv: Option<Receiver>,
    pub pkg_path: String,
    #[serde(skip)]
    pub file: Arc<str>,
    pub pos: Position,
}

impl Rpc {
    pub fn requires_auth(&self) -> bool {
        self.access == Access::Auth
    }
}

/// Path used when the directive has no `path=` field: `/<package>.<Func>`.
fn default_path(pkg_name: &str, func: &str, pos: &Position) -> Path {
    Path {
        style: PathStyle::Api,
        segments: vec![Segment::literal(format!("{}.{}", pkg_name, func))],
        pos: pos.clone(),
    }
}

/// @acp:summary "Validate an annotated function against the endpoint signature contract"
///
/// Returns `None` only when the signature is too short to describe an
/// endpoint at all; every other violation is reported and parsing continues.
pub fn parse(
    cx: &DeclContext<'_>,
    fd: &ast::FuncDecl,
    dir: ApiDirective,
    doc: String,
) -> Option<Rpc> {
    let decl = cx
        .schema
        .parse_func_decl(cx.pkg, cx.file, fd);

    if !decl.type_params.is_empty() {
        cx.errs
            .add(&decl.pos, "API endpoints cannot have type parameters");
    }

    let mut rpc = Rpc {
        name: fd.name.name.clone(),
        doc,
        access: dir.access,
        raw: dir.raw,
        methods: dir.methods,
        path: dir
            .path
            .unwrap_or_else(|| default_path(&cx.pkg.name, &fd.name.name, &dir.pos)),
        request: None,
        response: None,
        tags: dir.tags,
        recv: decl.recv.clone(),
        pkg_path: cx.pkg.import_path.clone(),
        file: Arc::clone(&cx.file.name),
        pos: decl.pos.clone(),
    };

    if rpc.raw {
        check_raw(cx, &decl)?;
    } else {
        check_typed(cx, &decl, &mut rpc)?;
    }

    if rpc.methods.is_empty() {
        rpc.methods = if rpc.raw {
            vec!["*".to_string()]
        } else if rpc.request.is_some() {
            vec!["POST".to_string()]
        } else {
            vec!["GET".to_string(), "POST".to_string()]
        };
    }

    Some(rpc)
}

fn check_raw(cx: &DeclContext<'_>, decl: &schema::FuncDecl) -> Option<()> {
    const SIGNATURE: &str =
        "raw endpoints must have the signature (w http.ResponseWriter, req *http.Request)";
    if decl.params.len() != 2 {
        cx.errs.add(&decl.params_pos, SIGNATURE);
        return None;
    }
    if !is_named(&decl.params[0].ty, known::RESPONSE_WRITER) {
        cx.errs.add(&decl.params[0].pos, SIGNATURE);
    }
    if !decl.params[1]
        .ty
        .pointee()
        .is_some_and(|t| is_named(t, known::HTTP_REQUEST))
    {
        cx.errs.add(&decl.params[1].pos, SIGNATURE);
    }
    if !decl.results.is_empty() {
        cx.errs
            .add(&result_pos(decl, 0), "raw endpoints must not return any results");
    }
    Some(())
}

fn check_typed(cx: &DeclContext<'_>, decl: &schema::FuncDecl, rpc: &mut Rpc) -> Option<()> {
    let Some(ctx) = decl.params.first() else {
        cx.errs.add(
            &decl.params_pos,
            "API endpoints must take context.Context as their first parameter",
        );
        return None;
    };
    if !is_named(&ctx.ty, known::CONTEXT) {
        cx.errs.add(
            &ctx.pos,
            format!("first parameter must be context.Context, got {}", ctx.ty),
        );
    }

    // Path parameters are matched positionally after the context.
    let rest = &decl.params[1..];
    let mut consumed = 0;
    for (seg, param) in rpc.path.params_mut().zip(rest) {
        consumed += 1;
        match param.name.as_deref() {
            Some(name) if name == seg.value => {}
            other => cx.errs.add(
                &param.pos,
                format!(
                    "path parameter '{}' does not match function parameter '{}'",
                    seg.value,
                    other.unwrap_or("_")
                ),
            ),
        }
        match param.ty.builtin() {
            Some(kind) if seg.kind == SegmentType::Wildcard && kind != BuiltinKind::String => {
                cx.errs.add(
                    &param.pos,
                    format!("wildcard parameter '{}' must be a string, got {}", seg.value, kind),
                );
            }
            Some(kind) if kind.is_path_param() => seg.value_type = Some(kind),
            _ => cx.errs.add(
                &param.pos,
                format!(
                    "path parameter '{}' must be a string, bool, integer or uuid.UUID, got {}",
                    seg.value, param.ty
                ),
            ),
        }
    }

    let missing: Vec<String> = rpc
        .path
        .params()
        .skip(consumed)
        .map(|s| s.value.clone())
        .collect();
    if !missing.is_empty() {
        cx.errs.add(
            &decl.params_pos,
            format!(
                "missing function parameters for path parameters: {}",
                missing.join(", ")
            ),
        );
    }

    let mut payload = rest.iter().skip(consumed);
    if let Some(req) = payload.next() {
        rpc.request = Some(req.ty.clone());
    }
    if let Some(extra) = payload.next() {
        cx.errs
            .add(&extra.pos, "APIs cannot have multiple payload parameters");
    }

    match decl.results.len() {
        0 => {
            cx.errs.add(
                &decl.params_pos,
                "API endpoints must return error or (T, error)",
            );
            return Some(());
        }
        1 | 2 => {}
        n => cx.errs.add(
            &result_pos(decl, 2),
            format!("API endpoints can have at most two results, got {}", n),
        ),
    }
    let last = decl.results.len() - 1;
    if !decl.results[last].ty.is_builtin(BuiltinKind::Error) {
        cx.errs
            .add(&result_pos(decl, last), "last result must be of type error");
    }
    if decl.results.len() == 2 {
        rpc.response = Some(decl.results[0].ty.clone());
    }
    Some(())
}
