//! @acp:module "Auth Handler Parser"
//! @acp:summary "Validates //encore:authhandler functions"
//! @acp:domain parser
//! @acp:layer service

use std::sync::Arc;

use serde::Serialize;

use super::{is_named, known, result_pos, DeclContext};
use crate::ast;
use crate::diag::Position;
use crate::directive::AuthHandlerDirective;
use crate::schema::{BuiltinKind, Receiver, Type};

const PARAMS_SIGNATURE: &str =
    "auth handlers must take (ctx context.Context, token string) or (ctx context.Context, params *T)";
const RESULTS_SIGNATURE: &str =
    "auth handlers must return (auth.UID, error) or (auth.UID, *T, error)";

/// @acp:summary "An authentication handler"
#[derive(Debug, Clone, Serialize)]
pub struct AuthHandler {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// `string` for token auth, otherwise a pointer to a named struct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<Type>,
    /// Custom auth data returned alongside the user id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_data: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recv: Option<Receiver>,
    pub pkg_path: String,
    #[serde(skip)]
    pub file: Arc<str>,
    pub pos: Position,
}

/// @acp:summary "Validate an auth handler signature"
///
/// Missing parameters or results end validation early and the partially
/// filled handler is returned as is.
pub fn parse(
    cx: &DeclContext<'_>,
    fd: &ast::FuncDecl,
    _dir: AuthHandlerDirective,
    doc: String,
) -> AuthHandler {
    let decl = cx.schema.parse_func_decl(cx.pkg, cx.file, fd);
    let mut ah = AuthHandler {
        name: fd.name.name.clone(),
        doc,
        param: None,
        auth_data: None,
        recv: decl.recv.clone(),
        pkg_path: cx.pkg.import_path.clone(),
        file: Arc::clone(&cx.file.name),
        pos: decl.pos.clone(),
    };

    let params = &decl.params;
    if params.len() < 2 {
        cx.errs.add(&decl.params_pos, PARAMS_SIGNATURE);
        return ah;
    }
    if params.len() > 2 {
        cx.errs.add(&params[2].pos, PARAMS_SIGNATURE);
    }
    if !is_named(&params[0].ty, known::CONTEXT) {
        cx.errs.add(
            &params[0].pos,
            format!("first parameter must be context.Context, got {}", params[0].ty),
        );
    }
    let param = &params[1].ty;
    if !param.is_builtin(BuiltinKind::String)
        && cx.schema.resolve_named_struct(param, true).is_none()
    {
        cx.errs.add(
            &params[1].pos,
            format!(
                "second parameter must be string or a pointer to a named struct, got {}",
                param
            ),
        );
    }
    ah.param = Some(param.clone());

    let results = &decl.results;
    if results.len() < 2 {
        cx.errs.add(&result_pos(&decl, 0), RESULTS_SIGNATURE);
        return ah;
    }
    if results.len() > 3 {
        cx.errs.add(&results[3].pos, RESULTS_SIGNATURE);
    }
    if !results[0].ty.is_builtin(BuiltinKind::UserId) {
        cx.errs.add(
            &results[0].pos,
            format!("first result must be auth.UID, got {}", results[0].ty),
        );
    }
    if results.len() >= 3 {
        let data = &results[1].ty;
        if cx.schema.resolve_named_struct(data, true).is_none() {
            cx.errs.add(
                &results[1].pos,
                format!("auth data must be a pointer to a named struct, got {}", data),
            );
        }
        ah.auth_data = Some(data.clone());
    }
    let last = &results[results.len() - 1];
    if !last.ty.is_builtin(BuiltinKind::Error) {
        cx.errs.add(&last.pos, "last result must be of type error");
    }

    ah
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_src;
    use super::*;

    const HEADER: &str = "package svc\n\nimport (\n    \"context\"\n    \"encore.dev/beta/auth\"\n)\n\ntype Params struct{ Token string }\ntype Data struct{ Email string }\n\n";

    fn handlers(body: &str) -> (Vec<AuthHandler>, Vec<String>) {
        let (res, msgs) = parse_src(&format!("{}{}", HEADER, body));
        (res.unwrap().auth_handlers, msgs)
    }

    #[test]
    fn test_token_handler() {
        let (ahs, msgs) = handlers(
            "//encore:authhandler\nfunc Auth(ctx context.Context, token string) (auth.UID, error) { return \"\", nil }\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert!(ahs[0].param.as_ref().unwrap().is_builtin(BuiltinKind::String));
        assert!(ahs[0].auth_data.is_none());
    }

    #[test]
    fn test_struct_params_with_auth_data() {
        let (ahs, msgs) = handlers(
            "//encore:authhandler\nfunc Auth(ctx context.Context, p *Params) (auth.UID, *Data, error) { return \"\", nil, nil }\n",
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(ahs[0].auth_data.as_ref().unwrap().to_string(), "*app/svc.Data");
    }

    #[test]
    fn test_too_few_params_is_partial() {
        let (ahs, msgs) = handlers(
            "//encore:authhandler\nfunc Auth(ctx context.Context) (auth.UID, error) { return \"\", nil }\n",
        );
        assert_eq!(msgs, vec![PARAMS_SIGNATURE]);
        assert_eq!(ahs.len(), 1);
        assert!(ahs[0].param.is_none());
    }

    #[test]
    fn test_wrong_types_reported_per_position() {
        let (_, msgs) = handlers(
            "//encore:authhandler\nfunc Auth(ctx context.Context, token int) (string, Data, error) { return \"\", Data{}, nil }\n",
        );
        assert_eq!(
            msgs,
            vec![
                "second parameter must be string or a pointer to a named struct, got int",
                "first result must be auth.UID, got string",
                "auth data must be a pointer to a named struct, got app/svc.Data",
            ]
        );
    }
}
