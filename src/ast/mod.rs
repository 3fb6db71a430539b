//! @acp:module "Go Syntax Model"
//! @acp:summary "Owned, thread-safe Go syntax tree consumed by the directive and resource parsers"
//! @acp:domain parser
//! @acp:layer model
//!
//! The loader converts tree-sitter output into these types once per file, so
//! the rest of the crate never touches tree-sitter nodes and packages can be
//! shared across worker threads.

pub mod walk;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diag::Position;

/// A package-qualified symbol, e.g. `encore.dev/pubsub.NewTopic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub pkg_path: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            name: name.into(),
        }
    }

    pub fn is(&self, pkg_path: &str, name: &str) -> bool {
        self.pkg_path == pkg_path && self.name == name
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pkg_path.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.pkg_path, self.name)
        }
    }
}

/// @acp:summary "A Go package: all non-test files in one directory"
#[derive(Debug, Clone)]
pub struct Package {
    pub import_path: String,
    pub name: String,
    /// Directory relative to the module root ("." for the root package)
    pub rel_dir: String,
    pub files: Vec<Arc<File>>,
}

impl Package {
    /// Whether any file in the package imports one of `paths`.
    pub fn imports_any(&self, paths: &[&str]) -> bool {
        self.files
            .iter()
            .any(|f| f.imports.iter().any(|imp| paths.contains(&imp.path.as_str())))
    }

    pub fn find_type(&self, name: &str) -> Option<(&Arc<File>, &TypeSpec)> {
        self.files.iter().find_map(|file| {
            file.decls.iter().find_map(|decl| match decl {
                Decl::Gen(gen) if gen.kind == GenKind::Type => {
                    gen.specs.iter().find_map(|spec| match spec {
                        Spec::Type(ts) if ts.name.name == name => Some((file, ts)),
                        _ => None,
                    })
                }
                _ => None,
            })
        })
    }

    /// Package-level function (not method) named `name`.
    pub fn find_func(&self, name: &str) -> Option<(&Arc<File>, &FuncDecl)> {
        self.files.iter().find_map(|file| {
            file.decls.iter().find_map(|decl| match decl {
                Decl::Func(fd) if fd.recv.is_none() && fd.name.name == name => Some((file, fd)),
                _ => None,
            })
        })
    }

    /// Package-level `var` or `const` binding named `name`, with the index of
    /// the name within its spec.
    pub fn find_value(&self, name: &str) -> Option<ValueRef<'_>> {
        for file in &self.files {
            for decl in &file.decls {
                let Decl::Gen(gen) = decl else { continue };
                if gen.kind == GenKind::Type {
                    continue;
                }
                for spec in &gen.specs {
                    let Spec::Value(vs) = spec else { continue };
                    if let Some(index) = vs.names.iter().position(|n| n.name == name) {
                        return Some(ValueRef {
                            file,
                            kind: gen.kind,
                            spec: vs,
                            index,
                        });
                    }
                }
            }
        }
        None
    }
}

/// A package-level `var`/`const` binding located by [`Package::find_value`].
#[derive(Debug, Clone, Copy)]
pub struct ValueRef<'a> {
    pub file: &'a Arc<File>,
    pub kind: GenKind,
    pub spec: &'a ValueSpec,
    pub index: usize,
}

impl<'a> ValueRef<'a> {
    pub fn value(&self) -> Option<&'a Expr> {
        self.spec.values.get(self.index)
    }
}

/// @acp:summary "One parsed Go source file"
#[derive(Debug, Clone)]
pub struct File {
    /// Path relative to the module root, used in every diagnostic position
    pub name: Arc<str>,
    pub package_name: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

impl File {
    /// Import path bound to the local package name `local` in this file.
    pub fn resolve_import(&self, local: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|imp| imp.local_name() == Some(local))
            .map(|imp| imp.path.as_str())
    }

    pub fn imports(&self, path: &str) -> bool {
        self.imports.iter().any(|imp| imp.path == path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub path: String,
    /// Explicit alias, including `_` and `.`
    pub name: Option<String>,
    pub pos: Position,
}

impl ImportSpec {
    /// Name the import is referenced by, or `None` for blank and dot imports.
    pub fn local_name(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some("_") | Some(".") => None,
            Some(alias) => Some(alias),
            None => Some(default_package_name(&self.path)),
        }
    }
}

/// Package name implied by an import path: its last element, skipping a
/// trailing major-version element (`/v2`) and a `.vN` suffix (`yaml.v3`).
pub fn default_package_name(path: &str) -> &str {
    let mut parts = path.rsplit('/');
    let last = parts.next().unwrap_or(path);
    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    let name = if is_major {
        parts.next().unwrap_or(last)
    } else {
        last
    };
    match name.rsplit_once(".v") {
        Some((base, ver)) if !ver.is_empty() && ver.chars().all(|c| c.is_ascii_digit()) => base,
        _ => name,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub pos: Position,
}

/// A `//` comment line (or one line of a block comment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentGroup {
    pub lines: Vec<Comment>,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub doc: Option<CommentGroup>,
    pub recv: Option<Field>,
    pub name: Ident,
    pub type_params: Vec<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Option<Block>,
    /// Position of the `func` keyword
    pub pos: Position,
    /// Position of the parameter list
    pub params_pos: Position,
}

/// One entry of a parameter, result, receiver or struct field list.
/// `a, b int` is a single field with two names.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenKind {
    Type,
    Var,
    Const,
}

#[derive(Debug, Clone)]
pub struct GenDecl {
    pub kind: GenKind,
    pub doc: Option<CommentGroup>,
    /// Declared with parentheses: `type ( ... )`
    pub grouped: bool,
    pub specs: Vec<Spec>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum Spec {
    Type(TypeSpec),
    Value(ValueSpec),
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub doc: Option<CommentGroup>,
    pub name: Ident,
    pub type_params: Vec<Field>,
    pub ty: TypeExpr,
    pub is_alias: bool,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub doc: Option<CommentGroup>,
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Ident(String),
    Qualified { pkg: String, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Struct(Vec<FieldType>),
    Generic { base: Box<TypeExpr>, args: Vec<TypeExpr> },
    Interface { empty: bool },
    Func,
    Chan(Box<TypeExpr>),
    /// `...T` in a variadic parameter
    Ellipsis(Box<TypeExpr>),
    Invalid(String),
}

/// Struct field inside a [`TypeExprKind::Struct`]; kept separate from [`Field`]
/// so that type expressions stay `PartialEq`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    /// Empty for embedded fields
    pub names: Vec<String>,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub pos: Position,
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeExprKind::Ident(name) => f.write_str(name),
            TypeExprKind::Qualified { pkg, name } => write!(f, "{}.{}", pkg, name),
            TypeExprKind::Pointer(inner) => write!(f, "*{}", inner),
            TypeExprKind::Slice(inner) => write!(f, "[]{}", inner),
            TypeExprKind::Array { len, elem } => write!(f, "[{}]{}", len, elem),
            TypeExprKind::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeExprKind::Struct(_) => f.write_str("struct{...}"),
            TypeExprKind::Generic { base, args } => {
                write!(f, "{}[", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str("]")
            }
            TypeExprKind::Interface { empty: true } => f.write_str("interface{}"),
            TypeExprKind::Interface { empty: false } => f.write_str("interface{...}"),
            TypeExprKind::Func => f.write_str("func(...)"),
            TypeExprKind::Chan(inner) => write!(f, "chan {}", inner),
            TypeExprKind::Ellipsis(inner) => write!(f, "...{}", inner),
            TypeExprKind::Invalid(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
    /// Source text of the whole expression
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Identifiers, including the predeclared `true`, `false`, `nil` and `iota`
    Ident(String),
    Selector { operand: Box<Expr>, field: Ident },
    Lit(BasicLit),
    Call(CallExpr),
    Composite(CompositeLit),
    Binary { op: String, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: String, operand: Box<Expr> },
    Paren(Box<Expr>),
    FuncLit(FuncLit),
    /// `x[i]`; also generic instantiation with a single type argument
    Index { operand: Box<Expr>, index: Box<Expr> },
    /// `f[T1, T2]` generic instantiation outside a call
    Instantiate { operand: Box<Expr>, type_args: Vec<TypeExpr> },
    /// A type in expression position (`make([]T, n)`, conversions)
    Type(TypeExpr),
    /// Anything else; children are kept so nested calls are still visited
    Other(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BasicLit {
    Int(String),
    Float(String),
    Imag(String),
    Rune(String),
    /// Decoded string value
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub fun: Box<Expr>,
    pub type_args: Vec<TypeExpr>,
    pub args: Vec<Expr>,
}

impl CallExpr {
    /// The called expression with any generic instantiation stripped,
    /// together with the type arguments from wherever they were written.
    pub fn callee(&self) -> (&Expr, Vec<TypeExpr>) {
        let mut type_args = self.type_args.clone();
        let fun = match &self.fun.kind {
            ExprKind::Index { operand, index } => {
                if let Some(ty) = index.as_type() {
                    type_args.insert(0, ty);
                }
                operand.as_ref()
            }
            ExprKind::Instantiate {
                operand,
                type_args: inst,
            } => {
                type_args.splice(0..0, inst.iter().cloned());
                operand.as_ref()
            }
            _ => self.fun.as_ref(),
        };
        (fun, type_args)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    pub ty: Option<TypeExpr>,
    pub elems: Vec<KeyedElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedElement {
    pub key: Option<Expr>,
    pub value: Expr,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub params: usize,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Decl(GenDeclStmt),
    Expr(Expr),
    Assign { lhs: Vec<Expr>, rhs: Vec<Expr> },
    Return(Vec<Expr>),
    Block(Block),
    /// Control-flow statements, flattened to their expressions and nested statements
    Compound { exprs: Vec<Expr>, stmts: Vec<Stmt> },
}

/// A `var`/`const` declaration inside a function body.
#[derive(Debug, Clone, PartialEq)]
pub struct GenDeclStmt {
    pub kind: GenKind,
    pub values: Vec<Expr>,
}

impl Expr {
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    /// `pkg.Name` where `pkg` is a plain identifier.
    pub fn as_selector(&self) -> Option<(&str, &Ident)> {
        match &self.kind {
            ExprKind::Selector { operand, field } => operand.ident().map(|pkg| (pkg, field)),
            _ => None,
        }
    }

    /// Reinterpret an expression as a type, as needed for generic
    /// instantiations the grammar parses as index expressions.
    pub fn as_type(&self) -> Option<TypeExpr> {
        let kind = match &self.kind {
            ExprKind::Type(ty) => return Some(ty.clone()),
            ExprKind::Ident(name) => TypeExprKind::Ident(name.clone()),
            ExprKind::Selector { operand, field } => TypeExprKind::Qualified {
                pkg: operand.ident()?.to_string(),
                name: field.name.clone(),
            },
            ExprKind::Unary { op, operand } if op == "*" => {
                TypeExprKind::Pointer(Box::new(operand.as_type()?))
            }
            ExprKind::Paren(inner) => return inner.as_type(),
            ExprKind::Index { operand, index } => TypeExprKind::Generic {
                base: Box::new(operand.as_type()?),
                args: vec![index.as_type()?],
            },
            ExprKind::Instantiate { operand, type_args } => TypeExprKind::Generic {
                base: Box::new(operand.as_type()?),
                args: type_args.clone(),
            },
            _ => return None,
        };
        Some(TypeExpr {
            kind,
            pos: self.pos.clone(),
        })
    }
}

impl CommentGroup {
    /// Comment text with markers and one leading space removed, one line per comment.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|c| strip_comment_marker(&c.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(crate) fn strip_comment_marker(text: &str) -> &str {
    let body = text
        .strip_prefix("//")
        .or_else(|| text.strip_prefix("/*"))
        .unwrap_or(text);
    let body = body.strip_suffix("*/").unwrap_or(body);
    body.strip_prefix(' ').unwrap_or(body)
}
