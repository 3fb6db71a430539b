//! @acp:module "Schema"
//! @acp:summary "Type model and memoized resolver for function signatures and type declarations"
//! @acp:domain parser
//! @acp:layer service
//!
//! Named types declared inside the application are stored in an arena and
//! referenced by [`DeclId`]. The id is allocated before the declaration's body
//! is resolved, so self-referential and mutually recursive types terminate.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::ast::{self, File, Package, QualifiedName, TypeExpr, TypeExprKind};
use crate::diag::{ErrorList, Position};
use crate::loader::PackageLoader;

/// Primitive kinds of the type model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinKind {
    Any,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Bytes,
    Time,
    Uuid,
    Json,
    UserId,
    Error,
}

impl BuiltinKind {
    /// Builtin named by a predeclared Go identifier.
    pub fn from_ident(name: &str) -> Option<Self> {
        Some(match name {
            "any" => Self::Any,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" | "rune" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" | "byte" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            "error" => Self::Error,
            _ => return None,
        })
    }

    /// Builtins that live in a package rather than the universe scope.
    pub fn from_qualified(pkg_path: &str, name: &str) -> Option<Self> {
        Some(match (pkg_path, name) {
            ("time", "Time") => Self::Time,
            ("encore.dev/types/uuid", "UUID") => Self::Uuid,
            ("encoding/json", "RawMessage") => Self::Json,
            ("encore.dev/beta/auth", "UID") => Self::UserId,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Bytes => "[]byte",
            Self::Time => "time.Time",
            Self::Uuid => "uuid.UUID",
            Self::Json => "json.RawMessage",
            Self::UserId => "auth.UID",
            Self::Error => "error",
        }
    }

    /// Kinds a path parameter may be declared as.
    pub fn is_path_param(&self) -> bool {
        matches!(
            self,
            Self::String
                | Self::Bool
                | Self::Int
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
                | Self::Uuid
        )
    }
}

impl fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable handle of a type declaration in the resolver arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type {
    pub kind: TypeKind,
    #[serde(skip)]
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeKind {
    Builtin { kind: BuiltinKind },
    Named(NamedType),
    Pointer { elem: Box<Type> },
    List { elem: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    Struct { fields: Vec<StructField> },
    TypeParamRef { name: String, index: usize },
    Interface,
    Func,
    Chan,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedType {
    pub name: QualifiedName,
    /// Set for types declared inside the application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl: Option<DeclId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructField {
    /// For embedded fields, the name of the embedded type
    pub name: String,
    pub ty: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl StructField {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

impl Type {
    pub fn new(kind: TypeKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    pub fn builtin(&self) -> Option<BuiltinKind> {
        match &self.kind {
            TypeKind::Builtin { kind } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_builtin(&self, kind: BuiltinKind) -> bool {
        self.builtin() == Some(kind)
    }

    pub fn named(&self) -> Option<&NamedType> {
        match &self.kind {
            TypeKind::Named(named) => Some(named),
            _ => None,
        }
    }

    /// Whether this is the named type `pkg_path.name`.
    pub fn is_named(&self, pkg_path: &str, name: &str) -> bool {
        self.named().is_some_and(|n| n.name.is(pkg_path, name))
    }

    /// Pointee of a pointer type.
    pub fn pointee(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Pointer { elem } => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Builtin { kind } => write!(f, "{}", kind),
            TypeKind::Named(named) => {
                write!(f, "{}", named.name)?;
                if !named.type_args.is_empty() {
                    f.write_str("[")?;
                    for (i, arg) in named.type_args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str("]")?;
                }
                Ok(())
            }
            TypeKind::Pointer { elem } => write!(f, "*{}", elem),
            TypeKind::List { elem } => write!(f, "[]{}", elem),
            TypeKind::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeKind::Struct { .. } => f.write_str("struct{...}"),
            TypeKind::TypeParamRef { name, .. } => f.write_str(name),
            TypeKind::Interface => f.write_str("interface{...}"),
            TypeKind::Func => f.write_str("func(...)"),
            TypeKind::Chan => f.write_str("chan"),
            TypeKind::Invalid => f.write_str("<invalid>"),
        }
    }
}

/// @acp:summary "A resolved type declaration"
#[derive(Debug, Clone, Serialize)]
pub struct TypeDecl {
    pub id: DeclId,
    pub name: QualifiedName,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    /// Underlying type
    pub ty: Type,
    pub pos: Position,
}

impl TypeDecl {
    pub fn struct_fields(&self) -> Option<&[StructField]> {
        match &self.ty.kind {
            TypeKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ty: Type,
    pub pos: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receiver {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub pointer: bool,
    /// The receiver's base type, without the pointer
    pub ty: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl: Option<DeclId>,
}

/// @acp:summary "A resolved function signature"
#[derive(Debug, Clone, Serialize)]
pub struct FuncDecl {
    pub name: QualifiedName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recv: Option<Receiver>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub pos: Position,
    #[serde(skip)]
    pub params_pos: Position,
}

#[derive(Default)]
struct State {
    decls: Vec<TypeDecl>,
    by_name: HashMap<QualifiedName, DeclId>,
    funcs: HashMap<Position, Arc<FuncDecl>>,
}

struct Scope<'a> {
    pkg: &'a Package,
    file: &'a File,
    type_params: &'a [String],
}

/// @acp:summary "Memoizing resolver from syntax types to the type model"
/// @acp:ai-careful "Shared by all package workers; state is behind one mutex"
pub struct SchemaResolver {
    loader: Arc<dyn PackageLoader>,
    errs: Arc<ErrorList>,
    state: Mutex<State>,
}

impl SchemaResolver {
    pub fn new(loader: Arc<dyn PackageLoader>, errs: Arc<ErrorList>) -> Self {
        Self {
            loader,
            errs,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolve a type expression written in `file`, with `type_params` in scope.
    pub fn resolve_type(
        &self,
        pkg: &Package,
        file: &File,
        expr: &TypeExpr,
        type_params: &[String],
    ) -> Type {
        let mut state = self.lock();
        let scope = Scope {
            pkg,
            file,
            type_params,
        };
        self.resolve(&mut state, &scope, expr)
    }

    /// @acp:summary "Resolve a function declaration's signature, memoized per declaration"
    pub fn parse_func_decl(&self, pkg: &Package, file: &File, fd: &ast::FuncDecl) -> Arc<FuncDecl> {
        let mut state = self.lock();
        if let Some(found) = state.funcs.get(&fd.pos) {
            return Arc::clone(found);
        }

        let type_params: Vec<String> = fd
            .type_params
            .iter()
            .flat_map(|f| f.names.iter().map(|n| n.name.clone()))
            .collect();

        let recv = fd.recv.as_ref().map(|field| {
            // Receiver type parameters are named in the receiver itself: (s *Svc[T]).
            let (base, pointer) = match &field.ty.kind {
                TypeExprKind::Pointer(inner) => (inner.as_ref(), true),
                _ => (&field.ty, false),
            };
            let recv_params: Vec<String> = match &base.kind {
                TypeExprKind::Generic { args, .. } => args.iter().map(|a| a.to_string()).collect(),
                _ => Vec::new(),
            };
            let scope = Scope {
                pkg,
                file,
                type_params: &recv_params,
            };
            let ty = self.resolve(&mut state, &scope, base);
            let decl = ty.named().and_then(|n| n.decl);
            Receiver {
                name: field.names.first().map(|n| n.name.clone()),
                pointer,
                ty,
                decl,
            }
        });

        let scope = Scope {
            pkg,
            file,
            type_params: &type_params,
        };
        let params = self.params(&mut state, &scope, &fd.params);
        let results = self.params(&mut state, &scope, &fd.results);

        let decl = Arc::new(FuncDecl {
            name: QualifiedName::new(pkg.import_path.clone(), fd.name.name.clone()),
            recv,
            type_params,
            params,
            results,
            pos: fd.name.pos.clone(),
            params_pos: fd.params_pos.clone(),
        });
        state.funcs.insert(fd.pos.clone(), Arc::clone(&decl));
        decl
    }

    /// @acp:summary "Resolve the named type declaration pkg_path.name"
    pub fn parse_type_decl(&self, pkg_path: &str, name: &str) -> Option<TypeDecl> {
        let mut state = self.lock();
        let id = self.resolve_decl(&mut state, pkg_path, name)?;
        state.decls.get(id.0 as usize).cloned()
    }

    pub fn decl(&self, id: DeclId) -> Option<TypeDecl> {
        self.lock().decls.get(id.0 as usize).cloned()
    }

    /// Every declaration resolved so far, in allocation order.
    pub fn decls(&self) -> Vec<TypeDecl> {
        self.lock().decls.clone()
    }

    /// @acp:summary "Resolve a type to a struct declaration, through at most one pointer"
    ///
    /// With `require_pointer` the type must be exactly one pointer to the struct.
    pub fn resolve_named_struct(&self, ty: &Type, require_pointer: bool) -> Option<TypeDecl> {
        let named = match (&ty.kind, require_pointer) {
            (TypeKind::Pointer { elem }, _) => elem.named()?,
            (TypeKind::Named(named), false) => named,
            _ => return None,
        };
        let decl = self.decl(named.decl?)?;
        decl.struct_fields().is_some().then_some(decl)
    }

    fn params(&self, state: &mut State, scope: &Scope<'_>, fields: &[ast::Field]) -> Vec<Param> {
        let mut out = Vec::new();
        for field in fields {
            let ty = self.resolve(state, scope, &field.ty);
            if field.names.is_empty() {
                out.push(Param {
                    name: None,
                    ty,
                    pos: field.pos.clone(),
                });
                continue;
            }
            for name in &field.names {
                out.push(Param {
                    name: Some(name.name.clone()),
                    ty: ty.clone(),
                    pos: name.pos.clone(),
                });
            }
        }
        out
    }

    fn resolve_decl(&self, state: &mut State, pkg_path: &str, name: &str) -> Option<DeclId> {
        let qn = QualifiedName::new(pkg_path, name);
        if let Some(id) = state.by_name.get(&qn) {
            return Some(*id);
        }

        let pkg = self.loader.package(pkg_path)?;
        let (file, spec) = pkg.find_type(name)?;
        let type_params: Vec<String> = spec
            .type_params
            .iter()
            .flat_map(|f| f.names.iter().map(|n| n.name.clone()))
            .collect();

        let id = DeclId(state.decls.len() as u32);
        state.decls.push(TypeDecl {
            id,
            name: qn.clone(),
            type_params: type_params.clone(),
            ty: Type::new(TypeKind::Invalid, spec.pos.clone()),
            pos: spec.name.pos.clone(),
        });
        state.by_name.insert(qn, id);

        let scope = Scope {
            pkg: &pkg,
            file,
            type_params: &type_params,
        };
        let ty = self.resolve(state, &scope, &spec.ty);
        state.decls[id.0 as usize].ty = ty;
        Some(id)
    }

    fn named(
        &self,
        state: &mut State,
        pkg_path: &str,
        name: &str,
        type_args: Vec<Type>,
        pos: &Position,
    ) -> Type {
        let decl = self.resolve_decl(state, pkg_path, name);
        if decl.is_none() && self.loader.package(pkg_path).is_some() {
            self.errs
                .add(pos, format!("undefined type: {}.{}", pkg_path, name));
            return Type::new(TypeKind::Invalid, pos.clone());
        }
        Type::new(
            TypeKind::Named(NamedType {
                name: QualifiedName::new(pkg_path, name),
                decl,
                type_args,
            }),
            pos.clone(),
        )
    }

    fn resolve(&self, state: &mut State, scope: &Scope<'_>, expr: &TypeExpr) -> Type {
        let pos = &expr.pos;
        let kind = match &expr.kind {
            TypeExprKind::Ident(name) => {
                if let Some(index) = scope.type_params.iter().position(|p| p == name) {
                    TypeKind::TypeParamRef {
                        name: name.clone(),
                        index,
                    }
                } else if let Some(kind) = BuiltinKind::from_ident(name) {
                    TypeKind::Builtin { kind }
                } else if self
                    .resolve_decl(state, &scope.pkg.import_path, name)
                    .is_some()
                {
                    return self.named(state, &scope.pkg.import_path, name, Vec::new(), pos);
                } else {
                    self.errs.add(pos, format!("undefined type: {}", name));
                    TypeKind::Invalid
                }
            }
            TypeExprKind::Qualified { pkg, name } => {
                let Some(path) = scope.file.resolve_import(pkg) else {
                    self.errs.add(pos, format!("unknown package {}", pkg));
                    return Type::new(TypeKind::Invalid, pos.clone());
                };
                if let Some(kind) = BuiltinKind::from_qualified(path, name) {
                    TypeKind::Builtin { kind }
                } else {
                    let path = path.to_string();
                    return self.named(state, &path, name, Vec::new(), pos);
                }
            }
            TypeExprKind::Pointer(inner) => TypeKind::Pointer {
                elem: Box::new(self.resolve(state, scope, inner)),
            },
            TypeExprKind::Slice(inner) => {
                let elem = self.resolve(state, scope, inner);
                if elem.is_builtin(BuiltinKind::Uint8) {
                    TypeKind::Builtin {
                        kind: BuiltinKind::Bytes,
                    }
                } else {
                    TypeKind::List {
                        elem: Box::new(elem),
                    }
                }
            }
            TypeExprKind::Array { elem, .. } | TypeExprKind::Ellipsis(elem) => TypeKind::List {
                elem: Box::new(self.resolve(state, scope, elem)),
            },
            TypeExprKind::Map { key, value } => TypeKind::Map {
                key: Box::new(self.resolve(state, scope, key)),
                value: Box::new(self.resolve(state, scope, value)),
            },
            TypeExprKind::Struct(fields) => {
                let mut out = Vec::new();
                for field in fields {
                    let ty = self.resolve(state, scope, &field.ty);
                    if field.names.is_empty() {
                        out.push(StructField {
                            name: embedded_name(&field.ty),
                            ty: ty.clone(),
                            tag: field.tag.clone(),
                        });
                    }
                    for name in &field.names {
                        out.push(StructField {
                            name: name.clone(),
                            ty: ty.clone(),
                            tag: field.tag.clone(),
                        });
                    }
                }
                TypeKind::Struct { fields: out }
            }
            TypeExprKind::Generic { base, args } => {
                let args: Vec<Type> = args.iter().map(|a| self.resolve(state, scope, a)).collect();
                let (pkg_path, name) = match &base.kind {
                    TypeExprKind::Ident(name) => (scope.pkg.import_path.clone(), name.clone()),
                    TypeExprKind::Qualified { pkg, name } => match scope.file.resolve_import(pkg) {
                        Some(path) => (path.to_string(), name.clone()),
                        None => {
                            self.errs.add(pos, format!("unknown package {}", pkg));
                            return Type::new(TypeKind::Invalid, pos.clone());
                        }
                    },
                    _ => return Type::new(TypeKind::Invalid, pos.clone()),
                };
                return self.named(state, &pkg_path, &name, args, pos);
            }
            TypeExprKind::Interface { empty: true } => TypeKind::Builtin {
                kind: BuiltinKind::Any,
            },
            TypeExprKind::Interface { empty: false } => TypeKind::Interface,
            TypeExprKind::Func => TypeKind::Func,
            TypeExprKind::Chan(_) => TypeKind::Chan,
            TypeExprKind::Invalid(_) => TypeKind::Invalid,
        };
        Type::new(kind, pos.clone())
    }
}

/// Go promotes an embedded field under its type's unqualified name.
fn embedded_name(ty: &TypeExpr) -> String {
    match &ty.kind {
        TypeExprKind::Ident(name) | TypeExprKind::Qualified { name, .. } => name.clone(),
        TypeExprKind::Pointer(inner) => embedded_name(inner),
        TypeExprKind::Generic { base, .. } => embedded_name(base),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;
    use crate::loader::Workspace;

    fn resolver(src: &str) -> (SchemaResolver, Arc<Package>, Arc<ErrorList>) {
        let ws = Workspace::from_sources("app", [("svc/svc.go", src)]).unwrap();
        let loader: Arc<dyn PackageLoader> = Arc::new(ws);
        let pkg = loader.package("app/svc").unwrap();
        let errs = Arc::new(ErrorList::new());
        (SchemaResolver::new(loader, Arc::clone(&errs)), pkg, errs)
    }

    fn func<'a>(pkg: &'a Package, name: &str) -> (&'a Arc<File>, &'a ast::FuncDecl) {
        pkg.files
            .iter()
            .find_map(|f| {
                f.decls.iter().find_map(|d| match d {
                    Decl::Func(fd) if fd.name.name == name => Some((f, fd)),
                    _ => None,
                })
            })
            .unwrap()
    }

    #[test]
    fn test_recursive_type_terminates() {
        let (res, _pkg, errs) = resolver(
            "package svc\n\ntype Node struct {\n    Value    int\n    Children []*Node\n}\n",
        );
        let decl = res.parse_type_decl("app/svc", "Node").unwrap();
        let fields = decl.struct_fields().unwrap();
        assert_eq!(fields.len(), 2);
        let TypeKind::List { elem } = &fields[1].ty.kind else {
            panic!("expected list");
        };
        let inner = elem.pointee().and_then(|t| t.named()).unwrap();
        assert_eq!(inner.decl, Some(decl.id));
        assert!(errs.is_empty());
    }

    #[test]
    fn test_embedded_fields_take_the_type_name() {
        let (res, _pkg, _) = resolver(
            "package svc\n\nimport \"time\"\n\ntype Base struct{ ID string }\n\ntype Event struct {\n    *Base\n    time.Time\n    Name string\n}\n",
        );
        let decl = res.parse_type_decl("app/svc", "Event").unwrap();
        let names: Vec<&str> = decl
            .struct_fields()
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Base", "Time", "Name"]);
    }

    #[test]
    fn test_func_decl_is_memoized() {
        let (res, pkg, _) = resolver(
            "package svc\n\nimport \"context\"\n\nfunc Get(ctx context.Context, id int) ([]byte, error) { return nil, nil }\n",
        );
        let (file, fd) = func(&pkg, "Get");
        let a = res.parse_func_decl(&pkg, file, fd);
        let b = res.parse_func_decl(&pkg, file, fd);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.params[0].ty.is_named("context", "Context"));
        assert!(a.params[1].ty.is_builtin(BuiltinKind::Int));
        assert!(a.results[0].ty.is_builtin(BuiltinKind::Bytes));
        assert!(a.results[1].ty.is_builtin(BuiltinKind::Error));
    }

    #[test]
    fn test_well_known_qualified_builtins() {
        let (res, pkg, _) = resolver(
            "package svc\n\nimport (\n    \"time\"\n    \"encore.dev/beta/auth\"\n)\n\nfunc F(t time.Time) (auth.UID, error) { return \"\", nil }\n",
        );
        let (file, fd) = func(&pkg, "F");
        let decl = res.parse_func_decl(&pkg, file, fd);
        assert!(decl.params[0].ty.is_builtin(BuiltinKind::Time));
        assert!(decl.results[0].ty.is_builtin(BuiltinKind::UserId));
    }

    #[test]
    fn test_generic_type_params() {
        let (res, _pkg, _) = resolver(
            "package svc\n\ntype Page[T any] struct {\n    Items []T\n    Next  string\n}\n",
        );
        let decl = res.parse_type_decl("app/svc", "Page").unwrap();
        assert_eq!(decl.type_params, vec!["T".to_string()]);
        let fields = decl.struct_fields().unwrap();
        let TypeKind::List { elem } = &fields[0].ty.kind else {
            panic!("expected list");
        };
        assert!(matches!(elem.kind, TypeKind::TypeParamRef { index: 0, .. }));
    }

    #[test]
    fn test_resolve_named_struct_pointer_rules() {
        let (res, pkg, _) = resolver(
            "package svc\n\ntype Params struct{ A string }\n\ntype ID int\n\nfunc F(p *Params, q Params, id ID) {}\n",
        );
        let (file, fd) = func(&pkg, "F");
        let decl = res.parse_func_decl(&pkg, file, fd);
        assert!(res.resolve_named_struct(&decl.params[0].ty, true).is_some());
        assert!(res.resolve_named_struct(&decl.params[1].ty, true).is_none());
        assert!(res.resolve_named_struct(&decl.params[1].ty, false).is_some());
        assert!(res.resolve_named_struct(&decl.params[2].ty, false).is_none());
    }

    #[test]
    fn test_undefined_type_reported() {
        let (res, pkg, errs) = resolver("package svc\n\nfunc F(x Missing) {}\n");
        let (file, fd) = func(&pkg, "F");
        let decl = res.parse_func_decl(&pkg, file, fd);
        assert!(matches!(decl.params[0].ty.kind, TypeKind::Invalid));
        assert!(errs.snapshot()[0].message.contains("undefined type: Missing"));
    }
}
