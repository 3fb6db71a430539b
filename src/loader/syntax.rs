//! @acp:module "Go Syntax Conversion"
//! @acp:summary "Converts tree-sitter-go parse trees into the owned syntax model"
//! @acp:domain parser
//! @acp:layer service
//!
//! Node kinds and field names follow the tree-sitter-go grammar. Where the
//! grammar has changed shape between releases (statement lists in blocks,
//! literal elements, type elements in type argument lists) both shapes are
//! accepted.

use std::sync::Arc;

use tree_sitter::{Node, Parser as TsParser};

use crate::ast::{
    BasicLit, Block, CallExpr, Comment, CommentGroup, CompositeLit, Decl, Expr, ExprKind, Field,
    FieldType, File, FuncDecl, FuncLit, GenDecl, GenDeclStmt, GenKind, Ident, ImportSpec,
    KeyedElement, Spec, Stmt, StmtKind, TypeExpr, TypeExprKind, TypeSpec, ValueSpec,
};
use crate::diag::Position;
use crate::error::{ParserError, Result};

/// Result of parsing one file: the converted file plus positions of syntax errors.
#[derive(Debug)]
pub struct ParsedFile {
    pub file: File,
    pub syntax_errors: Vec<Position>,
}

/// @acp:summary "Parse Go source into the owned syntax model"
pub fn parse_go(name: &str, source: &str) -> Result<ParsedFile> {
    let mut parser = TsParser::new();
    parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParserError::Syntax(name.to_string()))?;

    let conv = Converter {
        src: source.as_bytes(),
        file: Arc::from(name),
    };
    let root = tree.root_node();
    let mut syntax_errors = Vec::new();
    if root.has_error() {
        conv.collect_errors(root, &mut syntax_errors);
    }
    let file = conv.file(root);
    Ok(ParsedFile {
        file,
        syntax_errors,
    })
}

const EXPR_KINDS: &[&str] = &[
    "identifier",
    "true",
    "false",
    "nil",
    "iota",
    "selector_expression",
    "call_expression",
    "composite_literal",
    "binary_expression",
    "unary_expression",
    "parenthesized_expression",
    "func_literal",
    "index_expression",
    "slice_expression",
    "type_assertion_expression",
    "type_conversion_expression",
    "type_instantiation_expression",
    "interpreted_string_literal",
    "raw_string_literal",
    "int_literal",
    "float_literal",
    "imaginary_literal",
    "rune_literal",
];

fn is_statement(kind: &str) -> bool {
    kind.ends_with("_statement") || kind.ends_with("_declaration") || kind == "block"
}

struct Converter<'s> {
    src: &'s [u8],
    file: Arc<str>,
}

impl<'s> Converter<'s> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.src).unwrap_or_default().to_string()
    }

    fn pos(&self, node: Node) -> Position {
        let p = node.start_position();
        Position {
            file: Arc::clone(&self.file),
            line: p.row as u32 + 1,
            column: p.column as u32 + 1,
        }
    }

    fn ident(&self, node: Node) -> Ident {
        Ident {
            name: self.text(node),
            pos: self.pos(node),
        }
    }

    fn collect_errors(&self, node: Node, out: &mut Vec<Position>) {
        if node.is_error() || node.is_missing() {
            out.push(self.pos(node));
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.has_error() || child.is_missing() {
                self.collect_errors(child, out);
            }
        }
    }

    fn file(&self, root: Node) -> File {
        let mut package_name = Ident {
            name: String::new(),
            pos: self.pos(root),
        };
        let mut imports = Vec::new();
        let mut decls = Vec::new();
        let mut comments: Vec<Node> = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "comment" => {
                    comments.push(child);
                    continue;
                }
                "package_clause" => {
                    if let Some(name) = child.named_child(0) {
                        package_name = self.ident(name);
                    }
                }
                "import_declaration" => self.imports(child, &mut imports),
                "function_declaration" | "method_declaration" => {
                    let doc = self.doc_for(&comments, child);
                    decls.push(Decl::Func(self.func_decl(child, doc)));
                }
                "type_declaration" | "var_declaration" | "const_declaration" => {
                    let doc = self.doc_for(&comments, child);
                    decls.push(Decl::Gen(self.gen_decl(child, doc)));
                }
                _ => {}
            }
            comments.clear();
        }

        File {
            name: Arc::clone(&self.file),
            package_name,
            imports,
            decls,
        }
    }

    /// The run of comments ending on the line directly above `target`.
    fn doc_for(&self, comments: &[Node], target: Node) -> Option<CommentGroup> {
        let mut next_row = target.start_position().row;
        let mut start = comments.len();
        for (i, c) in comments.iter().enumerate().rev() {
            if c.end_position().row + 1 != next_row {
                break;
            }
            next_row = c.start_position().row;
            start = i;
        }
        if start == comments.len() {
            return None;
        }

        let mut lines = Vec::new();
        for c in &comments[start..] {
            let text = self.text(*c);
            let pos = self.pos(*c);
            if text.starts_with("/*") {
                for (offset, line) in text.lines().enumerate() {
                    lines.push(Comment {
                        text: line.to_string(),
                        pos: Position {
                            line: pos.line + offset as u32,
                            ..pos.clone()
                        },
                    });
                }
            } else {
                lines.push(Comment { text, pos });
            }
        }
        Some(CommentGroup { lines })
    }

    fn imports(&self, node: Node, out: &mut Vec<ImportSpec>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "import_spec" => {
                    let Some(path) = child.child_by_field_name("path") else {
                        continue;
                    };
                    out.push(ImportSpec {
                        path: self.string_lit(path),
                        name: child.child_by_field_name("name").map(|n| self.text(n)),
                        pos: self.pos(child),
                    });
                }
                "import_spec_list" => self.imports(child, out),
                _ => {}
            }
        }
    }

    fn func_decl(&self, node: Node, doc: Option<CommentGroup>) -> FuncDecl {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.ident(n))
            .unwrap_or_else(|| Ident {
                name: String::new(),
                pos: self.pos(node),
            });
        let recv = node
            .child_by_field_name("receiver")
            .and_then(|r| self.field_list(r).into_iter().next());
        let type_params = node
            .child_by_field_name("type_parameters")
            .map(|n| self.field_list(n))
            .unwrap_or_default();
        let params_node = node.child_by_field_name("parameters");
        let params = params_node.map(|n| self.field_list(n)).unwrap_or_default();
        let results = node
            .child_by_field_name("result")
            .map(|n| self.results(n))
            .unwrap_or_default();
        let body = node.child_by_field_name("body").map(|b| self.block(b));

        FuncDecl {
            doc,
            recv,
            name,
            type_params,
            params,
            results,
            body,
            pos: self.pos(node),
            params_pos: params_node.map(|n| self.pos(n)).unwrap_or_else(|| self.pos(node)),
        }
    }

    fn results(&self, node: Node) -> Vec<Field> {
        if node.kind() == "parameter_list" {
            return self.field_list(node);
        }
        vec![Field {
            names: Vec::new(),
            ty: self.ty(node),
            tag: None,
            pos: self.pos(node),
        }]
    }

    /// Parameter, receiver and type parameter lists.
    fn field_list(&self, node: Node) -> Vec<Field> {
        let mut fields = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "parameter_declaration" | "type_parameter_declaration" => {
                    fields.push(Field {
                        names: self.names(child),
                        ty: self.field_type(child),
                        tag: None,
                        pos: self.pos(child),
                    });
                }
                "variadic_parameter_declaration" => {
                    let inner = self.field_type(child);
                    fields.push(Field {
                        names: self.names(child),
                        ty: TypeExpr {
                            pos: self.pos(child),
                            kind: TypeExprKind::Ellipsis(Box::new(inner)),
                        },
                        tag: None,
                        pos: self.pos(child),
                    });
                }
                _ => {}
            }
        }
        fields
    }

    fn names(&self, node: Node) -> Vec<Ident> {
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .filter(|n| n.kind() == "identifier")
            .map(|n| self.ident(n))
            .collect()
    }

    fn field_type(&self, node: Node) -> TypeExpr {
        match node.child_by_field_name("type") {
            Some(ty) => self.ty(ty),
            None => TypeExpr {
                kind: TypeExprKind::Invalid(self.text(node)),
                pos: self.pos(node),
            },
        }
    }

    fn gen_decl(&self, node: Node, doc: Option<CommentGroup>) -> GenDecl {
        let kind = match node.kind() {
            "type_declaration" => GenKind::Type,
            "var_declaration" => GenKind::Var,
            _ => GenKind::Const,
        };

        let mut grouped = false;
        let mut specs = Vec::new();
        self.specs(node, &mut grouped, &mut specs);

        GenDecl {
            kind,
            doc,
            grouped,
            specs,
            pos: self.pos(node),
        }
    }

    fn specs(&self, node: Node, grouped: &mut bool, specs: &mut Vec<Spec>) {
        let mut comments: Vec<Node> = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "(" => *grouped = true,
                "comment" => {
                    comments.push(child);
                    continue;
                }
                "type_spec" | "type_alias" => {
                    let doc = self.doc_for(&comments, child);
                    specs.push(Spec::Type(self.type_spec(child, doc)));
                }
                "var_spec" | "const_spec" => {
                    let doc = self.doc_for(&comments, child);
                    specs.push(Spec::Value(self.value_spec(child, doc)));
                }
                "var_spec_list" | "const_spec_list" => self.specs(child, grouped, specs),
                _ => {}
            }
            comments.clear();
        }
    }

    fn type_spec(&self, node: Node, doc: Option<CommentGroup>) -> TypeSpec {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.ident(n))
            .unwrap_or_else(|| Ident {
                name: String::new(),
                pos: self.pos(node),
            });
        TypeSpec {
            doc,
            name,
            type_params: node
                .child_by_field_name("type_parameters")
                .map(|n| self.field_list(n))
                .unwrap_or_default(),
            ty: self.field_type(node),
            is_alias: node.kind() == "type_alias",
            pos: self.pos(node),
        }
    }

    fn value_spec(&self, node: Node, doc: Option<CommentGroup>) -> ValueSpec {
        ValueSpec {
            doc,
            names: self.names(node),
            ty: node.child_by_field_name("type").map(|t| self.ty(t)),
            values: node
                .child_by_field_name("value")
                .map(|v| self.expr_list(v))
                .unwrap_or_default(),
            pos: self.pos(node),
        }
    }

    fn ty(&self, node: Node) -> TypeExpr {
        let pos = self.pos(node);
        let kind = match node.kind() {
            "type_identifier" | "identifier" => TypeExprKind::Ident(self.text(node)),
            "qualified_type" => {
                let pkg = node.child_by_field_name("package").map(|n| self.text(n));
                let name = node.child_by_field_name("name").map(|n| self.text(n));
                match (pkg, name) {
                    (Some(pkg), Some(name)) => TypeExprKind::Qualified { pkg, name },
                    _ => TypeExprKind::Invalid(self.text(node)),
                }
            }
            "pointer_type" => match node.named_child(0) {
                Some(inner) => TypeExprKind::Pointer(Box::new(self.ty(inner))),
                None => TypeExprKind::Invalid(self.text(node)),
            },
            "slice_type" | "implicit_length_array_type" => {
                match node.child_by_field_name("element") {
                    Some(elem) => TypeExprKind::Slice(Box::new(self.ty(elem))),
                    None => TypeExprKind::Invalid(self.text(node)),
                }
            }
            "array_type" => match node.child_by_field_name("element") {
                Some(elem) => TypeExprKind::Array {
                    len: node
                        .child_by_field_name("length")
                        .map(|l| self.text(l))
                        .unwrap_or_default(),
                    elem: Box::new(self.ty(elem)),
                },
                None => TypeExprKind::Invalid(self.text(node)),
            },
            "map_type" => match (
                node.child_by_field_name("key"),
                node.child_by_field_name("value"),
            ) {
                (Some(k), Some(v)) => TypeExprKind::Map {
                    key: Box::new(self.ty(k)),
                    value: Box::new(self.ty(v)),
                },
                _ => TypeExprKind::Invalid(self.text(node)),
            },
            "struct_type" => TypeExprKind::Struct(self.struct_fields(node)),
            "generic_type" => {
                let base = node.child_by_field_name("type").map(|t| self.ty(t));
                let args = node
                    .child_by_field_name("type_arguments")
                    .map(|a| self.type_args(a))
                    .unwrap_or_default();
                match base {
                    Some(base) => TypeExprKind::Generic {
                        base: Box::new(base),
                        args,
                    },
                    None => TypeExprKind::Invalid(self.text(node)),
                }
            }
            "interface_type" => TypeExprKind::Interface {
                empty: node.named_child_count() == 0,
            },
            "function_type" => TypeExprKind::Func,
            "channel_type" => match node.child_by_field_name("value") {
                Some(v) => TypeExprKind::Chan(Box::new(self.ty(v))),
                None => TypeExprKind::Invalid(self.text(node)),
            },
            "parenthesized_type" | "type_elem" | "type_constraint" | "constraint_elem" => {
                match node.named_child(0) {
                    Some(inner) => return self.ty(inner),
                    None => TypeExprKind::Invalid(self.text(node)),
                }
            }
            _ => TypeExprKind::Invalid(self.text(node)),
        };
        TypeExpr { kind, pos }
    }

    fn type_args(&self, node: Node) -> Vec<TypeExpr> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|n| self.ty(n))
            .collect()
    }

    fn struct_fields(&self, node: Node) -> Vec<FieldType> {
        let mut fields = Vec::new();
        let Some(list) = find_named_child(node, "field_declaration_list") else {
            return fields;
        };
        let mut cursor = list.walk();
        for decl in list.named_children(&mut cursor) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let mut name_cursor = decl.walk();
            let names = decl
                .children_by_field_name("name", &mut name_cursor)
                .filter(|n| n.kind() == "field_identifier")
                .map(|n| self.text(n))
                .collect();
            fields.push(FieldType {
                names,
                ty: self.field_type(decl),
                tag: decl
                    .child_by_field_name("tag")
                    .map(|t| self.string_lit(t)),
                pos: self.pos(decl),
            });
        }
        fields
    }

    fn block(&self, node: Node) -> Block {
        let mut stmts = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "statement_list" {
                let mut inner = child.walk();
                for s in child.named_children(&mut inner) {
                    if s.kind() != "comment" {
                        stmts.push(self.stmt(s));
                    }
                }
            } else if child.kind() != "comment" {
                stmts.push(self.stmt(child));
            }
        }
        Block { stmts }
    }

    fn stmt(&self, node: Node) -> Stmt {
        let pos = self.pos(node);
        let kind = match node.kind() {
            "var_declaration" | "const_declaration" => {
                let decl = self.gen_decl(node, None);
                StmtKind::Decl(GenDeclStmt {
                    kind: decl.kind,
                    values: decl
                        .specs
                        .into_iter()
                        .filter_map(|s| match s {
                            Spec::Value(vs) => Some(vs.values),
                            Spec::Type(_) => None,
                        })
                        .flatten()
                        .collect(),
                })
            }
            "expression_statement" => match node.named_child(0) {
                Some(e) => StmtKind::Expr(self.expr(e)),
                None => StmtKind::Compound {
                    exprs: Vec::new(),
                    stmts: Vec::new(),
                },
            },
            "short_var_declaration" | "assignment_statement" => StmtKind::Assign {
                lhs: node
                    .child_by_field_name("left")
                    .map(|n| self.expr_list(n))
                    .unwrap_or_default(),
                rhs: node
                    .child_by_field_name("right")
                    .map(|n| self.expr_list(n))
                    .unwrap_or_default(),
            },
            "return_statement" => {
                let mut exprs = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "expression_list" {
                        exprs.extend(self.expr_list(child));
                    } else if EXPR_KINDS.contains(&child.kind()) {
                        exprs.push(self.expr(child));
                    }
                }
                StmtKind::Return(exprs)
            }
            "block" => StmtKind::Block(self.block(node)),
            _ => {
                let mut exprs = Vec::new();
                let mut stmts = Vec::new();
                self.compound(node, &mut exprs, &mut stmts);
                StmtKind::Compound { exprs, stmts }
            }
        };
        Stmt { kind, pos }
    }

    fn compound(&self, node: Node, exprs: &mut Vec<Expr>, stmts: &mut Vec<Stmt>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let kind = child.kind();
            if kind == "comment" {
                continue;
            } else if EXPR_KINDS.contains(&kind) {
                exprs.push(self.expr(child));
            } else if is_statement(kind) {
                stmts.push(self.stmt(child));
            } else {
                self.compound(child, exprs, stmts);
            }
        }
    }

    fn expr_list(&self, node: Node) -> Vec<Expr> {
        if node.kind() != "expression_list" {
            return vec![self.expr(node)];
        }
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|n| self.expr(n))
            .collect()
    }

    fn expr(&self, node: Node) -> Expr {
        let kind = match node.kind() {
            "identifier" | "true" | "false" | "nil" | "iota" => ExprKind::Ident(self.text(node)),
            "selector_expression" => {
                match (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("field"),
                ) {
                    (Some(operand), Some(field)) => ExprKind::Selector {
                        operand: Box::new(self.expr(operand)),
                        field: self.ident(field),
                    },
                    _ => self.other(node),
                }
            }
            // A qualified type in expression position, e.g. the base of a
            // type instantiation.
            "qualified_type" => {
                match (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) {
                    (Some(pkg), Some(name)) => ExprKind::Selector {
                        operand: Box::new(Expr {
                            kind: ExprKind::Ident(self.text(pkg)),
                            pos: self.pos(pkg),
                            text: self.text(pkg),
                        }),
                        field: self.ident(name),
                    },
                    _ => self.other(node),
                }
            }
            "type_identifier" => ExprKind::Ident(self.text(node)),
            "call_expression" => self.call(node),
            "type_conversion_expression" => self.conversion(node),
            "composite_literal" => ExprKind::Composite(CompositeLit {
                ty: node.child_by_field_name("type").map(|t| self.ty(t)),
                elems: node
                    .child_by_field_name("body")
                    .map(|b| self.literal_elems(b))
                    .unwrap_or_default(),
            }),
            "literal_value" => ExprKind::Composite(CompositeLit {
                ty: None,
                elems: self.literal_elems(node),
            }),
            "literal_element" => match node.named_child(0) {
                Some(inner) => return self.expr(inner),
                None => self.other(node),
            },
            "interpreted_string_literal" | "raw_string_literal" => {
                ExprKind::Lit(BasicLit::String(self.string_lit(node)))
            }
            "int_literal" => ExprKind::Lit(BasicLit::Int(self.text(node))),
            "float_literal" => ExprKind::Lit(BasicLit::Float(self.text(node))),
            "imaginary_literal" => ExprKind::Lit(BasicLit::Imag(self.text(node))),
            "rune_literal" => ExprKind::Lit(BasicLit::Rune(self.text(node))),
            "binary_expression" => {
                match (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("right"),
                ) {
                    (Some(l), Some(op), Some(r)) => ExprKind::Binary {
                        op: self.text(op),
                        lhs: Box::new(self.expr(l)),
                        rhs: Box::new(self.expr(r)),
                    },
                    _ => self.other(node),
                }
            }
            "unary_expression" => {
                match (
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("operand"),
                ) {
                    (Some(op), Some(operand)) => ExprKind::Unary {
                        op: self.text(op),
                        operand: Box::new(self.expr(operand)),
                    },
                    _ => self.other(node),
                }
            }
            "parenthesized_expression" => match first_non_comment(node) {
                Some(inner) => ExprKind::Paren(Box::new(self.expr(inner))),
                None => self.other(node),
            },
            "func_literal" => ExprKind::FuncLit(FuncLit {
                params: node
                    .child_by_field_name("parameters")
                    .map(|p| self.field_list(p).iter().map(|f| f.names.len().max(1)).sum())
                    .unwrap_or(0),
                body: node
                    .child_by_field_name("body")
                    .map(|b| self.block(b))
                    .unwrap_or_default(),
            }),
            "index_expression" => {
                match (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("index"),
                ) {
                    (Some(operand), Some(index)) => ExprKind::Index {
                        operand: Box::new(self.expr(operand)),
                        index: Box::new(self.expr_or_type(index)),
                    },
                    _ => self.other(node),
                }
            }
            "type_instantiation_expression" => {
                let mut cursor = node.walk();
                let mut children = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment");
                match children.next() {
                    Some(base) => ExprKind::Instantiate {
                        operand: Box::new(self.expr(base)),
                        type_args: children.map(|t| self.ty(t)).collect(),
                    },
                    None => self.other(node),
                }
            }
            kind if kind.ends_with("_type") => ExprKind::Type(self.ty(node)),
            _ => self.other(node),
        };
        Expr {
            kind,
            pos: self.pos(node),
            text: self.text(node),
        }
    }

    fn expr_or_type(&self, node: Node) -> Expr {
        if EXPR_KINDS.contains(&node.kind()) {
            self.expr(node)
        } else {
            Expr {
                kind: ExprKind::Type(self.ty(node)),
                pos: self.pos(node),
                text: self.text(node),
            }
        }
    }

    fn other(&self, node: Node) -> ExprKind {
        let mut cursor = node.walk();
        let children = node
            .named_children(&mut cursor)
            .filter(|n| EXPR_KINDS.contains(&n.kind()) || n.kind() == "literal_value")
            .map(|n| self.expr(n))
            .collect();
        ExprKind::Other(children)
    }

    /// `F[T](x)` parses as a conversion to the type `F[T]`; lower it to a call
    /// when the base names a function rather than a type literal.
    fn conversion(&self, node: Node) -> ExprKind {
        let ty = node.child_by_field_name("type");
        let base = ty
            .filter(|t| t.kind() == "generic_type")
            .and_then(|t| t.child_by_field_name("type"))
            .filter(|b| matches!(b.kind(), "type_identifier" | "qualified_type"));
        let (Some(ty), Some(base)) = (ty, base) else {
            return self.other(node);
        };
        let type_args = ty
            .child_by_field_name("type_arguments")
            .map(|a| self.type_args(a))
            .unwrap_or_default();
        let args = node
            .child_by_field_name("operand")
            .map(|op| vec![self.expr_or_type(op)])
            .unwrap_or_default();
        ExprKind::Call(CallExpr {
            fun: Box::new(self.expr(base)),
            type_args,
            args,
        })
    }

    fn call(&self, node: Node) -> ExprKind {
        let Some(fun) = node.child_by_field_name("function") else {
            return self.other(node);
        };
        let type_args = node
            .child_by_field_name("type_arguments")
            .map(|a| self.type_args(a))
            .unwrap_or_default();
        let args = match node.child_by_field_name("arguments") {
            Some(list) => {
                let mut cursor = list.walk();
                list.named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| self.expr_or_type(n))
                    .collect()
            }
            None => Vec::new(),
        };
        ExprKind::Call(CallExpr {
            fun: Box::new(self.expr(fun)),
            type_args,
            args,
        })
    }

    fn literal_elems(&self, node: Node) -> Vec<KeyedElement> {
        let mut elems = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "comment" => {}
                "keyed_element" => {
                    let mut inner = child.walk();
                    let parts: Vec<Node> = child
                        .named_children(&mut inner)
                        .filter(|n| n.kind() != "comment")
                        .collect();
                    if let [key, value] = parts.as_slice() {
                        elems.push(KeyedElement {
                            key: Some(self.element_key(*key)),
                            value: self.expr(*value),
                            pos: self.pos(child),
                        });
                    }
                }
                _ => elems.push(KeyedElement {
                    key: None,
                    value: self.expr(child),
                    pos: self.pos(child),
                }),
            }
        }
        elems
    }

    fn element_key(&self, node: Node) -> Expr {
        let node = if node.kind() == "literal_element" {
            node.named_child(0).unwrap_or(node)
        } else {
            node
        };
        if node.kind() == "field_identifier" {
            return Expr {
                kind: ExprKind::Ident(self.text(node)),
                pos: self.pos(node),
                text: self.text(node),
            };
        }
        self.expr(node)
    }

    fn string_lit(&self, node: Node) -> String {
        let raw = self.text(node);
        if node.kind() == "raw_string_literal" {
            return raw.trim_matches('`').replace('\r', "");
        }
        let inner = raw
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(&raw);
        unescape(inner)
    }
}

fn find_named_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|n| n.kind() == kind);
    found
}

fn first_non_comment(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");
    found
}

/// Decode the escape sequences of a Go interpreted string literal body.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0c}'),
            Some('v') => out.push('\u{0b}'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(k @ ('x' | 'u' | 'U')) => {
                let len = match k {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..len).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push(k);
                        out.push_str(&hex);
                    }
                }
            }
            Some(d @ '0'..='7') => {
                let mut oct = String::from(d);
                for _ in 0..2 {
                    if let Some(&n) = chars.peek() {
                        if ('0'..='7').contains(&n) {
                            oct.push(n);
                            chars.next();
                        }
                    }
                }
                if let Some(ch) = u32::from_str_radix(&oct, 8).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> File {
        parse_go("svc/svc.go", src).unwrap().file
    }

    #[test]
    fn test_package_and_imports() {
        let file = parse(
            r#"package svc

import (
    "context"
    ps "encore.dev/pubsub"
)
"#,
        );
        assert_eq!(file.package_name.name, "svc");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.resolve_import("context"), Some("context"));
        assert_eq!(file.resolve_import("ps"), Some("encore.dev/pubsub"));
        assert_eq!(file.resolve_import("pubsub"), None);
    }

    #[test]
    fn test_func_doc_and_signature() {
        let file = parse(
            r#"package svc

import "context"

// Ping checks liveness.
//encore:api public
func Ping(ctx context.Context, a, b int) (string, error) {
    return "", nil
}
"#,
        );
        let Decl::Func(fd) = &file.decls[0] else {
            panic!("expected func decl");
        };
        assert_eq!(fd.name.name, "Ping");
        let doc = fd.doc.as_ref().expect("doc comment");
        assert_eq!(doc.lines.len(), 2);
        assert_eq!(doc.lines[1].text, "//encore:api public");
        assert_eq!(fd.params.len(), 2);
        assert_eq!(fd.params[1].names.len(), 2);
        assert_eq!(fd.results.len(), 2);
        assert_eq!(fd.results[0].ty.to_string(), "string");
    }

    #[test]
    fn test_detached_comment_is_not_doc() {
        let file = parse(
            r#"package svc

// unrelated

func Foo() {}
"#,
        );
        let Decl::Func(fd) = &file.decls[0] else {
            panic!("expected func decl");
        };
        assert!(fd.doc.is_none());
    }

    #[test]
    fn test_var_with_generic_call_and_composite() {
        let file = parse(
            r#"package svc

import "encore.dev/pubsub"

var Signups = pubsub.NewTopic[*SignupEvent]("signups", pubsub.TopicConfig{
    DeliveryGuarantee: pubsub.AtLeastOnce,
})
"#,
        );
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected gen decl");
        };
        assert_eq!(gen.kind, GenKind::Var);
        let Spec::Value(vs) = &gen.specs[0] else {
            panic!("expected value spec");
        };
        assert_eq!(vs.names[0].name, "Signups");
        let ExprKind::Call(call) = &vs.values[0].kind else {
            panic!("expected call, got {:?}", vs.values[0].kind);
        };
        let (callee, type_args) = call.callee();
        let (pkg, field) = callee.as_selector().expect("selector callee");
        assert_eq!(pkg, "pubsub");
        assert_eq!(field.name, "NewTopic");
        assert_eq!(type_args.len(), 1);
        assert_eq!(type_args[0].to_string(), "*SignupEvent");
        assert_eq!(call.args.len(), 2);
        let ExprKind::Composite(lit) = &call.args[1].kind else {
            panic!("expected composite literal");
        };
        assert_eq!(lit.elems.len(), 1);
        assert_eq!(
            lit.elems[0].key.as_ref().and_then(|k| k.ident()),
            Some("DeliveryGuarantee")
        );
    }

    #[test]
    fn test_single_argument_generic_call() {
        let file = parse(
            r#"package svc

import "encore.dev/config"

var cfg = config.Load[*Settings]("x")
"#,
        );
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected gen decl");
        };
        let Spec::Value(vs) = &gen.specs[0] else {
            panic!("expected value spec");
        };
        let ExprKind::Call(call) = &vs.values[0].kind else {
            panic!("expected call, got {:?}", vs.values[0].kind);
        };
        let (callee, type_args) = call.callee();
        let (pkg, field) = callee.as_selector().expect("selector callee");
        assert_eq!((pkg, field.name.as_str()), ("config", "Load"));
        assert_eq!(type_args[0].to_string(), "*Settings");
        assert_eq!(call.args.len(), 1);
    }

    #[test]
    fn test_const_spec_names_skip_separators() {
        let file = parse("package svc\n\nconst a, b, c = 1, 2, 3\n");
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected gen decl");
        };
        let Spec::Value(vs) = &gen.specs[0] else {
            panic!("expected value spec");
        };
        let names: Vec<&str> = vs.names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(vs.values.len(), 3);
    }

    #[test]
    fn test_struct_type_fields() {
        let file = parse(
            r#"package svc

type Params struct {
    Name  string `json:"name"`
    Count int
}
"#,
        );
        let Decl::Gen(gen) = &file.decls[0] else {
            panic!("expected gen decl");
        };
        let Spec::Type(ts) = &gen.specs[0] else {
            panic!("expected type spec");
        };
        let TypeExprKind::Struct(fields) = &ts.ty.kind else {
            panic!("expected struct type");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].names, vec!["Name".to_string()]);
        assert_eq!(fields[0].tag.as_deref(), Some("json:\"name\""));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\tb\n"), "a\tb\n");
        assert_eq!(unescape(r"\x41é\101"), "AéA");
        assert_eq!(unescape(r#"\"q\""#), "\"q\"");
    }

    #[test]
    fn test_syntax_errors_reported() {
        let parsed = parse_go("bad.go", "package svc\n\nfunc Foo( {\n").unwrap();
        assert!(!parsed.syntax_errors.is_empty());
    }
}
