//! @acp:module "Syntax Walker"
//! @acp:summary "Depth-first traversal that tracks the ancestor chain of each expression"
//! @acp:domain parser
//! @acp:layer model

use super::{
    Block, Decl, Expr, ExprKind, File, FuncDecl, GenDecl, GenKind, Spec, Stmt, StmtKind,
    ValueSpec,
};

/// Syntactic context an expression is nested in, outermost first.
#[derive(Debug, Clone, Copy)]
pub enum Ancestor<'a> {
    File(&'a File),
    /// A `var` declaration, at file scope or inside a function
    VarDecl,
    ConstDecl,
    /// The value expression at `index` of a package-level spec
    ValueSpec { spec: &'a ValueSpec, index: usize },
    FuncDecl(&'a FuncDecl),
    FuncLit,
    Call,
}

/// Callbacks invoked by [`walk_file`].
pub trait Visitor<'a> {
    /// Called for every expression before its children.
    ///
    /// `stack` holds the ancestors of `expr`, not `expr` itself. `callee` is
    /// true when `expr` is (part of) the function position of a call.
    fn visit_expr(&mut self, expr: &'a Expr, stack: &[Ancestor<'a>], callee: bool);
}

pub fn walk_file<'a, V: Visitor<'a>>(file: &'a File, visitor: &mut V) {
    let mut walker = Walker {
        visitor,
        stack: vec![Ancestor::File(file)],
    };
    for decl in &file.decls {
        match decl {
            Decl::Func(fd) => walker.func_decl(fd),
            Decl::Gen(gen) => walker.gen_decl(gen),
        }
    }
}

struct Walker<'a, 'v, V: Visitor<'a>> {
    visitor: &'v mut V,
    stack: Vec<Ancestor<'a>>,
}

impl<'a, V: Visitor<'a>> Walker<'a, '_, V> {
    fn with<F: FnOnce(&mut Self)>(&mut self, anc: Ancestor<'a>, f: F) {
        self.stack.push(anc);
        f(self);
        self.stack.pop();
    }

    fn func_decl(&mut self, fd: &'a FuncDecl) {
        if let Some(body) = &fd.body {
            self.with(Ancestor::FuncDecl(fd), |w| w.block(body));
        }
    }

    fn gen_decl(&mut self, gen: &'a GenDecl) {
        let anc = match gen.kind {
            GenKind::Var => Ancestor::VarDecl,
            GenKind::Const => Ancestor::ConstDecl,
            GenKind::Type => return,
        };
        self.with(anc, |w| {
            for spec in &gen.specs {
                let Spec::Value(vs) = spec else { continue };
                for (index, value) in vs.values.iter().enumerate() {
                    w.with(Ancestor::ValueSpec { spec: vs, index }, |w| {
                        w.expr(value, false)
                    });
                }
            }
        });
    }

    fn block(&mut self, block: &'a Block) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Decl(decl) => {
                let anc = match decl.kind {
                    GenKind::Var => Ancestor::VarDecl,
                    _ => Ancestor::ConstDecl,
                };
                self.with(anc, |w| {
                    for value in &decl.values {
                        w.expr(value, false);
                    }
                });
            }
            StmtKind::Expr(expr) => self.expr(expr, false),
            StmtKind::Assign { lhs, rhs } => {
                for e in lhs.iter().chain(rhs) {
                    self.expr(e, false);
                }
            }
            StmtKind::Return(exprs) => {
                for e in exprs {
                    self.expr(e, false);
                }
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Compound { exprs, stmts } => {
                for e in exprs {
                    self.expr(e, false);
                }
                for s in stmts {
                    self.stmt(s);
                }
            }
        }
    }

    fn expr(&mut self, expr: &'a Expr, callee: bool) {
        self.visitor.visit_expr(expr, &self.stack, callee);

        match &expr.kind {
            ExprKind::Ident(_) | ExprKind::Lit(_) | ExprKind::Type(_) => {}
            ExprKind::Selector { operand, .. } => self.expr(operand, false),
            ExprKind::Call(call) => self.with(Ancestor::Call, |w| {
                w.expr(&call.fun, true);
                for arg in &call.args {
                    w.expr(arg, false);
                }
            }),
            ExprKind::Composite(lit) => {
                for elem in &lit.elems {
                    if let Some(key) = &elem.key {
                        self.expr(key, false);
                    }
                    self.expr(&elem.value, false);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs, false);
                self.expr(rhs, false);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand, false),
            ExprKind::Paren(inner) => self.expr(inner, callee),
            ExprKind::FuncLit(lit) => self.with(Ancestor::FuncLit, |w| w.block(&lit.body)),
            ExprKind::Index { operand, index } => {
                self.expr(operand, callee);
                self.expr(index, false);
            }
            ExprKind::Instantiate { operand, .. } => self.expr(operand, callee),
            ExprKind::Other(children) => {
                for child in children {
                    self.expr(child, false);
                }
            }
        }
    }
}
