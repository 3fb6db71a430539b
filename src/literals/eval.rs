//! @acp:module "Constant Evaluation"
//! @acp:summary "Compile-time evaluation of Go constant expressions"
//! @acp:domain parser
//! @acp:layer core

use std::fmt;

use serde::Serialize;

use crate::ast::{BasicLit, Expr, ExprKind, File, GenKind, Package};
use crate::loader::syntax::unescape;
use crate::loader::PackageLoader;

/// Nested const references followed before giving up.
const MAX_DEPTH: usize = 32;

/// A typed compile-time constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl ConstValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstValue::Int(_) => "int",
            ConstValue::Float(_) => "float",
            ConstValue::String(_) => "string",
            ConstValue::Bool(_) => "bool",
        }
    }

    /// Whether this is Go's zero value for its type.
    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v == 0,
            ConstValue::Float(v) => *v == 0.0,
            ConstValue::String(v) => v.is_empty(),
            ConstValue::Bool(v) => !v,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::String(v) => write!(f, "{:?}", v),
            ConstValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Constants exported by framework packages.
fn framework_const(pkg_path: &str, name: &str) -> Option<ConstValue> {
    let int = |v: i64| Some(ConstValue::Int(v));
    let string = |v: &str| Some(ConstValue::String(v.to_string()));
    match (pkg_path, name) {
        ("encore.dev/cron", "Minute") => int(60),
        ("encore.dev/cron", "Hour") => int(60 * 60),
        ("encore.dev/pubsub", "AtLeastOnce") => int(1),
        ("encore.dev/pubsub", "ExactlyOnce") => int(2),
        ("encore.dev/storage/cache", "NoEviction") => string("noeviction"),
        ("encore.dev/storage/cache", "AllKeysLRU") => string("allkeys-lru"),
        ("encore.dev/storage/cache", "AllKeysLFU") => string("allkeys-lfu"),
        ("encore.dev/storage/cache", "AllKeysRandom") => string("allkeys-random"),
        ("encore.dev/storage/cache", "VolatileLRU") => string("volatile-lru"),
        ("encore.dev/storage/cache", "VolatileLFU") => string("volatile-lfu"),
        ("encore.dev/storage/cache", "VolatileTTL") => string("volatile-ttl"),
        ("encore.dev/storage/cache", "VolatileRandom") => string("volatile-random"),
        _ => None,
    }
}

/// Scope in which identifiers of a constant expression are resolved.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub pkg: &'a Package,
    pub file: &'a File,
    pub loader: Option<&'a dyn PackageLoader>,
}

impl<'a> EvalContext<'a> {
    pub fn new(pkg: &'a Package, file: &'a File) -> Self {
        Self {
            pkg,
            file,
            loader: None,
        }
    }

    pub fn with_loader(mut self, loader: &'a dyn PackageLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// @acp:summary "Evaluate expr as a constant, or None if it is not one"
    pub fn eval(&self, expr: &Expr) -> Option<ConstValue> {
        eval_in(self.pkg, self.file, self.loader, expr, 0)
    }
}

fn eval_in(
    pkg: &Package,
    file: &File,
    loader: Option<&dyn PackageLoader>,
    expr: &Expr,
    depth: usize,
) -> Option<ConstValue> {
    if depth > MAX_DEPTH {
        return None;
    }
    match &expr.kind {
        ExprKind::Lit(lit) => eval_lit(lit),
        ExprKind::Paren(inner) => eval_in(pkg, file, loader, inner, depth + 1),
        ExprKind::Ident(name) => match name.as_str() {
            "true" => Some(ConstValue::Bool(true)),
            "false" => Some(ConstValue::Bool(false)),
            _ => package_const(pkg, loader, name, depth),
        },
        ExprKind::Selector { operand, field } => {
            let local = operand.ident()?;
            let path = file.resolve_import(local)?;
            if let Some(v) = framework_const(path, &field.name) {
                return Some(v);
            }
            let other = loader?.package(path)?;
            package_const(&other, loader, &field.name, depth)
        }
        ExprKind::Unary { op, operand } => {
            let v = eval_in(pkg, file, loader, operand, depth + 1)?;
            match (op.as_str(), v) {
                ("+", v @ (ConstValue::Int(_) | ConstValue::Float(_))) => Some(v),
                ("-", ConstValue::Int(i)) => i.checked_neg().map(ConstValue::Int),
                ("-", ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
                ("!", ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
                ("^", ConstValue::Int(i)) => Some(ConstValue::Int(!i)),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = eval_in(pkg, file, loader, lhs, depth + 1)?;
            let r = eval_in(pkg, file, loader, rhs, depth + 1)?;
            binary(op, l, r)
        }
        _ => None,
    }
}

fn package_const(
    pkg: &Package,
    loader: Option<&dyn PackageLoader>,
    name: &str,
    depth: usize,
) -> Option<ConstValue> {
    let found = pkg.find_value(name)?;
    if found.kind != GenKind::Const {
        return None;
    }
    let value = found.value()?;
    eval_in(pkg, found.file, loader, value, depth + 1)
}

fn binary(op: &str, l: ConstValue, r: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    match (l, r) {
        (Int(a), Int(b)) => match op {
            "+" => a.checked_add(b).map(Int),
            "-" => a.checked_sub(b).map(Int),
            "*" => a.checked_mul(b).map(Int),
            "/" => a.checked_div(b).map(Int),
            "%" => a.checked_rem(b).map(Int),
            "<<" => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)).map(Int),
            ">>" => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)).map(Int),
            "&" => Some(Int(a & b)),
            "|" => Some(Int(a | b)),
            "==" => Some(Bool(a == b)),
            "!=" => Some(Bool(a != b)),
            "<" => Some(Bool(a < b)),
            "<=" => Some(Bool(a <= b)),
            ">" => Some(Bool(a > b)),
            ">=" => Some(Bool(a >= b)),
            _ => None,
        },
        (Int(a), Float(b)) => binary(op, Float(a as f64), Float(b)),
        (Float(a), Int(b)) => binary(op, Float(a), Float(b as f64)),
        (Float(a), Float(b)) => match op {
            "+" => Some(Float(a + b)),
            "-" => Some(Float(a - b)),
            "*" => Some(Float(a * b)),
            "/" if b != 0.0 => Some(Float(a / b)),
            "<" => Some(Bool(a < b)),
            ">" => Some(Bool(a > b)),
            _ => None,
        },
        (String(a), String(b)) => match op {
            "+" => Some(String(a + &b)),
            "==" => Some(Bool(a == b)),
            "!=" => Some(Bool(a != b)),
            _ => None,
        },
        (Bool(a), Bool(b)) => match op {
            "&&" => Some(Bool(a && b)),
            "||" => Some(Bool(a || b)),
            "==" => Some(Bool(a == b)),
            "!=" => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn eval_lit(lit: &BasicLit) -> Option<ConstValue> {
    match lit {
        BasicLit::Int(text) => parse_int(text).map(ConstValue::Int),
        BasicLit::Float(text) => text.replace('_', "").parse().ok().map(ConstValue::Float),
        BasicLit::String(s) => Some(ConstValue::String(s.clone())),
        BasicLit::Rune(text) => {
            let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
            let decoded = unescape(inner);
            let mut chars = decoded.chars();
            let c = chars.next()?;
            chars.next().is_none().then_some(ConstValue::Int(c as i64))
        }
        BasicLit::Imag(_) => None,
    }
}

/// Parse a Go integer literal, including base prefixes and digit separators.
pub fn parse_int(text: &str) -> Option<i64> {
    let clean = text.replace('_', "");
    let lower = clean.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    i64::from_str_radix(digits, radix).ok()
}
