//! Typed intermediate representation
//!
//! The analyzer lowers the AST into this form: every node carries the type
//! it evaluates to, names are fully resolved, and the surface sugar
//! (pattern matches, closures) is already expanded into explicit control
//! flow and synthetic classes. Back-ends consume this tree directly.

use crate::ast::{BinOp, UnOp};
use crate::types::{TypeId, TypePool};

/// A typed expression
#[derive(Debug, Clone)]
pub struct TExpr {
    pub ty: TypeId,
    pub kind: TExprKind,
}

impl TExpr {
    pub fn new(ty: TypeId, kind: TExprKind) -> Self {
        Self { ty, kind }
    }
}

/// Typed expression kinds
#[derive(Debug, Clone)]
pub enum TExprKind {
    Unit,
    Null,
    Int(i64),
    Long(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    /// The receiver of the enclosing method
    This,
    /// Reference to a singleton object
    Object(TypeId),
    /// Read of a local binding or parameter
    Local(String),
    /// Local declaration; `value` is absent for lowering-introduced slots
    Declare {
        name: String,
        mutable: bool,
        value: Option<Box<TExpr>>,
    },
    AssignLocal {
        name: String,
        value: Box<TExpr>,
    },
    GetField {
        target: Box<TExpr>,
        field: String,
    },
    SetField {
        target: Box<TExpr>,
        field: String,
        value: Box<TExpr>,
    },
    /// Resolved method call; `target` is absent for static calls
    Call {
        target: Option<Box<TExpr>>,
        owner: TypeId,
        method: String,
        args: Vec<TExpr>,
    },
    New {
        class: TypeId,
        args: Vec<TExpr>,
    },
    /// Instantiate a synthetic closure class with its captured values
    MakeClosure {
        class: TypeId,
        captures: Vec<TExpr>,
    },
    Binary {
        op: BinOp,
        left: Box<TExpr>,
        right: Box<TExpr>,
    },
    Unary {
        op: UnOp,
        expr: Box<TExpr>,
    },
    IsNull(Box<TExpr>),
    /// Checked downcast producing null on failure
    SafeCast {
        expr: Box<TExpr>,
        target: TypeId,
    },
    Block(Vec<TExpr>),
    /// A block that `Break` exits; produced by match lowering
    Breakable(Vec<TExpr>),
    Break,
    If {
        cond: Box<TExpr>,
        then_branch: Box<TExpr>,
        else_branch: Option<Box<TExpr>>,
    },
    While {
        cond: Box<TExpr>,
        body: Box<TExpr>,
    },
    Throw(Box<TExpr>),
    /// Trap reached when no match case applied
    NonExhaustive,
}

/// A method body after analysis
#[derive(Debug, Clone)]
pub struct TypedMethod {
    pub owner: TypeId,
    pub name: String,
    pub body: TExpr,
}

/// A field initializer after analysis; constructors run these in order
#[derive(Debug, Clone)]
pub struct TypedField {
    pub owner: TypeId,
    pub name: String,
    pub init: TExpr,
}

/// Render a typed expression as an indented tree. The output is stable and
/// is what snapshot tests assert against.
pub fn print_expr(pool: &TypePool, expr: &TExpr) -> String {
    let mut out = String::new();
    write_expr(pool, expr, 0, &mut out);
    out
}

fn write_expr(pool: &TypePool, expr: &TExpr, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let ty = pool.format_type(expr.ty);
    match &expr.kind {
        TExprKind::Unit => push_line(out, &pad, format!("unit: {ty}")),
        TExprKind::Null => push_line(out, &pad, format!("null: {ty}")),
        TExprKind::Int(v) => push_line(out, &pad, format!("int {v}: {ty}")),
        TExprKind::Long(v) => push_line(out, &pad, format!("long {v}: {ty}")),
        TExprKind::Double(v) => push_line(out, &pad, format!("double {v}: {ty}")),
        TExprKind::Bool(v) => push_line(out, &pad, format!("bool {v}: {ty}")),
        TExprKind::Str(v) => push_line(out, &pad, format!("str {v:?}: {ty}")),
        TExprKind::This => push_line(out, &pad, format!("this: {ty}")),
        TExprKind::Object(id) => {
            push_line(out, &pad, format!("object {}: {ty}", pool.data(*id).name))
        }
        TExprKind::Local(name) => push_line(out, &pad, format!("local {name}: {ty}")),
        TExprKind::Declare {
            name,
            mutable,
            value,
        } => {
            let kw = if *mutable { "var" } else { "let" };
            push_line(out, &pad, format!("{kw} {name}: {ty}"));
            if let Some(value) = value {
                write_expr(pool, value, depth + 1, out);
            }
        }
        TExprKind::AssignLocal { name, value } => {
            push_line(out, &pad, format!("assign {name}: {ty}"));
            write_expr(pool, value, depth + 1, out);
        }
        TExprKind::GetField { target, field } => {
            push_line(out, &pad, format!("get {field}: {ty}"));
            write_expr(pool, target, depth + 1, out);
        }
        TExprKind::SetField {
            target,
            field,
            value,
        } => {
            push_line(out, &pad, format!("set {field}: {ty}"));
            write_expr(pool, target, depth + 1, out);
            write_expr(pool, value, depth + 1, out);
        }
        TExprKind::Call {
            target,
            owner,
            method,
            args,
        } => {
            let owner = pool.format_type(*owner);
            push_line(out, &pad, format!("call {owner}.{method}: {ty}"));
            if let Some(target) = target {
                write_expr(pool, target, depth + 1, out);
            }
            for arg in args {
                write_expr(pool, arg, depth + 1, out);
            }
        }
        TExprKind::New { class, args } => {
            push_line(out, &pad, format!("new {}: {ty}", pool.format_type(*class)));
            for arg in args {
                write_expr(pool, arg, depth + 1, out);
            }
        }
        TExprKind::MakeClosure { class, captures } => {
            push_line(
                out,
                &pad,
                format!("closure {}: {ty}", pool.data(*class).name),
            );
            for capture in captures {
                write_expr(pool, capture, depth + 1, out);
            }
        }
        TExprKind::Binary { op, left, right } => {
            push_line(out, &pad, format!("binary {op}: {ty}"));
            write_expr(pool, left, depth + 1, out);
            write_expr(pool, right, depth + 1, out);
        }
        TExprKind::Unary { op, expr } => {
            push_line(out, &pad, format!("unary {op}: {ty}"));
            write_expr(pool, expr, depth + 1, out);
        }
        TExprKind::IsNull(inner) => {
            push_line(out, &pad, format!("is-null: {ty}"));
            write_expr(pool, inner, depth + 1, out);
        }
        TExprKind::SafeCast { expr, target } => {
            push_line(
                out,
                &pad,
                format!("safe-cast to {}: {ty}", pool.format_type(*target)),
            );
            write_expr(pool, expr, depth + 1, out);
        }
        TExprKind::Block(items) => {
            push_line(out, &pad, format!("block: {ty}"));
            for item in items {
                write_expr(pool, item, depth + 1, out);
            }
        }
        TExprKind::Breakable(items) => {
            push_line(out, &pad, format!("breakable: {ty}"));
            for item in items {
                write_expr(pool, item, depth + 1, out);
            }
        }
        TExprKind::Break => push_line(out, &pad, format!("break: {ty}")),
        TExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            push_line(out, &pad, format!("if: {ty}"));
            write_expr(pool, cond, depth + 1, out);
            write_expr(pool, then_branch, depth + 1, out);
            if let Some(else_branch) = else_branch {
                write_expr(pool, else_branch, depth + 1, out);
            }
        }
        TExprKind::While { cond, body } => {
            push_line(out, &pad, format!("while: {ty}"));
            write_expr(pool, cond, depth + 1, out);
            write_expr(pool, body, depth + 1, out);
        }
        TExprKind::Throw(inner) => {
            push_line(out, &pad, format!("throw: {ty}"));
            write_expr(pool, inner, depth + 1, out);
        }
        TExprKind::NonExhaustive => push_line(out, &pad, format!("non-exhaustive: {ty}")),
    }
}

fn push_line(out: &mut String, pad: &str, line: String) {
    out.push_str(pad);
    out.push_str(&line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_print_nested_expr() {
        let mut pool = TypePool::new();
        let int = pool.define("Int", TypeKind::Class);
        let boolean = pool.define("Boolean", TypeKind::Class);

        let expr = TExpr::new(
            int,
            TExprKind::If {
                cond: Box::new(TExpr::new(boolean, TExprKind::Bool(true))),
                then_branch: Box::new(TExpr::new(int, TExprKind::Int(1))),
                else_branch: Some(Box::new(TExpr::new(int, TExprKind::Int(2)))),
            },
        );

        let printed = print_expr(&pool, &expr);
        assert_eq!(
            printed,
            "if: Int\n  bool true: Boolean\n  int 1: Int\n  int 2: Int\n"
        );
    }

    #[test]
    fn test_print_declare_without_value() {
        let mut pool = TypePool::new();
        let int = pool.define("Int", TypeKind::Class);
        let expr = TExpr::new(
            int,
            TExprKind::Declare {
                name: "<out$0>".to_string(),
                mutable: true,
                value: None,
            },
        );
        assert_eq!(print_expr(&pool, &expr), "var <out$0>: Int\n");
    }
}
