//! Expression and pattern AST nodes

use super::{Spanned, TypeRef};
use serde::{Deserialize, Serialize};

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal
    IntLit(i64),
    /// Long literal (`42L`)
    LongLit(i64),
    /// Double literal
    DoubleLit(f64),
    /// Boolean literal
    BoolLit(bool),
    /// String literal
    StringLit(String),
    /// Unit value `()`
    UnitLit,
    /// `null`
    NullLit,

    /// Identifier reference: local, field, or object name
    Ident(String),
    /// `this`
    This,

    /// Member selection: `expr.name`
    Select {
        target: Box<Spanned<Expr>>,
        name: Spanned<String>,
    },

    /// Binary operation
    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },

    /// Unary operation
    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },

    /// Method or function call, with optional explicit type arguments:
    /// `target.name[T1, T2](args)`
    Call {
        target: Option<Box<Spanned<Expr>>>,
        name: Spanned<String>,
        type_args: Vec<TypeRef>,
        args: Vec<Spanned<Expr>>,
    },

    /// Constructor invocation: `new List[Int](x)`
    New {
        ty: TypeRef,
        args: Vec<Spanned<Expr>>,
    },

    /// Block: `{ stmt1; stmt2; result }`
    Block(Vec<Spanned<Expr>>),

    /// Local binding: `val x = e` / `var x: Int = e`
    Let {
        name: Spanned<String>,
        mutable: bool,
        ty: Option<TypeRef>,
        value: Box<Spanned<Expr>>,
    },

    /// Assignment to a local, field, or `target.field`
    Assign {
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },

    /// Conditional; without `else` the result type is `Unit`
    If {
        cond: Box<Spanned<Expr>>,
        then_branch: Box<Spanned<Expr>>,
        else_branch: Option<Box<Spanned<Expr>>>,
    },

    /// While loop
    While {
        cond: Box<Spanned<Expr>>,
        body: Box<Spanned<Expr>>,
    },

    /// Throw expression; has type `Nothing`
    Throw {
        expr: Box<Spanned<Expr>>,
    },

    /// Closure literal: `(a: Int, b: Int) => a + b`
    Closure {
        params: Vec<ClosureParam>,
        body: Box<Spanned<Expr>>,
    },

    /// Match expression
    Match {
        scrutinee: Box<Spanned<Expr>>,
        cases: Vec<MatchCase>,
    },
}

/// Closure parameter; parameter types are always annotated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureParam {
    pub name: Spanned<String>,
    pub ty: TypeRef,
}

/// A single case in a match expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCase {
    pub pattern: Spanned<Pattern>,
    pub body: Spanned<Expr>,
}

/// Pattern for match expressions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    /// Literal pattern: equality test
    Literal(LiteralPattern),
    /// Variable binding; `_` is the wildcard
    Var(String),
    /// Runtime type test with binding: `x: Shape`
    Typed {
        name: String,
        ty: TypeRef,
    },
    /// Extractor pattern: `Foo(a, Bar(0), _)` via the companion's `unapply`
    Constructor {
        name: Spanned<String>,
        args: Vec<Spanned<Pattern>>,
    },
}

impl Pattern {
    /// Whether this pattern matches any value without testing it
    pub fn is_irrefutable(&self) -> bool {
        matches!(self, Pattern::Var(_))
    }
}

/// Literal patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralPattern {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod)
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Numeric negation
    Neg,
    /// Logical not
    Not,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
        }
    }
}
