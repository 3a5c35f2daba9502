//! Declaration AST nodes
//!
//! The parser hands the semantic core a list of top-level declarations:
//! classes, objects (singletons / companions), traits, and free functions.

use super::{Expr, Span, Spanned};
use serde::{Deserialize, Serialize};

/// Top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Class(ClassDecl),
    Object(ClassDecl),
    Trait(ClassDecl),
    /// Free function, visible from the global scope
    Function(MethodDecl),
}

/// Class, object or trait declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: Spanned<String>,
    pub mods: Modifiers,
    pub type_params: Vec<TypeParamDecl>,
    /// Primary-constructor parameters; each becomes a field plus a
    /// constructor parameter
    pub params: Vec<ClassParamDecl>,
    /// Base class reference with constructor arguments
    pub base: Option<BaseRef>,
    /// Implemented traits
    pub interfaces: Vec<TypeRef>,
    pub members: Vec<Member>,
    pub span: Span,
}

/// Base class reference: `extends Base[T](arg1, arg2)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRef {
    pub ty: TypeRef,
    pub args: Vec<Spanned<Expr>>,
}

/// Class body member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
}

/// Primary-constructor parameter: `class Point(val x: Int, var y: Int)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassParamDecl {
    pub name: Spanned<String>,
    pub ty: TypeRef,
    pub mutable: bool,
}

/// Field declaration: `val x: Int = 0` / `var y = compute()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: Spanned<String>,
    pub mods: Modifiers,
    pub mutable: bool,
    pub ty: Option<TypeRef>,
    pub value: Option<Spanned<Expr>>,
    pub span: Span,
}

/// Method declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: Spanned<String>,
    pub mods: Modifiers,
    /// The method's own type parameters, distinct from the declaring type's
    pub type_params: Vec<TypeParamDecl>,
    pub params: Vec<ParamDecl>,
    /// `None` means `Unit`
    pub ret: Option<TypeRef>,
    /// `None` for abstract methods
    pub body: Option<Spanned<Expr>>,
    pub span: Span,
}

/// Method parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: Spanned<String>,
    pub ty: TypeRef,
    /// Trailing `args: T*` parameter
    pub variadic: bool,
}

/// Declaration modifiers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub private: bool,
    pub abstract_: bool,
    pub sealed: bool,
    pub override_: bool,
    pub static_: bool,
    pub final_: bool,
}

/// Type parameter declaration with variance annotation: `[+A <: Fruit]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParamDecl {
    pub name: Spanned<String>,
    pub variance: VarianceAnn,
    pub upper_bound: Option<TypeRef>,
}

/// Variance annotation on a type parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarianceAnn {
    /// No annotation
    Invariant,
    /// `+A`
    Covariant,
    /// `-A`
    Contravariant,
}

/// Reference to a type by name, optionally applied: `List[Option[Int]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: Spanned<String>,
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: Spanned::new(name.into(), span),
            args: Vec::new(),
        }
    }

    pub fn applied(name: impl Into<String>, args: Vec<TypeRef>, span: Span) -> Self {
        Self {
            name: Spanned::new(name.into(), span),
            args,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name.node)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "[{}]", args.join(", "))?;
        }
        Ok(())
    }
}
