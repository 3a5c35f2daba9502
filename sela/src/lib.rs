//! Sela Semantic Core
//!
//! Type model, symbol table and semantic analysis for the Sela language:
//! the AST goes in, a typed IR with all sugar expanded comes out.

pub mod ast;
pub mod error;
pub mod hir;
pub mod scope;
pub mod sema;
pub mod types;
pub mod util;

pub use ast::Span;
pub use error::{CompileError, Result};
pub use sema::{analyze, Analysis};
