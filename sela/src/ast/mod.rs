//! Abstract Syntax Tree definitions
//!
//! The AST is produced by the (external) parser and consumed by the
//! semantic passes. Node kinds form closed enums; every pass matches on
//! them exhaustively.

mod decl;
mod expr;
mod span;

pub use decl::*;
pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};

/// A program is a sequence of top-level declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<Decl>,
}
