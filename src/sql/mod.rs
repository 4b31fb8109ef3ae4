//! SQL syntax trees
//!
//! Defines the AST consumed and produced by the binder and its SQL rendering.

pub mod ast;
pub mod display;

pub use ast::*;
pub use display::quote_identifier;
