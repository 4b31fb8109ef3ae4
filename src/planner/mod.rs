//! Query Planner
//!
//! Turns [`SelectStatement`](crate::sql::SelectStatement) trees into logical
//! plans:
//!
//! 1. **Binding**: resolves column references against the catalog and the
//!    relations in scope, checks types and extracts aggregates
//! 2. **PIVOT / UNPIVOT rewriting**: pivot table references are rewritten
//!    into plain select trees during binding
//! 3. **Logical Planning**: the bound query is represented as a tree of
//!    relational operators addressed by column bindings

pub mod bind_context;
pub mod bind_pivot;
pub mod binder;
pub mod expression;
pub mod functions;
pub mod logical_plan;
pub mod pivot;

#[cfg(test)]
mod tests;

pub use bind_context::*;
pub use bind_pivot::PivotRewrite;
pub use binder::Binder;
pub use expression::*;
pub use logical_plan::*;
