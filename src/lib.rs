//! PrismDB Pivot - PIVOT / UNPIVOT query rewriting
//!
//! PIVOT and UNPIVOT table references are rewritten into trees of plain
//! SELECT statements (GROUP BY, list aggregation, maps, unnest) and bound
//! like any other subquery. A small in-memory catalog, a binder producing
//! logical plans and a row-based executor make the rewrites runnable.
//!
pub mod catalog;
pub mod common;
pub mod database;
pub mod execution;
pub mod planner;
pub mod sql;
pub mod storage;
pub mod types;

// Re-export catalog system for convenience
pub use catalog::{Catalog, CatalogDefinition, ColumnInfo, TableInfo};

// Re-export common types for convenience
pub use common::{BinderConfig, ConfigManager, PrismError, PrismResult};

// Re-export type system for convenience
pub use types::{LogicalType, Value};

// Re-export database for convenience
pub use database::Database;
pub use execution::{Executor, QueryResult};

// Re-export planner system for convenience
pub use planner::{Binder, BoundQueryNode, LogicalPlan, PivotRewrite};

// Re-export the statement AST for convenience
pub use sql::{
    Expression, PivotColumn, PivotColumnEntry, PivotRef, SelectItem, SelectStatement,
    StarExpression, TableReference,
};
