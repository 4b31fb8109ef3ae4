//! Logical Plan Representation
//!
//! Relational operators produced by the binder. Every operator exposes the
//! [`ColumnBinding`]s of its output so that parent expressions can address
//! columns by binding rather than by position.

use crate::planner::expression::{BoundAggregate, BoundExpression, BoundOrder, ColumnBinding};
use crate::types::LogicalType;
use std::fmt;

/// Logical plan node types
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Scan a catalog table
    Get(LogicalGet),
    /// A single row without columns (SELECT without FROM)
    DummyScan(LogicalDummyScan),
    Filter(LogicalFilter),
    Aggregate(LogicalAggregate),
    /// Expand list values into rows
    Unnest(LogicalUnnest),
    Projection(LogicalProjection),
    Order(LogicalOrder),
}

impl LogicalPlan {
    /// Bindings of the output columns, in output order
    pub fn column_bindings(&self) -> Vec<ColumnBinding> {
        match self {
            LogicalPlan::Get(get) => (0..get.names.len())
                .map(|i| ColumnBinding::new(get.table_index, i))
                .collect(),
            LogicalPlan::DummyScan(_) => vec![],
            LogicalPlan::Filter(filter) => filter.input.column_bindings(),
            LogicalPlan::Aggregate(aggregate) => (0..aggregate.groups.len())
                .map(|i| ColumnBinding::new(aggregate.group_index, i))
                .chain(
                    (0..aggregate.aggregates.len())
                        .map(|i| ColumnBinding::new(aggregate.aggregate_index, i)),
                )
                .collect(),
            LogicalPlan::Unnest(unnest) => {
                let mut bindings = unnest.input.column_bindings();
                bindings.extend(
                    (0..unnest.expressions.len()).map(|i| ColumnBinding::new(unnest.unnest_index, i)),
                );
                bindings
            }
            LogicalPlan::Projection(projection) => (0..projection.expressions.len())
                .map(|i| ColumnBinding::new(projection.table_index, i))
                .collect(),
            LogicalPlan::Order(order) => order.input.column_bindings(),
        }
    }

    /// Types of the output columns, in output order
    pub fn types(&self) -> Vec<LogicalType> {
        match self {
            LogicalPlan::Get(get) => get.types.clone(),
            LogicalPlan::DummyScan(_) => vec![],
            LogicalPlan::Filter(filter) => filter.input.types(),
            LogicalPlan::Aggregate(aggregate) => aggregate
                .groups
                .iter()
                .map(BoundExpression::return_type)
                .chain(aggregate.aggregates.iter().map(|a| a.return_type.clone()))
                .collect(),
            LogicalPlan::Unnest(unnest) => {
                let mut types = unnest.input.types();
                for expression in &unnest.expressions {
                    types.push(match expression.return_type() {
                        LogicalType::List(child) => *child,
                        _ => LogicalType::Null,
                    });
                }
                types
            }
            LogicalPlan::Projection(projection) => projection
                .expressions
                .iter()
                .map(BoundExpression::return_type)
                .collect(),
            LogicalPlan::Order(order) => order.input.types(),
        }
    }

    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Get(_) | LogicalPlan::DummyScan(_) => vec![],
            LogicalPlan::Filter(filter) => vec![&filter.input],
            LogicalPlan::Aggregate(aggregate) => vec![&aggregate.input],
            LogicalPlan::Unnest(unnest) => vec![&unnest.input],
            LogicalPlan::Projection(projection) => vec![&projection.input],
            LogicalPlan::Order(order) => vec![&order.input],
        }
    }

    fn describe(&self) -> String {
        fn list<T: fmt::Display>(items: &[T]) -> String {
            items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
        }
        match self {
            LogicalPlan::Get(get) => format!("GET {} [{}]", get.table_name, get.names.join(", ")),
            LogicalPlan::DummyScan(_) => "DUMMY_SCAN".to_string(),
            LogicalPlan::Filter(filter) => format!("FILTER {}", filter.predicate),
            LogicalPlan::Aggregate(aggregate) => format!(
                "AGGREGATE groups=[{}] aggregates=[{}]",
                list(&aggregate.groups),
                list(&aggregate.aggregates)
            ),
            LogicalPlan::Unnest(unnest) => format!("UNNEST [{}]", list(&unnest.expressions)),
            LogicalPlan::Projection(projection) => format!(
                "PROJECTION #{} [{}]",
                projection.table_index,
                list(&projection.expressions)
            ),
            LogicalPlan::Order(order) => {
                let orders: Vec<String> = order
                    .orders
                    .iter()
                    .map(|o| format!("{} {}", o.expression, if o.ascending { "ASC" } else { "DESC" }))
                    .collect();
                format!("ORDER [{}]", orders.join(", "))
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(depth), self.describe())?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented operator tree, as shown by EXPLAIN
impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalGet {
    pub table_index: usize,
    pub table_name: String,
    pub names: Vec<String>,
    pub types: Vec<LogicalType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDummyScan {
    pub table_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalFilter {
    pub input: Box<LogicalPlan>,
    pub predicate: BoundExpression,
}

impl LogicalFilter {
    pub fn new(input: LogicalPlan, predicate: BoundExpression) -> Self {
        Self {
            input: Box::new(input),
            predicate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalAggregate {
    pub input: Box<LogicalPlan>,
    pub group_index: usize,
    pub aggregate_index: usize,
    pub groups: Vec<BoundExpression>,
    pub aggregates: Vec<BoundAggregate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalUnnest {
    pub input: Box<LogicalPlan>,
    pub unnest_index: usize,
    /// LIST-typed expressions unnested side by side
    pub expressions: Vec<BoundExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalProjection {
    pub input: Box<LogicalPlan>,
    pub table_index: usize,
    pub expressions: Vec<BoundExpression>,
}

impl LogicalProjection {
    pub fn new(input: LogicalPlan, table_index: usize, expressions: Vec<BoundExpression>) -> Self {
        Self {
            input: Box::new(input),
            table_index,
            expressions,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalOrder {
    pub input: Box<LogicalPlan>,
    pub orders: Vec<BoundOrder>,
}

/// The result of binding a SELECT: a plan whose output columns are
/// addressed through `root_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQueryNode {
    pub root_index: usize,
    pub names: Vec<String>,
    pub types: Vec<LogicalType>,
    pub plan: LogicalPlan,
}
