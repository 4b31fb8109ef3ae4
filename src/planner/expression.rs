//! Bound expressions
//!
//! Expressions after name resolution: column references point at a
//! `(table_index, column_index)` binding and every node carries its type.

use crate::planner::logical_plan::BoundQueryNode;
use crate::sql::{BinaryOperator, UnaryOperator};
use crate::types::{LogicalType, Value};
use std::fmt;

/// Identifies one output column of one plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnBinding {
    pub table_index: usize,
    pub column_index: usize,
}

impl ColumnBinding {
    pub fn new(table_index: usize, column_index: usize) -> Self {
        Self {
            table_index,
            column_index,
        }
    }
}

impl fmt::Display for ColumnBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#[{}.{}]", self.table_index, self.column_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryKind {
    Scalar,
    Exists,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpression {
    ColumnRef {
        name: String,
        binding: ColumnBinding,
        /// Number of binder scopes between the reference and its binding
        depth: usize,
        return_type: LogicalType,
    },
    Constant(Value),
    Function {
        name: String,
        arguments: Vec<BoundExpression>,
        return_type: LogicalType,
    },
    Cast {
        child: Box<BoundExpression>,
        target: LogicalType,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<BoundExpression>,
        right: Box<BoundExpression>,
        return_type: LogicalType,
    },
    Unary {
        operator: UnaryOperator,
        child: Box<BoundExpression>,
        return_type: LogicalType,
    },
    IsNull {
        child: Box<BoundExpression>,
        negated: bool,
    },
    Subquery {
        subquery: Box<BoundQueryNode>,
        kind: SubqueryKind,
        return_type: LogicalType,
    },
}

impl BoundExpression {
    pub fn column_ref(name: impl Into<String>, binding: ColumnBinding, return_type: LogicalType) -> Self {
        BoundExpression::ColumnRef {
            name: name.into(),
            binding,
            depth: 0,
            return_type,
        }
    }

    pub fn return_type(&self) -> LogicalType {
        match self {
            BoundExpression::ColumnRef { return_type, .. }
            | BoundExpression::Function { return_type, .. }
            | BoundExpression::Binary { return_type, .. }
            | BoundExpression::Unary { return_type, .. }
            | BoundExpression::Subquery { return_type, .. } => return_type.clone(),
            BoundExpression::Constant(value) => value.get_type(),
            BoundExpression::Cast { target, .. } => target.clone(),
            BoundExpression::IsNull { .. } => LogicalType::Boolean,
        }
    }

    pub fn children(&self) -> Vec<&BoundExpression> {
        match self {
            BoundExpression::ColumnRef { .. }
            | BoundExpression::Constant(_)
            | BoundExpression::Subquery { .. } => vec![],
            BoundExpression::Function { arguments, .. } => arguments.iter().collect(),
            BoundExpression::Cast { child, .. }
            | BoundExpression::Unary { child, .. }
            | BoundExpression::IsNull { child, .. } => vec![child],
            BoundExpression::Binary { left, right, .. } => vec![left, right],
        }
    }

    /// Whether the expression reads any column of the scope it was bound in
    pub fn references_local_columns(&self) -> bool {
        match self {
            BoundExpression::ColumnRef { depth, .. } => *depth == 0,
            BoundExpression::Subquery { .. } => true,
            other => other.children().into_iter().any(|c| c.references_local_columns()),
        }
    }
}

impl fmt::Display for BoundExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundExpression::ColumnRef {
                name,
                binding,
                depth,
                ..
            } => {
                if *depth > 0 {
                    write!(f, "{}{} (depth {})", name, binding, depth)
                } else {
                    write!(f, "{}{}", name, binding)
                }
            }
            BoundExpression::Constant(value) => write!(f, "{}", value.to_sql()),
            BoundExpression::Function {
                name, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            BoundExpression::Cast { child, target } => write!(f, "CAST({} AS {})", child, target),
            BoundExpression::Binary {
                operator,
                left,
                right,
                ..
            } => write!(f, "({} {} {})", left, operator, right),
            BoundExpression::Unary {
                operator, child, ..
            } => match operator {
                UnaryOperator::Minus => write!(f, "(-{})", child),
                UnaryOperator::Not => write!(f, "(NOT {})", child),
            },
            BoundExpression::IsNull { child, negated } => {
                if *negated {
                    write!(f, "({} IS NOT NULL)", child)
                } else {
                    write!(f, "({} IS NULL)", child)
                }
            }
            BoundExpression::Subquery { subquery, kind, .. } => match kind {
                SubqueryKind::Scalar => write!(f, "SUBQUERY({})", subquery.root_index),
                SubqueryKind::Exists => write!(f, "EXISTS({})", subquery.root_index),
            },
        }
    }
}

/// Aggregate computed by a [`LogicalAggregate`](crate::planner::LogicalAggregate)
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAggregate {
    pub name: String,
    pub arguments: Vec<BoundExpression>,
    pub distinct: bool,
    pub return_type: LogicalType,
}

impl fmt::Display for BoundAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
        write!(
            f,
            "{}({}{})",
            self.name,
            if self.distinct { "DISTINCT " } else { "" },
            args.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundOrder {
    pub expression: BoundExpression,
    pub ascending: bool,
}

/// A column of an enclosing scope referenced from inside a child scope
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedColumnInfo {
    pub binding: ColumnBinding,
    pub name: String,
    pub return_type: LogicalType,
    /// Depth relative to the binder that records the entry
    pub depth: usize,
}
