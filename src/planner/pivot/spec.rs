//! Validation and enumeration of pivot specifications
//!
//! Everything here runs before any select tree is built: ENUM sources are
//! expanded into entries, aggregates and IN lists are checked, the cross
//! product is bounded, and finally the pivot value combinations are
//! enumerated in declaration order.

use crate::binder_err;
use crate::catalog::Catalog;
use crate::common::error::{PrismError, PrismResult};
use crate::sql::{Expression, PivotAggregate, PivotColumn, PivotColumnEntry};
use crate::types::{LogicalType, Value};
use std::collections::HashSet;
use tracing::trace;

/// Source columns consumed by aggregates or pivot keys. Such columns are not
/// used as implicit group columns. Case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct HandledColumns {
    names: HashSet<String>,
}

impl HandledColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn collect_columns(expression: &Expression, handled: &mut HandledColumns) -> PrismResult<()> {
    if let Expression::ColumnReference { table, column } = expression {
        if table.is_some() {
            return Err(binder_err!("PIVOT expression cannot contain qualified columns"));
        }
        handled.insert(column);
    }
    for child in expression.children() {
        collect_columns(child, handled)?;
    }
    Ok(())
}

/// Check the shape of every pivot aggregate and record the columns they read
pub fn validate_aggregates(
    aggregates: &[PivotAggregate],
    handled: &mut HandledColumns,
) -> PrismResult<()> {
    for aggregate in aggregates {
        let expression = &aggregate.expression;
        if expression.has_subquery() {
            return Err(binder_err!("Pivot expression cannot contain subqueries"));
        }
        if expression.is_window() {
            return Err(binder_err!("Pivot expression cannot contain window functions"));
        }
        if !matches!(expression, Expression::FunctionCall { .. }) {
            return Err(binder_err!(
                "Pivot expression must be an aggregate, got \"{}\"",
                expression
            ));
        }
        collect_columns(expression, handled)?;
    }
    Ok(())
}

/// Check the key expressions of every pivot column and record the columns they read
pub fn validate_pivot_expressions(
    pivots: &[PivotColumn],
    handled: &mut HandledColumns,
) -> PrismResult<()> {
    for pivot in pivots {
        for expression in &pivot.pivot_expressions {
            if expression.has_subquery() {
                return Err(binder_err!("Pivot expression cannot contain subqueries"));
            }
            collect_columns(expression, handled)?;
        }
    }
    Ok(())
}

/// Replace an ENUM reference by one entry per member, in ordinal order
pub fn expand_enum_pivot(pivot: &mut PivotColumn, catalog: &Catalog) -> PrismResult<()> {
    let Some(enum_name) = pivot.pivot_enum.take() else {
        return Ok(());
    };
    if !pivot.entries.is_empty() {
        return Err(binder_err!(
            "PIVOT IN list cannot combine the ENUM \"{}\" with explicit values",
            enum_name
        ));
    }
    let enum_type = catalog.get_type(&enum_name)?;
    if !matches!(enum_type, LogicalType::Enum { .. }) {
        return Err(binder_err!(
            "Pivot must reference an ENUM type: \"{}\" is of type \"{}\"",
            enum_name,
            enum_type
        ));
    }
    let size = enum_type.enum_size()?;
    pivot.entries.reserve(size);
    for index in 0..size {
        let member = enum_type.enum_value(index)?;
        pivot.entries.push(PivotColumnEntry {
            values: vec![Value::varchar(member)],
            star: None,
            alias: Some(member.to_string()),
        });
    }
    Ok(())
}

fn render_tuple(values: &[Value]) -> String {
    match values {
        [value] => value.to_string(),
        values => {
            let items: Vec<String> = values.iter().map(Value::to_string).collect();
            format!("({})", items.join(", "))
        }
    }
}

/// Check arity and uniqueness of the IN list of one pivot column
pub fn validate_entries(pivot: &PivotColumn) -> PrismResult<()> {
    if pivot.entries.is_empty() {
        return Err(binder_err!("PIVOT IN list cannot be empty"));
    }
    let expected = pivot.pivot_expressions.len();
    let mut seen: HashSet<&[Value]> = HashSet::with_capacity(pivot.entries.len());
    for entry in &pivot.entries {
        if entry.star.is_some() {
            return Err(binder_err!("PIVOT IN list cannot contain a star expression"));
        }
        if entry.values.len() != expected {
            return Err(PrismError::Shape(format!(
                "PIVOT IN list - inconsistent amount of rows - expected {} but got {}",
                expected,
                entry.values.len()
            )));
        }
        if !seen.insert(&entry.values) {
            return Err(binder_err!(
                "The value \"{}\" was specified multiple times in the IN clause",
                render_tuple(&entry.values)
            ));
        }
    }
    Ok(())
}

/// Number of pivot value combinations, failing when it reaches `limit`
pub fn compute_cross_product_bound(pivots: &[PivotColumn], limit: usize) -> PrismResult<usize> {
    let total = pivots
        .iter()
        .fold(1usize, |acc, pivot| acc.saturating_mul(pivot.entries.len()));
    if total >= limit {
        return Err(binder_err!(
            "Pivot column limit of {} exceeded. Use SET pivot_limit=X to increase the limit",
            limit
        ));
    }
    Ok(total)
}

/// One combination of pivot values and the output column name derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct PivotValueElement {
    pub values: Vec<Value>,
    pub name: String,
}

fn entry_name(entry: &PivotColumnEntry) -> String {
    match &entry.alias {
        Some(alias) => alias.clone(),
        None => entry
            .values
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join("_"),
    }
}

struct PendingElement {
    depth: usize,
    values: Vec<Value>,
    names: Vec<String>,
}

/// Depth-first enumeration of the cross product of all pivot columns.
/// The first column varies slowest.
pub struct PivotEnumerator {
    columns: Vec<Vec<(Vec<Value>, String)>>,
    stack: Vec<PendingElement>,
}

impl PivotEnumerator {
    pub fn new(pivots: &[PivotColumn]) -> Self {
        let columns = pivots
            .iter()
            .map(|pivot| {
                pivot
                    .entries
                    .iter()
                    .map(|entry| (entry.values.clone(), entry_name(entry)))
                    .collect()
            })
            .collect();
        Self {
            columns,
            stack: vec![PendingElement {
                depth: 0,
                values: Vec::new(),
                names: Vec::new(),
            }],
        }
    }
}

impl Iterator for PivotEnumerator {
    type Item = PivotValueElement;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(pending) = self.stack.pop() {
            let Some(entries) = self.columns.get(pending.depth) else {
                let element = PivotValueElement {
                    values: pending.values,
                    name: pending.names.join("_"),
                };
                trace!(name = %element.name, "pivot value");
                return Some(element);
            };
            // reversed so the first entry is popped first
            for (values, name) in entries.iter().rev() {
                let mut next_values = pending.values.clone();
                next_values.extend(values.iter().cloned());
                let mut next_names = pending.names.clone();
                next_names.push(name.clone());
                self.stack.push(PendingElement {
                    depth: pending.depth + 1,
                    values: next_values,
                    names: next_names,
                });
            }
        }
        None
    }
}
