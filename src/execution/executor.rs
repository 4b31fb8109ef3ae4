//! Query Executor
//!
//! Walks a [`LogicalPlan`] bottom-up and materializes each operator's
//! output. Rows are addressed by [`ColumnBinding`], mirroring the plan.

use crate::catalog::Catalog;
use crate::common::error::PrismResult;
use crate::execution::aggregate::AggregateAccumulator;
use crate::execution::expression::{evaluate, is_true, Frame, RowContext};
use crate::execution::parallel::{parallel_scan, ParallelContext};
use crate::execution::QueryResult;
use crate::planner::{
    BoundExpression, BoundQueryNode, ColumnBinding, LogicalAggregate, LogicalOrder, LogicalPlan,
    LogicalUnnest,
};
use crate::types::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Materialized operator output
#[derive(Debug, Clone)]
pub struct Relation {
    pub bindings: Vec<ColumnBinding>,
    pub rows: Vec<Vec<Value>>,
}

pub struct Executor<'a> {
    catalog: &'a Catalog,
    parallel: ParallelContext,
}

impl<'a> Executor<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_parallel_context(catalog, ParallelContext::default())
    }

    pub fn with_parallel_context(catalog: &'a Catalog, parallel: ParallelContext) -> Self {
        Self { catalog, parallel }
    }

    /// Execute a bound query and return its rows under the query's names
    pub fn execute(&self, node: &BoundQueryNode) -> PrismResult<QueryResult> {
        let start = Instant::now();
        let relation = self.execute_plan(&node.plan, &[])?;
        debug!(
            rows = relation.rows.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query executed"
        );
        Ok(QueryResult::new(
            node.names.clone(),
            node.types.clone(),
            relation.rows,
        ))
    }

    /// Execute one plan subtree; `outer` holds the rows of enclosing queries
    pub(crate) fn execute_plan(&self, plan: &LogicalPlan, outer: &[Frame]) -> PrismResult<Relation> {
        match plan {
            LogicalPlan::Get(get) => {
                let table = self.catalog.get_table(&get.table_name)?;
                let table = table.read();
                let chunks = parallel_scan(table.data(), &self.parallel);
                let rows: Vec<Vec<Value>> = chunks.iter().flat_map(|chunk| chunk.rows()).collect();
                Ok(Relation {
                    bindings: plan.column_bindings(),
                    rows,
                })
            }
            LogicalPlan::DummyScan(_) => Ok(Relation {
                bindings: vec![],
                rows: vec![vec![]],
            }),
            LogicalPlan::Filter(filter) => {
                let input = self.execute_plan(&filter.input, outer)?;
                let mut rows = Vec::with_capacity(input.rows.len());
                for row in input.rows {
                    let context = RowContext::new(&input.bindings, &row, outer);
                    if is_true(&evaluate(self, &filter.predicate, &context)?) {
                        rows.push(row);
                    }
                }
                Ok(Relation {
                    bindings: input.bindings,
                    rows,
                })
            }
            LogicalPlan::Aggregate(aggregate) => self.execute_aggregate(plan, aggregate, outer),
            LogicalPlan::Unnest(unnest) => self.execute_unnest(plan, unnest, outer),
            LogicalPlan::Projection(projection) => {
                let input = self.execute_plan(&projection.input, outer)?;
                let rows = input
                    .rows
                    .iter()
                    .map(|row| {
                        let context = RowContext::new(&input.bindings, row, outer);
                        self.evaluate_all(&projection.expressions, &context)
                    })
                    .collect::<PrismResult<Vec<_>>>()?;
                Ok(Relation {
                    bindings: plan.column_bindings(),
                    rows,
                })
            }
            LogicalPlan::Order(order) => self.execute_order(order, outer),
        }
    }

    fn evaluate_all(&self, expressions: &[BoundExpression], context: &RowContext<'_>) -> PrismResult<Vec<Value>> {
        expressions
            .iter()
            .map(|expression| evaluate(self, expression, context))
            .collect()
    }

    fn execute_aggregate(
        &self,
        plan: &LogicalPlan,
        aggregate: &LogicalAggregate,
        outer: &[Frame],
    ) -> PrismResult<Relation> {
        let input = self.execute_plan(&aggregate.input, outer)?;

        // groups keep the order in which they were first seen
        let mut group_keys: Vec<Vec<Value>> = Vec::new();
        let mut states: Vec<Vec<AggregateAccumulator>> = Vec::new();
        let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();
        let new_states = || {
            aggregate
                .aggregates
                .iter()
                .map(AggregateAccumulator::new)
                .collect::<PrismResult<Vec<_>>>()
        };

        for row in &input.rows {
            let context = RowContext::new(&input.bindings, row, outer);
            let key = self.evaluate_all(&aggregate.groups, &context)?;
            let index = match lookup.get(&key) {
                Some(index) => *index,
                None => {
                    lookup.insert(key.clone(), group_keys.len());
                    group_keys.push(key);
                    states.push(new_states()?);
                    group_keys.len() - 1
                }
            };
            for (accumulator, bound) in states[index].iter_mut().zip(&aggregate.aggregates) {
                let arguments = self.evaluate_all(&bound.arguments, &context)?;
                accumulator.update(&arguments)?;
            }
        }

        // an ungrouped aggregate over no rows still produces one row
        if aggregate.groups.is_empty() && group_keys.is_empty() {
            group_keys.push(vec![]);
            states.push(new_states()?);
        }

        let rows = group_keys
            .into_iter()
            .zip(states)
            .map(|(mut key, states)| {
                key.extend(states.iter().map(AggregateAccumulator::finalize));
                key
            })
            .collect();
        Ok(Relation {
            bindings: plan.column_bindings(),
            rows,
        })
    }

    fn execute_unnest(&self, plan: &LogicalPlan, unnest: &LogicalUnnest, outer: &[Frame]) -> PrismResult<Relation> {
        let input = self.execute_plan(&unnest.input, outer)?;
        let mut rows = Vec::new();
        for row in &input.rows {
            let context = RowContext::new(&input.bindings, row, outer);
            let lists = self
                .evaluate_all(&unnest.expressions, &context)?
                .into_iter()
                .map(|value| match value {
                    Value::List(values) => Ok(values),
                    Value::Null => Ok(Vec::new()),
                    other => Err(crate::internal_err!(
                        "UNNEST expected a LIST, got {}",
                        other.get_type()
                    )),
                })
                .collect::<PrismResult<Vec<_>>>()?;
            // lists are unnested side by side; shorter lists are padded with NULL
            let length = lists.iter().map(Vec::len).max().unwrap_or(0);
            for position in 0..length {
                let mut output = row.clone();
                output.extend(
                    lists
                        .iter()
                        .map(|list| list.get(position).cloned().unwrap_or(Value::Null)),
                );
                rows.push(output);
            }
        }
        Ok(Relation {
            bindings: plan.column_bindings(),
            rows,
        })
    }

    fn execute_order(&self, order: &LogicalOrder, outer: &[Frame]) -> PrismResult<Relation> {
        let input = self.execute_plan(&order.input, outer)?;
        let mut keyed = input
            .rows
            .into_iter()
            .map(|row| {
                let context = RowContext::new(&input.bindings, &row, outer);
                let key = order
                    .orders
                    .iter()
                    .map(|o| evaluate(self, &o.expression, &context))
                    .collect::<PrismResult<Vec<_>>>()?;
                Ok((key, row))
            })
            .collect::<PrismResult<Vec<_>>>()?;

        keyed.sort_by(|(left, _), (right, _)| {
            for ((l, r), o) in left.iter().zip(right).zip(&order.orders) {
                // NULLs sort last in either direction
                let ordering = match (l.is_null(), r.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    _ => {
                        let ordering = l.compare(r).unwrap_or(Ordering::Equal);
                        if o.ascending {
                            ordering
                        } else {
                            ordering.reverse()
                        }
                    }
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(Relation {
            bindings: input.bindings,
            rows: keyed.into_iter().map(|(_, row)| row).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, TableInfo};
    use crate::common::config::BinderConfig;
    use crate::planner::Binder;
    use crate::sql::*;
    use crate::types::LogicalType;
    use pretty_assertions::assert_eq;

    fn catalog() -> PrismResult<Catalog> {
        let catalog = Catalog::new();
        catalog.create_table(&TableInfo::new(
            "t",
            vec![
                ColumnInfo::new("k", LogicalType::Varchar),
                ColumnInfo::new("v", LogicalType::Integer),
            ],
        ))?;
        let table = catalog.get_table("t")?;
        table.write().insert_rows(vec![
            vec!["b".into(), Value::Integer(2)],
            vec!["a".into(), Value::Integer(1)],
            vec!["b".into(), Value::Null],
            vec![Value::Null, Value::Integer(5)],
        ])?;
        Ok(catalog)
    }

    fn run(catalog: &Catalog, select: &SelectStatement) -> PrismResult<QueryResult> {
        let mut binder = Binder::new(catalog, BinderConfig::default());
        let node = binder.bind_select(select)?;
        Executor::with_parallel_context(catalog, ParallelContext::single_threaded()).execute(&node)
    }

    #[test]
    fn test_group_by_keeps_first_seen_order() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement {
            from: Some(Box::new(TableReference::table("t"))),
            ..Default::default()
        };
        select.push_group(SelectItem::Expression(Expression::column("k")));
        select.push_item(SelectItem::Expression(Expression::function(
            "list",
            vec![Expression::column("v")],
        )));
        let result = run(&catalog, &select)?;
        assert_eq!(
            result.rows,
            vec![
                vec!["b".into(), Value::List(vec![Value::Integer(2), Value::Null])],
                vec!["a".into(), Value::List(vec![Value::Integer(1)])],
                vec![Value::Null, Value::List(vec![Value::Integer(5)])],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_global_aggregate_over_empty_input() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement {
            from: Some(Box::new(TableReference::table("t"))),
            where_clause: Some(Box::new(Expression::binary(
                Expression::column("v"),
                BinaryOperator::GreaterThan,
                Expression::literal(100),
            ))),
            ..Default::default()
        };
        select.push_item(SelectItem::Expression(Expression::function("count", vec![])));
        select.push_item(SelectItem::Expression(Expression::function(
            "sum",
            vec![Expression::column("v")],
        )));
        let result = run(&catalog, &select)?;
        assert_eq!(result.rows, vec![vec![Value::BigInt(0), Value::Null]]);
        Ok(())
    }

    #[test]
    fn test_order_by_nulls_last() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement::star_from(TableReference::table("t"));
        select.order_by.push(OrderByExpression {
            expression: Expression::column("v"),
            ascending: false,
        });
        let result = run(&catalog, &select)?;
        assert_eq!(
            result.column("v")?,
            vec![Value::Integer(5), Value::Integer(2), Value::Integer(1), Value::Null]
        );
        Ok(())
    }

    #[test]
    fn test_unnest_pads_shorter_lists() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement::default();
        select.push_item(SelectItem::aliased(
            Expression::function(
                "unnest",
                vec![Expression::function(
                    "list_value",
                    vec![Expression::literal(1), Expression::literal(2)],
                )],
            ),
            "a",
        ));
        select.push_item(SelectItem::aliased(
            Expression::function(
                "unnest",
                vec![Expression::function("list_value", vec![Expression::literal("x")])],
            ),
            "b",
        ));
        let result = run(&catalog, &select)?;
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1), "x".into()],
                vec![Value::Integer(2), Value::Null],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_parallel_and_serial_scans_agree() -> PrismResult<()> {
        let catalog = catalog()?;
        let select = SelectStatement::star_from(TableReference::table("t"));
        let mut binder = Binder::new(&catalog, BinderConfig::default());
        let node = binder.bind_select(&select)?;
        let serial = Executor::with_parallel_context(&catalog, ParallelContext::single_threaded()).execute(&node)?;
        let parallel = Executor::with_parallel_context(&catalog, ParallelContext::new(4)).execute(&node)?;
        assert_eq!(serial, parallel);
        Ok(())
    }
}
