//! Four-stage PIVOT rewrite
//!
//! ```text
//! stage 1  SELECT groups, keys, aggregates FROM source GROUP BY groups, keys
//! stage 2  SELECT groups, list(aggregate), list(key) FROM stage1 GROUP BY groups
//! stage 3  SELECT groups, map(keys, aggregates) FROM stage2
//! stage 4  SELECT groups, list_extract(map_extract(map, value), 1) AS value FROM stage3
//! ```
//!
//! Several key expressions (within one pivot column or across columns) are
//! collected as a single composite key `list_value(CAST(k1 AS VARCHAR), ...)`
//! and looked up with a list literal of the same shape.

use crate::common::error::PrismResult;
use crate::internal_err;
use crate::planner::pivot::{AggregateName, HandledColumns, PivotBindState, PivotValueElement};
use crate::sql::{Expression, PivotRef, SelectItem, SelectStatement, TableReference};
use crate::types::{LogicalType, Value};
use tracing::debug;

/// Build the stage 4 select of a PIVOT over `source`.
///
/// `all_columns` are the source columns in declaration order, `handled` the
/// columns consumed by aggregates and pivot keys.
pub fn build_pivot_query(
    source: TableReference,
    pivot: &PivotRef,
    all_columns: &[String],
    handled: &HandledColumns,
    elements: impl IntoIterator<Item = PivotValueElement>,
) -> PrismResult<SelectStatement> {
    let mut state = PivotBindState::new();
    let select = initial_aggregate(&mut state, source, pivot, all_columns, handled);
    debug!(sql = %select, "pivot stage 1 (group)");
    let select = list_aggregate(&mut state, select)?;
    debug!(sql = %select, "pivot stage 2 (list)");
    let select = map_aggregate(&mut state, select)?;
    debug!(sql = %select, "pivot stage 3 (map)");
    let select = final_operator(&state, select, elements)?;
    debug!(sql = %select, "pivot stage 4 (extract)");
    Ok(select)
}

fn select_from(from: TableReference) -> SelectStatement {
    SelectStatement {
        from: Some(Box::new(from)),
        ..Default::default()
    }
}

fn initial_aggregate(
    state: &mut PivotBindState,
    source: TableReference,
    pivot: &PivotRef,
    all_columns: &[String],
    handled: &HandledColumns,
) -> SelectStatement {
    let mut select = select_from(source);

    let groups: Vec<String> = if pivot.groups.is_empty() {
        all_columns
            .iter()
            .filter(|column| !handled.contains(column))
            .cloned()
            .collect()
    } else {
        pivot.groups.clone()
    };
    for group in groups {
        let alias = state.next_group_alias();
        select.push_group(SelectItem::aliased(Expression::column(&group), &alias));
        state.group_names.push(group);
        state.internal_group_names.push(alias);
    }

    for pivot_column in &pivot.pivots {
        for expression in &pivot_column.pivot_expressions {
            let alias = state.next_ref_alias();
            select.push_group(SelectItem::aliased(expression.clone(), &alias));
            state.internal_pivot_refs.push(alias);
        }
    }

    for aggregate in &pivot.aggregates {
        let alias = state.next_aggregate_alias();
        select.push_item(SelectItem::aliased(aggregate.expression.clone(), &alias));
        state.aggregate_names.push(AggregateName {
            alias: aggregate.alias.clone(),
            rendered: aggregate.expression.to_string(),
        });
        state.internal_aggregate_names.push(alias);
    }
    select
}

fn list_aggregate(state: &mut PivotBindState, previous: SelectStatement) -> PrismResult<SelectStatement> {
    let mut select = select_from(TableReference::subquery(previous));
    for alias in &state.internal_group_names {
        select.push_group(SelectItem::Expression(Expression::column(alias)));
    }
    for alias in &state.internal_aggregate_names {
        select.push_item(SelectItem::aliased(
            Expression::function("list", vec![Expression::column(alias)]),
            alias,
        ));
    }

    let key = match state.internal_pivot_refs.as_slice() {
        [] => return Err(internal_err!("PIVOT without pivot expressions")),
        [single] => Expression::column(single),
        refs => Expression::function(
            "list_value",
            refs.iter()
                .map(|r| Expression::Cast {
                    expression: Box::new(Expression::column(r)),
                    data_type: LogicalType::Varchar,
                })
                .collect(),
        ),
    };
    let name = state.next_name_alias();
    select.push_item(SelectItem::aliased(Expression::function("list", vec![key]), &name));
    state.internal_pivot_names.push(name);
    Ok(select)
}

fn map_aggregate(state: &mut PivotBindState, previous: SelectStatement) -> PrismResult<SelectStatement> {
    let mut select = select_from(TableReference::subquery(previous));
    for alias in &state.internal_group_names {
        select.push_item(SelectItem::Expression(Expression::column(alias)));
    }
    let [pivot_name] = state.internal_pivot_names.as_slice() else {
        return Err(internal_err!(
            "expected one pivot key list, found {}",
            state.internal_pivot_names.len()
        ));
    };
    let pivot_name = pivot_name.clone();
    for index in 0..state.internal_aggregate_names.len() {
        let map_name = state.next_map_alias();
        let map = Expression::function(
            "map",
            vec![
                Expression::column(&pivot_name),
                Expression::column(&state.internal_aggregate_names[index]),
            ],
        );
        select.push_item(SelectItem::aliased(map, &map_name));
        state.internal_map_names.push(map_name);
    }
    Ok(select)
}

fn lookup_key(state: &PivotBindState, element: &PivotValueElement) -> PrismResult<Value> {
    let key_count = state.internal_pivot_refs.len();
    if element.values.len() != key_count {
        return Err(internal_err!(
            "PIVOT value \"{}\" has {} values but there are {} pivot expressions - lookup of this shape is not supported",
            element.name,
            element.values.len(),
            key_count
        ));
    }
    if key_count == 1 {
        return Ok(element.values[0].clone());
    }
    let parts = element
        .values
        .iter()
        .map(|v| v.cast_to(&LogicalType::Varchar))
        .collect::<PrismResult<Vec<_>>>()?;
    Ok(Value::List(parts))
}

fn final_operator(
    state: &PivotBindState,
    previous: SelectStatement,
    elements: impl IntoIterator<Item = PivotValueElement>,
) -> PrismResult<SelectStatement> {
    if state.internal_map_names.len() != state.aggregate_names.len()
        || state.group_names.len() != state.internal_group_names.len()
    {
        return Err(internal_err!("PIVOT naming tables are out of sync"));
    }

    let mut select = select_from(TableReference::subquery(previous));
    for (group, internal) in state.group_names.iter().zip(&state.internal_group_names) {
        select.push_item(SelectItem::aliased(Expression::column(internal), group));
    }

    let aggregate_count = state.aggregate_names.len();
    for element in elements {
        let key = lookup_key(state, &element)?;
        for (map_name, aggregate) in state.internal_map_names.iter().zip(&state.aggregate_names) {
            let name = match aggregate.suffix(aggregate_count) {
                Some(suffix) => format!("{}_{}", element.name, suffix),
                None => element.name.clone(),
            };
            let lookup = Expression::function(
                "map_extract",
                vec![Expression::column(map_name), Expression::Literal(key.clone())],
            );
            let extract =
                Expression::function("list_extract", vec![lookup, Expression::literal(1)]);
            select.push_item(SelectItem::aliased(extract, name));
        }
    }
    Ok(select)
}
