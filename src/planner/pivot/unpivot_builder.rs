//! UNPIVOT rewrite
//!
//! `source UNPIVOT (v FOR name IN (a, b))` becomes
//!
//! ```text
//! SELECT <other columns>, unnest(['a', 'b']) AS name, unnest(list_value(a, b)) AS v
//! FROM source
//! ```
//!
//! plus a deferred `v IS NOT NULL` filter unless nulls are included.

use crate::common::error::{PrismError, PrismResult};
use crate::planner::bind_context::BindContext;
use crate::planner::pivot::UnpivotRewrite;
use crate::sql::{Expression, PivotColumnEntry, PivotRef, SelectItem, SelectStatement, TableReference};
use crate::types::Value;
use crate::{binder_err, internal_err};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Build the UNPIVOT projection over `source`.
///
/// `all_columns` are the source columns in declaration order; `source_context`
/// is the scope the source was bound in and serves star expansion.
pub fn build_unpivot_query(
    source: TableReference,
    unpivot: &PivotRef,
    all_columns: &[String],
    source_context: &BindContext,
) -> PrismResult<UnpivotRewrite> {
    let [pivot] = unpivot.pivots.as_slice() else {
        return Err(binder_err!("UNPIVOT requires a single pivot element"));
    };
    let [name_column] = pivot.unpivot_names.as_slice() else {
        return Err(binder_err!("UNPIVOT requires a single column name for the PIVOT IN clause"));
    };
    if !unpivot.groups.is_empty() {
        return Err(binder_err!("UNPIVOT cannot be combined with GROUP BY"));
    }
    if pivot.entries.is_empty() {
        return Err(binder_err!("UNPIVOT IN list cannot be empty"));
    }

    let entries = expand_star_entries(&pivot.entries, source_context)?;
    if entries.is_empty() {
        return Err(binder_err!("UNPIVOT IN list cannot be empty"));
    }

    // lower-cased name -> name as declared by the source
    let name_map: HashMap<String, &str> = all_columns
        .iter()
        .map(|c| (c.to_lowercase(), c.as_str()))
        .collect();
    let mut handled = HashSet::new();
    for entry in &entries {
        for value in &entry.values {
            handled.insert(column_name(value)?.to_lowercase());
        }
    }

    let mut select = SelectStatement {
        from: Some(Box::new(source)),
        ..Default::default()
    };
    for column in all_columns {
        if !handled.contains(&column.to_lowercase()) {
            select.push_item(SelectItem::Expression(Expression::column(column)));
        }
    }

    let unmatched: Vec<&str> = entries
        .iter()
        .flat_map(|entry| entry.values.iter())
        .filter_map(|value| value.try_as_str().ok())
        .filter(|name| !name_map.contains_key(&name.to_lowercase()))
        .collect();
    if !unmatched.is_empty() {
        return Err(binder_err!(
            "Column \"{}\" referenced in UNPIVOT but no matching entry was found in the table",
            unmatched.join("\", \"")
        ));
    }

    let value_count = entries[0].values.len();
    let mut labels = Vec::with_capacity(entries.len());
    let mut columns: Vec<Vec<String>> = Vec::with_capacity(entries.len());
    for entry in &entries {
        if entry.values.len() != value_count {
            return Err(PrismError::Shape(format!(
                "UNPIVOT value count mismatch - entry has {} values, but expected all entries to have {} values",
                entry.values.len(),
                value_count
            )));
        }
        let mut matched = Vec::with_capacity(entry.values.len());
        for value in &entry.values {
            let name = column_name(value)?;
            let declared = name_map
                .get(&name.to_lowercase())
                .ok_or_else(|| internal_err!("UNPIVOT column \"{}\" lost during matching", name))?;
            matched.push(declared.to_string());
        }
        labels.push(Value::Varchar(
            entry.alias.clone().unwrap_or_else(|| matched.join("_")),
        ));
        columns.push(matched);
    }

    select.push_item(SelectItem::aliased(
        Expression::function("unnest", vec![Expression::Literal(Value::List(labels))]),
        name_column,
    ));

    if unpivot.unpivot_names.len() != value_count {
        return Err(PrismError::Shape(format!(
            "UNPIVOT name count mismatch - got {} names but {} expressions",
            unpivot.unpivot_names.len(),
            value_count
        )));
    }

    let mut filter: Option<Expression> = None;
    for (index, destination) in unpivot.unpivot_names.iter().enumerate() {
        let values = columns
            .iter()
            .map(|entry| Expression::column(&entry[index]))
            .collect();
        select.push_item(SelectItem::aliased(
            Expression::function("unnest", vec![Expression::function("list_value", values)]),
            destination,
        ));
        if !unpivot.include_nulls {
            let not_null = Expression::is_not_null(Expression::column(destination));
            filter = Some(match filter {
                Some(existing) => Expression::and(existing, not_null),
                None => not_null,
            });
        }
    }

    debug!(sql = %select, filter = ?filter.as_ref().map(|f| f.to_string()), "unpivot rewrite");
    Ok(UnpivotRewrite { select, filter })
}

fn column_name(value: &Value) -> PrismResult<&str> {
    value.try_as_str().map_err(|_| {
        binder_err!(
            "UNPIVOT IN list must reference columns by name, got {}",
            value.to_sql()
        )
    })
}

/// Replace star entries by one entry per matching source column. Columns
/// named by other entries are skipped.
fn expand_star_entries(
    entries: &[PivotColumnEntry],
    source_context: &BindContext,
) -> PrismResult<Vec<PivotColumnEntry>> {
    if entries.iter().all(|e| e.star.is_none()) {
        return Ok(entries.to_vec());
    }
    let mut referenced = HashSet::new();
    for entry in entries.iter().filter(|e| e.star.is_none()) {
        for value in &entry.values {
            referenced.insert(column_name(value)?.to_lowercase());
        }
    }

    let mut expanded = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(star) = &entry.star else {
            expanded.push(entry.clone());
            continue;
        };
        for column in source_context.expand_star(star)? {
            if referenced.contains(&column.name.to_lowercase()) {
                continue;
            }
            expanded.push(PivotColumnEntry {
                values: vec![Value::varchar(&column.name)],
                star: None,
                alias: Some(column.name),
            });
        }
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::StarExpression;
    use crate::types::LogicalType;
    use pretty_assertions::assert_eq;

    fn context(columns: &[&str]) -> BindContext {
        let mut context = BindContext::new();
        context
            .add_binding(
                "monthly",
                0,
                columns.iter().map(|c| c.to_string()).collect(),
                vec![LogicalType::Integer; columns.len()],
            )
            .unwrap();
        context
    }

    fn rewrite(unpivot: &PivotRef, columns: &[&str]) -> PrismResult<UnpivotRewrite> {
        let all: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        build_unpivot_query((*unpivot.source).clone(), unpivot, &all, &context(columns))
    }

    fn months() -> PivotRef {
        PivotRef::unpivot(
            TableReference::table("monthly"),
            "month",
            &["amount"],
            vec![
                PivotColumnEntry::columns(&["jan"], None),
                PivotColumnEntry::columns(&["Feb"], None),
                PivotColumnEntry::columns(&["mar"], Some("march")),
            ],
        )
    }

    #[test]
    fn test_projection_and_filter() -> PrismResult<()> {
        let result = rewrite(&months(), &["id", "jan", "feb", "mar"])?;
        assert_eq!(
            result.select.to_string(),
            "SELECT id, unnest(['jan', 'feb', 'march']) AS month, \
             unnest(list_value(jan, feb, mar)) AS amount FROM monthly"
        );
        assert_eq!(
            result.filter.map(|f| f.to_string()),
            Some("(amount IS NOT NULL)".to_string())
        );

        let mut include = months();
        include.include_nulls = true;
        assert!(rewrite(&include, &["id", "jan", "feb", "mar"])?.filter.is_none());
        Ok(())
    }

    #[test]
    fn test_star_entry_skips_referenced_columns() -> PrismResult<()> {
        let unpivot = PivotRef::unpivot(
            TableReference::table("monthly"),
            "month",
            &["amount"],
            vec![
                PivotColumnEntry::columns(&["a"], None),
                PivotColumnEntry::star(StarExpression::default()),
                PivotColumnEntry::columns(&["d"], None),
            ],
        );
        let result = rewrite(&unpivot, &["a", "b", "c", "d", "e"])?;
        assert_eq!(
            result.select.select_list[0].to_string(),
            "unnest(['a', 'b', 'c', 'e', 'd']) AS month"
        );
        Ok(())
    }

    #[test]
    fn test_star_expanding_to_nothing_is_rejected() {
        let star = StarExpression {
            relation: None,
            exclude: vec!["a".into(), "b".into()],
        };
        let unpivot = PivotRef::unpivot(
            TableReference::table("monthly"),
            "month",
            &["amount"],
            vec![PivotColumnEntry::star(star)],
        );
        let err = rewrite(&unpivot, &["a", "b"]).unwrap_err();
        assert!(matches!(err, PrismError::Binder(_)));
        assert_eq!(err.to_string(), "Binder error: UNPIVOT IN list cannot be empty");
    }

    #[test]
    fn test_unmatched_columns_are_reported_together() {
        let unpivot = PivotRef::unpivot(
            TableReference::table("monthly"),
            "month",
            &["amount"],
            vec![
                PivotColumnEntry::columns(&["jan"], None),
                PivotColumnEntry::columns(&["apr"], None),
                PivotColumnEntry::columns(&["may"], None),
            ],
        );
        let err = rewrite(&unpivot, &["jan", "feb"]).unwrap_err();
        assert!(err.to_string().contains("\"apr\", \"may\""));
    }

    #[test]
    fn test_multi_value_entries() -> PrismResult<()> {
        let unpivot = PivotRef::unpivot(
            TableReference::table("monthly"),
            "quarter",
            &["first", "second"],
            vec![
                PivotColumnEntry::columns(&["jan", "feb"], Some("q1")),
                PivotColumnEntry::columns(&["apr", "may"], None),
            ],
        );
        let result = rewrite(&unpivot, &["jan", "feb", "apr", "may"])?;
        let items: Vec<String> = result.select.select_list.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            items,
            vec![
                "unnest(['q1', 'apr_may']) AS quarter",
                "unnest(list_value(jan, apr)) AS first",
                "unnest(list_value(feb, may)) AS second",
            ]
        );
        assert_eq!(
            result.filter.map(|f| f.to_string()),
            Some("((first IS NOT NULL) AND (second IS NOT NULL))".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_count_mismatches_are_shape_errors() {
        let mut unpivot = PivotRef::unpivot(
            TableReference::table("monthly"),
            "quarter",
            &["first"],
            vec![PivotColumnEntry::columns(&["jan", "feb"], None)],
        );
        let err = rewrite(&unpivot, &["jan", "feb"]).unwrap_err();
        assert!(matches!(err, PrismError::Shape(_)));
        assert!(err.to_string().contains("got 1 names but 2 expressions"));

        unpivot.pivots[0].entries.push(PivotColumnEntry::columns(&["jan"], None));
        let err = rewrite(&unpivot, &["jan", "feb"]).unwrap_err();
        assert!(err.to_string().contains("entry has 1 values, but expected all entries to have 2"));
    }
}
