//! Integration tests for the binder and the PIVOT rewrite

#[cfg(test)]
mod tests {
    use crate::catalog::{Catalog, ColumnInfo, TableInfo};
    use crate::common::config::BinderConfig;
    use crate::common::error::{PrismError, PrismResult};
    use crate::planner::{Binder, LogicalPlan};
    use crate::sql::*;
    use crate::types::{LogicalType, Value};
    use pretty_assertions::assert_eq;

    fn catalog() -> PrismResult<Catalog> {
        let catalog = Catalog::new();
        catalog.create_table(&TableInfo::new(
            "sales",
            vec![
                ColumnInfo::new("year", LogicalType::Integer),
                ColumnInfo::new("quarter", LogicalType::Varchar),
                ColumnInfo::new("revenue", LogicalType::Integer),
            ],
        ))?;
        catalog.create_table(&TableInfo::new(
            "monthly",
            vec![
                ColumnInfo::new("id", LogicalType::Integer),
                ColumnInfo::new("jan", LogicalType::Integer),
                ColumnInfo::new("feb", LogicalType::Integer),
                ColumnInfo::new("mar", LogicalType::Integer),
            ],
        ))?;
        Ok(catalog)
    }

    fn sales_pivot() -> PivotRef {
        PivotRef::new(TableReference::table("sales"))
            .with_aggregate(
                Expression::function("sum", vec![Expression::column("revenue")]),
                None,
            )
            .with_pivot(PivotColumn::on(
                "quarter",
                vec![Value::varchar("Q1"), Value::varchar("Q2")],
            ))
    }

    fn bind(catalog: &Catalog, select: &SelectStatement) -> PrismResult<crate::planner::BoundQueryNode> {
        let mut binder = Binder::new(catalog, BinderConfig::default());
        binder.bind_select(select)
    }

    #[test]
    fn test_select_with_where() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement::star_from(TableReference::table("sales"));
        select.where_clause = Some(Box::new(Expression::binary(
            Expression::column("year"),
            BinaryOperator::GreaterThan,
            Expression::literal(2020),
        )));
        let node = bind(&catalog, &select)?;
        assert_eq!(node.names, vec!["year", "quarter", "revenue"]);

        match &node.plan {
            LogicalPlan::Projection(projection) => match projection.input.as_ref() {
                LogicalPlan::Filter(filter) => {
                    assert!(matches!(filter.input.as_ref(), LogicalPlan::Get(get) if get.table_name == "sales"));
                }
                other => panic!("Expected Filter, got {}", other),
            },
            other => panic!("Expected Projection, got {}", other),
        }
        Ok(())
    }

    #[test]
    fn test_group_by_ordinal() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement {
            from: Some(Box::new(TableReference::table("sales"))),
            ..Default::default()
        };
        select.push_group(SelectItem::Expression(Expression::column("year")));
        select.push_item(SelectItem::aliased(
            Expression::function("sum", vec![Expression::column("revenue")]),
            "total",
        ));
        let node = bind(&catalog, &select)?;
        assert_eq!(node.names, vec!["year", "total"]);
        assert_eq!(node.types, vec![LogicalType::Integer, LogicalType::BigInt]);

        let LogicalPlan::Projection(projection) = &node.plan else {
            panic!("Expected Projection");
        };
        let LogicalPlan::Aggregate(aggregate) = projection.input.as_ref() else {
            panic!("Expected Aggregate");
        };
        assert_eq!(aggregate.groups.len(), 1);
        assert_eq!(aggregate.aggregates.len(), 1);
        Ok(())
    }

    #[test]
    fn test_ungrouped_column_is_rejected() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement {
            from: Some(Box::new(TableReference::table("sales"))),
            ..Default::default()
        };
        select.push_group(SelectItem::Expression(Expression::column("year")));
        select.push_item(SelectItem::Expression(Expression::column("quarter")));
        let err = bind(&catalog, &select).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Binder error: column \"quarter\" must appear in the GROUP BY clause or must be part of an aggregate function"
        );
        Ok(())
    }

    #[test]
    fn test_unknown_column() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement {
            from: Some(Box::new(TableReference::table("sales"))),
            ..Default::default()
        };
        select.push_item(SelectItem::Expression(Expression::column("month")));
        assert!(matches!(bind(&catalog, &select), Err(PrismError::Binder(_))));
        Ok(())
    }

    #[test]
    fn test_bind_pivot() -> PrismResult<()> {
        let catalog = catalog()?;
        let select = SelectStatement::star_from(sales_pivot().into_table_ref());
        let node = bind(&catalog, &select)?;
        assert_eq!(node.names, vec!["year", "Q1", "Q2"]);
        assert_eq!(
            node.types,
            vec![LogicalType::Integer, LogicalType::BigInt, LogicalType::BigInt]
        );
        Ok(())
    }

    #[test]
    fn test_pivot_alias_and_column_aliases() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut pivot = sales_pivot().with_alias("p");
        pivot.column_aliases = vec!["y".into()];
        let mut select = SelectStatement {
            from: Some(Box::new(pivot.clone().into_table_ref())),
            ..Default::default()
        };
        select.push_item(SelectItem::Expression(Expression::qualified_column("p", "y")));
        select.push_item(SelectItem::Expression(Expression::column("Q2")));
        let node = bind(&catalog, &select)?;
        assert_eq!(node.names, vec!["y", "Q2"]);

        pivot.column_aliases = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let select = SelectStatement::star_from(pivot.into_table_ref());
        let err = bind(&catalog, &select).unwrap_err();
        assert!(err.to_string().contains("has 3 columns available but 4 columns specified"));
        Ok(())
    }

    #[test]
    fn test_subquery_source_gets_internal_alias() -> PrismResult<()> {
        let catalog = catalog()?;
        let source = TableReference::subquery(SelectStatement::star_from(TableReference::table("sales")));
        let mut pivot = sales_pivot();
        pivot.source = Box::new(source);

        let binder = Binder::new(&catalog, BinderConfig::default());
        let rewrite = binder.plan_pivot_rewrite(&pivot)?;
        assert_eq!(rewrite.alias, "__unnamed_pivot");

        let mut stage = &rewrite.select;
        while let Some(TableReference::Subquery { subquery, alias, .. }) = stage.from.as_deref() {
            if alias.is_some() {
                assert_eq!(alias.as_deref(), Some("__internal_pivot_alias_1"));
                return Ok(());
            }
            stage = &**subquery;
        }
        panic!("source alias not found in {}", rewrite.select);
    }

    #[test]
    fn test_pivot_limit_from_config() -> PrismResult<()> {
        let catalog = catalog()?;
        let select = SelectStatement::star_from(sales_pivot().into_table_ref());
        let mut binder = Binder::new(&catalog, BinderConfig { pivot_limit: 2 });
        let err = binder.bind_select(&select).unwrap_err();
        assert!(err.to_string().contains("Pivot column limit of 2 exceeded"));
        Ok(())
    }

    #[test]
    fn test_bind_unpivot_wraps_filter() -> PrismResult<()> {
        let catalog = catalog()?;
        let unpivot = PivotRef::unpivot(
            TableReference::table("monthly"),
            "month",
            &["amount"],
            vec![
                PivotColumnEntry::columns(&["jan"], None),
                PivotColumnEntry::columns(&["feb"], None),
                PivotColumnEntry::columns(&["mar"], None),
            ],
        );
        let node = bind(&catalog, &SelectStatement::star_from(unpivot.into_table_ref()))?;
        assert_eq!(node.names, vec!["id", "month", "amount"]);
        assert_eq!(
            node.types,
            vec![LogicalType::Integer, LogicalType::Varchar, LogicalType::Integer]
        );

        let LogicalPlan::Projection(outer) = &node.plan else {
            panic!("Expected Projection");
        };
        let LogicalPlan::Projection(filtered) = outer.input.as_ref() else {
            panic!("Expected the filtering projection");
        };
        assert!(matches!(filtered.input.as_ref(), LogicalPlan::Filter(_)));
        Ok(())
    }

    #[test]
    fn test_correlated_subquery() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut inner = SelectStatement {
            from: Some(Box::new(TableReference::Table {
                name: "sales".into(),
                alias: Some("s2".into()),
            })),
            ..Default::default()
        };
        inner.push_item(SelectItem::Expression(Expression::function(
            "max",
            vec![Expression::qualified_column("s2", "revenue")],
        )));
        inner.where_clause = Some(Box::new(Expression::binary(
            Expression::qualified_column("s2", "year"),
            BinaryOperator::Equals,
            Expression::qualified_column("s", "year"),
        )));

        let mut outer = SelectStatement {
            from: Some(Box::new(TableReference::Table {
                name: "sales".into(),
                alias: Some("s".into()),
            })),
            ..Default::default()
        };
        outer.push_item(SelectItem::Expression(Expression::column("year")));
        outer.push_item(SelectItem::aliased(Expression::Subquery(Box::new(inner.clone())), "best"));

        let mut binder = Binder::new(&catalog, BinderConfig::default());
        let node = binder.bind_select(&outer)?;
        assert_eq!(node.types[1], LogicalType::Integer);
        assert!(binder.correlated_columns.is_empty());

        // bound on its own the inner query cannot see "s"
        let err = bind(&catalog, &inner).unwrap_err();
        assert!(err.to_string().contains("Referenced table \"s\" not found"));
        Ok(())
    }

    #[test]
    fn test_scalar_subquery_must_return_one_column() -> PrismResult<()> {
        let catalog = catalog()?;
        let mut select = SelectStatement::default();
        select.push_item(SelectItem::Expression(Expression::Subquery(Box::new(
            SelectStatement::star_from(TableReference::table("sales")),
        ))));
        let err = bind(&catalog, &select).unwrap_err();
        assert!(err.to_string().contains("Subquery returns 3 columns - expected 1"));
        Ok(())
    }
}
