//! End-to-end UNPIVOT tests, including a PIVOT → UNPIVOT round trip

use pretty_assertions::assert_eq;
use prism_pivot::sql::OrderByExpression;
use prism_pivot::{
    ColumnInfo, Database, Expression, LogicalType, PivotColumn, PivotColumnEntry, PivotRef,
    PrismError, PrismResult, SelectItem, SelectStatement, StarExpression, TableReference, Value,
};

fn monthly_db() -> PrismResult<Database> {
    let db = Database::new();
    db.create_table(
        "monthly",
        vec![
            ColumnInfo::new("id", LogicalType::Integer),
            ColumnInfo::new("jan", LogicalType::Integer),
            ColumnInfo::new("feb", LogicalType::Integer),
            ColumnInfo::new("mar", LogicalType::Integer),
        ],
    )?;
    db.insert_rows(
        "monthly",
        vec![
            vec![1.into(), 10.into(), Value::Null, 30.into()],
            vec![2.into(), Value::Null, Value::Null, Value::Null],
        ],
    )?;
    Ok(db)
}

fn months() -> Vec<PivotColumnEntry> {
    ["jan", "feb", "mar"]
        .iter()
        .map(|m| PivotColumnEntry::columns(&[*m], None))
        .collect()
}

fn row(id: i32, month: &str, amount: Option<i32>) -> Vec<Value> {
    vec![id.into(), month.into(), amount.into()]
}

#[test]
fn test_unpivot_excludes_nulls() -> PrismResult<()> {
    let db = monthly_db()?;
    let unpivot = PivotRef::unpivot(TableReference::table("monthly"), "month", &["amount"], months());
    let result = db.execute(&SelectStatement::star_from(unpivot.into_table_ref()))?;
    assert_eq!(result.names, vec!["id", "month", "amount"]);
    assert_eq!(
        result.types,
        vec![LogicalType::Integer, LogicalType::Varchar, LogicalType::Integer]
    );
    assert_eq!(result.rows, vec![row(1, "jan", Some(10)), row(1, "mar", Some(30))]);
    Ok(())
}

#[test]
fn test_unpivot_include_nulls() -> PrismResult<()> {
    let db = monthly_db()?;
    let mut unpivot = PivotRef::unpivot(TableReference::table("monthly"), "month", &["amount"], months());
    unpivot.include_nulls = true;
    let result = db.execute(&SelectStatement::star_from(unpivot.into_table_ref()))?;
    assert_eq!(
        result.rows,
        vec![
            row(1, "jan", Some(10)),
            row(1, "feb", None),
            row(1, "mar", Some(30)),
            row(2, "jan", None),
            row(2, "feb", None),
            row(2, "mar", None),
        ]
    );
    Ok(())
}

#[test]
fn test_star_entry_expands_remaining_columns() -> PrismResult<()> {
    let db = monthly_db()?;
    let star = StarExpression {
        relation: None,
        exclude: vec!["id".into()],
    };
    let unpivot = PivotRef::unpivot(
        TableReference::table("monthly"),
        "month",
        &["amount"],
        vec![PivotColumnEntry::star(star)],
    );
    let sql = db.rewrite(&unpivot)?;
    assert!(sql.contains("unnest(['jan', 'feb', 'mar']) AS month"));

    let result = db.execute(&SelectStatement::star_from(unpivot.into_table_ref()))?;
    assert_eq!(result.names, vec!["id", "month", "amount"]);
    assert_eq!(result.row_count(), 2);
    Ok(())
}

#[test]
fn test_star_excluding_every_column_is_an_error() -> PrismResult<()> {
    let db = Database::new();
    db.create_table(
        "t",
        vec![
            ColumnInfo::new("a", LogicalType::Integer),
            ColumnInfo::new("b", LogicalType::Integer),
        ],
    )?;
    let star = StarExpression {
        relation: None,
        exclude: vec!["a".into(), "b".into()],
    };
    let unpivot = PivotRef::unpivot(
        TableReference::table("t"),
        "name",
        &["value"],
        vec![PivotColumnEntry::star(star)],
    );
    let err = db
        .execute(&SelectStatement::star_from(unpivot.into_table_ref()))
        .unwrap_err();
    assert!(matches!(err, PrismError::Binder(_)));
    assert!(err.to_string().contains("UNPIVOT IN list cannot be empty"));
    Ok(())
}

#[test]
fn test_multiple_value_columns() -> PrismResult<()> {
    let db = monthly_db()?;
    let mut unpivot = PivotRef::unpivot(
        TableReference::table("monthly"),
        "pair",
        &["first", "second"],
        vec![PivotColumnEntry::columns(&["jan", "feb"], Some("early"))],
    );
    unpivot.include_nulls = true;
    let result = db.execute(&SelectStatement::star_from(unpivot.into_table_ref()))?;
    assert_eq!(result.names, vec!["id", "mar", "pair", "first", "second"]);
    assert_eq!(
        result.rows[0],
        vec![1.into(), 30.into(), "early".into(), 10.into(), Value::Null]
    );
    Ok(())
}

#[test]
fn test_unpivot_shape_errors() -> PrismResult<()> {
    let db = monthly_db()?;
    let names = PivotRef::unpivot(TableReference::table("monthly"), "month", &["a", "b"], months());
    let err = db.rewrite(&names).unwrap_err();
    assert!(matches!(err, PrismError::Shape(_)));
    assert!(err
        .to_string()
        .contains("UNPIVOT name count mismatch - got 2 names but 1 expressions"));

    let values = PivotRef::unpivot(
        TableReference::table("monthly"),
        "month",
        &["amount"],
        vec![
            PivotColumnEntry::columns(&["jan", "feb"], None),
            PivotColumnEntry::columns(&["mar"], None),
        ],
    );
    assert!(matches!(db.rewrite(&values), Err(PrismError::Shape(_))));
    Ok(())
}

#[test]
fn test_unpivot_unknown_columns() -> PrismResult<()> {
    let db = monthly_db()?;
    let unpivot = PivotRef::unpivot(
        TableReference::table("monthly"),
        "month",
        &["amount"],
        vec![
            PivotColumnEntry::columns(&["jan"], None),
            PivotColumnEntry::columns(&["apr"], None),
        ],
    );
    let err = db.rewrite(&unpivot).unwrap_err();
    assert!(err
        .to_string()
        .contains("Column \"apr\" referenced in UNPIVOT but no matching entry was found in the table"));
    Ok(())
}

#[test]
fn test_unpivot_result_can_be_filtered_and_projected() -> PrismResult<()> {
    let db = monthly_db()?;
    let unpivot = PivotRef::unpivot(TableReference::table("monthly"), "month", &["amount"], months())
        .with_alias("u");
    let mut select = SelectStatement {
        from: Some(Box::new(unpivot.into_table_ref())),
        ..Default::default()
    };
    select.push_item(SelectItem::Expression(Expression::qualified_column("u", "month")));
    select.where_clause = Some(Box::new(Expression::binary(
        Expression::column("amount"),
        prism_pivot::sql::BinaryOperator::GreaterThan,
        Expression::literal(15),
    )));
    let result = db.execute(&select)?;
    assert_eq!(result.rows, vec![vec![Value::varchar("mar")]]);
    Ok(())
}

#[test]
fn test_pivot_then_unpivot_round_trip() -> PrismResult<()> {
    let db = Database::new();
    db.create_table(
        "sales",
        vec![
            ColumnInfo::new("year", LogicalType::Integer),
            ColumnInfo::new("quarter", LogicalType::Varchar),
            ColumnInfo::new("revenue", LogicalType::Integer),
        ],
    )?;
    db.insert_rows(
        "sales",
        vec![
            vec![2020.into(), "Q1".into(), 100.into()],
            vec![2020.into(), "Q2".into(), 150.into()],
            vec![2021.into(), "Q1".into(), 200.into()],
            vec![2021.into(), "Q3".into(), 80.into()],
        ],
    )?;

    let pivot = PivotRef::new(TableReference::table("sales"))
        .with_aggregate(Expression::function("sum", vec![Expression::column("revenue")]), None)
        .with_pivot(PivotColumn::on(
            "quarter",
            vec!["Q1".into(), "Q2".into(), "Q3".into()],
        ));
    let unpivot = PivotRef::unpivot(
        pivot.into_table_ref(),
        "quarter",
        &["revenue"],
        ["Q1", "Q2", "Q3"]
            .iter()
            .map(|q| PivotColumnEntry::columns(&[*q], None))
            .collect(),
    );

    let mut select = SelectStatement::star_from(unpivot.into_table_ref());
    for column in ["year", "quarter"] {
        select.order_by.push(OrderByExpression {
            expression: Expression::column(column),
            ascending: true,
        });
    }
    let result = db.execute(&select)?;
    assert_eq!(result.names, vec!["year", "quarter", "revenue"]);
    assert_eq!(
        result.rows,
        vec![
            vec![2020.into(), "Q1".into(), Value::BigInt(100)],
            vec![2020.into(), "Q2".into(), Value::BigInt(150)],
            vec![2021.into(), "Q1".into(), Value::BigInt(200)],
            vec![2021.into(), "Q3".into(), Value::BigInt(80)],
        ]
    );
    Ok(())
}
