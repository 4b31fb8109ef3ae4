//! End-to-end tests: catalog definition → CSV load → PIVOT → CSV output
//!
//! Mirrors what the `prism-pivot run` command does, using temporary files.

use pretty_assertions::assert_eq;
use prism_pivot::sql::BinaryOperator;
use prism_pivot::{
    CatalogDefinition, Database, Expression, PivotColumn, PivotRef, PrismResult, SelectItem,
    SelectStatement, TableReference, Value,
};
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "enums": [{"name": "quarter", "values": ["Q1", "Q2", "Q3", "Q4"]}],
    "tables": [{"name": "sales", "columns": [
        {"name": "year", "type": "Integer"},
        {"name": "quarter", "type": "Varchar"},
        {"name": "revenue", "type": "Integer"}
    ]}]
}"#;

fn load(dir: &TempDir) -> PrismResult<Database> {
    let definition: CatalogDefinition = serde_json::from_str(CATALOG)?;
    let db = Database::from_definition(&definition)?;

    let path = dir.path().join("sales.csv");
    // columns in a different order than the table, with an empty revenue
    fs::write(
        &path,
        "quarter,year,revenue\nQ1,2020,100\nQ2,2020,150\nQ1,2021,200\nQ4,2021,\n",
    )?;
    assert_eq!(db.load_csv("sales", &path)?, 4);
    Ok(db)
}

#[test]
fn test_csv_pivot_to_csv() -> PrismResult<()> {
    let dir = TempDir::new()?;
    let db = load(&dir)?;
    let pivot: PivotRef = serde_json::from_str(
        r#"{
            "source": {"Table": {"name": "sales", "alias": null}},
            "aggregates": [{"expression": {"FunctionCall": {
                "name": "sum",
                "arguments": [{"ColumnReference": {"table": null, "column": "revenue"}}],
                "distinct": false
            }}}],
            "pivots": [{
                "pivot_expressions": [{"ColumnReference": {"table": null, "column": "quarter"}}],
                "pivot_enum": "quarter"
            }]
        }"#,
    )?;
    let result = db.execute(&SelectStatement::star_from(pivot.into_table_ref()))?;

    let mut out = Vec::new();
    result.write_csv(&mut out)?;
    assert_eq!(
        String::from_utf8_lossy(&out),
        "year,Q1,Q2,Q3,Q4\n2020,100,150,,\n2021,200,,,\n"
    );
    Ok(())
}

#[test]
fn test_csv_with_missing_column_is_rejected() -> PrismResult<()> {
    let dir = TempDir::new()?;
    let db = load(&dir)?;
    let path = dir.path().join("bad.csv");
    fs::write(&path, "year,month,revenue\n2020,1,5\n")?;
    let err = db.load_csv("sales", &path).unwrap_err();
    assert!(err.to_string().contains("has no column \"quarter\""));
    assert_eq!(db.catalog().get_table("sales")?.read().row_count(), 4);
    Ok(())
}

#[test]
fn test_correlated_subquery_over_loaded_table() -> PrismResult<()> {
    let dir = TempDir::new()?;
    let db = load(&dir)?;

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
    outer.push_item(SelectItem::Expression(Expression::column("quarter")));
    outer.push_item(SelectItem::aliased(Expression::Subquery(Box::new(inner)), "best"));

    let result = db.execute(&outer)?;
    assert_eq!(
        result.column("best")?,
        vec![
            Value::Integer(150),
            Value::Integer(150),
            Value::Integer(200),
            Value::Integer(200)
        ]
    );
    Ok(())
}

#[test]
fn test_explain_shows_rewritten_plan() -> PrismResult<()> {
    let dir = TempDir::new()?;
    let db = load(&dir)?;
    let pivot = PivotRef::new(TableReference::table("sales"))
        .with_aggregate(Expression::function("sum", vec![Expression::column("revenue")]), None)
        .with_pivot(PivotColumn::on("quarter", vec!["Q1".into()]));
    let plan = db.explain(&SelectStatement::star_from(pivot.into_table_ref()))?;
    assert_eq!(plan.matches("AGGREGATE").count(), 2);
    assert!(plan.contains("map_extract("));
    Ok(())
}
