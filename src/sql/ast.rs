//! Abstract Syntax Tree (AST) for SELECT queries and PIVOT/UNPIVOT references
//!
//! The binder consumes these trees, and the pivot rewrite produces them: every
//! stage of a rewritten PIVOT is an ordinary [`SelectStatement`] whose FROM
//! clause owns the previous stage.

use crate::types::{LogicalType, Value};
use serde::{Deserialize, Serialize};

/// SELECT statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectStatement {
    pub select_list: Vec<SelectItem>,
    pub from: Option<Box<TableReference>>,
    pub where_clause: Option<Box<Expression>>,
    /// GROUP BY expressions; integer literals are 1-based select list ordinals
    pub group_by: Vec<Expression>,
    pub order_by: Vec<OrderByExpression>,
}

impl SelectStatement {
    /// `SELECT * FROM <from>`
    pub fn star_from(from: TableReference) -> Self {
        Self {
            select_list: vec![SelectItem::Wildcard],
            from: Some(Box::new(from)),
            ..Default::default()
        }
    }

    /// Append a select item and return its 1-based position
    pub fn push_item(&mut self, item: SelectItem) -> usize {
        self.select_list.push(item);
        self.select_list.len()
    }

    /// Append a select item and group by its position
    pub fn push_group(&mut self, item: SelectItem) {
        let ordinal = self.push_item(item);
        self.group_by.push(Expression::Literal(Value::Integer(ordinal as i32)));
    }
}

/// SELECT list item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Expression(Expression),
    QualifiedWildcard(String), // table.*
    Wildcard,                  // *
    Alias(Box<Expression>, String),
}

impl SelectItem {
    pub fn aliased(expression: Expression, alias: impl Into<String>) -> Self {
        SelectItem::Alias(Box::new(expression), alias.into())
    }

    /// The expression of a non-star item
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            SelectItem::Expression(expr) => Some(expr),
            SelectItem::Alias(expr, _) => Some(expr),
            SelectItem::Wildcard | SelectItem::QualifiedWildcard(_) => None,
        }
    }
}

/// Table reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableReference {
    Table {
        name: String,
        alias: Option<String>,
    },
    Subquery {
        subquery: Box<SelectStatement>,
        alias: Option<String>,
        #[serde(default)]
        column_aliases: Vec<String>,
    },
    Pivot(Box<PivotRef>),
}

impl TableReference {
    pub fn table(name: impl Into<String>) -> Self {
        TableReference::Table {
            name: name.into(),
            alias: None,
        }
    }

    /// Wrap a select statement as an anonymous derived table
    pub fn subquery(subquery: SelectStatement) -> Self {
        TableReference::Subquery {
            subquery: Box::new(subquery),
            alias: None,
            column_aliases: Vec::new(),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            TableReference::Table { alias, .. } | TableReference::Subquery { alias, .. } => {
                alias.as_deref()
            }
            TableReference::Pivot(pivot) => pivot.alias.as_deref(),
        }
    }
}

/// ORDER BY expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpression {
    pub expression: Expression,
    pub ascending: bool,
}

/// Expression AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    ColumnReference {
        table: Option<String>,
        column: String,
    },
    FunctionCall {
        name: String,
        arguments: Vec<Expression>,
        #[serde(default)]
        distinct: bool,
    },
    WindowFunction {
        name: String,
        arguments: Vec<Expression>,
        window_spec: WindowSpec,
    },
    Cast {
        expression: Box<Expression>,
        data_type: LogicalType,
    },
    Subquery(Box<SelectStatement>),
    Exists(Box<SelectStatement>),
    IsNull(Box<Expression>),
    IsNotNull(Box<Expression>),
    Binary {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        expression: Box<Expression>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Minus,
    Not,
}

/// Window specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSpec {
    pub partition_by: Vec<Expression>,
    pub order_by: Vec<OrderByExpression>,
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::ColumnReference {
            table: None,
            column: name.into(),
        }
    }

    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expression::ColumnReference {
            table: Some(table.into()),
            column: name.into(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn function(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            name: name.into(),
            arguments,
            distinct: false,
        }
    }

    pub fn is_not_null(expression: Expression) -> Self {
        Expression::IsNotNull(Box::new(expression))
    }

    pub fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary(left, BinaryOperator::And, right)
    }

    /// Direct children of this expression. Subquery bodies are not
    /// expressions and are not returned.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_)
            | Expression::ColumnReference { .. }
            | Expression::Subquery(_)
            | Expression::Exists(_) => vec![],
            Expression::FunctionCall { arguments, .. } => arguments.iter().collect(),
            Expression::WindowFunction {
                arguments,
                window_spec,
                ..
            } => arguments
                .iter()
                .chain(window_spec.partition_by.iter())
                .chain(window_spec.order_by.iter().map(|o| &o.expression))
                .collect(),
            Expression::Cast { expression, .. }
            | Expression::IsNull(expression)
            | Expression::IsNotNull(expression)
            | Expression::Unary { expression, .. } => vec![expression],
            Expression::Binary { left, right, .. } => vec![left, right],
        }
    }

    /// Whether this expression or any descendant satisfies `predicate`
    pub fn any(&self, predicate: &dyn Fn(&Expression) -> bool) -> bool {
        predicate(self) || self.children().into_iter().any(|child| child.any(predicate))
    }

    pub fn has_subquery(&self) -> bool {
        self.any(&|e| matches!(e, Expression::Subquery(_) | Expression::Exists(_)))
    }

    pub fn is_window(&self) -> bool {
        self.any(&|e| matches!(e, Expression::WindowFunction { .. }))
    }
}

/// `*` or `rel.*` with an optional EXCLUDE list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarExpression {
    pub relation: Option<String>,
    pub exclude: Vec<String>,
}

/// PIVOT / UNPIVOT table reference
///
/// A reference with aggregates is a PIVOT; one without is an UNPIVOT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRef {
    pub source: Box<TableReference>,
    #[serde(default)]
    pub aggregates: Vec<PivotAggregate>,
    /// UNPIVOT destination (value) column names
    #[serde(default)]
    pub unpivot_names: Vec<String>,
    pub pivots: Vec<PivotColumn>,
    /// Explicit row/group columns of a PIVOT
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub column_aliases: Vec<String>,
    #[serde(default)]
    pub include_nulls: bool,
    #[serde(default)]
    pub alias: Option<String>,
}

impl PivotRef {
    pub fn new(source: TableReference) -> Self {
        Self {
            source: Box::new(source),
            aggregates: Vec::new(),
            unpivot_names: Vec::new(),
            pivots: Vec::new(),
            groups: Vec::new(),
            column_aliases: Vec::new(),
            include_nulls: false,
            alias: None,
        }
    }

    pub fn with_aggregate(mut self, expression: Expression, alias: Option<&str>) -> Self {
        self.aggregates.push(PivotAggregate {
            expression,
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn with_pivot(mut self, pivot: PivotColumn) -> Self {
        self.pivots.push(pivot);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn into_table_ref(self) -> TableReference {
        TableReference::Pivot(Box::new(self))
    }

    /// UNPIVOT shorthand: `<source> UNPIVOT (<values> FOR <name> IN (<entries>))`
    pub fn unpivot(
        source: TableReference,
        name_column: impl Into<String>,
        value_columns: &[&str],
        entries: Vec<PivotColumnEntry>,
    ) -> Self {
        let mut unpivot = Self::new(source);
        unpivot.unpivot_names = value_columns.iter().map(|s| s.to_string()).collect();
        unpivot.pivots.push(PivotColumn {
            pivot_expressions: Vec::new(),
            unpivot_names: vec![name_column.into()],
            entries,
            pivot_enum: None,
        });
        unpivot
    }

    pub fn is_pivot(&self) -> bool {
        !self.aggregates.is_empty()
    }
}

/// Aggregate computed for every pivot value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotAggregate {
    pub expression: Expression,
    #[serde(default)]
    pub alias: Option<String>,
}

/// One `<keys> IN (<entries>)` clause
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotColumn {
    pub pivot_expressions: Vec<Expression>,
    pub unpivot_names: Vec<String>,
    pub entries: Vec<PivotColumnEntry>,
    /// Name of an ENUM type whose members become the entries
    pub pivot_enum: Option<String>,
}

impl PivotColumn {
    /// `<column> IN (<values>)` with unaliased single-value entries
    pub fn on(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            pivot_expressions: vec![Expression::column(column)],
            entries: values.into_iter().map(PivotColumnEntry::value).collect(),
            ..Default::default()
        }
    }

    /// `<column> IN <enum type>`
    pub fn on_enum(column: impl Into<String>, enum_name: impl Into<String>) -> Self {
        Self {
            pivot_expressions: vec![Expression::column(column)],
            pivot_enum: Some(enum_name.into()),
            ..Default::default()
        }
    }
}

/// One IN-list entry: a value tuple, or a star for UNPIVOT
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotColumnEntry {
    pub values: Vec<Value>,
    pub star: Option<StarExpression>,
    pub alias: Option<String>,
}

impl PivotColumnEntry {
    pub fn value(value: Value) -> Self {
        Self {
            values: vec![value],
            ..Default::default()
        }
    }

    pub fn tuple(values: Vec<Value>, alias: Option<&str>) -> Self {
        Self {
            values,
            star: None,
            alias: alias.map(str::to_string),
        }
    }

    /// UNPIVOT entry naming one or more source columns
    pub fn columns(columns: &[&str], alias: Option<&str>) -> Self {
        Self::tuple(columns.iter().map(|c| Value::varchar(*c)).collect(), alias)
    }

    pub fn star(star: StarExpression) -> Self {
        Self {
            star: Some(star),
            ..Default::default()
        }
    }
}
