//! Query Binder
//!
//! The binder resolves names against the catalog and the relations in scope,
//! type-checks expressions and turns a [`SelectStatement`] into a
//! [`BoundQueryNode`]. Subqueries (derived tables, scalar and EXISTS
//! subqueries, and the synthetic trees of a PIVOT rewrite) are bound by child
//! binders chained to their parent, so a reference that cannot be resolved
//! locally is looked up in the enclosing scopes and recorded as correlated.

use crate::catalog::Catalog;
use crate::common::config::BinderConfig;
use crate::common::error::PrismResult;
use crate::planner::bind_context::{BindContext, ResolvedColumn};
use crate::planner::expression::*;
use crate::planner::functions::{aggregate_return_type, is_aggregate_function, scalar_return_type};
use crate::planner::logical_plan::*;
use crate::sql::*;
use crate::types::{LogicalType, TypeUtils, Value};
use crate::{binder_err, not_implemented_err};
use std::cell::Cell;
use std::rc::Rc;

const UNNAMED_SUBQUERY_ALIAS: &str = "unnamed_subquery";

/// Query binder for one scope
pub struct Binder<'a> {
    catalog: &'a Catalog,
    config: BinderConfig,
    parent: Option<&'a Binder<'a>>,
    pub bind_context: BindContext,
    /// Columns of enclosing scopes referenced from this scope or its children
    pub correlated_columns: Vec<CorrelatedColumnInfo>,
    /// Shared by the whole binder tree so table indexes are unique per statement
    next_table_index: Rc<Cell<usize>>,
    next_alias_index: Rc<Cell<usize>>,
}

/// State of a grouped SELECT while its select list is bound
struct AggregateScope<'g> {
    groups: &'g [BoundExpression],
    group_index: usize,
    aggregate_index: usize,
    aggregates: Vec<BoundAggregate>,
}

impl AggregateScope<'_> {
    fn find_group(&self, bound: &BoundExpression) -> Option<BoundExpression> {
        let index = self.groups.iter().position(|g| g == bound)?;
        let name = match bound {
            BoundExpression::ColumnRef { name, .. } => name.clone(),
            other => other.to_string(),
        };
        Some(BoundExpression::column_ref(
            name,
            ColumnBinding::new(self.group_index, index),
            bound.return_type(),
        ))
    }
}

enum SelectEntry {
    Expression { expression: Expression, name: String },
    Column(ResolvedColumn),
}

impl SelectEntry {
    fn name(&self) -> &str {
        match self {
            SelectEntry::Expression { name, .. } => name,
            SelectEntry::Column(column) => &column.name,
        }
    }

    fn contains_aggregate(&self) -> bool {
        match self {
            SelectEntry::Expression { expression, .. } => contains_aggregate(expression),
            SelectEntry::Column(_) => false,
        }
    }
}

fn contains_aggregate(expression: &Expression) -> bool {
    expression.any(&|e| {
        matches!(e, Expression::FunctionCall { name, .. } if is_aggregate_function(name))
    })
}

fn as_ordinal(expression: &Expression) -> Option<i64> {
    match expression {
        Expression::Literal(Value::Integer(v)) => Some(*v as i64),
        Expression::Literal(Value::BigInt(v)) => Some(*v),
        _ => None,
    }
}

fn is_unnest(name: &str) -> bool {
    name.eq_ignore_ascii_case("unnest")
}

/// Replace leading column names by user supplied aliases
pub(crate) fn apply_column_aliases(
    alias: &str,
    mut names: Vec<String>,
    column_aliases: &[String],
) -> PrismResult<Vec<String>> {
    if column_aliases.len() > names.len() {
        return Err(binder_err!(
            "table \"{}\" has {} columns available but {} columns specified",
            alias,
            names.len(),
            column_aliases.len()
        ));
    }
    for (name, column_alias) in names.iter_mut().zip(column_aliases) {
        *name = column_alias.clone();
    }
    Ok(names)
}

impl<'a> Binder<'a> {
    pub fn new(catalog: &'a Catalog, config: BinderConfig) -> Self {
        Self {
            catalog,
            config,
            parent: None,
            bind_context: BindContext::new(),
            correlated_columns: Vec::new(),
            next_table_index: Rc::new(Cell::new(0)),
            next_alias_index: Rc::new(Cell::new(0)),
        }
    }

    /// A fresh scope chained to this one
    pub fn child(&self) -> Binder<'_> {
        Binder {
            catalog: self.catalog,
            config: self.config,
            parent: Some(self),
            bind_context: BindContext::new(),
            correlated_columns: Vec::new(),
            next_table_index: Rc::clone(&self.next_table_index),
            next_alias_index: Rc::clone(&self.next_alias_index),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn config(&self) -> BinderConfig {
        self.config
    }

    pub fn generate_table_index(&self) -> usize {
        let index = self.next_table_index.get();
        self.next_table_index.set(index + 1);
        index
    }

    /// Next number for generated relation aliases (starts at 1)
    pub(crate) fn generate_alias_index(&self) -> usize {
        let index = self.next_alias_index.get() + 1;
        self.next_alias_index.set(index);
        index
    }

    /// Take over correlated columns reported by a finished child binder.
    /// Entries that resolve in this scope are dropped.
    pub(crate) fn add_correlated_columns(&mut self, columns: Vec<CorrelatedColumnInfo>) {
        for mut column in columns {
            if column.depth <= 1 {
                continue;
            }
            column.depth -= 1;
            if !self.correlated_columns.contains(&column) {
                self.correlated_columns.push(column);
            }
        }
    }

    /// Bind a SELECT in a child scope and merge its correlated columns
    pub(crate) fn bind_in_child(&mut self, select: &SelectStatement) -> PrismResult<BoundQueryNode> {
        let (node, correlated) = {
            let mut child = self.child();
            let node = child.bind_select(select)?;
            (node, std::mem::take(&mut child.correlated_columns))
        };
        self.add_correlated_columns(correlated);
        Ok(node)
    }

    pub fn bind_select(&mut self, select: &SelectStatement) -> PrismResult<BoundQueryNode> {
        let mut plan = match &select.from {
            Some(from) => self.bind_table_ref(from)?,
            None => LogicalPlan::DummyScan(LogicalDummyScan {
                table_index: self.generate_table_index(),
            }),
        };

        if let Some(predicate) = &select.where_clause {
            let predicate = self.bind_expr(predicate, None)?;
            let predicate_type = predicate.return_type();
            if !matches!(predicate_type, LogicalType::Boolean | LogicalType::Null) {
                return Err(binder_err!(
                    "WHERE clause must be a boolean expression, got {}",
                    predicate_type
                ));
            }
            plan = LogicalPlan::Filter(LogicalFilter::new(plan, predicate));
        }

        let entries = self.expand_select_list(&select.select_list)?;

        let mut groups = Vec::with_capacity(select.group_by.len());
        for group in &select.group_by {
            let bound = match as_ordinal(group) {
                Some(ordinal) => {
                    if ordinal < 1 || ordinal as usize > entries.len() {
                        return Err(binder_err!(
                            "GROUP BY term out of range - should be between 1 and {}",
                            entries.len()
                        ));
                    }
                    self.bind_entry(&entries[ordinal as usize - 1], None)?
                }
                None => self.bind_expr(group, None)?,
            };
            groups.push(bound);
        }

        let is_aggregate = !groups.is_empty() || entries.iter().any(SelectEntry::contains_aggregate);
        let mut scope = if is_aggregate {
            Some(AggregateScope {
                groups: &groups,
                group_index: self.generate_table_index(),
                aggregate_index: self.generate_table_index(),
                aggregates: Vec::new(),
            })
        } else {
            None
        };

        let mut unnest_index = None;
        let mut unnests = Vec::new();
        let mut expressions = Vec::with_capacity(entries.len());
        for entry in &entries {
            let bound = match entry {
                SelectEntry::Expression {
                    expression: Expression::FunctionCall { name, arguments, .. },
                    name: entry_name,
                } if is_unnest(name) => {
                    let [argument] = arguments.as_slice() else {
                        return Err(binder_err!("unnest() requires a single argument"));
                    };
                    let child = self.bind_expr(argument, scope.as_mut())?;
                    let element_type = match child.return_type() {
                        LogicalType::List(element) => *element,
                        LogicalType::Null => LogicalType::Null,
                        other => {
                            return Err(binder_err!("UNNEST requires a LIST argument, got {}", other))
                        }
                    };
                    let index = *unnest_index.get_or_insert_with(|| self.generate_table_index());
                    unnests.push(child);
                    BoundExpression::column_ref(
                        entry_name.clone(),
                        ColumnBinding::new(index, unnests.len() - 1),
                        element_type,
                    )
                }
                _ => self.bind_entry(entry, scope.as_mut())?,
            };
            expressions.push(bound);
        }

        if let Some(scope) = scope {
            let AggregateScope {
                group_index,
                aggregate_index,
                aggregates,
                ..
            } = scope;
            plan = LogicalPlan::Aggregate(LogicalAggregate {
                input: Box::new(plan),
                group_index,
                aggregate_index,
                groups,
                aggregates,
            });
        }
        if let Some(unnest_index) = unnest_index {
            plan = LogicalPlan::Unnest(LogicalUnnest {
                input: Box::new(plan),
                unnest_index,
                expressions: unnests,
            });
        }

        let root_index = self.generate_table_index();
        let names: Vec<String> = entries.iter().map(|e| e.name().to_string()).collect();
        let types: Vec<LogicalType> = expressions.iter().map(BoundExpression::return_type).collect();
        let orders = self.bind_order_by(&select.order_by, root_index, &names, &types, &expressions, is_aggregate)?;

        plan = LogicalPlan::Projection(LogicalProjection::new(plan, root_index, expressions));
        if !orders.is_empty() {
            plan = LogicalPlan::Order(LogicalOrder {
                input: Box::new(plan),
                orders,
            });
        }

        Ok(BoundQueryNode {
            root_index,
            names,
            types,
            plan,
        })
    }

    fn expand_select_list(&self, select_list: &[SelectItem]) -> PrismResult<Vec<SelectEntry>> {
        let mut entries = Vec::with_capacity(select_list.len());
        for item in select_list {
            match item {
                SelectItem::Wildcard | SelectItem::QualifiedWildcard(_) => {
                    let star = StarExpression {
                        relation: match item {
                            SelectItem::QualifiedWildcard(relation) => Some(relation.clone()),
                            _ => None,
                        },
                        exclude: Vec::new(),
                    };
                    for column in self.bind_context.expand_star(&star)? {
                        let resolved = self
                            .bind_context
                            .lookup(Some(&column.relation), &column.name)?
                            .ok_or_else(|| {
                                binder_err!("Referenced column \"{}\" not found in FROM clause!", column.name)
                            })?;
                        entries.push(SelectEntry::Column(resolved));
                    }
                }
                SelectItem::Expression(expression) => {
                    let name = match expression {
                        Expression::ColumnReference { column, .. } => column.clone(),
                        other => other.to_string(),
                    };
                    entries.push(SelectEntry::Expression {
                        expression: expression.clone(),
                        name,
                    });
                }
                SelectItem::Alias(expression, alias) => entries.push(SelectEntry::Expression {
                    expression: (**expression).clone(),
                    name: alias.clone(),
                }),
            }
        }
        Ok(entries)
    }

    fn bind_entry(
        &mut self,
        entry: &SelectEntry,
        scope: Option<&mut AggregateScope<'_>>,
    ) -> PrismResult<BoundExpression> {
        match entry {
            SelectEntry::Expression { expression, .. } => self.bind_expr(expression, scope),
            SelectEntry::Column(column) => {
                let bound = BoundExpression::column_ref(
                    column.name.clone(),
                    column.binding,
                    column.return_type.clone(),
                );
                match scope {
                    None => Ok(bound),
                    Some(scope) => scope.find_group(&bound).ok_or_else(|| {
                        binder_err!(
                            "column \"{}\" must appear in the GROUP BY clause or must be part of an aggregate function",
                            column.name
                        )
                    }),
                }
            }
        }
    }

    fn bind_order_by(
        &mut self,
        order_by: &[OrderByExpression],
        root_index: usize,
        names: &[String],
        types: &[LogicalType],
        expressions: &[BoundExpression],
        is_aggregate: bool,
    ) -> PrismResult<Vec<BoundOrder>> {
        let mut orders = Vec::with_capacity(order_by.len());
        for order in order_by {
            let index = if let Some(ordinal) = as_ordinal(&order.expression) {
                if ordinal < 1 || ordinal as usize > names.len() {
                    return Err(binder_err!(
                        "ORDER term out of range - should be between 1 and {}",
                        names.len()
                    ));
                }
                ordinal as usize - 1
            } else if let Some(index) = match &order.expression {
                Expression::ColumnReference { table: None, column } => {
                    names.iter().position(|n| n.eq_ignore_ascii_case(column))
                }
                _ => None,
            } {
                index
            } else {
                let missing = || {
                    binder_err!(
                        "ORDER BY term \"{}\" must appear in the SELECT list",
                        order.expression
                    )
                };
                if is_aggregate {
                    return Err(missing());
                }
                let bound = self.bind_expr(&order.expression, None)?;
                expressions
                    .iter()
                    .position(|e| e == &bound)
                    .ok_or_else(missing)?
            };
            orders.push(BoundOrder {
                expression: BoundExpression::column_ref(
                    names[index].clone(),
                    ColumnBinding::new(root_index, index),
                    types[index].clone(),
                ),
                ascending: order.ascending,
            });
        }
        Ok(orders)
    }

    /// Bind a FROM reference and register it in this scope
    pub fn bind_table_ref(&mut self, table_ref: &TableReference) -> PrismResult<LogicalPlan> {
        match table_ref {
            TableReference::Table { name, alias } => {
                let table = self.catalog.get_table(name)?;
                let table = table.read();
                let names: Vec<String> = table.get_columns().iter().map(|c| c.name.clone()).collect();
                let types: Vec<LogicalType> = table
                    .get_columns()
                    .iter()
                    .map(|c| c.column_type.clone())
                    .collect();
                let table_index = self.generate_table_index();
                let alias = alias.clone().unwrap_or_else(|| table.get_name().to_string());
                self.bind_context
                    .add_binding(&alias, table_index, names.clone(), types.clone())?;
                Ok(LogicalPlan::Get(LogicalGet {
                    table_index,
                    table_name: name.clone(),
                    names,
                    types,
                }))
            }
            TableReference::Subquery {
                subquery,
                alias,
                column_aliases,
            } => {
                let node = self.bind_in_child(subquery)?;
                let alias = alias
                    .clone()
                    .unwrap_or_else(|| UNNAMED_SUBQUERY_ALIAS.to_string());
                let names = apply_column_aliases(&alias, node.names, column_aliases)?;
                self.bind_context
                    .add_binding(&alias, node.root_index, names, node.types)?;
                Ok(node.plan)
            }
            TableReference::Pivot(pivot) => self.bind_pivot_ref(pivot),
        }
    }

    fn resolve_column(&mut self, table: Option<&str>, column: &str) -> PrismResult<BoundExpression> {
        if let Some(found) = self.bind_context.lookup(table, column)? {
            return Ok(BoundExpression::column_ref(found.name, found.binding, found.return_type));
        }

        let mut depth = 1;
        let mut current = self.parent;
        while let Some(binder) = current {
            if let Some(found) = binder.bind_context.lookup(table, column)? {
                let correlated = CorrelatedColumnInfo {
                    binding: found.binding,
                    name: found.name.clone(),
                    return_type: found.return_type.clone(),
                    depth,
                };
                if !self.correlated_columns.contains(&correlated) {
                    self.correlated_columns.push(correlated);
                }
                return Ok(BoundExpression::ColumnRef {
                    name: found.name,
                    binding: found.binding,
                    depth,
                    return_type: found.return_type,
                });
            }
            depth += 1;
            current = binder.parent;
        }

        match table {
            Some(table) => Err(binder_err!("Referenced table \"{}\" not found!", table)),
            None => Err(binder_err!(
                "Referenced column \"{}\" not found in FROM clause!",
                column
            )),
        }
    }

    /// Bind a scalar expression against the relations of this scope
    pub fn bind_expression(&mut self, expression: &Expression) -> PrismResult<BoundExpression> {
        self.bind_expr(expression, None)
    }

    /// Bind an expression. With an aggregate scope, aggregates are extracted
    /// into the scope and grouped expressions are replaced by group references.
    fn bind_expr(
        &mut self,
        expression: &Expression,
        mut scope: Option<&mut AggregateScope<'_>>,
    ) -> PrismResult<BoundExpression> {
        if let Some(scope) = scope.as_deref_mut() {
            if let Expression::FunctionCall {
                name,
                arguments,
                distinct,
            } = expression
            {
                if is_aggregate_function(name) {
                    return self.bind_aggregate(expression, name, arguments, *distinct, scope);
                }
            }
            if !contains_aggregate(expression) {
                let bound = self.bind_expr(expression, None)?;
                if let Some(group) = scope.find_group(&bound) {
                    return Ok(group);
                }
                if !bound.references_local_columns() {
                    return Ok(bound);
                }
                if let Expression::ColumnReference { column, .. } = expression {
                    return Err(binder_err!(
                        "column \"{}\" must appear in the GROUP BY clause or must be part of an aggregate function",
                        column
                    ));
                }
            }
        }

        match expression {
            Expression::Literal(value) => Ok(BoundExpression::Constant(value.clone())),
            Expression::ColumnReference { table, column } => {
                self.resolve_column(table.as_deref(), column)
            }
            Expression::FunctionCall {
                name,
                arguments,
                distinct,
            } => {
                if is_aggregate_function(name) {
                    return Err(binder_err!(
                        "aggregate function calls cannot be used here: {}",
                        expression
                    ));
                }
                if is_unnest(name) {
                    return Err(not_implemented_err!(
                        "UNNEST is only supported as a top-level SELECT expression"
                    ));
                }
                if *distinct {
                    return Err(binder_err!(
                        "DISTINCT is only supported for aggregate functions, not {}",
                        name
                    ));
                }
                let mut bound_arguments = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    bound_arguments.push(self.bind_expr(argument, scope.as_deref_mut())?);
                }
                let types: Vec<LogicalType> =
                    bound_arguments.iter().map(BoundExpression::return_type).collect();
                let return_type = scalar_return_type(name, &types)?;
                Ok(BoundExpression::Function {
                    name: name.to_lowercase(),
                    arguments: bound_arguments,
                    return_type,
                })
            }
            Expression::WindowFunction { name, .. } => Err(not_implemented_err!(
                "Window function {} is not supported",
                name
            )),
            Expression::Cast {
                expression,
                data_type,
            } => {
                let child = self.bind_expr(expression, scope)?;
                Ok(BoundExpression::Cast {
                    child: Box::new(child),
                    target: data_type.clone(),
                })
            }
            Expression::Subquery(select) => {
                let node = self.bind_in_child(select)?;
                let [return_type] = node.types.as_slice() else {
                    return Err(binder_err!(
                        "Subquery returns {} columns - expected 1",
                        node.types.len()
                    ));
                };
                let return_type = return_type.clone();
                Ok(BoundExpression::Subquery {
                    subquery: Box::new(node),
                    kind: SubqueryKind::Scalar,
                    return_type,
                })
            }
            Expression::Exists(select) => {
                let node = self.bind_in_child(select)?;
                Ok(BoundExpression::Subquery {
                    subquery: Box::new(node),
                    kind: SubqueryKind::Exists,
                    return_type: LogicalType::Boolean,
                })
            }
            Expression::IsNull(child) | Expression::IsNotNull(child) => {
                let negated = matches!(expression, Expression::IsNotNull(_));
                let child = self.bind_expr(child, scope)?;
                Ok(BoundExpression::IsNull {
                    child: Box::new(child),
                    negated,
                })
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.bind_expr(left, scope.as_deref_mut())?;
                let right = self.bind_expr(right, scope)?;
                let return_type = binary_return_type(*operator, &left.return_type(), &right.return_type())?;
                Ok(BoundExpression::Binary {
                    operator: *operator,
                    left: Box::new(left),
                    right: Box::new(right),
                    return_type,
                })
            }
            Expression::Unary {
                operator,
                expression,
            } => {
                let child = self.bind_expr(expression, scope)?;
                let child_type = child.return_type();
                let valid = match operator {
                    UnaryOperator::Minus => child_type.is_numeric(),
                    UnaryOperator::Not => child_type == LogicalType::Boolean,
                } || child_type == LogicalType::Null;
                if !valid {
                    return Err(binder_err!(
                        "No operator matches the given name and argument types '{:?}({})'",
                        operator,
                        child_type
                    ));
                }
                Ok(BoundExpression::Unary {
                    operator: *operator,
                    child: Box::new(child),
                    return_type: child_type,
                })
            }
        }
    }

    fn bind_aggregate(
        &mut self,
        expression: &Expression,
        name: &str,
        arguments: &[Expression],
        distinct: bool,
        scope: &mut AggregateScope<'_>,
    ) -> PrismResult<BoundExpression> {
        let mut bound_arguments = Vec::with_capacity(arguments.len());
        for argument in arguments {
            if contains_aggregate(argument) {
                return Err(binder_err!("aggregate function calls cannot be nested"));
            }
            bound_arguments.push(self.bind_expr(argument, None)?);
        }
        let types: Vec<LogicalType> = bound_arguments.iter().map(BoundExpression::return_type).collect();
        let return_type = aggregate_return_type(name, &types)?;
        let index = scope.aggregates.len();
        scope.aggregates.push(BoundAggregate {
            name: name.to_lowercase(),
            arguments: bound_arguments,
            distinct,
            return_type: return_type.clone(),
        });
        Ok(BoundExpression::column_ref(
            expression.to_string(),
            ColumnBinding::new(scope.aggregate_index, index),
            return_type,
        ))
    }
}

fn binary_return_type(
    operator: BinaryOperator,
    left: &LogicalType,
    right: &LogicalType,
) -> PrismResult<LogicalType> {
    let mismatch = || {
        binder_err!(
            "No operator matches the given name and argument types '{}({}, {})'",
            operator,
            left,
            right
        )
    };
    if operator.is_comparison() {
        TypeUtils::get_max_type(left, right).map_err(|_| {
            binder_err!("Cannot compare values of type {} and type {}", left, right)
        })?;
        return Ok(LogicalType::Boolean);
    }
    if operator.is_logical() {
        let boolean = |t: &LogicalType| matches!(t, LogicalType::Boolean | LogicalType::Null);
        if boolean(left) && boolean(right) {
            return Ok(LogicalType::Boolean);
        }
        return Err(mismatch());
    }
    let numeric = |t: &LogicalType| t.is_numeric() || *t == LogicalType::Null;
    if !numeric(left) || !numeric(right) {
        return Err(mismatch());
    }
    if operator == BinaryOperator::Divide {
        return Ok(LogicalType::Double);
    }
    TypeUtils::get_max_type(left, right).map_err(|_| mismatch())
}
