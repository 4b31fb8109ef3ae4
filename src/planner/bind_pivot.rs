//! Binding of PIVOT / UNPIVOT table references
//!
//! The reference is rewritten into an ordinary select tree (see
//! [`crate::planner::pivot`]) which is then bound in a child scope and
//! registered in the current scope as a derived table.

use crate::common::constants::{INTERNAL_PIVOT_ALIAS_PREFIX, UNNAMED_PIVOT_ALIAS};
use crate::common::error::PrismResult;
use crate::planner::binder::{apply_column_aliases, Binder};
use crate::planner::expression::{BoundExpression, ColumnBinding};
use crate::planner::logical_plan::{BoundQueryNode, LogicalFilter, LogicalPlan, LogicalProjection};
use crate::planner::pivot::*;
use crate::sql::{Expression, PivotRef, SelectItem, SelectStatement, StarExpression, TableReference};
use crate::binder_err;
use tracing::debug;

const FILTERED_UNPIVOT_ALIAS: &str = "__unpivot";

/// A PIVOT or UNPIVOT reference rewritten into plain SQL
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRewrite {
    pub select: SelectStatement,
    /// Null-excluding predicate applied on top of `select`
    pub filter: Option<Expression>,
    /// Alias the result is registered under
    pub alias: String,
    pub column_aliases: Vec<String>,
}

impl PivotRewrite {
    /// The rewrite as a single statement
    pub fn to_select(&self) -> SelectStatement {
        match &self.filter {
            None => self.select.clone(),
            Some(filter) => SelectStatement {
                select_list: vec![SelectItem::Wildcard],
                from: Some(Box::new(TableReference::subquery(self.select.clone()))),
                where_clause: Some(Box::new(filter.clone())),
                ..Default::default()
            },
        }
    }
}

impl<'a> Binder<'a> {
    pub(crate) fn bind_pivot_ref(&mut self, pivot: &PivotRef) -> PrismResult<LogicalPlan> {
        let rewrite = self.plan_pivot_rewrite(pivot)?;

        let node = self.bind_in_child(&rewrite.select)?;
        let node = match &rewrite.filter {
            Some(filter) => self.bind_filter_over(node, filter)?,
            None => node,
        };

        let names = apply_column_aliases(&rewrite.alias, node.names, &rewrite.column_aliases)?;
        self.bind_context
            .add_binding(&rewrite.alias, node.root_index, names, node.types)?;
        Ok(node.plan)
    }

    /// Validate a PIVOT / UNPIVOT reference and rewrite it without binding
    /// the result.
    pub fn plan_pivot_rewrite(&self, pivot: &PivotRef) -> PrismResult<PivotRewrite> {
        let mut pivot = pivot.clone();
        if let TableReference::Subquery { alias, .. } = pivot.source.as_mut() {
            if alias.is_none() {
                *alias = Some(format!(
                    "{}{}",
                    INTERNAL_PIVOT_ALIAS_PREFIX,
                    self.generate_alias_index()
                ));
            }
        }

        // bind the source on its own to learn its columns; correlations found
        // here are recorded again when the rewritten tree is bound
        let (all_columns, source_context) = {
            let mut star_binder = self.child();
            star_binder.bind_table_ref(&pivot.source)?;
            let columns: Vec<String> = star_binder
                .bind_context
                .expand_star(&StarExpression::default())?
                .into_iter()
                .map(|c| c.name)
                .collect();
            (columns, std::mem::take(&mut star_binder.bind_context))
        };

        let source = (*pivot.source).clone();
        let (select, filter) = if pivot.is_pivot() {
            if pivot.pivots.is_empty() {
                return Err(binder_err!("PIVOT requires at least one pivot column"));
            }
            for column in &mut pivot.pivots {
                expand_enum_pivot(column, self.catalog())?;
            }
            let mut handled = HandledColumns::new();
            validate_aggregates(&pivot.aggregates, &mut handled)?;
            validate_pivot_expressions(&pivot.pivots, &mut handled)?;
            for column in &pivot.pivots {
                validate_entries(column)?;
            }
            let total = compute_cross_product_bound(&pivot.pivots, self.config().pivot_limit)?;
            debug!(columns = total, aggregates = pivot.aggregates.len(), "binding PIVOT");
            let elements = PivotEnumerator::new(&pivot.pivots);
            let select = build_pivot_query(source, &pivot, &all_columns, &handled, elements)?;
            (select, None)
        } else {
            debug!(entries = pivot.pivots.len(), "binding UNPIVOT");
            let rewrite = build_unpivot_query(source, &pivot, &all_columns, &source_context)?;
            (rewrite.select, rewrite.filter)
        };

        Ok(PivotRewrite {
            select,
            filter,
            alias: pivot
                .alias
                .clone()
                .unwrap_or_else(|| UNNAMED_PIVOT_ALIAS.to_string()),
            column_aliases: std::mem::take(&mut pivot.column_aliases),
        })
    }

    /// `SELECT * FROM (node) WHERE filter`, bound in a fresh child scope
    fn bind_filter_over(
        &mut self,
        node: BoundQueryNode,
        filter: &Expression,
    ) -> PrismResult<BoundQueryNode> {
        let (filtered, correlated) = {
            let mut child = self.child();
            child.bind_context.add_binding(
                FILTERED_UNPIVOT_ALIAS,
                node.root_index,
                node.names.clone(),
                node.types.clone(),
            )?;
            let predicate = child.bind_expression(filter)?;
            let expressions = node
                .names
                .iter()
                .zip(&node.types)
                .enumerate()
                .map(|(i, (name, column_type))| {
                    BoundExpression::column_ref(
                        name.clone(),
                        ColumnBinding::new(node.root_index, i),
                        column_type.clone(),
                    )
                })
                .collect();
            let root_index = child.generate_table_index();
            let plan = LogicalPlan::Projection(LogicalProjection::new(
                LogicalPlan::Filter(LogicalFilter::new(node.plan, predicate)),
                root_index,
                expressions,
            ));
            let filtered = BoundQueryNode {
                root_index,
                names: node.names,
                types: node.types,
                plan,
            };
            (filtered, std::mem::take(&mut child.correlated_columns))
        };
        self.add_correlated_columns(correlated);
        Ok(filtered)
    }
}
