//! PIVOT / UNPIVOT rewrite
//!
//! A PIVOT is rewritten into four chained derived tables (group, collect
//! into lists, build maps, extract one column per pivot value); an UNPIVOT
//! into a single projection of paired UNNEST calls plus an optional
//! null-excluding filter. Nothing here binds or executes: the builders only
//! assemble [`SelectStatement`] trees which the bind driver then binds like
//! any other derived table.

pub mod pivot_builder;
pub mod spec;
pub mod unpivot_builder;

pub use pivot_builder::build_pivot_query;
pub use spec::*;
pub use unpivot_builder::build_unpivot_query;

use crate::common::constants::*;
use crate::sql::{Expression, SelectStatement};

/// Name of one pivot aggregate as it appears in output column names
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateName {
    pub alias: Option<String>,
    /// SQL text of the aggregate expression
    pub rendered: String,
}

impl AggregateName {
    /// Column name suffix for this aggregate. A single aggregate leaves the
    /// pivot value name untouched, even when it is aliased.
    pub fn suffix(&self, aggregate_count: usize) -> Option<&str> {
        if aggregate_count <= 1 {
            return None;
        }
        Some(self.alias.as_deref().unwrap_or(&self.rendered))
    }
}

/// Naming tables of one PIVOT rewrite.
///
/// Each alias category has its own counter starting at 1, so generated
/// names never collide across categories.
#[derive(Debug, Default)]
pub struct PivotBindState {
    /// User-facing group column names
    pub group_names: Vec<String>,
    /// Generated aliases of the group columns, parallel to `group_names`
    pub internal_group_names: Vec<String>,
    pub aggregate_names: Vec<AggregateName>,
    pub internal_aggregate_names: Vec<String>,
    /// Generated aliases of the pivot key expressions
    pub internal_pivot_refs: Vec<String>,
    /// Generated aliases of the collected key lists
    pub internal_pivot_names: Vec<String>,
    pub internal_map_names: Vec<String>,
    group_counter: usize,
    ref_counter: usize,
    aggregate_counter: usize,
    name_counter: usize,
    map_counter: usize,
}

fn next_name(counter: &mut usize, prefix: &str) -> String {
    *counter += 1;
    format!("{}{}", prefix, counter)
}

impl PivotBindState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_group_alias(&mut self) -> String {
        next_name(&mut self.group_counter, INTERNAL_PIVOT_GROUP_PREFIX)
    }

    pub fn next_ref_alias(&mut self) -> String {
        next_name(&mut self.ref_counter, INTERNAL_PIVOT_REF_PREFIX)
    }

    pub fn next_aggregate_alias(&mut self) -> String {
        next_name(&mut self.aggregate_counter, INTERNAL_PIVOT_AGGREGATE_PREFIX)
    }

    pub fn next_name_alias(&mut self) -> String {
        next_name(&mut self.name_counter, INTERNAL_PIVOT_NAME_PREFIX)
    }

    pub fn next_map_alias(&mut self) -> String {
        next_name(&mut self.map_counter, INTERNAL_PIVOT_MAP_PREFIX)
    }
}

/// Output of the UNPIVOT builder
#[derive(Debug, Clone, PartialEq)]
pub struct UnpivotRewrite {
    pub select: SelectStatement,
    /// Predicate applied after the UNNEST projection (null exclusion)
    pub filter: Option<Expression>,
}
