//! Bind context
//!
//! The set of relations visible to one binder scope. Each relation is a
//! [`Binding`]: an alias plus the names and types of its columns, addressed
//! through the table index of the plan node that produces them. Name lookups
//! are case-insensitive.

use crate::binder_err;
use crate::common::error::PrismResult;
use crate::planner::expression::ColumnBinding;
use crate::sql::StarExpression;
use crate::types::LogicalType;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub alias: String,
    pub table_index: usize,
    pub names: Vec<String>,
    pub types: Vec<LogicalType>,
}

impl Binding {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }
}

/// A resolved column
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub binding: ColumnBinding,
    /// The column name as declared by its relation
    pub name: String,
    pub return_type: LogicalType,
}

/// A column produced by star expansion
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedColumn {
    pub relation: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct BindContext {
    bindings: Vec<Binding>,
}

impl BindContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(
        &mut self,
        alias: &str,
        table_index: usize,
        names: Vec<String>,
        types: Vec<LogicalType>,
    ) -> PrismResult<()> {
        if self.get_binding(alias).is_some() {
            return Err(binder_err!("Duplicate alias \"{}\" in query!", alias));
        }
        self.bindings.push(Binding {
            alias: alias.to_string(),
            table_index,
            names,
            types,
        });
        Ok(())
    }

    pub fn get_binding(&self, alias: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.alias.eq_ignore_ascii_case(alias))
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve a column in this scope only. `Ok(None)` means the name is not
    /// visible here and the caller may continue with enclosing scopes.
    pub fn lookup(&self, table: Option<&str>, column: &str) -> PrismResult<Option<ResolvedColumn>> {
        if let Some(table) = table {
            let Some(binding) = self.get_binding(table) else {
                return Ok(None);
            };
            return match binding.column_index(column) {
                Some(index) => Ok(Some(Self::resolved(binding, index))),
                None => Err(binder_err!(
                    "Table \"{}\" does not have a column named \"{}\"",
                    binding.alias,
                    column
                )),
            };
        }

        let mut found: Option<ResolvedColumn> = None;
        let mut candidates = Vec::new();
        for binding in &self.bindings {
            if let Some(index) = binding.column_index(column) {
                candidates.push(format!("\"{}.{}\"", binding.alias, binding.names[index]));
                if found.is_none() {
                    found = Some(Self::resolved(binding, index));
                }
            }
        }
        if candidates.len() > 1 {
            return Err(binder_err!(
                "Ambiguous reference to column name \"{}\" (use: {})",
                column,
                candidates.join(" or ")
            ));
        }
        Ok(found)
    }

    fn resolved(binding: &Binding, index: usize) -> ResolvedColumn {
        ResolvedColumn {
            binding: ColumnBinding::new(binding.table_index, index),
            name: binding.names[index].clone(),
            return_type: binding.types[index].clone(),
        }
    }

    /// Expand `*`, `rel.*` and their EXCLUDE lists into concrete columns in
    /// declaration order.
    pub fn expand_star(&self, star: &StarExpression) -> PrismResult<Vec<ExpandedColumn>> {
        if self.bindings.is_empty() {
            return Err(binder_err!("SELECT * expression without FROM clause!"));
        }
        let relations: Vec<&Binding> = match &star.relation {
            Some(relation) => match self.get_binding(relation) {
                Some(binding) => vec![binding],
                None => return Err(binder_err!("Referenced table \"{}\" not found!", relation)),
            },
            None => self.bindings.iter().collect(),
        };

        for excluded in &star.exclude {
            let exists = relations.iter().any(|b| b.column_index(excluded).is_some());
            if !exists {
                return Err(binder_err!(
                    "Column \"{}\" in EXCLUDE list not found in FROM clause",
                    excluded
                ));
            }
        }

        let mut columns = Vec::new();
        for binding in relations {
            for name in &binding.names {
                if star.exclude.iter().any(|e| e.eq_ignore_ascii_case(name)) {
                    continue;
                }
                columns.push(ExpandedColumn {
                    relation: binding.alias.clone(),
                    name: name.clone(),
                });
            }
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::PrismError;

    fn context() -> PrismResult<BindContext> {
        let mut context = BindContext::new();
        context.add_binding(
            "s",
            0,
            vec!["Year".into(), "revenue".into()],
            vec![LogicalType::Integer, LogicalType::BigInt],
        )?;
        context.add_binding(
            "t",
            1,
            vec!["year".into(), "target".into()],
            vec![LogicalType::Integer, LogicalType::BigInt],
        )?;
        Ok(context)
    }

    #[test]
    fn test_lookup_qualified_and_ambiguous() -> PrismResult<()> {
        let context = context()?;
        let column = context.lookup(Some("S"), "year")?.expect("column");
        assert_eq!(column.binding, ColumnBinding::new(0, 0));
        assert_eq!(column.name, "Year");

        assert!(matches!(context.lookup(None, "year"), Err(PrismError::Binder(_))));
        assert!(context.lookup(None, "missing")?.is_none());
        assert!(context.lookup(Some("x"), "year")?.is_none());
        assert!(context.lookup(Some("t"), "revenue").is_err());
        Ok(())
    }

    #[test]
    fn test_expand_star_with_exclude() -> PrismResult<()> {
        let context = context()?;
        let star = StarExpression {
            relation: None,
            exclude: vec!["YEAR".into()],
        };
        let names: Vec<String> = context
            .expand_star(&star)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["revenue", "target"]);

        let star = StarExpression {
            relation: Some("t".into()),
            exclude: vec!["revenue".into()],
        };
        assert!(context.expand_star(&star).is_err());
        Ok(())
    }

    #[test]
    fn test_duplicate_alias() -> PrismResult<()> {
        let mut context = context()?;
        assert!(context
            .add_binding("T", 2, vec![], vec![])
            .is_err());
        Ok(())
    }
}
