//! Database implementation
//!
//! The [`Database`] ties the catalog, configuration, binder and executor
//! together behind a small API: define tables, load rows, then execute
//! or explain statements (PIVOT / UNPIVOT references included).

use crate::catalog::{Catalog, CatalogDefinition, ColumnInfo, TableInfo};
use crate::common::config::ConfigManager;
use crate::common::error::{PrismError, PrismResult};
use crate::execution::{Executor, ParallelContext, QueryResult};
use crate::planner::{Binder, BoundQueryNode};
use crate::sql::{PivotRef, SelectStatement};
use crate::types::Value;
use parking_lot::{RwLock, RwLockReadGuard};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Main database instance
#[derive(Debug, Clone, Default)]
pub struct Database {
    /// Catalog for schema/table management
    catalog: Arc<RwLock<Catalog>>,
    /// Configuration manager
    config: ConfigManager,
}

impl Database {
    /// Create a new in-memory database
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            config: ConfigManager::new(),
        }
    }

    /// Create a database from a serialized catalog definition
    pub fn from_definition(definition: &CatalogDefinition) -> PrismResult<Self> {
        Ok(Self::from_catalog(Catalog::from_definition(definition)?))
    }

    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read()
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    /// `SET key = value`
    pub fn set(&self, key: &str, value: impl Into<String>) -> PrismResult<()> {
        self.config.set(key, value)
    }

    pub fn create_table(&self, name: &str, columns: Vec<ColumnInfo>) -> PrismResult<()> {
        self.catalog.read().create_table(&TableInfo::new(name, columns))
    }

    /// `CREATE TYPE name AS ENUM (...)`
    pub fn create_enum(&self, name: &str, members: &[&str]) -> PrismResult<()> {
        self.catalog
            .read()
            .create_enum_type(name, members.iter().map(|m| m.to_string()).collect())
    }

    /// Append rows to a table, casting values to the column types
    pub fn insert_rows(&self, table: &str, rows: Vec<Vec<Value>>) -> PrismResult<usize> {
        let table = self.catalog.read().get_table(table)?;
        let inserted = table.write().insert_rows(rows)?;
        Ok(inserted)
    }

    /// Load a CSV file with a header line into an existing table. Columns
    /// are matched by header name; empty fields are NULL.
    pub fn load_csv(&self, table_name: &str, path: impl AsRef<Path>) -> PrismResult<usize> {
        let path = path.as_ref();
        let table = self.catalog.read().get_table(table_name)?;
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        let positions = {
            let table = table.read();
            if headers.len() != table.get_columns().len() {
                return Err(PrismError::InvalidArgument(format!(
                    "CSV file {} has {} columns but table '{}' has {}",
                    path.display(),
                    headers.len(),
                    table_name,
                    table.get_columns().len()
                )));
            }
            table
                .get_columns()
                .iter()
                .map(|column| {
                    headers
                        .iter()
                        .position(|h| h.trim().eq_ignore_ascii_case(&column.name))
                        .ok_or_else(|| {
                            PrismError::InvalidArgument(format!(
                                "CSV file {} has no column \"{}\"",
                                path.display(),
                                column.name
                            ))
                        })
                })
                .collect::<PrismResult<Vec<_>>>()?
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                positions
                    .iter()
                    .map(|&position| match record.get(position) {
                        Some("") | None => Value::Null,
                        Some(field) => Value::varchar(field),
                    })
                    .collect(),
            );
        }
        let inserted = table.write().insert_rows(rows)?;
        info!(table = table_name, rows = inserted, path = %path.display(), "loaded CSV");
        Ok(inserted)
    }

    /// Bind a statement against the current catalog and settings
    pub fn bind(&self, select: &SelectStatement) -> PrismResult<BoundQueryNode> {
        let catalog = self.catalog.read();
        let mut binder = Binder::new(&catalog, self.config.binder_config()?);
        binder.bind_select(select)
    }

    pub fn execute(&self, select: &SelectStatement) -> PrismResult<QueryResult> {
        debug!(sql = %select, "executing");
        let parallel = match self.config.threads()? {
            Some(threads) => ParallelContext::new(threads),
            None => ParallelContext::from_system(),
        };
        let catalog = self.catalog.read();
        let mut binder = Binder::new(&catalog, self.config.binder_config()?);
        let node = binder.bind_select(select)?;
        Executor::with_parallel_context(&catalog, parallel).execute(&node)
    }

    /// The logical plan of a statement, as an indented operator tree
    pub fn explain(&self, select: &SelectStatement) -> PrismResult<String> {
        Ok(self.bind(select)?.plan.to_string())
    }

    /// The plain SELECT a PIVOT / UNPIVOT reference is rewritten into
    pub fn rewrite(&self, pivot: &PivotRef) -> PrismResult<String> {
        let catalog = self.catalog.read();
        let binder = Binder::new(&catalog, self.config.binder_config()?);
        Ok(binder.plan_pivot_rewrite(pivot)?.to_select().to_string())
    }
}
