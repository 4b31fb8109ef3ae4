//! Schema Management
//!
//! A schema groups tables and user-defined types. Names are case-insensitive.

use crate::catalog::{Table, TableInfo};
use crate::common::error::{PrismError, PrismResult};
use crate::types::LogicalType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Database schema
#[derive(Debug)]
pub struct Schema {
    pub name: String,
    tables: HashMap<String, Arc<RwLock<Table>>>,
    /// User-defined types (ENUMs)
    types: HashMap<String, LogicalType>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
            types: HashMap::new(),
        }
    }

    pub fn create_table(&mut self, table_info: &TableInfo) -> PrismResult<()> {
        let key = table_info.table_name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(PrismError::Catalog(format!(
                "Table '{}' already exists in schema '{}'",
                table_info.table_name, self.name
            )));
        }
        let table = Table::new(table_info.clone())?;
        self.tables.insert(key, Arc::new(RwLock::new(table)));
        Ok(())
    }

    pub fn drop_table(&mut self, table_name: &str) -> PrismResult<()> {
        self.tables
            .remove(&table_name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| {
                PrismError::Catalog(format!(
                    "Table '{}' does not exist in schema '{}'",
                    table_name, self.name
                ))
            })
    }

    pub fn get_table(&self, table_name: &str) -> PrismResult<Arc<RwLock<Table>>> {
        self.tables
            .get(&table_name.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                PrismError::Catalog(format!(
                    "Table with name {} does not exist in schema '{}'",
                    table_name, self.name
                ))
            })
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .values()
            .map(|t| t.read().get_name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Register an ENUM type with its members in ordinal order
    pub fn create_enum_type(&mut self, name: &str, members: Vec<String>) -> PrismResult<()> {
        let key = name.to_lowercase();
        if self.types.contains_key(&key) {
            return Err(PrismError::Catalog(format!(
                "Type '{}' already exists in schema '{}'",
                name, self.name
            )));
        }
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(PrismError::Catalog(format!(
                    "Duplicate member '{}' in ENUM {}",
                    member, name
                )));
            }
        }
        self.types.insert(
            key,
            LogicalType::Enum {
                name: name.to_string(),
                values: members,
            },
        );
        Ok(())
    }

    pub fn get_type(&self, name: &str) -> Option<LogicalType> {
        self.types.get(&name.to_lowercase()).cloned()
    }
}
