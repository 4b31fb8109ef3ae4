//! Catalog System
//!
//! Manages database metadata: schemas, the tables they contain and
//! user-defined ENUM types. Object names may be schema-qualified
//! (`schema.name`); unqualified names resolve against the default schema.

pub mod schema;
pub mod table;

pub use schema::*;
pub use table::*;

use crate::common::constants::DEFAULT_SCHEMA;
use crate::common::error::{PrismError, PrismResult};
use crate::types::LogicalType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Main catalog that manages all database metadata
#[derive(Debug)]
pub struct Catalog {
    schemas: HashMap<String, Arc<RwLock<Schema>>>,
    default_schema: String,
}

/// Split `schema.name` into its parts
pub fn split_qualified_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, object)) => (Some(schema), object),
        None => (None, name),
    }
}

impl Catalog {
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(
            DEFAULT_SCHEMA.to_string(),
            Arc::new(RwLock::new(Schema::new(DEFAULT_SCHEMA))),
        );
        Self {
            schemas,
            default_schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn create_schema(&mut self, name: &str) -> PrismResult<()> {
        let key = name.to_lowercase();
        if self.schemas.contains_key(&key) {
            return Err(PrismError::Catalog(format!(
                "Schema '{}' already exists",
                name
            )));
        }
        self.schemas
            .insert(key, Arc::new(RwLock::new(Schema::new(name))));
        Ok(())
    }

    pub fn get_schema(&self, name: &str) -> PrismResult<Arc<RwLock<Schema>>> {
        self.schemas
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| PrismError::Catalog(format!("Schema '{}' does not exist", name)))
    }

    fn schema_for(&self, schema_name: Option<&str>) -> PrismResult<Arc<RwLock<Schema>>> {
        self.get_schema(schema_name.unwrap_or(&self.default_schema))
    }

    pub fn create_table(&self, table_info: &TableInfo) -> PrismResult<()> {
        let schema = self.get_schema(&table_info.schema_name)?;
        let result = schema.write().create_table(table_info);
        result
    }

    pub fn drop_table(&self, name: &str) -> PrismResult<()> {
        let (schema_name, table_name) = split_qualified_name(name);
        let schema = self.schema_for(schema_name)?;
        let result = schema.write().drop_table(table_name);
        result
    }

    /// Look up a table by (optionally qualified) name
    pub fn get_table(&self, name: &str) -> PrismResult<Arc<RwLock<Table>>> {
        let (schema_name, table_name) = split_qualified_name(name);
        let schema = self.schema_for(schema_name)?;
        let result = schema.read().get_table(table_name);
        result
    }

    pub fn create_enum_type(&self, name: &str, members: Vec<String>) -> PrismResult<()> {
        let (schema_name, type_name) = split_qualified_name(name);
        let schema = self.schema_for(schema_name)?;
        let result = schema.write().create_enum_type(type_name, members);
        result
    }

    /// Resolve a type name: built-in type names first, then user types of
    /// the addressed schema.
    pub fn get_type(&self, name: &str) -> PrismResult<LogicalType> {
        if let Some(builtin) = builtin_type(name) {
            return Ok(builtin);
        }
        let (schema_name, type_name) = split_qualified_name(name);
        let schema = self.schema_for(schema_name)?;
        let result = schema.read().get_type(type_name);
        result.ok_or_else(|| PrismError::Catalog(format!("Type with name {} does not exist", name)))
    }

    pub fn list_schemas(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a catalog from a declarative definition
    pub fn from_definition(definition: &CatalogDefinition) -> PrismResult<Self> {
        let mut catalog = Self::new();
        for schema in &definition.schemas {
            catalog.create_schema(schema)?;
        }
        for enum_type in &definition.enums {
            catalog.create_enum_type(&enum_type.name, enum_type.values.clone())?;
        }
        for table in &definition.tables {
            catalog.create_table(table)?;
        }
        Ok(catalog)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_type(name: &str) -> Option<LogicalType> {
    match name.to_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => Some(LogicalType::Boolean),
        "INTEGER" | "INT" | "INT4" => Some(LogicalType::Integer),
        "BIGINT" | "INT8" => Some(LogicalType::BigInt),
        "DOUBLE" | "FLOAT8" => Some(LogicalType::Double),
        "VARCHAR" | "TEXT" | "STRING" => Some(LogicalType::Varchar),
        _ => None,
    }
}

/// ENUM declaration in a [`CatalogDefinition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<String>,
}

/// Serializable description of a catalog, as loaded by the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDefinition {
    pub schemas: Vec<String>,
    pub enums: Vec<EnumDefinition>,
    pub tables: Vec<TableInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_lookup_is_schema_aware() -> PrismResult<()> {
        let mut catalog = Catalog::new();
        catalog.create_schema("reporting")?;
        catalog.create_enum_type("reporting.Mood", vec!["sad".into(), "happy".into()])?;

        let mood = catalog.get_type("reporting.mood")?;
        assert_eq!(mood.enum_size()?, 2);
        assert!(matches!(catalog.get_type("mood"), Err(PrismError::Catalog(_))));
        assert_eq!(catalog.get_type("varchar")?, LogicalType::Varchar);
        assert!(catalog.create_enum_type("reporting.mood", vec![]).is_err());
        Ok(())
    }

    #[test]
    fn test_catalog_from_definition() -> PrismResult<()> {
        let definition: CatalogDefinition = serde_json::from_str(
            r#"{
                "enums": [{"name": "quarter", "values": ["Q1", "Q2"]}],
                "tables": [{"name": "Sales", "columns": [
                    {"name": "year", "type": "Integer"},
                    {"name": "quarter", "type": "Varchar"}
                ]}]
            }"#,
        )?;
        let catalog = Catalog::from_definition(&definition)?;
        let table = catalog.get_table("main.sales")?;
        assert_eq!(table.read().get_columns().len(), 2);
        assert_eq!(catalog.get_type("quarter")?.enum_value(1)?, "Q2");
        assert!(catalog.get_table("missing").is_err());
        Ok(())
    }
}
