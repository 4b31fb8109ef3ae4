//! Table Management
//!
//! A catalog table: its column definitions plus the in-memory column data.

use crate::common::error::{PrismError, PrismResult};
use crate::storage::{ColumnDataCollection, DataChunk};
use crate::types::{LogicalType, Value};
use serde::{Deserialize, Serialize};

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type")]
    pub column_type: LogicalType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
    #[serde(rename = "name")]
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

fn default_schema_name() -> String {
    crate::common::constants::DEFAULT_SCHEMA.to_string()
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            schema_name: default_schema_name(),
            table_name: table_name.into(),
            columns,
        }
    }
}

/// Database table
#[derive(Debug)]
pub struct Table {
    pub info: TableInfo,
    data: ColumnDataCollection,
}

impl Table {
    pub fn new(info: TableInfo) -> PrismResult<Self> {
        if info.columns.is_empty() {
            return Err(PrismError::Catalog(format!(
                "Table '{}' must have at least one column",
                info.table_name
            )));
        }
        for (i, column) in info.columns.iter().enumerate() {
            if info.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(PrismError::Catalog(format!(
                    "Column '{}' is specified more than once in table '{}'",
                    column.name, info.table_name
                )));
            }
        }
        let types = info.columns.iter().map(|c| c.column_type.clone()).collect();
        Ok(Self {
            info,
            data: ColumnDataCollection::new(types),
        })
    }

    pub fn get_name(&self) -> &str {
        &self.info.table_name
    }

    pub fn get_columns(&self) -> &[ColumnInfo] {
        &self.info.columns
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.info
            .columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub fn row_count(&self) -> usize {
        self.data.count()
    }

    pub fn data(&self) -> &ColumnDataCollection {
        &self.data
    }

    /// Cast every row to the column types and append them.
    ///
    /// Rows are staged in a local collection that is combined into the table
    /// only once all of them converted, so a failing row appends nothing.
    pub fn insert_rows(&mut self, rows: Vec<Vec<Value>>) -> PrismResult<usize> {
        let types: Vec<LogicalType> = self.data.types().to_vec();
        let mut staged = ColumnDataCollection::new(types.clone());
        let mut chunk = DataChunk::new(types.len());
        for row in rows {
            if row.len() != types.len() {
                return Err(PrismError::InvalidArgument(format!(
                    "Table '{}' has {} columns but {} values were supplied",
                    self.info.table_name,
                    types.len(),
                    row.len()
                )));
            }
            let row = row
                .iter()
                .zip(&types)
                .map(|(value, ty)| cast_for_column(value, ty))
                .collect::<PrismResult<Vec<_>>>()?;
            chunk.append_row(&row)?;
        }
        let inserted = chunk.len();
        staged.append(&chunk)?;
        self.data.combine(&mut staged)?;
        Ok(inserted)
    }
}

fn cast_for_column(value: &Value, column_type: &LogicalType) -> PrismResult<Value> {
    if let (LogicalType::Enum { name, values }, Value::Varchar(text)) = (column_type, value) {
        if !values.iter().any(|member| member == text) {
            return Err(PrismError::InvalidArgument(format!(
                "'{}' is not a member of ENUM {}",
                text, name
            )));
        }
    }
    value.cast_to(column_type)
}
