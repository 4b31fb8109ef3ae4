//! Execution Engine
//!
//! Runs bound logical plans against the catalog and materializes their
//! output as a [`QueryResult`]. Table scans are parallelized with rayon;
//! operators above the scan work on materialized rows.

pub mod aggregate;
pub mod executor;
pub mod expression;
pub mod functions;
pub mod parallel;

pub use executor::Executor;
pub use parallel::{parallel_scan, ParallelContext};

use crate::common::error::{PrismError, PrismResult};
use crate::types::{LogicalType, Value};
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// Materialized result of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub names: Vec<String>,
    pub types: Vec<LogicalType>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(names: Vec<String>, types: Vec<LogicalType>, rows: Vec<Vec<Value>>) -> Self {
        Self { names, types, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    /// Position of a column by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// All values of one column
    pub fn column(&self, name: &str) -> PrismResult<Vec<Value>> {
        let index = self.column_index(name).ok_or_else(|| {
            PrismError::InvalidArgument(format!("Column \"{}\" not found in result", name))
        })?;
        Ok(self.rows.iter().map(|row| row[index].clone()).collect())
    }

    /// Write the result as CSV with a header line. NULL is written as an
    /// empty field.
    pub fn write_csv<W: Write>(&self, writer: W) -> PrismResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.names)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|value| match value {
                Value::Null => String::new(),
                other => other.to_string(),
            }))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();
        let mut widths: Vec<usize> = self.names.iter().map(|n| n.len()).collect();
        for row in &rendered {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect();
            writeln!(f, "| {} |", padded.join(" | "))
        };
        line(f, &self.names)?;
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "|-{}-|", separator.join("-|-"))?;
        for row in &rendered {
            line(f, row)?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result() -> QueryResult {
        QueryResult::new(
            vec!["year".into(), "Q1".into()],
            vec![LogicalType::Integer, LogicalType::BigInt],
            vec![
                vec![Value::Integer(2020), Value::BigInt(10)],
                vec![Value::Integer(2021), Value::Null],
            ],
        )
    }

    #[test]
    fn test_column_access() -> PrismResult<()> {
        let result = result();
        assert_eq!(result.column_index("q1"), Some(1));
        assert_eq!(result.column("Q1")?, vec![Value::BigInt(10), Value::Null]);
        assert!(result.column("Q3").is_err());
        Ok(())
    }

    #[test]
    fn test_write_csv() -> PrismResult<()> {
        let mut buffer = Vec::new();
        result().write_csv(&mut buffer)?;
        assert_eq!(String::from_utf8_lossy(&buffer), "year,Q1\n2020,10\n2021,\n");
        Ok(())
    }

    #[test]
    fn test_display_table() {
        let rendered = result().to_string();
        assert!(rendered.starts_with("| year | Q1   |\n"));
        assert!(rendered.ends_with("(2 rows)"));
    }
}
