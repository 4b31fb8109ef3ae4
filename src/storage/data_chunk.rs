//! DataChunk: a column-oriented batch of rows

use crate::common::error::{PrismError, PrismResult};
use crate::types::Value;

/// A batch of rows stored column by column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataChunk {
    columns: Vec<Vec<Value>>,
    count: usize,
}

impl DataChunk {
    /// Create an empty chunk with `column_count` columns
    pub fn new(column_count: usize) -> Self {
        Self {
            columns: vec![Vec::new(); column_count],
            count: 0,
        }
    }

    /// Build a chunk from row-major data
    pub fn from_rows(column_count: usize, rows: &[Vec<Value>]) -> PrismResult<Self> {
        let mut chunk = Self::new(column_count);
        for row in rows {
            chunk.append_row(row)?;
        }
        Ok(chunk)
    }

    pub fn append_row(&mut self, row: &[Value]) -> PrismResult<()> {
        if row.len() != self.columns.len() {
            return Err(PrismError::InvalidArgument(format!(
                "Row has {} values but the chunk has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value.clone());
        }
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&[Value]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    /// Materialize one row
    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        if index >= self.count {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index].clone()).collect())
    }

    /// Materialize all rows
    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.count).filter_map(|i| self.row(i)).collect()
    }
}
