//! Column data collection
//!
//! An append-only, column-oriented buffer of rows. Data is kept in chunks of
//! at most [`STANDARD_VECTOR_SIZE`] rows. Readers either scan serially with a
//! private [`ScanState`], or cooperatively through a shared
//! [`ParallelScanState`] whose cursor is guarded by a lock while each worker
//! keeps a [`LocalScanState`].

use crate::common::constants::STANDARD_VECTOR_SIZE;
use crate::common::error::{PrismError, PrismResult};
use crate::storage::data_chunk::DataChunk;
use crate::types::{LogicalType, Value};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct ColumnDataCollection {
    types: Vec<LogicalType>,
    chunks: Vec<DataChunk>,
    count: usize,
    /// Set once the collection has been absorbed by `combine`
    finished: bool,
}

/// Cursor of a serial scan
#[derive(Debug, Default)]
pub struct ScanState {
    next_chunk: usize,
}

/// Cursor shared between parallel scanners
#[derive(Debug, Default)]
pub struct ParallelScanState {
    next_chunk: Mutex<usize>,
}

/// Per-worker state of a parallel scan
#[derive(Debug, Default)]
pub struct LocalScanState {
    pub current_chunk: Option<usize>,
    pub rows_scanned: usize,
}

impl ColumnDataCollection {
    pub fn new(types: Vec<LogicalType>) -> Self {
        Self {
            types,
            chunks: Vec::new(),
            count: 0,
            finished: false,
        }
    }

    pub fn types(&self) -> &[LogicalType] {
        &self.types
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn check_writable(&self) -> PrismResult<()> {
        if self.finished {
            return Err(PrismError::Storage(
                "Cannot append to a collection that was combined into another".to_string(),
            ));
        }
        Ok(())
    }

    /// Append one row
    pub fn append_row(&mut self, row: &[Value]) -> PrismResult<()> {
        self.check_writable()?;
        if row.len() != self.types.len() {
            return Err(PrismError::Storage(format!(
                "Row has {} values but the collection has {} columns",
                row.len(),
                self.types.len()
            )));
        }
        let needs_chunk = self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.len() >= STANDARD_VECTOR_SIZE);
        if needs_chunk {
            self.chunks.push(DataChunk::new(self.types.len()));
        }
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.append_row(row)?;
        }
        self.count += 1;
        Ok(())
    }

    /// Append a batch
    pub fn append(&mut self, chunk: &DataChunk) -> PrismResult<()> {
        self.check_writable()?;
        if chunk.column_count() != self.types.len() {
            return Err(PrismError::Storage(format!(
                "Chunk has {} columns but the collection has {}",
                chunk.column_count(),
                self.types.len()
            )));
        }
        for row in chunk.rows() {
            self.append_row(&row)?;
        }
        Ok(())
    }

    pub fn init_scan(&self) -> ScanState {
        ScanState::default()
    }

    /// Next chunk of a serial scan, `None` once exhausted
    pub fn scan(&self, state: &mut ScanState) -> Option<DataChunk> {
        let chunk = self.chunks.get(state.next_chunk)?.clone();
        state.next_chunk += 1;
        Some(chunk)
    }

    pub fn init_parallel_scan(&self) -> ParallelScanState {
        ParallelScanState::default()
    }

    /// Claim and return the next unclaimed chunk
    pub fn scan_parallel(
        &self,
        global: &ParallelScanState,
        local: &mut LocalScanState,
    ) -> Option<DataChunk> {
        let index = {
            let mut next = global.next_chunk.lock();
            if *next >= self.chunks.len() {
                local.current_chunk = None;
                return None;
            }
            let index = *next;
            *next += 1;
            index
        };
        let chunk = self.chunks[index].clone();
        local.current_chunk = Some(index);
        local.rows_scanned += chunk.len();
        Some(chunk)
    }

    /// Move all data of `other` into this collection; `other` is left empty
    /// and rejects further appends.
    pub fn combine(&mut self, other: &mut ColumnDataCollection) -> PrismResult<()> {
        self.check_writable()?;
        if self.types != other.types {
            return Err(PrismError::Storage(
                "Cannot combine collections with different column types".to_string(),
            ));
        }
        self.chunks.append(&mut other.chunks);
        self.count += other.count;
        other.count = 0;
        other.finished = true;
        Ok(())
    }

    /// Materialize all rows in insertion order
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.chunks.iter().flat_map(DataChunk::rows).collect()
    }
}
