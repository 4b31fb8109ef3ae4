//! Parallel scanning
//!
//! Table scans are executed by a pool of rayon workers that claim chunks
//! from a [`ColumnDataCollection`] through a shared
//! [`ParallelScanState`](crate::storage::ParallelScanState). Each worker keeps
//! its own [`LocalScanState`]; chunk indexes restore insertion order
//! afterwards.

use crate::common::constants::STANDARD_VECTOR_SIZE;
use crate::storage::{ColumnDataCollection, DataChunk, LocalScanState};
use rayon::prelude::*;
use tracing::trace;

/// Parallel execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelContext {
    /// Number of worker threads
    pub num_threads: usize,
    /// Enable parallel execution
    pub parallel_enabled: bool,
}

impl ParallelContext {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            parallel_enabled: num_threads > 1,
        }
    }

    pub fn from_system() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn single_threaded() -> Self {
        Self::new(1)
    }
}

impl Default for ParallelContext {
    fn default() -> Self {
        Self::from_system()
    }
}

/// Scan every chunk of `collection`, in insertion order.
///
/// Small collections (a single chunk) and single-threaded contexts use a
/// serial scan.
pub fn parallel_scan(collection: &ColumnDataCollection, context: &ParallelContext) -> Vec<DataChunk> {
    if !context.parallel_enabled || collection.count() <= STANDARD_VECTOR_SIZE {
        let mut state = collection.init_scan();
        let mut chunks = Vec::with_capacity(collection.chunk_count());
        while let Some(chunk) = collection.scan(&mut state) {
            chunks.push(chunk);
        }
        return chunks;
    }

    let global = collection.init_parallel_scan();
    let workers = context.num_threads.min(collection.chunk_count()).max(1);
    let mut claimed: Vec<(usize, DataChunk)> = (0..workers)
        .into_par_iter()
        .flat_map_iter(|worker| {
            let mut local = LocalScanState::default();
            let mut chunks = Vec::new();
            while let Some(chunk) = collection.scan_parallel(&global, &mut local) {
                if let Some(index) = local.current_chunk {
                    chunks.push((index, chunk));
                }
            }
            trace!(worker, rows = local.rows_scanned, "scan worker finished");
            chunks
        })
        .collect();
    claimed.sort_by_key(|(index, _)| *index);
    claimed.into_iter().map(|(_, chunk)| chunk).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogicalType, Value};

    fn collection(rows: usize) -> ColumnDataCollection {
        let mut collection = ColumnDataCollection::new(vec![LogicalType::BigInt]);
        for i in 0..rows {
            collection.append_row(&[Value::BigInt(i as i64)]).unwrap();
        }
        collection
    }

    #[test]
    fn test_parallel_scan_preserves_order() {
        let collection = collection(STANDARD_VECTOR_SIZE * 3 + 17);
        let chunks = parallel_scan(&collection, &ParallelContext::new(4));
        assert_eq!(chunks.len(), 4);
        let values: Vec<Value> = chunks.iter().flat_map(|c| c.rows()).map(|mut r| r.remove(0)).collect();
        let expected: Vec<Value> = (0..values.len() as i64).map(Value::BigInt).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_serial_scan_for_small_inputs() {
        let collection = collection(10);
        let chunks = parallel_scan(&collection, &ParallelContext::single_threaded());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 10);
    }
}
