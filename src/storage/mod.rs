//! Storage module for PrismDB
//!
//! In-memory, column-oriented row storage used by tables and query results:
//! - `DataChunk` batches
//! - `ColumnDataCollection` with serial and parallel scans

pub mod column_data;
pub mod data_chunk;

pub use column_data::*;
pub use data_chunk::*;
