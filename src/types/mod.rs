//! Type system: logical types and values

pub mod logical_type;
pub mod value;

pub use logical_type::{LogicalType, TypeUtils};
pub use value::Value;
