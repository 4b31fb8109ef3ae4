use crate::common::error::{PrismError, PrismResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical types represent the SQL-level types that users interact with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    /// Type of an untyped NULL literal
    Null,
    /// Boolean type (TRUE/FALSE)
    Boolean,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    BigInt,
    /// 64-bit double precision
    Double,
    /// Variable length string
    Varchar,
    /// List type with element type
    List(Box<LogicalType>),
    /// Map type with key and value types
    Map {
        key_type: Box<LogicalType>,
        value_type: Box<LogicalType>,
    },
    /// Enum type with its members in ordinal order
    Enum { name: String, values: Vec<String> },
    /// Invalid/unknown type
    Invalid,
}

impl LogicalType {
    pub fn list(element_type: LogicalType) -> Self {
        LogicalType::List(Box::new(element_type))
    }

    pub fn map(key_type: LogicalType, value_type: LogicalType) -> Self {
        LogicalType::Map {
            key_type: Box::new(key_type),
            value_type: Box::new(value_type),
        }
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            LogicalType::Integer | LogicalType::BigInt | LogicalType::Double
        )
    }

    /// Check if this is an integral type
    pub fn is_integral(&self) -> bool {
        matches!(self, LogicalType::Integer | LogicalType::BigInt)
    }

    /// Check if this is a nested type
    pub fn is_nested(&self) -> bool {
        matches!(self, LogicalType::List(_) | LogicalType::Map { .. })
    }

    /// Element type of a LIST
    pub fn list_child(&self) -> PrismResult<&LogicalType> {
        match self {
            LogicalType::List(child) => Ok(child),
            other => Err(PrismError::InvalidType(format!(
                "Expected a LIST type, got {}",
                other
            ))),
        }
    }

    /// Number of members of an ENUM
    pub fn enum_size(&self) -> PrismResult<usize> {
        match self {
            LogicalType::Enum { values, .. } => Ok(values.len()),
            other => Err(PrismError::InvalidType(format!(
                "Expected an ENUM type, got {}",
                other
            ))),
        }
    }

    /// Textual form of the ENUM member at `index`
    pub fn enum_value(&self, index: usize) -> PrismResult<&str> {
        match self {
            LogicalType::Enum { name, values } => values
                .get(index)
                .map(String::as_str)
                .ok_or_else(|| {
                    PrismError::InvalidArgument(format!(
                        "ENUM {} has no member at position {}",
                        name, index
                    ))
                }),
            other => Err(PrismError::InvalidType(format!(
                "Expected an ENUM type, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::Double => write!(f, "DOUBLE"),
            LogicalType::Varchar => write!(f, "VARCHAR"),
            LogicalType::List(element_type) => write!(f, "{}[]", element_type),
            LogicalType::Map {
                key_type,
                value_type,
            } => write!(f, "MAP({}, {})", key_type, value_type),
            LogicalType::Enum { name, .. } => write!(f, "ENUM({})", name),
            LogicalType::Null => write!(f, "NULL"),
            LogicalType::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Type system utilities
pub struct TypeUtils;

impl TypeUtils {
    /// Get the smallest type that can hold both types
    pub fn get_max_type(type1: &LogicalType, type2: &LogicalType) -> PrismResult<LogicalType> {
        use LogicalType::*;

        if type1 == type2 {
            return Ok(type1.clone());
        }

        match (type1, type2) {
            (Null, other) | (other, Null) => Ok(other.clone()),
            (Integer, BigInt) | (BigInt, Integer) => Ok(BigInt),
            (Integer | BigInt, Double) | (Double, Integer | BigInt) => Ok(Double),
            (Enum { .. }, Varchar) | (Varchar, Enum { .. }) => Ok(Varchar),
            (Enum { .. }, Enum { .. }) => Ok(Varchar),
            (List(a), List(b)) => Ok(LogicalType::list(Self::get_max_type(a, b)?)),
            _ => Err(PrismError::InvalidType(format!(
                "Cannot find common type between {} and {}",
                type1, type2
            ))),
        }
    }
}
