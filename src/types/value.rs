use crate::common::error::{PrismError, PrismResult};
use crate::types::logical_type::{LogicalType, TypeUtils};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single SQL value tagged with its kind
///
/// Equality and hashing are structural (doubles compare by their total
/// order), which makes values usable as hash-set keys when detecting
/// duplicate pivot tuples. SQL comparison semantics with numeric coercion
/// live in [`Value::compare`] and [`Value::sql_equals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    Varchar(String),
    List(Vec<Value>),
    /// Map value (key-value pairs in insertion order)
    Map(Vec<(Value, Value)>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (Value::Varchar(a), Value::Varchar(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::Double(v) => OrderedFloat(*v).hash(state),
            Value::Varchar(v) => v.hash(state),
            Value::List(values) => values.hash(state),
            Value::Map(pairs) => pairs.hash(state),
        }
    }
}

impl Value {
    pub fn varchar(value: impl Into<String>) -> Self {
        Value::Varchar(value.into())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the logical type of this value
    pub fn get_type(&self) -> LogicalType {
        match self {
            Value::Null => LogicalType::Null,
            Value::Boolean(_) => LogicalType::Boolean,
            Value::Integer(_) => LogicalType::Integer,
            Value::BigInt(_) => LogicalType::BigInt,
            Value::Double(_) => LogicalType::Double,
            Value::Varchar(_) => LogicalType::Varchar,
            Value::List(values) => {
                let child = values
                    .iter()
                    .map(Value::get_type)
                    .try_fold(LogicalType::Null, |acc, t| TypeUtils::get_max_type(&acc, &t))
                    .unwrap_or(LogicalType::Invalid);
                LogicalType::list(child)
            }
            Value::Map(pairs) => match pairs.first() {
                Some((k, v)) => LogicalType::map(k.get_type(), v.get_type()),
                None => LogicalType::map(LogicalType::Null, LogicalType::Null),
            },
        }
    }

    /// Try to extract a boolean value
    pub fn try_as_boolean(&self) -> PrismResult<bool> {
        match self {
            Value::Boolean(value) => Ok(*value),
            _ => Err(PrismError::InvalidType(format!(
                "Cannot extract boolean from {}",
                self.get_type()
            ))),
        }
    }

    /// Try to extract an i64 value
    pub fn try_as_i64(&self) -> PrismResult<i64> {
        match self {
            Value::BigInt(value) => Ok(*value),
            Value::Integer(value) => Ok(*value as i64),
            _ => Err(PrismError::InvalidType(format!(
                "Cannot extract i64 from {}",
                self.get_type()
            ))),
        }
    }

    /// Try to extract an f64 value
    pub fn try_as_f64(&self) -> PrismResult<f64> {
        match self {
            Value::Double(value) => Ok(*value),
            Value::BigInt(value) => Ok(*value as f64),
            Value::Integer(value) => Ok(*value as f64),
            _ => Err(PrismError::InvalidType(format!(
                "Cannot extract f64 from {}",
                self.get_type()
            ))),
        }
    }

    /// Try to borrow a string value
    pub fn try_as_str(&self) -> PrismResult<&str> {
        match self {
            Value::Varchar(value) => Ok(value),
            _ => Err(PrismError::InvalidType(format!(
                "Cannot extract string from {}",
                self.get_type()
            ))),
        }
    }

    /// Cast this value to a target type
    pub fn cast_to(&self, target_type: &LogicalType) -> PrismResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if &self.get_type() == target_type {
            return Ok(self.clone());
        }

        match (self, target_type) {
            (_, LogicalType::Varchar) | (_, LogicalType::Enum { .. }) => {
                Ok(Value::Varchar(self.to_string()))
            }
            (Value::Integer(v), LogicalType::BigInt) => Ok(Value::BigInt(*v as i64)),
            (Value::Integer(v), LogicalType::Double) => Ok(Value::Double(*v as f64)),
            (Value::BigInt(v), LogicalType::Double) => Ok(Value::Double(*v as f64)),
            (Value::BigInt(v), LogicalType::Integer) => i32::try_from(*v)
                .map(Value::Integer)
                .map_err(|_| PrismError::InvalidArgument(format!("{} is out of range for INTEGER", v))),
            (Value::Double(v), LogicalType::BigInt) => Ok(Value::BigInt(v.round() as i64)),
            (Value::Varchar(s), LogicalType::Integer) => s
                .trim()
                .parse()
                .map(Value::Integer)
                .map_err(|_| PrismError::InvalidArgument(format!("Cannot cast '{}' to INTEGER", s))),
            (Value::Varchar(s), LogicalType::BigInt) => s
                .trim()
                .parse()
                .map(Value::BigInt)
                .map_err(|_| PrismError::InvalidArgument(format!("Cannot cast '{}' to BIGINT", s))),
            (Value::Varchar(s), LogicalType::Double) => s
                .trim()
                .parse()
                .map(Value::Double)
                .map_err(|_| PrismError::InvalidArgument(format!("Cannot cast '{}' to DOUBLE", s))),
            (Value::Varchar(s), LogicalType::Boolean) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(PrismError::InvalidArgument(format!(
                    "Cannot cast '{}' to BOOLEAN",
                    s
                ))),
            },
            (Value::List(values), LogicalType::List(child)) => Ok(Value::List(
                values
                    .iter()
                    .map(|v| v.cast_to(child))
                    .collect::<PrismResult<_>>()?,
            )),
            _ => Err(PrismError::InvalidType(format!(
                "Cannot cast from {} to {}",
                self.get_type(),
                target_type
            ))),
        }
    }

    /// Compare two values for ordering. NULL sorts first; numerics compare
    /// across widths; lists compare lexicographically.
    pub fn compare(&self, other: &Value) -> PrismResult<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Integer(_) | Value::BigInt(_), Value::Integer(_) | Value::BigInt(_)) => {
                Ok(self.try_as_i64()?.cmp(&other.try_as_i64()?))
            }
            (
                Value::Integer(_) | Value::BigInt(_) | Value::Double(_),
                Value::Integer(_) | Value::BigInt(_) | Value::Double(_),
            ) => Ok(OrderedFloat(self.try_as_f64()?).cmp(&OrderedFloat(other.try_as_f64()?))),
            (Value::Varchar(a), Value::Varchar(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    let ord = left.compare(right)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(PrismError::InvalidType(format!(
                "Cannot compare {} and {}",
                self.get_type(),
                other.get_type()
            ))),
        }
    }

    /// SQL equality used for lookups: NULL never matches, numerics coerce,
    /// values of incomparable kinds are simply unequal.
    pub fn sql_equals(&self, other: &Value) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| l.sql_equals(r))
            }
            _ => matches!(self.compare(other), Ok(Ordering::Equal)),
        }
    }

    /// Render as a SQL literal
    pub fn to_sql(&self) -> String {
        match self {
            Value::Varchar(s) => format!("'{}'", s.replace('\'', "''")),
            Value::List(values) => {
                let items: Vec<String> = values.iter().map(Value::to_sql).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(pairs) => {
                let items: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_sql(), v.to_sql()))
                    .collect();
                format!("MAP {{{}}}", items.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Textual form of a value; strings are rendered bare, which is what pivot
/// column names are derived from.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Integer(value) => write!(f, "{}", value),
            Value::BigInt(value) => write!(f, "{}", value),
            Value::Double(value) => write!(f, "{}", value),
            Value::Varchar(value) => write!(f, "{}", value),
            Value::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::BigInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_equality_and_hashing() {
        let mut seen = HashSet::new();
        assert!(seen.insert(Value::varchar("Q1")));
        assert!(!seen.insert(Value::varchar("Q1")));
        assert!(seen.insert(Value::Double(1.5)));
        assert!(!seen.insert(Value::Double(1.5)));
        assert!(seen.insert(Value::List(vec![Value::Integer(1), Value::varchar("a")])));
        assert!(!seen.insert(Value::List(vec![Value::Integer(1), Value::varchar("a")])));
        // different kinds are distinct keys even when numerically equal
        assert!(seen.insert(Value::BigInt(1)));
        assert!(seen.insert(Value::Integer(1)));
    }

    #[test]
    fn test_sql_equality_coerces_numerics() {
        assert!(Value::Integer(2020).sql_equals(&Value::BigInt(2020)));
        assert!(Value::BigInt(3).sql_equals(&Value::Double(3.0)));
        assert!(!Value::Null.sql_equals(&Value::Null));
        assert!(!Value::varchar("1").sql_equals(&Value::Integer(1)));
    }

    #[test]
    fn test_compare_orders_nulls_first() -> PrismResult<()> {
        assert_eq!(Value::Null.compare(&Value::Integer(1))?, Ordering::Less);
        assert_eq!(
            Value::List(vec![1.into(), 2.into()]).compare(&Value::List(vec![1.into()]))?,
            Ordering::Greater
        );
        Ok(())
    }

    #[test]
    fn test_display_and_sql_rendering() {
        assert_eq!(Value::varchar("it's").to_string(), "it's");
        assert_eq!(Value::varchar("it's").to_sql(), "'it''s'");
        assert_eq!(Value::List(vec!["a".into(), 1.into()]).to_sql(), "['a', 1]");
    }

    #[test]
    fn test_casts() -> PrismResult<()> {
        assert_eq!(Value::Integer(7).cast_to(&LogicalType::Varchar)?, Value::varchar("7"));
        assert_eq!(Value::varchar("42").cast_to(&LogicalType::BigInt)?, Value::BigInt(42));
        assert!(Value::varchar("x").cast_to(&LogicalType::Double).is_err());
        Ok(())
    }
}
