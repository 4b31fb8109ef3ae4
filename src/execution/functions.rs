//! Scalar function implementations

use crate::common::error::{PrismError, PrismResult};
use crate::internal_err;
use crate::types::{LogicalType, Value};

/// Key equality used by MAP construction and lookup. NULL keys match each
/// other; a string matches any key with the same textual form.
pub fn map_key_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(l, r)| map_key_equals(l, r))
        }
        (Value::Varchar(_), other) | (other, Value::Varchar(_))
            if !matches!(other, Value::Varchar(_)) =>
        {
            left.to_string() == right.to_string()
        }
        _ => left.sql_equals(right),
    }
}

fn list_argument<'v>(name: &str, value: &'v Value) -> PrismResult<&'v [Value]> {
    match value {
        Value::List(values) => Ok(values),
        other => Err(PrismError::Execution(format!(
            "{}: expected a LIST argument, got {}",
            name,
            other.get_type()
        ))),
    }
}

/// Evaluate a scalar function over already evaluated arguments
pub fn evaluate_scalar(name: &str, arguments: Vec<Value>, return_type: &LogicalType) -> PrismResult<Value> {
    match name {
        "list_value" => {
            let child = return_type.list_child()?;
            let values = arguments
                .iter()
                .map(|v| v.cast_to(child))
                .collect::<PrismResult<Vec<_>>>()?;
            Ok(Value::List(values))
        }
        "map" => {
            let [keys, values] = arguments.as_slice() else {
                return Err(internal_err!("map() expects two arguments"));
            };
            if keys.is_null() || values.is_null() {
                return Ok(Value::Null);
            }
            let keys = list_argument(name, keys)?;
            let values = list_argument(name, values)?;
            if keys.len() != values.len() {
                return Err(PrismError::Execution(
                    "Key list has a different size from Value list".to_string(),
                ));
            }
            let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(keys.len());
            for (key, value) in keys.iter().zip(values) {
                if pairs.iter().any(|(existing, _)| map_key_equals(existing, key)) {
                    return Err(PrismError::Execution(format!(
                        "Map keys have to be unique, {} appears more than once",
                        key.to_sql()
                    )));
                }
                pairs.push((key.clone(), value.clone()));
            }
            Ok(Value::Map(pairs))
        }
        "map_extract" => {
            let [map, key] = arguments.as_slice() else {
                return Err(internal_err!("map_extract() expects two arguments"));
            };
            match map {
                Value::Null => Ok(Value::List(Vec::new())),
                Value::Map(pairs) => Ok(Value::List(
                    pairs
                        .iter()
                        .find(|(k, _)| map_key_equals(k, key))
                        .map(|(_, v)| v.clone())
                        .into_iter()
                        .collect(),
                )),
                other => Err(PrismError::Execution(format!(
                    "map_extract: expected a MAP, got {}",
                    other.get_type()
                ))),
            }
        }
        "list_extract" => {
            let [list, index] = arguments.as_slice() else {
                return Err(internal_err!("list_extract() expects two arguments"));
            };
            if list.is_null() || index.is_null() {
                return Ok(Value::Null);
            }
            let values = list_argument(name, list)?;
            let index = index.try_as_i64()?;
            let position = if index > 0 {
                usize::try_from(index - 1).ok()
            } else if index < 0 {
                usize::try_from(index.unsigned_abs())
                    .ok()
                    .and_then(|back| values.len().checked_sub(back))
            } else {
                None
            };
            Ok(position
                .and_then(|p| values.get(p))
                .cloned()
                .unwrap_or(Value::Null))
        }
        "coalesce" => Ok(arguments
            .into_iter()
            .find(|v| !v.is_null())
            .unwrap_or(Value::Null)),
        "concat" => Ok(Value::Varchar(
            arguments
                .iter()
                .filter(|v| !v.is_null())
                .map(Value::to_string)
                .collect(),
        )),
        "lower" | "upper" => match arguments.as_slice() {
            [Value::Null] => Ok(Value::Null),
            [value] => {
                let text = value.to_string();
                Ok(Value::Varchar(if name == "lower" {
                    text.to_lowercase()
                } else {
                    text.to_uppercase()
                }))
            }
            _ => Err(internal_err!("{}() expects one argument", name)),
        },
        other => Err(internal_err!("Scalar function {} cannot be executed", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: Vec<Value>) -> Value {
        Value::List(values)
    }

    #[test]
    fn test_map_roundtrip() -> PrismResult<()> {
        let map = evaluate_scalar(
            "map",
            vec![
                list(vec!["Q1".into(), "Q2".into()]),
                list(vec![Value::BigInt(10), Value::Null]),
            ],
            &LogicalType::map(LogicalType::Varchar, LogicalType::BigInt),
        )?;
        let hit = evaluate_scalar(
            "map_extract",
            vec![map.clone(), "Q1".into()],
            &LogicalType::list(LogicalType::BigInt),
        )?;
        assert_eq!(hit, list(vec![Value::BigInt(10)]));
        let miss = evaluate_scalar("map_extract", vec![map, "Q3".into()], &LogicalType::list(LogicalType::BigInt))?;
        assert_eq!(miss, list(vec![]));
        Ok(())
    }

    #[test]
    fn test_map_errors() {
        let mismatched = evaluate_scalar(
            "map",
            vec![list(vec![1.into()]), list(vec![])],
            &LogicalType::map(LogicalType::Integer, LogicalType::Null),
        );
        assert!(mismatched.is_err());
        let duplicate = evaluate_scalar(
            "map",
            vec![list(vec![1.into(), 1.into()]), list(vec![1.into(), 2.into()])],
            &LogicalType::map(LogicalType::Integer, LogicalType::Integer),
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_list_extract_positions() -> PrismResult<()> {
        let values = list(vec![1.into(), 2.into(), 3.into()]);
        let extract = |index: i32| {
            evaluate_scalar("list_extract", vec![values.clone(), index.into()], &LogicalType::Integer)
        };
        assert_eq!(extract(1)?, Value::Integer(1));
        assert_eq!(extract(-1)?, Value::Integer(3));
        assert_eq!(extract(0)?, Value::Null);
        assert_eq!(extract(4)?, Value::Null);
        assert_eq!(extract(-4)?, Value::Null);
        Ok(())
    }

    #[test]
    fn test_key_equality() {
        assert!(map_key_equals(&Value::Null, &Value::Null));
        assert!(map_key_equals(&Value::Integer(2020), &Value::BigInt(2020)));
        assert!(map_key_equals(&Value::Integer(2020), &Value::varchar("2020")));
        assert!(!map_key_equals(&Value::varchar("a"), &Value::varchar("b")));
    }
}
