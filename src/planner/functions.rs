//! Function catalog
//!
//! Return-type resolution for the built-in aggregate and scalar functions
//! the binder accepts.

use crate::binder_err;
use crate::common::error::PrismResult;
use crate::types::{LogicalType, TypeUtils};

const AGGREGATE_FUNCTIONS: &[&str] = &["count", "sum", "avg", "min", "max", "first", "list"];

pub fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

fn signature(name: &str, arguments: &[LogicalType]) -> String {
    let args: Vec<String> = arguments.iter().map(|t| t.to_string()).collect();
    format!("{}({})", name, args.join(", "))
}

fn no_match(name: &str, arguments: &[LogicalType]) -> crate::common::error::PrismError {
    binder_err!(
        "No function matches the given name and argument types '{}'",
        signature(name, arguments)
    )
}

/// Return type of an aggregate. `count` without arguments counts rows.
pub fn aggregate_return_type(name: &str, arguments: &[LogicalType]) -> PrismResult<LogicalType> {
    let lower = name.to_lowercase();
    if lower == "count" {
        return match arguments.len() {
            0 | 1 => Ok(LogicalType::BigInt),
            _ => Err(no_match(name, arguments)),
        };
    }
    let [argument] = arguments else {
        return Err(no_match(name, arguments));
    };
    match lower.as_str() {
        "sum" => match argument {
            LogicalType::Integer | LogicalType::BigInt | LogicalType::Null => Ok(LogicalType::BigInt),
            LogicalType::Double => Ok(LogicalType::Double),
            _ => Err(no_match(name, arguments)),
        },
        "avg" => {
            if argument.is_numeric() || *argument == LogicalType::Null {
                Ok(LogicalType::Double)
            } else {
                Err(no_match(name, arguments))
            }
        }
        "min" | "max" | "first" => Ok(argument.clone()),
        "list" => Ok(LogicalType::list(argument.clone())),
        _ => Err(binder_err!("Function with name {} does not exist", name)),
    }
}

/// Return type of a scalar function
pub fn scalar_return_type(name: &str, arguments: &[LogicalType]) -> PrismResult<LogicalType> {
    match name.to_lowercase().as_str() {
        "list_value" => {
            let mut child = LogicalType::Null;
            for argument in arguments {
                child = TypeUtils::get_max_type(&child, argument)
                    .map_err(|_| no_match(name, arguments))?;
            }
            Ok(LogicalType::list(child))
        }
        "map" => match arguments {
            [keys, values] => {
                let key_type = list_child_or_null(keys).ok_or_else(|| no_match(name, arguments))?;
                let value_type =
                    list_child_or_null(values).ok_or_else(|| no_match(name, arguments))?;
                Ok(LogicalType::map(key_type, value_type))
            }
            _ => Err(no_match(name, arguments)),
        },
        "map_extract" => match arguments {
            [LogicalType::Map {
                key_type,
                value_type,
            }, key] => {
                // string literals are looked up by their text against any key type
                let textual = **key_type == LogicalType::Varchar || *key == LogicalType::Varchar;
                if !textual {
                    TypeUtils::get_max_type(key_type, key).map_err(|_| no_match(name, arguments))?;
                }
                Ok(LogicalType::list((**value_type).clone()))
            }
            [LogicalType::Null, _] => Ok(LogicalType::list(LogicalType::Null)),
            _ => Err(no_match(name, arguments)),
        },
        "list_extract" => match arguments {
            [list, index] if index.is_integral() => {
                list_child_or_null(list).ok_or_else(|| no_match(name, arguments))
            }
            _ => Err(no_match(name, arguments)),
        },
        "unnest" => match arguments {
            [list] => list_child_or_null(list).ok_or_else(|| no_match(name, arguments)),
            _ => Err(no_match(name, arguments)),
        },
        "coalesce" => {
            if arguments.is_empty() {
                return Err(no_match(name, arguments));
            }
            let mut result = LogicalType::Null;
            for argument in arguments {
                result = TypeUtils::get_max_type(&result, argument)
                    .map_err(|_| no_match(name, arguments))?;
            }
            Ok(result)
        }
        "concat" => Ok(LogicalType::Varchar),
        "lower" | "upper" => match arguments {
            [LogicalType::Varchar | LogicalType::Enum { .. } | LogicalType::Null] => {
                Ok(LogicalType::Varchar)
            }
            _ => Err(no_match(name, arguments)),
        },
        _ => Err(binder_err!("Function with name {} does not exist", name)),
    }
}

fn list_child_or_null(list: &LogicalType) -> Option<LogicalType> {
    match list {
        LogicalType::List(child) => Some((**child).clone()),
        LogicalType::Null => Some(LogicalType::Null),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_types() -> PrismResult<()> {
        assert!(is_aggregate_function("SUM"));
        assert!(!is_aggregate_function("map"));
        assert_eq!(aggregate_return_type("sum", &[LogicalType::Integer])?, LogicalType::BigInt);
        assert_eq!(aggregate_return_type("count", &[])?, LogicalType::BigInt);
        assert_eq!(
            aggregate_return_type("list", &[LogicalType::Varchar])?,
            LogicalType::list(LogicalType::Varchar)
        );
        assert!(aggregate_return_type("sum", &[LogicalType::Varchar]).is_err());
        Ok(())
    }

    #[test]
    fn test_map_function_types() -> PrismResult<()> {
        let map = scalar_return_type(
            "map",
            &[
                LogicalType::list(LogicalType::Varchar),
                LogicalType::list(LogicalType::BigInt),
            ],
        )?;
        assert_eq!(map, LogicalType::map(LogicalType::Varchar, LogicalType::BigInt));

        let extracted = scalar_return_type("map_extract", &[map, LogicalType::Varchar])?;
        assert_eq!(extracted, LogicalType::list(LogicalType::BigInt));
        assert_eq!(
            scalar_return_type("list_extract", &[extracted, LogicalType::Integer])?,
            LogicalType::BigInt
        );
        assert_eq!(
            scalar_return_type("list_value", &[LogicalType::Integer, LogicalType::BigInt])?,
            LogicalType::list(LogicalType::BigInt)
        );
        assert!(scalar_return_type("list_value", &[LogicalType::Integer, LogicalType::Varchar]).is_err());
        assert!(scalar_return_type("nope", &[]).is_err());
        Ok(())
    }
}
