//! Aggregate function states

use crate::common::error::{PrismError, PrismResult};
use crate::internal_err;
use crate::planner::BoundAggregate;
use crate::types::{LogicalType, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum AggregateState {
    CountStar(i64),
    Count(i64),
    SumInteger(Option<i64>),
    SumDouble(Option<f64>),
    Avg { sum: f64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    List(Vec<Value>),
}

/// Running state of one aggregate within one group
#[derive(Debug, Clone)]
pub struct AggregateAccumulator {
    state: AggregateState,
    /// Argument tuples already seen, for DISTINCT aggregates
    seen: Option<HashSet<Vec<Value>>>,
}

impl AggregateAccumulator {
    pub fn new(aggregate: &BoundAggregate) -> PrismResult<Self> {
        let state = match (aggregate.name.as_str(), aggregate.arguments.len()) {
            ("count", 0) => AggregateState::CountStar(0),
            ("count", _) => AggregateState::Count(0),
            ("sum", _) => match aggregate.return_type {
                LogicalType::Double => AggregateState::SumDouble(None),
                _ => AggregateState::SumInteger(None),
            },
            ("avg", _) => AggregateState::Avg { sum: 0.0, count: 0 },
            ("min", _) => AggregateState::Min(None),
            ("max", _) => AggregateState::Max(None),
            ("first", _) => AggregateState::First(None),
            ("list", _) => AggregateState::List(Vec::new()),
            (name, _) => return Err(internal_err!("Unknown aggregate function {}", name)),
        };
        Ok(Self {
            state,
            seen: aggregate.distinct.then(HashSet::new),
        })
    }

    /// Feed one row's argument values
    pub fn update(&mut self, arguments: &[Value]) -> PrismResult<()> {
        if let Some(seen) = &mut self.seen {
            if !seen.insert(arguments.to_vec()) {
                return Ok(());
            }
        }
        let value = arguments.first().unwrap_or(&Value::Null);
        match &mut self.state {
            AggregateState::CountStar(count) => *count += 1,
            AggregateState::Count(count) => {
                if !value.is_null() {
                    *count += 1;
                }
            }
            AggregateState::SumInteger(sum) => {
                if !value.is_null() {
                    let current = sum.unwrap_or(0);
                    let next = current
                        .checked_add(value.try_as_i64()?)
                        .ok_or_else(|| PrismError::Execution("Overflow in SUM".to_string()))?;
                    *sum = Some(next);
                }
            }
            AggregateState::SumDouble(sum) => {
                if !value.is_null() {
                    *sum = Some(sum.unwrap_or(0.0) + value.try_as_f64()?);
                }
            }
            AggregateState::Avg { sum, count } => {
                if !value.is_null() {
                    *sum += value.try_as_f64()?;
                    *count += 1;
                }
            }
            AggregateState::Min(current) => update_extreme(current, value, Ordering::Less)?,
            AggregateState::Max(current) => update_extreme(current, value, Ordering::Greater)?,
            AggregateState::First(first) => {
                if first.is_none() {
                    *first = Some(value.clone());
                }
            }
            // NULLs are kept so lists collected side by side stay aligned
            AggregateState::List(values) => values.push(value.clone()),
        }
        Ok(())
    }

    pub fn finalize(&self) -> Value {
        match &self.state {
            AggregateState::CountStar(count) | AggregateState::Count(count) => Value::BigInt(*count),
            AggregateState::SumInteger(sum) => sum.map(Value::BigInt).unwrap_or(Value::Null),
            AggregateState::SumDouble(sum) => sum.map(Value::Double).unwrap_or(Value::Null),
            AggregateState::Avg { sum, count } => {
                if *count == 0 {
                    Value::Null
                } else {
                    Value::Double(sum / *count as f64)
                }
            }
            AggregateState::Min(value) | AggregateState::Max(value) | AggregateState::First(value) => {
                value.clone().unwrap_or(Value::Null)
            }
            AggregateState::List(values) => {
                if values.is_empty() {
                    Value::Null
                } else {
                    Value::List(values.clone())
                }
            }
        }
    }
}

fn update_extreme(current: &mut Option<Value>, value: &Value, wanted: Ordering) -> PrismResult<()> {
    if value.is_null() {
        return Ok(());
    }
    let replace = match current {
        None => true,
        Some(existing) => value.compare(existing)? == wanted,
    };
    if replace {
        *current = Some(value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(name: &str, distinct: bool, return_type: LogicalType) -> BoundAggregate {
        BoundAggregate {
            name: name.to_string(),
            arguments: vec![crate::planner::BoundExpression::Constant(Value::Null)],
            distinct,
            return_type,
        }
    }

    fn run(aggregate: &BoundAggregate, values: &[Value]) -> PrismResult<Value> {
        let mut accumulator = AggregateAccumulator::new(aggregate)?;
        for value in values {
            accumulator.update(std::slice::from_ref(value))?;
        }
        Ok(accumulator.finalize())
    }

    #[test]
    fn test_sum_count_avg_skip_nulls() -> PrismResult<()> {
        let values = [Value::Integer(3), Value::Null, Value::Integer(4)];
        assert_eq!(run(&aggregate("sum", false, LogicalType::BigInt), &values)?, Value::BigInt(7));
        assert_eq!(run(&aggregate("count", false, LogicalType::BigInt), &values)?, Value::BigInt(2));
        assert_eq!(run(&aggregate("avg", false, LogicalType::Double), &values)?, Value::Double(3.5));
        assert_eq!(run(&aggregate("sum", false, LogicalType::BigInt), &[Value::Null])?, Value::Null);
        Ok(())
    }

    #[test]
    fn test_list_keeps_nulls() -> PrismResult<()> {
        let values = [Value::Integer(1), Value::Null];
        assert_eq!(
            run(&aggregate("list", false, LogicalType::list(LogicalType::Integer)), &values)?,
            Value::List(vec![Value::Integer(1), Value::Null])
        );
        Ok(())
    }

    #[test]
    fn test_min_max_distinct() -> PrismResult<()> {
        let values = [Value::varchar("b"), Value::varchar("a"), Value::varchar("b")];
        assert_eq!(run(&aggregate("min", false, LogicalType::Varchar), &values)?, Value::varchar("a"));
        assert_eq!(run(&aggregate("max", false, LogicalType::Varchar), &values)?, Value::varchar("b"));
        assert_eq!(run(&aggregate("count", true, LogicalType::BigInt), &values)?, Value::BigInt(2));
        Ok(())
    }

    #[test]
    fn test_sum_overflow() {
        let values = [Value::BigInt(i64::MAX), Value::BigInt(1)];
        assert!(run(&aggregate("sum", false, LogicalType::BigInt), &values).is_err());
    }
}
