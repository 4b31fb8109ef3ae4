//! Row-at-a-time expression evaluation

use crate::common::error::{PrismError, PrismResult};
use crate::execution::executor::Executor;
use crate::execution::functions::evaluate_scalar;
use crate::internal_err;
use crate::planner::{BoundExpression, ColumnBinding, SubqueryKind};
use crate::sql::{BinaryOperator, UnaryOperator};
use crate::types::{LogicalType, Value};
use std::cmp::Ordering;

/// A row of an enclosing query, visible to correlated subqueries
#[derive(Debug, Clone)]
pub struct Frame {
    pub bindings: Vec<ColumnBinding>,
    pub row: Vec<Value>,
}

/// The row an expression is evaluated against, plus the rows of all
/// enclosing queries (innermost last)
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'r> {
    pub bindings: &'r [ColumnBinding],
    pub row: &'r [Value],
    pub outer: &'r [Frame],
}

impl<'r> RowContext<'r> {
    pub fn new(bindings: &'r [ColumnBinding], row: &'r [Value], outer: &'r [Frame]) -> Self {
        Self {
            bindings,
            row,
            outer,
        }
    }

    fn lookup(&self, binding: ColumnBinding, depth: usize) -> PrismResult<Value> {
        if depth == 0 {
            if let Some(index) = self.bindings.iter().position(|b| *b == binding) {
                return Ok(self.row[index].clone());
            }
        }
        // table indexes are unique per statement, so the first frame that
        // produces the binding is the right one
        self.outer
            .iter()
            .rev()
            .find_map(|frame| {
                frame
                    .bindings
                    .iter()
                    .position(|b| *b == binding)
                    .map(|index| frame.row[index].clone())
            })
            .ok_or_else(|| internal_err!("Column binding {} is not available", binding))
    }

    /// The enclosing frames seen from inside a subquery of this row
    fn nested_frames(&self) -> Vec<Frame> {
        let mut frames = self.outer.to_vec();
        frames.push(Frame {
            bindings: self.bindings.to_vec(),
            row: self.row.to_vec(),
        });
        frames
    }
}

/// Evaluate `expression` against one row
pub fn evaluate(executor: &Executor<'_>, expression: &BoundExpression, context: &RowContext<'_>) -> PrismResult<Value> {
    match expression {
        BoundExpression::ColumnRef { binding, depth, .. } => context.lookup(*binding, *depth),
        BoundExpression::Constant(value) => Ok(value.clone()),
        BoundExpression::Function {
            name,
            arguments,
            return_type,
        } => {
            let arguments = arguments
                .iter()
                .map(|argument| evaluate(executor, argument, context))
                .collect::<PrismResult<Vec<_>>>()?;
            evaluate_scalar(name, arguments, return_type)
        }
        BoundExpression::Cast { child, target } => evaluate(executor, child, context)?.cast_to(target),
        BoundExpression::Binary {
            operator,
            left,
            right,
            return_type,
        } => {
            let left = evaluate(executor, left, context)?;
            let right = evaluate(executor, right, context)?;
            evaluate_binary(*operator, left, right, return_type)
        }
        BoundExpression::Unary { operator, child, .. } => {
            let value = evaluate(executor, child, context)?;
            evaluate_unary(*operator, value)
        }
        BoundExpression::IsNull { child, negated } => {
            let value = evaluate(executor, child, context)?;
            Ok(Value::Boolean(value.is_null() != *negated))
        }
        BoundExpression::Subquery { subquery, kind, .. } => {
            let frames = context.nested_frames();
            let result = executor.execute_plan(&subquery.plan, &frames)?;
            match kind {
                SubqueryKind::Scalar => Ok(result
                    .rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_iter().next())
                    .unwrap_or(Value::Null)),
                SubqueryKind::Exists => Ok(Value::Boolean(!result.rows.is_empty())),
            }
        }
    }
}

/// Whether a predicate value selects the row
pub fn is_true(value: &Value) -> bool {
    matches!(value, Value::Boolean(true))
}

/// Ordering used by comparisons; a string compared with a value of another
/// kind compares on the textual form.
fn compare_values(left: &Value, right: &Value) -> PrismResult<Ordering> {
    match left.compare(right) {
        Ok(ordering) => Ok(ordering),
        Err(_) if matches!(left, Value::Varchar(_)) || matches!(right, Value::Varchar(_)) => {
            Ok(left.to_string().cmp(&right.to_string()))
        }
        Err(err) => Err(err),
    }
}

fn evaluate_logical(operator: BinaryOperator, left: &Value, right: &Value) -> PrismResult<Value> {
    let as_bool = |value: &Value| -> PrismResult<Option<bool>> {
        if value.is_null() {
            Ok(None)
        } else {
            value.try_as_boolean().map(Some)
        }
    };
    let (left, right) = (as_bool(left)?, as_bool(right)?);
    let result = match operator {
        BinaryOperator::And => match (left, right) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        _ => match (left, right) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(result.map(Value::Boolean).unwrap_or(Value::Null))
}

fn overflow(operator: BinaryOperator, left: &Value, right: &Value) -> PrismError {
    PrismError::Execution(format!(
        "Overflow in {} of {} and {}",
        operator,
        left.to_sql(),
        right.to_sql()
    ))
}

pub(crate) fn evaluate_binary(
    operator: BinaryOperator,
    left: Value,
    right: Value,
    return_type: &LogicalType,
) -> PrismResult<Value> {
    if operator.is_logical() {
        return evaluate_logical(operator, &left, &right);
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if operator.is_comparison() {
        let ordering = compare_values(&left, &right)?;
        let result = match operator {
            BinaryOperator::Equals => ordering == Ordering::Equal,
            BinaryOperator::NotEquals => ordering != Ordering::Equal,
            BinaryOperator::LessThan => ordering == Ordering::Less,
            BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
            BinaryOperator::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Ok(Value::Boolean(result));
    }

    if operator == BinaryOperator::Divide {
        let divisor = right.try_as_f64()?;
        if divisor == 0.0 {
            return Ok(Value::Null);
        }
        return Ok(Value::Double(left.try_as_f64()? / divisor));
    }

    match return_type {
        LogicalType::Integer | LogicalType::BigInt => {
            let (l, r) = (left.try_as_i64()?, right.try_as_i64()?);
            let result = match operator {
                BinaryOperator::Add => l.checked_add(r),
                BinaryOperator::Subtract => l.checked_sub(r),
                BinaryOperator::Multiply => l.checked_mul(r),
                other => return Err(internal_err!("Unexpected arithmetic operator {}", other)),
            }
            .ok_or_else(|| overflow(operator, &left, &right))?;
            if *return_type == LogicalType::Integer {
                i32::try_from(result)
                    .map(Value::Integer)
                    .map_err(|_| overflow(operator, &left, &right))
            } else {
                Ok(Value::BigInt(result))
            }
        }
        _ => {
            let (l, r) = (left.try_as_f64()?, right.try_as_f64()?);
            Ok(Value::Double(match operator {
                BinaryOperator::Add => l + r,
                BinaryOperator::Subtract => l - r,
                BinaryOperator::Multiply => l * r,
                other => return Err(internal_err!("Unexpected arithmetic operator {}", other)),
            }))
        }
    }
}

fn evaluate_unary(operator: UnaryOperator, value: Value) -> PrismResult<Value> {
    match (operator, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, value) => Ok(Value::Boolean(!value.try_as_boolean()?)),
        (UnaryOperator::Minus, Value::Integer(v)) => v
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| PrismError::Execution(format!("Overflow in negation of {}", v))),
        (UnaryOperator::Minus, Value::BigInt(v)) => v
            .checked_neg()
            .map(Value::BigInt)
            .ok_or_else(|| PrismError::Execution(format!("Overflow in negation of {}", v))),
        (UnaryOperator::Minus, Value::Double(v)) => Ok(Value::Double(-v)),
        (UnaryOperator::Minus, other) => Err(PrismError::InvalidType(format!(
            "Cannot negate a value of type {}",
            other.get_type()
        ))),
    }
}
