//! SQL rendering for the AST
//!
//! Used for EXPLAIN-style output, debug logging of rewritten stages, and for
//! naming expressions that carry no alias.

use crate::sql::ast::*;
use std::fmt;

/// Quote an identifier unless it is a plain lower-case name
pub fn quote_identifier(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equals => "=",
            BinaryOperator::NotEquals => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        };
        write!(f, "{}", op)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value.to_sql()),
            Expression::ColumnReference { table, column } => match table {
                Some(table) => write!(f, "{}.{}", quote_identifier(table), quote_identifier(column)),
                None => write!(f, "{}", quote_identifier(column)),
            },
            Expression::FunctionCall {
                name,
                arguments,
                distinct,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, arguments)?;
                write!(f, ")")
            }
            Expression::WindowFunction {
                name,
                arguments,
                window_spec,
            } => {
                write!(f, "{}(", name)?;
                write_list(f, arguments)?;
                write!(f, ") OVER (")?;
                if !window_spec.partition_by.is_empty() {
                    write!(f, "PARTITION BY ")?;
                    write_list(f, &window_spec.partition_by)?;
                }
                if !window_spec.order_by.is_empty() {
                    if !window_spec.partition_by.is_empty() {
                        write!(f, " ")?;
                    }
                    write!(f, "ORDER BY ")?;
                    write_list(f, &window_spec.order_by)?;
                }
                write!(f, ")")
            }
            Expression::Cast {
                expression,
                data_type,
            } => write!(f, "CAST({} AS {})", expression, data_type),
            Expression::Subquery(select) => write!(f, "({})", select),
            Expression::Exists(select) => write!(f, "EXISTS ({})", select),
            Expression::IsNull(expression) => write!(f, "({} IS NULL)", expression),
            Expression::IsNotNull(expression) => write!(f, "({} IS NOT NULL)", expression),
            Expression::Binary {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::Unary {
                operator,
                expression,
            } => match operator {
                UnaryOperator::Minus => write!(f, "(-{})", expression),
                UnaryOperator::Not => write!(f, "(NOT {})", expression),
            },
        }
    }
}

impl fmt::Display for OrderByExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.expression,
            if self.ascending { "ASC" } else { "DESC" }
        )
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Expression(expr) => write!(f, "{}", expr),
            SelectItem::QualifiedWildcard(table) => write!(f, "{}.*", quote_identifier(table)),
            SelectItem::Wildcard => write!(f, "*"),
            SelectItem::Alias(expr, alias) => write!(f, "{} AS {}", expr, quote_identifier(alias)),
        }
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        write_list(f, &self.select_list)?;
        if let Some(from) = &self.from {
            write!(f, " FROM {}", from)?;
        }
        if let Some(predicate) = &self.where_clause {
            write!(f, " WHERE {}", predicate)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        Ok(())
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableReference::Table { name, alias } => {
                write!(f, "{}", quote_identifier(name))?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", quote_identifier(alias))?;
                }
                Ok(())
            }
            TableReference::Subquery {
                subquery,
                alias,
                column_aliases,
            } => {
                write!(f, "({})", subquery)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", quote_identifier(alias))?;
                }
                if !column_aliases.is_empty() {
                    let quoted: Vec<String> =
                        column_aliases.iter().map(|c| quote_identifier(c)).collect();
                    write!(f, "({})", quoted.join(", "))?;
                }
                Ok(())
            }
            TableReference::Pivot(pivot) => write!(f, "{}", pivot),
        }
    }
}

impl fmt::Display for StarExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}.*", quote_identifier(relation))?,
            None => write!(f, "*")?,
        }
        if !self.exclude.is_empty() {
            let quoted: Vec<String> = self.exclude.iter().map(|c| quote_identifier(c)).collect();
            write!(f, " EXCLUDE ({})", quoted.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for PivotColumnEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(star) = &self.star {
            write!(f, "{}", star)?;
        } else if self.values.len() == 1 {
            write!(f, "{}", self.values[0].to_sql())?;
        } else {
            let values: Vec<String> = self.values.iter().map(|v| v.to_sql()).collect();
            write!(f, "({})", values.join(", "))?;
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_identifier(alias))?;
        }
        Ok(())
    }
}

/// Renders the SQL-standard form: `source PIVOT (aggs FOR keys IN (...) ...)`
impl fmt::Display for PivotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.source)?;
        if self.is_pivot() {
            write!(f, "PIVOT (")?;
            for (i, aggregate) in self.aggregates.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", aggregate.expression)?;
                if let Some(alias) = &aggregate.alias {
                    write!(f, " AS {}", quote_identifier(alias))?;
                }
            }
            for pivot in &self.pivots {
                write!(f, " FOR ")?;
                write_list(f, &pivot.pivot_expressions)?;
                match &pivot.pivot_enum {
                    Some(enum_name) => write!(f, " IN {}", quote_identifier(enum_name))?,
                    None => {
                        write!(f, " IN (")?;
                        write_list(f, &pivot.entries)?;
                        write!(f, ")")?;
                    }
                }
            }
            if !self.groups.is_empty() {
                let quoted: Vec<String> = self.groups.iter().map(|g| quote_identifier(g)).collect();
                write!(f, " GROUP BY {}", quoted.join(", "))?;
            }
        } else {
            write!(f, "UNPIVOT ")?;
            if self.include_nulls {
                write!(f, "INCLUDE NULLS ")?;
            }
            write!(f, "(")?;
            let names: Vec<String> = self.unpivot_names.iter().map(|n| quote_identifier(n)).collect();
            if names.len() == 1 {
                write!(f, "{}", names[0])?;
            } else {
                write!(f, "({})", names.join(", "))?;
            }
            for pivot in &self.pivots {
                let name_columns: Vec<String> =
                    pivot.unpivot_names.iter().map(|n| quote_identifier(n)).collect();
                write!(f, " FOR {} IN (", name_columns.join(", "))?;
                write_list(f, &pivot.entries)?;
                write!(f, ")")?;
            }
        }
        write!(f, ")")?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_identifier(alias))?;
        }
        if !self.column_aliases.is_empty() {
            let quoted: Vec<String> = self.column_aliases.iter().map(|c| quote_identifier(c)).collect();
            write!(f, "({})", quoted.join(", "))?;
        }
        Ok(())
    }
}
