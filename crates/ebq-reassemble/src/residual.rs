//! Client-side expression evaluation over already-decoded row values:
//! whatever `ebq-rewrite` couldn't push down as server SQL is evaluated
//! here, one row at a time, against the flat postfix [`Token`] sequences
//! the rewriter carried in [`ebq_rewrite::ResidualPredicate`] and
//! [`ebq_rewrite::Projection::ClientComputed`].

use std::collections::HashMap;

use ebq_schema::{AggregationFn, BuiltinFn, EbqError, Literal, Operator, Token};
use serde_json::{Number, Value};

/// A decoded row, keyed by plaintext column name.
pub type Row = HashMap<String, Value>;

/// Evaluates a postfix expression against one decoded row. `Field` tokens
/// look themselves up in `row`; aggregation tokens are out of scope here
/// (they reduce an entire matched row set, not a single row) and are
/// rejected - callers detect and special-case a top-level aggregation
/// before reaching this function.
pub fn evaluate_row(tokens: &[Token], row: &Row) -> Result<Value, EbqError> {
    let mut stack: Vec<Value> = Vec::new();
    for tok in tokens {
        match tok {
            Token::Literal(lit) => stack.push(literal_value(lit)),
            Token::Field(name) => {
                let v = row.get(name).ok_or_else(|| EbqError::invalid_query(name, "referenced column was not fetched for this row"))?;
                stack.push(v.clone());
            }
            Token::EncryptedField { alias, .. } => {
                let v = row.get(alias).ok_or_else(|| EbqError::invalid_query(alias, "referenced column was not fetched for this row"))?;
                stack.push(v.clone());
            }
            Token::CountStar => return Err(EbqError::invalid_query("COUNT(*)", "cannot appear inside a row-level expression")),
            Token::Operator(op) => apply_operator(*op, &mut stack)?,
            Token::BuiltinFn { func, arg_count } => apply_builtin(*func, *arg_count, &mut stack)?,
            Token::AggregationFn { func, .. } => return Err(EbqError::invalid_query(func.name(), "aggregation cannot appear inside a row-level expression")),
            Token::AggregationQuery(label) | Token::UnencryptedQuery(label) => {
                let v = row.get(label).ok_or_else(|| EbqError::invalid_query(label, "sub-query result was not supplied for this row"))?;
                stack.push(v.clone());
            }
        }
    }
    stack.pop().ok_or_else(|| EbqError::invalid_query("expression", "empty postfix sequence"))
}

/// Reduces every decoded value of one column across the full matched row
/// set - the path a bare `AGG(field)` client-computed projection takes
///.
pub fn reduce_aggregate(func: AggregationFn, distinct: bool, mut values: Vec<Value>) -> Result<Value, EbqError> {
    values.retain(|v| !v.is_null());
    if distinct {
        let mut seen = Vec::new();
        values.retain(|v| {
            let key = v.to_string();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }

    match func {
        AggregationFn::Count => Ok(Value::from(values.len() as i64)),
        AggregationFn::Min => Ok(values.into_iter().min_by(cmp_values).unwrap_or(Value::Null)),
        AggregationFn::Max => Ok(values.into_iter().max_by(cmp_values).unwrap_or(Value::Null)),
        AggregationFn::Sum => numeric_fold(&values, 0.0, |a, b| a + b),
        AggregationFn::Avg => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let sum = numeric_fold(&values, 0.0, |a, b| a + b)?;
            let n = values.len() as f64;
            Ok(as_number(sum.as_f64().unwrap_or(0.0) / n))
        }
        AggregationFn::GroupConcat => {
            let joined = values.iter().map(display_value).collect::<Vec<_>>().join(",");
            Ok(Value::String(joined))
        }
        AggregationFn::Top => {
            // TOP(field) with no explicit count/offset: the single most
            // frequent value, ties broken by first occurrence.
            let mut counts: Vec<(String, Value, u64)> = Vec::new();
            for v in values {
                let key = v.to_string();
                match counts.iter_mut().find(|(k, ..)| *k == key) {
                    Some((_, _, n)) => *n += 1,
                    None => counts.push((key, v, 1)),
                }
            }
            Ok(counts.into_iter().max_by_key(|(_, _, n)| *n).map(|(_, v, _)| v).unwrap_or(Value::Null))
        }
    }
}

fn numeric_fold(values: &[Value], init: f64, f: impl Fn(f64, f64) -> f64) -> Result<Value, EbqError> {
    let mut acc = init;
    for v in values {
        let n = v.as_f64().ok_or_else(|| EbqError::Format(format!("{v}: not numeric")))?;
        acc = f(acc, n);
    }
    Ok(as_number(acc))
}

fn as_number(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cmp_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Integer(n) => Value::from(*n),
        Literal::Float(f) => as_number(*f),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, EbqError> {
    stack.pop().ok_or_else(|| EbqError::invalid_query("expression", "malformed postfix sequence"))
}

fn apply_operator(op: Operator, stack: &mut Vec<Value>) -> Result<(), EbqError> {
    if op.arity() == 1 {
        let a = pop(stack)?;
        let result = match op {
            Operator::Not => match a {
                Value::Null => Value::Null,
                Value::Bool(b) => Value::Bool(!b),
                other => return Err(EbqError::Format(format!("{other}: NOT requires a boolean"))),
            },
            Operator::IsNull => Value::Bool(a.is_null()),
            Operator::IsNotNull => Value::Bool(!a.is_null()),
            other => return Err(EbqError::invalid_query(other.surface(), "not a unary operator")),
        };
        stack.push(result);
        return Ok(());
    }

    let b = pop(stack)?;
    let a = pop(stack)?;

    if matches!(op, Operator::And | Operator::Or) {
        stack.push(apply_boolean(op, a, b)?);
        return Ok(());
    }

    if a.is_null() || b.is_null() {
        stack.push(Value::Null);
        return Ok(());
    }

    let result = match op {
        Operator::Add | Operator::Sub | Operator::Mul | Operator::Div => apply_arithmetic(op, &a, &b)?,
        Operator::Eq => Value::Bool(values_equal(&a, &b)),
        Operator::NotEq => Value::Bool(!values_equal(&a, &b)),
        Operator::Lt => Value::Bool(cmp_values(&a, &b) == std::cmp::Ordering::Less),
        Operator::LtEq => Value::Bool(cmp_values(&a, &b) != std::cmp::Ordering::Greater),
        Operator::Gt => Value::Bool(cmp_values(&a, &b) == std::cmp::Ordering::Greater),
        Operator::GtEq => Value::Bool(cmp_values(&a, &b) != std::cmp::Ordering::Less),
        Operator::Like => Value::Bool(like_match(value_as_str(&a)?, value_as_str(&b)?)),
        Operator::In => return Err(EbqError::invalid_query("IN", "must be desugared to OR before reaching the residual evaluator")),
        Operator::And | Operator::Or | Operator::Not | Operator::IsNull | Operator::IsNotNull => unreachable!("handled above"),
    };
    stack.push(result);
    Ok(())
}

fn apply_boolean(op: Operator, a: Value, b: Value) -> Result<Value, EbqError> {
    let (a, b) = (as_bool_opt(&a)?, as_bool_opt(&b)?);
    Ok(match op {
        // Three-valued logic: AND is false if either side is false even under NULL, matching SQL.
        Operator::And => match (a, b) {
            (Some(false), _) | (_, Some(false)) => Value::Bool(false),
            (Some(true), Some(true)) => Value::Bool(true),
            _ => Value::Null,
        },
        Operator::Or => match (a, b) {
            (Some(true), _) | (_, Some(true)) => Value::Bool(true),
            (Some(false), Some(false)) => Value::Bool(false),
            _ => Value::Null,
        },
        _ => unreachable!("caller filters to AND/OR"),
    })
}

fn as_bool_opt(v: &Value) -> Result<Option<bool>, EbqError> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(EbqError::Format(format!("{other}: expected a boolean"))),
    }
}

fn apply_arithmetic(op: Operator, a: &Value, b: &Value) -> Result<Value, EbqError> {
    let x = a.as_f64().ok_or_else(|| EbqError::Format(format!("{a}: not numeric")))?;
    let y = b.as_f64().ok_or_else(|| EbqError::Format(format!("{b}: not numeric")))?;
    let result = match op {
        Operator::Add => x + y,
        Operator::Sub => x - y,
        Operator::Mul => x * y,
        Operator::Div => {
            if y == 0.0 {
                return Err(EbqError::Format("division by zero".to_string()));
            }
            x / y
        }
        _ => unreachable!("caller filters to arithmetic operators"),
    };
    if a.is_i64() && b.is_i64() && op != Operator::Div {
        Ok(Value::from(result as i64))
    } else {
        Ok(as_number(result))
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (x, y) => x == y,
    }
}

fn value_as_str(v: &Value) -> Result<&str, EbqError> {
    v.as_str().ok_or_else(|| EbqError::Format(format!("{v}: expected a string")))
}

/// `%`-wildcard containment match; `_` is not a special character in this
/// dialect's `LIKE`.
fn like_match(haystack: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return haystack == pattern;
    }
    let mut rest = haystack;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn apply_builtin(func: BuiltinFn, arg_count: usize, stack: &mut Vec<Value>) -> Result<(), EbqError> {
    let mut args = Vec::with_capacity(arg_count);
    for _ in 0..arg_count {
        args.push(pop(stack)?);
    }
    args.reverse();

    let result = match func {
        BuiltinFn::Lower => Value::String(value_as_str(&args[0])?.to_lowercase()),
        BuiltinFn::Upper => Value::String(value_as_str(&args[0])?.to_uppercase()),
        BuiltinFn::Length => Value::from(value_as_str(&args[0])?.chars().count() as i64),
        BuiltinFn::Concat => {
            let mut s = String::new();
            for a in &args {
                if a.is_null() {
                    stack.push(Value::Null);
                    return Ok(());
                }
                s.push_str(&display_value(a));
            }
            Value::String(s)
        }
        BuiltinFn::Coalesce => args.into_iter().find(|a| !a.is_null()).unwrap_or(Value::Null),
    };
    stack.push(result);
    Ok(())
}
