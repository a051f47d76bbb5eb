//! Operator semantics for constant evaluation.

use std::cmp::Ordering;

use dmkit_foundation::{Error, Result, Value};

/// Low 24 bits: the range bitwise operators work in.
const BIT_MASK: i64 = 0x00FF_FFFF;

/// Reads a numeric operand; null counts as zero.
pub(crate) fn number(value: &Value, op: &str) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => Ok(*n),
        other => Err(Error::non_constant(format!(
            "cannot apply {op} to a {}",
            other.kind_name()
        ))),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integer(value: &Value, op: &str) -> Result<i64> {
    Ok(number(value, op)?.trunc() as i64)
}

#[allow(clippy::cast_precision_loss)]
fn masked(n: i64) -> Value {
    Value::Number((n & BIT_MASK) as f64)
}

/// Applies a prefix operator.
pub(crate) fn prefix(op: &str, operand: &Value) -> Result<Value> {
    match op {
        "-" => Ok(Value::Number(-number(operand, op)?)),
        "!" => Ok(Value::from(!operand.is_truthy())),
        "~" => Ok(masked(!integer(operand, op)?)),
        _ => Err(Error::non_constant(format!("{op} has side effects"))),
    }
}

/// Applies a binary operator to evaluated operands.
///
/// The short-circuit operators are handled by the caller.
pub(crate) fn binary(op: &str, lhs: &Value, rhs: &Value) -> Result<Value> {
    match op {
        "+" => add(lhs, rhs),
        "-" => Ok(Value::Number(number(lhs, op)? - number(rhs, op)?)),
        "*" => Ok(Value::Number(number(lhs, op)? * number(rhs, op)?)),
        // a zero divisor gives infinity or NaN, which render as `1.#INF` and `1.#IND`
        "/" => Ok(Value::Number(number(lhs, op)? / number(rhs, op)?)),
        "%" => Ok(Value::Number(number(lhs, op)?.trunc() % number(rhs, op)?.trunc())),
        "**" => Ok(Value::Number(number(lhs, op)?.powf(number(rhs, op)?))),
        "==" | "~=" => Ok(Value::from(lhs == rhs)),
        "!=" | "<>" | "~!" => Ok(Value::from(lhs != rhs)),
        "<" | "<=" | ">" | ">=" => {
            let ordering = compare(lhs, rhs, op)?;
            let holds = match op {
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::from(holds))
        }
        "&" => Ok(masked(integer(lhs, op)? & integer(rhs, op)?)),
        "|" => Ok(masked(integer(lhs, op)? | integer(rhs, op)?)),
        "^" => Ok(masked(integer(lhs, op)? ^ integer(rhs, op)?)),
        "<<" => Ok(masked(integer(lhs, op)? << integer(rhs, op)?.clamp(0, 31))),
        ">>" => Ok(masked(integer(lhs, op)? >> integer(rhs, op)?.clamp(0, 31))),
        _ => Err(Error::non_constant(format!("{op} is not a constant operator"))),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
        (Value::String(s), Value::Null) | (Value::Null, Value::String(s)) => {
            Ok(Value::String(s.clone()))
        }
        _ => Ok(Value::Number(number(lhs, "+")? + number(rhs, "+")?)),
    }
}

fn compare(lhs: &Value, rhs: &Value, op: &str) -> Result<Ordering> {
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return Ok(a.cmp(b));
    }
    let (a, b) = (number(lhs, op)?, number(rhs, op)?);
    Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
}
