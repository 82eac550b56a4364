//! Operators dispatched on runtime value kind

use super::value::{Value, ValueError, ValueResult};
use crate::ast::{BinaryOp, UnaryOp};

/// Apply a unary operator
pub fn eval_unary(op: UnaryOp, arg: &Value) -> ValueResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!arg.as_bool("!")?)),
        UnaryOp::Neg => arg
            .as_int("unary -")?
            .checked_neg()
            .map(Value::Int)
            .ok_or(ValueError::TypeMismatch {
                op: "unary -",
                expected: "negatable int",
                found: "int",
            }),
        UnaryOp::Keys => arg.keys(),
        UnaryOp::Values => arg.values(),
        UnaryOp::Sizeof => arg.size().map(Value::Int),
    }
}

/// Apply a strict binary operator; `&&` and `||` are handled by the caller
pub fn eval_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> ValueResult<Value> {
    let ints = |name: &'static str| -> ValueResult<(i64, i64)> { Ok((lhs.as_int(name)?, rhs.as_int(name)?)) };
    Ok(match op {
        BinaryOp::Add => {
            let (a, b) = ints("+")?;
            Value::Int(a.wrapping_add(b))
        }
        BinaryOp::Sub => {
            let (a, b) = ints("-")?;
            Value::Int(a.wrapping_sub(b))
        }
        BinaryOp::Mul => {
            let (a, b) = ints("*")?;
            Value::Int(a.wrapping_mul(b))
        }
        BinaryOp::IntDiv => {
            let (a, b) = ints("/")?;
            if b == 0 {
                return Err(ValueError::DivisionByZero);
            }
            Value::Int(a.wrapping_div(b))
        }
        BinaryOp::And => Value::Bool(lhs.as_bool("&&")? && rhs.as_bool("&&")?),
        BinaryOp::Or => Value::Bool(lhs.as_bool("||")? || rhs.as_bool("||")?),
        BinaryOp::Eq => Value::Bool(lhs == rhs),
        BinaryOp::Ne => Value::Bool(lhs != rhs),
        BinaryOp::Lt => {
            let (a, b) = ints("<")?;
            Value::Bool(a < b)
        }
        BinaryOp::Le => {
            let (a, b) = ints("<=")?;
            Value::Bool(a <= b)
        }
        BinaryOp::Gt => {
            let (a, b) = ints(">")?;
            Value::Bool(a > b)
        }
        BinaryOp::Ge => {
            let (a, b) = ints(">=")?;
            Value::Bool(a >= b)
        }
        BinaryOp::Index => lhs.lookup(rhs)?,
        BinaryOp::In => Value::Bool(rhs.contains_key(lhs)?),
    })
}

/// Substitute `{i}` placeholders with displayed values
///
/// Placeholders without a matching value are left as written.
pub fn format_message(format: &str, args: &[Value]) -> String {
    let mut output = String::with_capacity(format.len());
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let index = close.and_then(|close| after[..close].parse::<usize>().ok());
        match (close, index.and_then(|i| args.get(i))) {
            (Some(close), Some(value)) => {
                output.push_str(&value.to_string());
                rest = &after[close + 1..];
            }
            _ => {
                output.push('{');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_and_comparison() {
        assert_eq!(eval_binary(BinaryOp::Add, &Value::Int(2), &Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(eval_binary(BinaryOp::IntDiv, &Value::Int(7), &Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(
            eval_binary(BinaryOp::IntDiv, &Value::Int(1), &Value::Int(0)),
            Err(ValueError::DivisionByZero)
        );
        assert_eq!(eval_binary(BinaryOp::Le, &Value::Int(2), &Value::Int(2)), Ok(Value::Bool(true)));
        assert!(eval_binary(BinaryOp::Add, &Value::Int(1), &Value::Bool(true)).is_err());
    }

    #[test]
    fn test_structural_equality_operator() {
        let a = Value::tuple(vec![Value::Int(1), Value::Null]);
        let b = Value::tuple(vec![Value::Int(1), Value::Null]);
        assert_eq!(eval_binary(BinaryOp::Eq, &a, &b), Ok(Value::Bool(true)));
        assert_eq!(eval_binary(BinaryOp::Ne, &Value::Null, &Value::Halt), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval_unary(UnaryOp::Not, &Value::Bool(true)), Ok(Value::Bool(false)));
        assert_eq!(eval_unary(UnaryOp::Neg, &Value::Int(4)), Ok(Value::Int(-4)));
        let s = Value::seq(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(eval_unary(UnaryOp::Sizeof, &s), Ok(Value::Int(2)));
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message("x={0}, y={1}", &[Value::Int(1), Value::Bool(false)]), "x=1, y=false");
        assert_eq!(format_message("{2} {x}", &[Value::Int(1)]), "{2} {x}");
        assert_eq!(format_message("no args", &[]), "no args");
    }
}
