//! Tree-walking evaluation of parsed expressions

use std::cmp::Ordering;

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::value::Value;
use super::ExprError;
use crate::engine::functions::{self, Function, FunctionHost};

const EPSILON: f64 = 1e-9;

pub fn eval(expr: &Expr, host: &mut dyn FunctionHost) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Placeholder(name) => Err(ExprError::UnresolvedPlaceholder(name.clone())),
        Expr::Ident(name) => Err(ExprError::UnknownIdentifier(name.clone())),
        Expr::Unary(UnaryOp::Neg, inner) => {
            let v = eval(inner, host)?;
            let n = number(&v, "-")?;
            Ok(Value::Number(-n))
        }
        Expr::Unary(UnaryOp::Not, inner) => {
            let v = eval(inner, host)?;
            Ok(Value::Bool(!boolean(&v, "not")?))
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            if !boolean(&eval(left, host)?, "and")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(boolean(&eval(right, host)?, "and")?))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if boolean(&eval(left, host)?, "or")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(boolean(&eval(right, host)?, "or")?))
        }
        Expr::Binary(op, left, right) => {
            let l = eval(left, host)?;
            let r = eval(right, host)?;
            apply_binary(*op, l, r)
        }
        Expr::Ternary(cond, then, otherwise) => {
            if boolean(&eval(cond, host)?, "?")? {
                eval(then, host)
            } else {
                eval(otherwise, host)
            }
        }
        Expr::Call(name, args) => {
            let function = Function::from_name(name)
                .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            let values = args
                .iter()
                .map(|arg| eval(arg, host))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(function, values, host)
        }
    }
}

fn number(v: &Value, op: &str) -> Result<f64, ExprError> {
    v.as_number().ok_or_else(|| {
        ExprError::Type(format!("'{}' needs a number, got {} '{}'", op, v.type_name(), v.to_text()))
    })
}

fn boolean(v: &Value, op: &str) -> Result<bool, ExprError> {
    v.as_bool().ok_or_else(|| {
        ExprError::Type(format!("'{}' needs a boolean, got {} '{}'", op, v.type_name(), v.to_text()))
    })
}

fn finite(n: f64) -> Result<Value, ExprError> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(ExprError::Math("result is not a finite number".to_string()))
    }
}

fn is_text(v: &Value) -> bool {
    matches!(v, Value::Text(_) | Value::Null)
}

fn apply_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add => {
            if is_text(&l) || is_text(&r) {
                Ok(Value::Text(format!("{}{}", l.to_text(), r.to_text())))
            } else {
                finite(number(&l, "+")? + number(&r, "+")?)
            }
        }
        BinaryOp::Sub => finite(number(&l, "-")? - number(&r, "-")?),
        BinaryOp::Mul => finite(number(&l, "*")? * number(&r, "*")?),
        BinaryOp::Div => {
            let divisor = number(&r, "/")?;
            if divisor == 0.0 {
                return Err(ExprError::Math("division by zero".to_string()));
            }
            finite(number(&l, "/")? / divisor)
        }
        BinaryOp::Rem => {
            let divisor = number(&r, "%")?;
            if divisor == 0.0 {
                return Err(ExprError::Math("division by zero".to_string()));
            }
            finite(number(&l, "%")? % divisor)
        }
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Neq => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r) == Ordering::Less)),
        BinaryOp::Lte => Ok(Value::Bool(compare(&l, &r) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r) == Ordering::Greater)),
        BinaryOp::Gte => Ok(Value::Bool(compare(&l, &r) != Ordering::Less)),
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit in eval"),
    }
}

/// Numeric equality when both sides read as numbers, boolean equality when
/// either side is a boolean, text equality otherwise
pub(crate) fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(a), Some(b)) = (l.as_number(), r.as_number()) {
        return (a - b).abs() < EPSILON;
    }
    if matches!(l, Value::Bool(_)) || matches!(r, Value::Bool(_)) {
        if let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) {
            return a == b;
        }
    }
    l.to_text() == r.to_text()
}

fn compare(l: &Value, r: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (l.as_number(), r.as_number()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    l.to_text().cmp(&r.to_text())
}
