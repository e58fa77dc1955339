//! Arithmetic, comparison and container access with Python semantics.

use std::cmp::Ordering;

use super::ast::{BinOp, CmpOp, UnaryOp};
use super::error::{
    overflow, too_large, type_error, zero_division, ErrorKind, RaiseResult, Raised,
};
use super::value::{Numeric, Value};

/// Upper bound on the length of any list or string built by an operator.
pub const MAX_SEQUENCE: usize = 10_000_000;

pub fn binary(op: BinOp, left: &Value, right: &Value) -> RaiseResult<Value> {
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            check_len(a.len() + b.len())?;
            return Ok(Value::Str(format!("{a}{b}")));
        }
        (BinOp::Add, Value::Str(_), other) => {
            return Err(type_error(format!(
                "can only concatenate str (not \"{}\") to str",
                other.type_name()
            )));
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            check_len(a.len().saturating_add(b.len()))?;
            let items = a.iter().chain(b.iter()).cloned().collect();
            return Ok(Value::new_list(items));
        }
        (BinOp::Add, Value::List(_), other) => {
            return Err(type_error(format!(
                "can only concatenate list (not \"{}\") to list",
                other.type_name()
            )));
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s))
            if matches!(n, Value::Int(_) | Value::Bool(_)) =>
        {
            let count = repeat_count(n)?;
            check_len(s.len().saturating_mul(count))?;
            return Ok(Value::Str(s.repeat(count)));
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if matches!(n, Value::Int(_) | Value::Bool(_)) =>
        {
            let count = repeat_count(n)?;
            let items = items.borrow();
            if items.is_empty() || count == 0 {
                return Ok(Value::new_list(Vec::new()));
            }
            check_len(items.len().saturating_mul(count))?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            return Ok(Value::new_list(out));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };

    match (a, b) {
        (Numeric::Int(a), Numeric::Int(b)) => int_op(op, a, b),
        _ => float_op(op, a.as_f64(), b.as_f64()),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> RaiseResult<Value> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            a.checked_div(b).map(|q| {
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(zero_division("integer modulo by zero"));
            }
            a.checked_rem(b).map(|r| {
                if r != 0 && ((r < 0) != (b < 0)) {
                    r + b
                } else {
                    r
                }
            })
        }
        BinOp::Pow => {
            if b < 0 {
                return float_op(op, a as f64, b as f64);
            }
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_op(op: BinOp, a: f64, b: f64) -> RaiseResult<Value> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            a.powf(b)
        }
    };
    Ok(Value::Float(result))
}

fn repeat_count(n: &Value) -> RaiseResult<usize> {
    let n = n.as_index()?;
    Ok(usize::try_from(n).unwrap_or(0))
}

fn check_len(len: usize) -> RaiseResult<()> {
    if len > MAX_SEQUENCE {
        Err(too_large())
    } else {
        Ok(())
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> RaiseResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(*b))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Value::Int(n)) => Ok(Value::Int(*n)),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (op, v) => {
            let symbol = if op == UnaryOp::Neg { "-" } else { "+" };
            Err(type_error(format!(
                "bad operand type for unary {symbol}: '{}'",
                v.type_name()
            )))
        }
    }
}

pub fn compare(op: CmpOp, left: &Value, right: &Value) -> RaiseResult<bool> {
    let ordered = |want: fn(Ordering) -> bool| -> RaiseResult<bool> {
        Ok(left.py_cmp(right, op.symbol())?.is_some_and(want))
    };
    match op {
        CmpOp::Eq => left.py_eq(right),
        CmpOp::NotEq => left.py_eq(right).map(|equal| !equal),
        CmpOp::Lt => ordered(|o| o == Ordering::Less),
        CmpOp::LtE => ordered(|o| o != Ordering::Greater),
        CmpOp::Gt => ordered(|o| o == Ordering::Greater),
        CmpOp::GtE => ordered(|o| o != Ordering::Less),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Is => Ok(left.is_same(right)),
        CmpOp::IsNot => Ok(!left.is_same(right)),
    }
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> RaiseResult<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => {
            let items = items.borrow().clone();
            for candidate in &items {
                if candidate.py_eq(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Dict(dict) => match item {
            Value::Str(key) => Ok(dict.borrow().contains_key(key)),
            _ => Ok(false),
        },
        other => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let idx = if index < 0 { index + len } else { index };
    if (0..len).contains(&idx) {
        usize::try_from(idx).ok()
    } else {
        None
    }
}

/// `obj[index]`.
pub fn get_item(obj: &Value, index: &Value) -> RaiseResult<Value> {
    match obj {
        Value::List(items) => {
            let items = items.borrow();
            normalize_index(index.as_index()?, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| Raised::new(ErrorKind::IndexError, "list index out of range"))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(index.as_index()?, chars.len())
                .map(|i| Value::Str(chars[i].to_string()))
                .ok_or_else(|| Raised::new(ErrorKind::IndexError, "string index out of range"))
        }
        Value::Dict(dict) => {
            let key = match index {
                Value::Str(key) => key,
                other => return Err(Raised::new(ErrorKind::KeyError, other.to_str())),
            };
            dict.borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| Raised::new(ErrorKind::KeyError, key.clone()))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `obj[index] = value`.
pub fn set_item(obj: &Value, index: &Value, value: Value) -> RaiseResult<()> {
    match obj {
        Value::List(items) => {
            let idx = index.as_index()?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = normalize_index(idx, len).ok_or_else(|| {
                Raised::new(ErrorKind::IndexError, "list assignment index out of range")
            })?;
            items[slot] = value;
            Ok(())
        }
        Value::Dict(dict) => {
            let key = index.as_key()?;
            dict.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del obj[index]`.
pub fn del_item(obj: &Value, index: &Value) -> RaiseResult<()> {
    match obj {
        Value::List(items) => {
            let idx = index.as_index()?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = normalize_index(idx, len).ok_or_else(|| {
                Raised::new(ErrorKind::IndexError, "list assignment index out of range")
            })?;
            items.remove(slot);
            Ok(())
        }
        Value::Dict(dict) => {
            let key = match index {
                Value::Str(key) => key.clone(),
                other => return Err(Raised::new(ErrorKind::KeyError, other.to_str())),
            };
            dict.borrow_mut()
                .remove(&key)
                .map(|_| ())
                .ok_or_else(|| Raised::new(ErrorKind::KeyError, key))
        }
        other => Err(type_error(format!(
            "'{}' object does not support item deletion",
            other.type_name()
        ))),
    }
}

/// `obj[lower:upper]` with Python clamping rules.
pub fn slice(obj: &Value, lower: Option<&Value>, upper: Option<&Value>) -> RaiseResult<Value> {
    let bound = |v: Option<&Value>, len: usize, default: usize| -> RaiseResult<usize> {
        let Some(v) = v else { return Ok(default) };
        if matches!(v, Value::None) {
            return Ok(default);
        }
        let n = v.as_index()?;
        let len_i = i64::try_from(len).unwrap_or(i64::MAX);
        let idx = if n < 0 { (n + len_i).max(0) } else { n.min(len_i) };
        Ok(usize::try_from(idx).unwrap_or(0))
    };

    match obj {
        Value::List(items) => {
            let items = items.borrow();
            let start = bound(lower, items.len(), 0)?;
            let end = bound(upper, items.len(), items.len())?;
            let out = if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            };
            Ok(Value::new_list(out))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let start = bound(lower, chars.len(), 0)?;
            let end = bound(upper, chars.len(), chars.len())?;
            let out: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Ok(Value::Str(out))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
