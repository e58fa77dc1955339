//! Builtin functions, the `json` module and methods on builtin types.

use std::io::Write;

use super::ast::BinOp;
use super::error::{
    overflow, recursion, too_large, type_error, value_error, ErrorKind, RaiseResult, Raised,
};
use super::ops::{self, normalize_index, MAX_SEQUENCE};
use super::value::{format_float, Dict, Numeric, Value, Walk, MAX_NESTING};
use super::widget::WidgetClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Bool,
    Abs,
    Min,
    Max,
    Sum,
    Round,
    Range,
    List,
    Dict,
    Sorted,
    Print,
    Widget(WidgetClass),
    JsonDumps,
    JsonLoads,
}

const CORE: [Builtin; 15] = [
    Builtin::Len,
    Builtin::Str,
    Builtin::Int,
    Builtin::Float,
    Builtin::Bool,
    Builtin::Abs,
    Builtin::Min,
    Builtin::Max,
    Builtin::Sum,
    Builtin::Round,
    Builtin::Range,
    Builtin::List,
    Builtin::Dict,
    Builtin::Sorted,
    Builtin::Print,
];

impl Builtin {
    /// Resolve a name in the builtins scope.
    pub fn lookup(name: &str) -> Option<Builtin> {
        CORE.into_iter().find(|b| b.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Round => "round",
            Self::Range => "range",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Sorted => "sorted",
            Self::Print => "print",
            Self::Widget(class) => class.name(),
            Self::JsonDumps => "dumps",
            Self::JsonLoads => "loads",
        }
    }

    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RaiseResult<Value> {
        let name = self.name();
        match self {
            Self::Widget(class) => Ok(Value::new_widget(class.construct(&args, &kwargs)?)),
            Self::Print => {
                let [sep, end] = keywords(name, kwargs, ["sep", "end"])?;
                print(&args, sep, end)
            }
            Self::Sorted => {
                let [key, reverse] = keywords(name, kwargs, ["key", "reverse"])?;
                let [iterable] = positional::<1>(name, args, 1)?;
                let mut items = required(iterable).iterate()?;
                sort_values(&mut items, key.as_ref(), reverse.is_some_and(|r| r.truthy()))?;
                Ok(Value::new_list(items))
            }
            Self::Sum => {
                let [start] = keywords(name, kwargs, ["start"])?;
                let [iterable, start_pos] = positional::<2>(name, args, 1)?;
                sum(required(iterable), start_pos.or(start))
            }
            Self::Round => {
                let [ndigits_kw] = keywords(name, kwargs, ["ndigits"])?;
                let [number, ndigits] = positional::<2>(name, args, 1)?;
                round(required(number), ndigits.or(ndigits_kw))
            }
            Self::JsonDumps => {
                let [indent, sort_keys] = keywords("dumps", kwargs, ["indent", "sort_keys"])?;
                let [value] = positional::<1>(name, args, 1)?;
                let indent = match indent {
                    None | Some(Value::None) => None,
                    Some(v) => Some(usize::try_from(v.as_index()?).unwrap_or(0)),
                };
                let sort_keys = sort_keys.is_some_and(|v| v.truthy());
                let mut out = String::new();
                dumps(&required(value), indent, sort_keys, &mut Walk::new(), &mut out)?;
                Ok(Value::Str(out))
            }
            Self::Dict => {
                let [source] = positional::<1>(name, args, 0)?;
                let mut dict = match source {
                    None => Dict::new(),
                    Some(source) => dict_from(&source)?,
                };
                for (key, value) in kwargs {
                    dict.insert(key, value);
                }
                Ok(Value::new_dict(dict))
            }
            _ => {
                no_keywords(name, &kwargs)?;
                self.call_positional(args)
            }
        }
    }

    fn call_positional(&self, args: Vec<Value>) -> RaiseResult<Value> {
        let name = self.name();
        match self {
            Self::Len => {
                let [value] = positional::<1>(name, args, 1)?;
                len(&required(value))
            }
            Self::Str => {
                let [value] = positional::<1>(name, args, 0)?;
                Ok(Value::Str(value.map_or(Ok(String::new()), |v| v.try_str())?))
            }
            Self::Int => {
                let [value] = positional::<1>(name, args, 0)?;
                value.map_or(Ok(Value::Int(0)), |v| to_int(&v))
            }
            Self::Float => {
                let [value] = positional::<1>(name, args, 0)?;
                value.map_or(Ok(Value::Float(0.0)), |v| to_float(&v))
            }
            Self::Bool => {
                let [value] = positional::<1>(name, args, 0)?;
                Ok(Value::Bool(value.is_some_and(|v| v.truthy())))
            }
            Self::Abs => {
                let [value] = positional::<1>(name, args, 1)?;
                match required(value) {
                    Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(overflow),
                    Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(type_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                }
            }
            Self::Min => extreme(name, args, std::cmp::Ordering::Less),
            Self::Max => extreme(name, args, std::cmp::Ordering::Greater),
            Self::Range => range(args),
            Self::List => {
                let [value] = positional::<1>(name, args, 0)?;
                let items = match value {
                    None => Vec::new(),
                    Some(v) => v.iterate()?,
                };
                Ok(Value::new_list(items))
            }
            Self::JsonLoads => {
                let [value] = positional::<1>(name, args, 1)?;
                match required(value) {
                    Value::Str(text) => serde_json::from_str::<serde_json::Value>(&text)
                        .map(|json| Value::from_json(&json))
                        .map_err(|e| value_error(e.to_string())),
                    other => Err(type_error(format!(
                        "the JSON object must be str, bytes or bytearray, not {}",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(type_error(format!("{name}() cannot be called here"))),
        }
    }
}

/// Call any callable value.
pub fn call_value(
    func: &Value,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> RaiseResult<Value> {
    match func {
        Value::Builtin(builtin) => builtin.call(args, kwargs),
        Value::Method(receiver, name) => call_method(receiver, name, args, kwargs),
        other => Err(type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

// ── argument helpers ─────────────────────────────────────────────────────

/// Split positional arguments into `N` optional slots, `min` of them required.
fn positional<const N: usize>(
    name: &str,
    args: Vec<Value>,
    min: usize,
) -> RaiseResult<[Option<Value>; N]> {
    let given = args.len();
    if given < min || given > N {
        let expected = if min == N {
            format!("exactly {N}")
        } else if given < min {
            format!("at least {min}")
        } else {
            format!("at most {N}")
        };
        let plural = if min == N && N == 1 { "argument" } else { "arguments" };
        return Err(type_error(format!(
            "{name}() takes {expected} {plural} ({given} given)"
        )));
    }
    let mut slots: [Option<Value>; N] = std::array::from_fn(|_| None);
    for (slot, arg) in slots.iter_mut().zip(args) {
        *slot = Some(arg);
    }
    Ok(slots)
}

/// Pick out the allowed keyword arguments by name.
fn keywords<const N: usize>(
    name: &str,
    kwargs: Vec<(String, Value)>,
    allowed: [&str; N],
) -> RaiseResult<[Option<Value>; N]> {
    let mut slots: [Option<Value>; N] = std::array::from_fn(|_| None);
    for (key, value) in kwargs {
        match allowed.iter().position(|a| *a == key) {
            Some(i) => slots[i] = Some(value),
            None => {
                return Err(type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )))
            }
        }
    }
    Ok(slots)
}

fn no_keywords(name: &str, kwargs: &[(String, Value)]) -> RaiseResult<()> {
    match kwargs.first() {
        Some(_) => Err(type_error(format!("{name}() takes no keyword arguments"))),
        None => Ok(()),
    }
}

// Slots below the required minimum are always filled by `positional`.
fn required(slot: Option<Value>) -> Value {
    slot.unwrap_or(Value::None)
}

// ── builtin functions ────────────────────────────────────────────────────

fn print(args: &[Value], sep: Option<Value>, end: Option<Value>) -> RaiseResult<Value> {
    let text_arg = |v: Option<Value>, default: &str| match v {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(type_error(format!(
            "sep and end must be None or a string, not {}",
            other.type_name()
        ))),
    };
    let sep = text_arg(sep, " ")?;
    let end = text_arg(end, "\n")?;
    let line = args
        .iter()
        .map(Value::try_str)
        .collect::<RaiseResult<Vec<_>>>()?
        .join(&sep);

    let mut stdout = std::io::stdout().lock();
    // A closed stdout must not abort the script.
    let _ = write!(stdout, "{line}{end}");
    let _ = stdout.flush();
    Ok(Value::None)
}

fn len(value: &Value) -> RaiseResult<Value> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Dict(dict) => dict.borrow().len(),
        other => {
            return Err(type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(i64::try_from(n).map_err(|_| overflow())?))
}

fn to_int(value: &Value) -> RaiseResult<Value> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(*f),
        Value::Str(s) => {
            let cleaned = s.trim().replace('_', "");
            cleaned.parse::<i64>().map(Value::Int).map_err(|_| {
                value_error(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            })
        }
        other => Err(type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn float_to_int(f: f64) -> RaiseResult<Value> {
    if f.is_nan() {
        return Err(value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(Raised::new(
            ErrorKind::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(overflow());
    }
    Ok(Value::Int(truncated as i64))
}

fn to_float(value: &Value) -> RaiseResult<Value> {
    match value.as_number() {
        Some(n) => Ok(Value::Float(n.as_f64())),
        None => match value {
            Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                value_error(format!(
                    "could not convert string to float: {}",
                    value.repr()
                ))
            }),
            other => Err(type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

/// `min` and `max`: a single iterable or several positional arguments.
fn extreme(name: &str, args: Vec<Value>, want: std::cmp::Ordering) -> RaiseResult<Value> {
    let items = match args.len() {
        0 => {
            return Err(type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )))
        }
        1 => args[0].iterate()?,
        _ => args,
    };
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(value_error(format!("{name}() arg is an empty sequence")));
    };
    for item in iter {
        if item.py_cmp(&best, if want.is_lt() { "<" } else { ">" })? == Some(want) {
            best = item;
        }
    }
    Ok(best)
}

fn sum(iterable: Value, start: Option<Value>) -> RaiseResult<Value> {
    let start = start.unwrap_or(Value::Int(0));
    if matches!(start, Value::Str(_)) {
        return Err(type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    iterable
        .iterate()?
        .iter()
        .try_fold(start, |acc, item| ops::binary(BinOp::Add, &acc, item))
}

fn round(number: Value, ndigits: Option<Value>) -> RaiseResult<Value> {
    let ndigits = match ndigits {
        None | Some(Value::None) => None,
        Some(v) => Some(v.as_index()?),
    };
    match (number.as_number(), ndigits) {
        (Some(Numeric::Int(n)), _) => Ok(Value::Int(n)),
        (Some(Numeric::Float(f)), None) => float_to_int(f.round_ties_even()),
        (Some(Numeric::Float(f)), Some(digits)) => {
            let digits = i32::try_from(digits.clamp(-308, 308)).unwrap_or(0);
            let scale = 10f64.powi(digits);
            let rounded = (f * scale).round_ties_even() / scale;
            Ok(Value::Float(if rounded.is_finite() { rounded } else { f }))
        }
        (None, _) => Err(type_error(format!(
            "type {} doesn't define __round__ method",
            number.type_name()
        ))),
    }
}

fn range(args: Vec<Value>) -> RaiseResult<Value> {
    let ints = args
        .iter()
        .map(Value::as_index)
        .collect::<RaiseResult<Vec<i64>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(type_error(format!(
                "range expected at most 3 arguments, got {}",
                ints.len()
            )))
        }
    };
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero"));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let count = if span <= 0 {
        0
    } else {
        let step = i128::from(step).abs();
        (span + step - 1) / step
    };
    if count > MAX_SEQUENCE as i128 {
        return Err(too_large());
    }
    let items = (0..count)
        .map(|i| Value::Int((i128::from(start) + i * i128::from(step)) as i64))
        .collect();
    Ok(Value::new_list(items))
}

fn dict_from(source: &Value) -> RaiseResult<Dict> {
    if let Value::Dict(dict) = source {
        return Ok(dict.borrow().clone());
    }
    let mut dict = Dict::new();
    for (i, pair) in source.iterate()?.into_iter().enumerate() {
        let items = pair.iterate().map_err(|_| {
            type_error(format!(
                "cannot convert dictionary update sequence element #{i} to a sequence"
            ))
        })?;
        let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
            value_error(format!(
                "dictionary update sequence element #{i} has length {}; 2 is required",
                items.len()
            ))
        })?;
        dict.insert(key.as_key()?, value);
    }
    Ok(dict)
}

/// Stable sort with a comparison that may raise.
fn sort_values(items: &mut Vec<Value>, key: Option<&Value>, reverse: bool) -> RaiseResult<()> {
    let keys = match key {
        None | Some(Value::None) => items.clone(),
        Some(func) => items
            .iter()
            .map(|item| call_value(func, vec![item.clone()], Vec::new()))
            .collect::<RaiseResult<Vec<_>>>()?,
    };
    let want = if reverse {
        std::cmp::Ordering::Greater
    } else {
        std::cmp::Ordering::Less
    };

    let n = keys.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut merged = Vec::with_capacity(n);
    let mut width = 1;
    while width < n {
        merged.clear();
        for start in (0..n).step_by(2 * width) {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut l, mut r) = (start, mid);
            while l < mid && r < end {
                // Take from the right run only when strictly before the left.
                let right_first = keys[order[r]].py_cmp(&keys[order[l]], "<")? == Some(want);
                if right_first {
                    merged.push(order[r]);
                    r += 1;
                } else {
                    merged.push(order[l]);
                    l += 1;
                }
            }
            merged.extend_from_slice(&order[l..mid]);
            merged.extend_from_slice(&order[r..end]);
        }
        std::mem::swap(&mut order, &mut merged);
        width *= 2;
    }

    let sorted = order.into_iter().map(|i| items[i].clone()).collect();
    *items = sorted;
    Ok(())
}

// ── json ─────────────────────────────────────────────────────────────────

/// Serialize like Python's `json.dumps` with default separators.
fn dumps(
    value: &Value,
    indent: Option<usize>,
    sort_keys: bool,
    walk: &mut Walk,
    out: &mut String,
) -> RaiseResult<()> {
    walk.visit()?;
    if out.len() > MAX_SEQUENCE {
        return Err(too_large());
    }
    let newline = |out: &mut String, level: usize| -> RaiseResult<()> {
        if let Some(width) = indent {
            let pad = width.checked_mul(level).ok_or_else(too_large)?;
            if out.len().saturating_add(pad) > MAX_SEQUENCE {
                return Err(too_large());
            }
            out.push('\n');
            out.extend(std::iter::repeat(' ').take(pad));
        }
        Ok(())
    };
    let item_sep = if indent.is_some() { "," } else { ", " };
    let level = walk.depth();

    match value {
        Value::None => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) if f.is_nan() => out.push_str("NaN"),
        Value::Float(f) if f.is_infinite() => {
            out.push_str(if *f > 0.0 { "Infinity" } else { "-Infinity" })
        }
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Str(s) => json_string(s, out),
        Value::List(list) => {
            let items = list.borrow().clone();
            if items.is_empty() {
                out.push_str("[]");
                return Ok(());
            }
            enter_container(walk, list)?;
            out.push('[');
            let written = items.iter().enumerate().try_for_each(|(i, item)| {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, level + 1)?;
                dumps(item, indent, sort_keys, walk, out)
            });
            walk.leave();
            written?;
            newline(out, level)?;
            out.push(']');
        }
        Value::Dict(dict) => {
            let mut entries: Vec<(String, Value)> = dict.borrow().iter().cloned().collect();
            if entries.is_empty() {
                out.push_str("{}");
                return Ok(());
            }
            if sort_keys {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            enter_container(walk, dict)?;
            out.push('{');
            let written = entries.iter().enumerate().try_for_each(|(i, (key, item))| {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, level + 1)?;
                json_string(key, out);
                out.push_str(": ");
                dumps(item, indent, sort_keys, walk, out)
            });
            walk.leave();
            written?;
            newline(out, level)?;
            out.push('}');
        }
        other => {
            return Err(type_error(format!(
                "Object of type {} is not JSON serializable",
                other.type_name()
            )))
        }
    }
    Ok(())
}

fn enter_container<T>(walk: &mut Walk, container: &std::rc::Rc<T>) -> RaiseResult<()> {
    if !walk.enter(container) {
        return Err(value_error("Circular reference detected"));
    }
    if walk.depth() > MAX_NESTING {
        walk.leave();
        return Err(recursion("while encoding a JSON object"));
    }
    Ok(())
}

/// JSON string literal with non-ASCII escaped as `\uXXXX`.
fn json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

// ── methods ──────────────────────────────────────────────────────────────

const LIST_METHODS: &[&str] = &[
    "append", "pop", "extend", "insert", "index", "count", "remove", "clear", "reverse", "sort",
];
const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "update", "pop", "clear", "setdefault",
];
const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "join", "replace", "startswith",
    "endswith", "find", "isdigit",
];

pub fn has_method(receiver: &Value, name: &str) -> bool {
    match receiver {
        Value::List(_) => LIST_METHODS.contains(&name),
        Value::Dict(_) => DICT_METHODS.contains(&name),
        Value::Str(_) => STR_METHODS.contains(&name),
        _ => false,
    }
}

pub fn call_method(
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> RaiseResult<Value> {
    if name == "sort" {
        if let Value::List(items) = receiver {
            let [key, reverse] = keywords(name, kwargs, ["key", "reverse"])?;
            positional::<0>(name, args, 0)?;
            let mut snapshot = items.borrow().clone();
            sort_values(&mut snapshot, key.as_ref(), reverse.is_some_and(|r| r.truthy()))?;
            **items.borrow_mut() = snapshot;
            return Ok(Value::None);
        }
    }
    if name == "update" {
        if let Value::Dict(dict) = receiver {
            let [other] = positional::<1>(name, args, 0)?;
            let mut entries: Vec<(String, Value)> = match other {
                None => Vec::new(),
                Some(other) => dict_from(&other)?.iter().cloned().collect(),
            };
            entries.extend(kwargs);
            let mut dict = dict.borrow_mut();
            for (key, value) in entries {
                dict.insert(key, value);
            }
            return Ok(Value::None);
        }
    }
    if name == "split" {
        if let Value::Str(s) = receiver {
            let [sep_kw, max_kw] = keywords(name, kwargs, ["sep", "maxsplit"])?;
            let [sep, maxsplit] = positional::<2>(name, args, 0)?;
            return split(s, sep.or(sep_kw), maxsplit.or(max_kw));
        }
    }

    no_keywords(name, &kwargs)?;
    match receiver {
        Value::List(items) => list_method(items, name, args),
        Value::Dict(dict) => dict_method(dict, name, args),
        Value::Str(s) => str_method(s, name, args),
        other => Err(Raised::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", other.type_name()),
        )),
    }
}

fn list_method(
    items: &super::value::ListRef,
    name: &str,
    args: Vec<Value>,
) -> RaiseResult<Value> {
    match name {
        "append" => {
            let [item] = positional::<1>(name, args, 1)?;
            let mut items = items.borrow_mut();
            if items.len() >= MAX_SEQUENCE {
                return Err(too_large());
            }
            items.push(required(item));
            Ok(Value::None)
        }
        "extend" => {
            let [other] = positional::<1>(name, args, 1)?;
            let extra = required(other).iterate()?;
            let mut items = items.borrow_mut();
            if items.len() + extra.len() > MAX_SEQUENCE {
                return Err(too_large());
            }
            items.extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            let [index, item] = positional::<2>(name, args, 2)?;
            let index = required(index).as_index()?;
            let mut items = items.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(usize::try_from(at).unwrap_or(0), required(item));
            Ok(Value::None)
        }
        "pop" => {
            let [index] = positional::<1>(name, args, 0)?;
            let index = index.map(|i| i.as_index()).transpose()?.unwrap_or(-1);
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Raised::new(ErrorKind::IndexError, "pop from empty list"));
            }
            let slot = normalize_index(index, items.len())
                .ok_or_else(|| Raised::new(ErrorKind::IndexError, "pop index out of range"))?;
            Ok(items.remove(slot))
        }
        "index" => {
            let [item] = positional::<1>(name, args, 1)?;
            let item = required(item);
            let snapshot = items.borrow().clone();
            position(&snapshot, &item)?
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| value_error(format!("{} is not in list", item.repr())))
        }
        "count" => {
            let [item] = positional::<1>(name, args, 1)?;
            let item = required(item);
            let snapshot = items.borrow().clone();
            let mut count = 0;
            for candidate in &snapshot {
                if candidate.py_eq(&item)? {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        "remove" => {
            let [item] = positional::<1>(name, args, 1)?;
            let item = required(item);
            let snapshot = items.borrow().clone();
            let slot = position(&snapshot, &item)?
                .ok_or_else(|| value_error("list.remove(x): x not in list"))?;
            items.borrow_mut().remove(slot);
            Ok(Value::None)
        }
        "clear" => {
            positional::<0>(name, args, 0)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "reverse" => {
            positional::<0>(name, args, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        _ => Err(no_attribute("list", name)),
    }
}

/// Index of the first element equal to `item`.
fn position(items: &[Value], item: &Value) -> RaiseResult<Option<usize>> {
    for (i, candidate) in items.iter().enumerate() {
        if candidate.py_eq(item)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn dict_method(
    dict: &super::value::DictRef,
    name: &str,
    args: Vec<Value>,
) -> RaiseResult<Value> {
    match name {
        "get" => {
            let [key, default] = positional::<2>(name, args, 1)?;
            let found = match required(key) {
                Value::Str(key) => dict.borrow().get(&key).cloned(),
                _ => None,
            };
            Ok(found.or(default).unwrap_or(Value::None))
        }
        "keys" => {
            positional::<0>(name, args, 0)?;
            let keys = dict.borrow().keys().map(|k| Value::Str(k.clone())).collect();
            Ok(Value::new_list(keys))
        }
        "values" => {
            positional::<0>(name, args, 0)?;
            let values = dict.borrow().values().cloned().collect();
            Ok(Value::new_list(values))
        }
        "items" => {
            positional::<0>(name, args, 0)?;
            let pairs = dict
                .borrow()
                .iter()
                .map(|(k, v)| Value::new_list(vec![Value::Str(k.clone()), v.clone()]))
                .collect();
            Ok(Value::new_list(pairs))
        }
        "pop" => {
            let [key, default] = positional::<2>(name, args, 1)?;
            let key = required(key);
            let removed = match &key {
                Value::Str(k) => dict.borrow_mut().remove(k),
                _ => None,
            };
            removed
                .or(default)
                .ok_or_else(|| Raised::new(ErrorKind::KeyError, key.to_str()))
        }
        "setdefault" => {
            let [key, default] = positional::<2>(name, args, 1)?;
            let key = required(key).as_key()?;
            let mut dict = dict.borrow_mut();
            if let Some(existing) = dict.get(&key) {
                return Ok(existing.clone());
            }
            let value = default.unwrap_or(Value::None);
            dict.insert(key, value.clone());
            Ok(value)
        }
        "clear" => {
            positional::<0>(name, args, 0)?;
            *dict.borrow_mut() = Dict::new();
            Ok(Value::None)
        }
        _ => Err(no_attribute("dict", name)),
    }
}

fn str_method(s: &str, name: &str, args: Vec<Value>) -> RaiseResult<Value> {
    let text = |v: Option<Value>, what: &str| -> RaiseResult<String> {
        match v {
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(type_error(format!(
                "{what} must be str, not {}",
                other.type_name()
            ))),
            None => Ok(String::new()),
        }
    };
    let strip_chars = |v: Option<Value>| -> RaiseResult<Option<Vec<char>>> {
        match v {
            None | Some(Value::None) => Ok(None),
            other => Ok(Some(text(other, "argument")?.chars().collect())),
        }
    };

    let result = match name {
        "upper" => {
            positional::<0>(name, args, 0)?;
            Value::Str(s.to_uppercase())
        }
        "lower" => {
            positional::<0>(name, args, 0)?;
            Value::Str(s.to_lowercase())
        }
        "strip" | "lstrip" | "rstrip" => {
            let [chars] = positional::<1>(name, args, 0)?;
            let chars = strip_chars(chars)?;
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let stripped = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Value::Str(stripped.to_string())
        }
        "join" => {
            let [iterable] = positional::<1>(name, args, 1)?;
            let parts = required(iterable)
                .iterate()?
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Str(part) => Ok(part),
                    other => Err(type_error(format!(
                        "sequence item {i}: expected str instance, {} found",
                        other.type_name()
                    ))),
                })
                .collect::<RaiseResult<Vec<_>>>()?;
            let total = parts
                .iter()
                .map(String::len)
                .fold(s.len().saturating_mul(parts.len()), usize::saturating_add);
            if total > MAX_SEQUENCE {
                return Err(too_large());
            }
            Value::Str(parts.join(s))
        }
        "replace" => {
            let [old, new] = positional::<2>(name, args, 2)?;
            let old = text(old, "replace() argument 1")?;
            let new = text(new, "replace() argument 2")?;
            let occurrences = if old.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(old.as_str()).count()
            };
            if s.len() + occurrences.saturating_mul(new.len()) > MAX_SEQUENCE {
                return Err(too_large());
            }
            Value::Str(s.replace(old.as_str(), &new))
        }
        "startswith" => {
            let [prefix] = positional::<1>(name, args, 1)?;
            Value::Bool(s.starts_with(text(prefix, "startswith first arg")?.as_str()))
        }
        "endswith" => {
            let [suffix] = positional::<1>(name, args, 1)?;
            Value::Bool(s.ends_with(text(suffix, "endswith first arg")?.as_str()))
        }
        "find" => {
            let [needle] = positional::<1>(name, args, 1)?;
            let needle = text(needle, "must be str")?;
            let index = s
                .find(needle.as_str())
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Value::Int(index)
        }
        "isdigit" => {
            positional::<0>(name, args, 0)?;
            Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        }
        _ => return Err(no_attribute("str", name)),
    };
    Ok(result)
}

fn split(s: &str, sep: Option<Value>, maxsplit: Option<Value>) -> RaiseResult<Value> {
    let limit = match maxsplit {
        None => None,
        Some(v) => usize::try_from(v.as_index()?).ok(),
    };
    let parts: Vec<String> = match sep {
        None | Some(Value::None) => {
            let mut parts = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() {
                if limit.is_some_and(|max| parts.len() >= max) {
                    parts.push(rest.to_string());
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            parts
        }
        Some(Value::Str(sep)) => {
            if sep.is_empty() {
                return Err(value_error("empty separator"));
            }
            match limit {
                Some(max) => s.splitn(max + 1, sep.as_str()).map(str::to_string).collect(),
                None => s.split(sep.as_str()).map(str::to_string).collect(),
            }
        }
        Some(other) => {
            return Err(type_error(format!(
                "must be str or None, not {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::new_list(parts.into_iter().map(Value::Str).collect()))
}

fn no_attribute(type_name: &str, name: &str) -> Raised {
    Raised::new(
        ErrorKind::AttributeError,
        format!("'{type_name}' object has no attribute '{name}'"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    fn list(items: Vec<Value>) -> Value {
        Value::new_list(items)
    }

    fn call(b: Builtin, args: Vec<Value>) -> RaiseResult<Value> {
        b.call(args, Vec::new())
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("len"), Some(Builtin::Len));
        assert_eq!(Builtin::lookup("dumps"), None);
        assert_eq!(Builtin::lookup("open"), None);
    }

    #[test]
    fn test_len_and_conversions() {
        assert_eq!(call(Builtin::Len, vec![s("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(call(Builtin::Int, vec![s(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call(Builtin::Int, vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(call(Builtin::Float, vec![s("1.5")]).unwrap(), Value::Float(1.5));
        assert_eq!(call(Builtin::Str, vec![Value::Float(2.0)]).unwrap(), s("2.0"));

        let err = call(Builtin::Int, vec![s("abc")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
        assert_eq!(err.message, "invalid literal for int() with base 10: 'abc'");

        let err = call(Builtin::Len, vec![Value::Int(3)]).unwrap_err();
        assert_eq!(err.message, "object of type 'int' has no len()");
    }

    #[test]
    fn test_arity_errors() {
        let err = call(Builtin::Len, vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "len() takes exactly 1 argument (0 given)");
    }

    #[test]
    fn test_min_max_sum() {
        let nums = list(vec![Value::Int(3), Value::Float(1.5), Value::Int(7)]);
        assert_eq!(call(Builtin::Min, vec![nums.clone()]).unwrap(), Value::Float(1.5));
        assert_eq!(call(Builtin::Max, vec![nums.clone()]).unwrap(), Value::Int(7));
        assert_eq!(call(Builtin::Sum, vec![nums]).unwrap(), Value::Float(11.5));
        assert_eq!(
            call(Builtin::Max, vec![Value::Int(1), Value::Int(9)]).unwrap(),
            Value::Int(9)
        );

        let err = call(Builtin::Min, vec![list(vec![])]).unwrap_err();
        assert_eq!(err.message, "min() arg is an empty sequence");
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(call(Builtin::Round, vec![Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call(Builtin::Round, vec![Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            call(Builtin::Round, vec![Value::Float(1.2345), Value::Int(2)]).unwrap(),
            Value::Float(1.23)
        );
    }

    #[test]
    fn test_range() {
        let Value::List(items) = call(Builtin::Range, vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap() else {
            panic!("range must build a list");
        };
        assert_eq!(
            items.borrow().to_vec(),
            vec![Value::Int(5), Value::Int(3), Value::Int(1)]
        );
        let err = call(Builtin::Range, vec![Value::Int(1), Value::Int(2), Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
        let err = call(Builtin::Range, vec![Value::Int(i64::MAX)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MemoryError);
    }

    #[test]
    fn test_sorted_is_stable_and_reversible() {
        let words = list(vec![s("bb"), s("a"), s("cc"), s("d")]);
        let sorted = Builtin::Sorted
            .call(
                vec![words.clone()],
                vec![("key".to_string(), Value::Builtin(Builtin::Len))],
            )
            .unwrap();
        assert_eq!(sorted.repr(), "['a', 'd', 'bb', 'cc']");

        let sorted = Builtin::Sorted
            .call(vec![words], vec![("reverse".to_string(), Value::Bool(true))])
            .unwrap();
        assert_eq!(sorted.repr(), "['d', 'cc', 'bb', 'a']");

        let mixed = list(vec![Value::Int(1), s("a")]);
        let err = call(Builtin::Sorted, vec![mixed]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_dumps_matches_python_layout() {
        let value = Value::from_json(&json!({"a": [1, 2.0, "é"], "b": null, "c": true}));
        let out = call(Builtin::JsonDumps, vec![value.clone()]).unwrap();
        assert_eq!(out, s(r#"{"a": [1, 2.0, "\u00e9"], "b": null, "c": true}"#));

        let out = Builtin::JsonDumps
            .call(vec![value], vec![("indent".to_string(), Value::Int(2))])
            .unwrap();
        let Value::Str(text) = out else { panic!("dumps must return str") };
        assert!(text.starts_with("{\n  \"a\": [\n    1,\n"));
    }

    fn dumps_indented(value: Value, indent: i64) -> RaiseResult<Value> {
        Builtin::JsonDumps.call(vec![value], vec![("indent".to_string(), Value::Int(indent))])
    }

    #[test]
    fn test_dumps_huge_indent_is_a_memory_error() {
        let err = dumps_indented(list(vec![Value::Int(1)]), 1_000_000_000_000_000).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MemoryError);
        let err = dumps_indented(list(vec![Value::Int(1)]), i64::MAX).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MemoryError);
    }

    #[test]
    fn test_dumps_cycles_and_shared_values() {
        let inner = list(vec![Value::Int(1)]);
        let shared = list(vec![inner.clone(), inner]);
        assert_eq!(call(Builtin::JsonDumps, vec![shared]).unwrap(), s("[[1], [1]]"));

        let cyclic = list(vec![]);
        if let Value::List(items) = &cyclic {
            items.borrow_mut().push(cyclic.clone());
            items.borrow_mut().push(cyclic.clone());
        }
        let err = call(Builtin::JsonDumps, vec![cyclic]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
        assert_eq!(err.message, "Circular reference detected");
    }

    #[test]
    fn test_loads() {
        let value = call(Builtin::JsonLoads, vec![s(r#"{"x": [1, 2]}"#)]).unwrap();
        assert_eq!(value.to_json().unwrap(), json!({"x": [1, 2]}));
        let err = call(Builtin::JsonLoads, vec![s("{bad")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
    }

    #[test]
    fn test_dict_builtin_and_kwargs() {
        let pairs = list(vec![list(vec![s("a"), Value::Int(1)])]);
        let dict = Builtin::Dict
            .call(vec![pairs], vec![("b".to_string(), Value::Int(2))])
            .unwrap();
        assert_eq!(dict.to_json().unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_list_methods() {
        let items = list(vec![Value::Int(1)]);
        call_method(&items, "append", vec![Value::Int(2)], vec![]).unwrap();
        call_method(&items, "insert", vec![Value::Int(0), Value::Int(0)], vec![]).unwrap();
        call_method(&items, "extend", vec![items.clone()], vec![]).unwrap();
        assert_eq!(items.repr(), "[0, 1, 2, 0, 1, 2]");
        assert_eq!(
            call_method(&items, "count", vec![Value::Int(1)], vec![]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(call_method(&items, "pop", vec![], vec![]).unwrap(), Value::Int(2));
        call_method(&items, "sort", vec![], vec![]).unwrap();
        assert_eq!(items.repr(), "[0, 0, 1, 1, 2]");

        let err = call_method(&items, "index", vec![Value::Int(9)], vec![]).unwrap_err();
        assert_eq!(err.message, "9 is not in list");
        let empty = list(vec![]);
        let err = call_method(&empty, "pop", vec![], vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexError);
    }

    #[test]
    fn test_dict_methods() {
        let dict = Value::from_json(&json!({"a": 1}));
        assert_eq!(
            call_method(&dict, "get", vec![s("z"), Value::Int(0)], vec![]).unwrap(),
            Value::Int(0)
        );
        call_method(&dict, "update", vec![], vec![("b".to_string(), Value::Int(2))]).unwrap();
        assert_eq!(call_method(&dict, "items", vec![], vec![]).unwrap().repr(), "[['a', 1], ['b', 2]]");
        assert_eq!(call_method(&dict, "pop", vec![s("a")], vec![]).unwrap(), Value::Int(1));
        let err = call_method(&dict, "pop", vec![s("a")], vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::KeyError);
        assert_eq!(err.message, "a");
    }

    #[test]
    fn test_str_methods() {
        let text = s("  a,b,,c  ");
        assert_eq!(call_method(&text, "strip", vec![], vec![]).unwrap(), s("a,b,,c"));
        assert_eq!(
            call_method(&s("a,b,,c"), "split", vec![s(",")], vec![]).unwrap().repr(),
            "['a', 'b', '', 'c']"
        );
        assert_eq!(
            call_method(&s(" x  y "), "split", vec![], vec![]).unwrap().repr(),
            "['x', 'y']"
        );
        assert_eq!(
            call_method(&s("-"), "join", vec![list(vec![s("a"), s("b")])], vec![]).unwrap(),
            s("a-b")
        );
        assert_eq!(call_method(&s("héllo"), "find", vec![s("l")], vec![]).unwrap(), Value::Int(2));
        assert_eq!(call_method(&s("Ab"), "upper", vec![], vec![]).unwrap(), s("AB"));
        let err = call_method(&s("-"), "join", vec![list(vec![Value::Int(1)])], vec![]).unwrap_err();
        assert_eq!(err.message, "sequence item 0: expected str instance, int found");
    }

    #[test]
    fn test_has_method() {
        assert!(has_method(&list(vec![]), "append"));
        assert!(!has_method(&s(""), "append"));
        assert!(has_method(&Value::from_json(&json!({})), "items"));
    }
}
