use std::cell::RefCell;
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use serde_json::Number;

use super::builtins::Builtin;
use super::error::{recursion, too_large, type_error, value_error, RaiseResult};
use super::ops::MAX_SEQUENCE;
use super::widget::Widget;

/// Serialization, repr and comparison stop descending past this depth.
pub(crate) const MAX_NESTING: usize = 100;

pub type ListRef = Rc<RefCell<Items>>;
pub type DictRef = Rc<RefCell<Dict>>;

/// Elements of a list value.
#[derive(Debug, Default, PartialEq)]
pub struct Items(Vec<Value>);

impl Deref for Items {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for Items {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

impl Drop for Items {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0));
    }
}

/// Drop values without recursing, so arbitrarily deep nesting cannot
/// exhaust the stack.
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(list) => {
                if let Ok(cell) = Rc::try_unwrap(list) {
                    let mut items = cell.into_inner();
                    pending.append(&mut items.0);
                }
            }
            Value::Dict(dict) => {
                if let Ok(cell) = Rc::try_unwrap(dict) {
                    let mut dict = cell.into_inner();
                    pending.extend(dict.entries.drain(..).map(|(_, v)| v));
                }
            }
            Value::Method(receiver, _) => pending.push(*receiver),
            _ => {}
        }
    }
}

/// Bookkeeping for a recursive walk over shared containers: the chain of
/// containers being visited and a bound on the total work.
#[derive(Default)]
pub(crate) struct Walk {
    path: Vec<*const ()>,
    visits: usize,
}

impl Walk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one visited node.
    pub fn visit(&mut self) -> RaiseResult<()> {
        self.visits += 1;
        if self.visits > MAX_SEQUENCE {
            return Err(too_large());
        }
        Ok(())
    }

    /// Push a container onto the path. `false` when it is already on it,
    /// meaning the value contains itself.
    pub fn enter<T>(&mut self, container: &Rc<T>) -> bool {
        let ptr = Rc::as_ptr(container).cast::<()>();
        if self.path.contains(&ptr) {
            return false;
        }
        self.path.push(ptr);
        true
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Insertion-ordered string-keyed mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(String, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn insert(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }
}

impl Drop for Dict {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            release(self.entries.drain(..).map(|(_, v)| v).collect());
        }
    }
}

impl FromIterator<(String, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// Modules a sandbox can expose as globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Json,
}

impl Module {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
        }
    }
}

/// A runtime value.
///
/// Lists, dicts and widgets are shared references: mutation through one
/// binding is visible through every other binding of the same object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Dict(DictRef),
    Widget(Rc<RefCell<Widget>>),
    Module(Module),
    Builtin(Builtin),
    Method(Box<Value>, String),
}

impl Value {
    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(Items(items))))
    }

    pub fn new_dict(dict: Dict) -> Value {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn new_widget(widget: Widget) -> Value {
        Value::Widget(Rc::new(RefCell::new(widget)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Widget(w) => w.borrow().class().name(),
            Value::Module(_) => "module",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(..) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            _ => true,
        }
    }

    // ── JSON conversion ─────────────────────────────────────────────────

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::new_list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::new_dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Fails with `ValueError` when a container holds
    /// itself.
    pub fn to_json(&self) -> RaiseResult<serde_json::Value> {
        self.to_json_in(&mut Walk::new())
    }

    fn to_json_in(&self, walk: &mut Walk) -> RaiseResult<serde_json::Value> {
        walk.visit()?;
        let json = match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                enter_json(walk, items)?;
                let converted = items
                    .borrow()
                    .iter()
                    .map(|v| v.to_json_in(walk))
                    .collect::<RaiseResult<_>>();
                walk.leave();
                serde_json::Value::Array(converted?)
            }
            Value::Dict(dict) => {
                enter_json(walk, dict)?;
                let mut map = serde_json::Map::new();
                let mut converted = Ok(());
                for (k, v) in dict.borrow().iter() {
                    match v.to_json_in(walk) {
                        Ok(json) => {
                            map.insert(k.clone(), json);
                        }
                        Err(e) => {
                            converted = Err(e);
                            break;
                        }
                    }
                }
                walk.leave();
                converted?;
                serde_json::Value::Object(map)
            }
            Value::Widget(w) => w.borrow().to_json(),
            other => serde_json::Value::String(other.repr()),
        };
        Ok(json)
    }

    // ── text forms ──────────────────────────────────────────────────────

    /// `str(value)` for messages; see [`Value::try_str`].
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// `str(value)`. Fails with `MemoryError` when the text would be too long.
    pub fn try_str(&self) -> RaiseResult<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => other.try_repr(),
        }
    }

    /// `repr(value)` for messages: cut short with `...` where
    /// [`Value::try_repr`] would fail.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        if self.write_repr(&mut out, &mut Walk::new()).is_err() {
            out.push_str("...");
        }
        out
    }

    /// `repr(value)`. A container that holds itself prints as `[...]` or
    /// `{...}`.
    pub fn try_repr(&self) -> RaiseResult<String> {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Walk::new())?;
        Ok(out)
    }

    fn write_repr(&self, out: &mut String, walk: &mut Walk) -> RaiseResult<()> {
        if out.len() > MAX_SEQUENCE {
            return Err(too_large());
        }
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote(s)),
            Value::List(items) => {
                if !enter_repr(walk, items)? {
                    out.push_str("[...]");
                    return Ok(());
                }
                out.push('[');
                let mut written = Ok(());
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    written = item.write_repr(out, walk);
                    if written.is_err() {
                        break;
                    }
                }
                walk.leave();
                written?;
                out.push(']');
            }
            Value::Dict(dict) => {
                if !enter_repr(walk, dict)? {
                    out.push_str("{...}");
                    return Ok(());
                }
                out.push('{');
                let mut written = Ok(());
                for (i, (k, v)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&quote(k));
                    out.push_str(": ");
                    written = v.write_repr(out, walk);
                    if written.is_err() {
                        break;
                    }
                }
                walk.leave();
                written?;
                out.push('}');
            }
            Value::Widget(w) => {
                let w = w.borrow();
                out.push_str(&format!("<{} {}>", w.class().name(), w.to_json()));
            }
            Value::Module(m) => out.push_str(&format!("<module '{}'>", m.name())),
            Value::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name())),
            Value::Method(recv, name) => out.push_str(&format!(
                "<built-in method {} of {} object>",
                name,
                recv.type_name()
            )),
        }
        Ok(())
    }

    // ── comparison ──────────────────────────────────────────────────────

    /// Python `==`.
    pub fn py_eq(&self, other: &Value) -> RaiseResult<bool> {
        self.eq_at(other, 0, &mut Walk::new())
    }

    fn eq_at(&self, other: &Value, depth: usize, walk: &mut Walk) -> RaiseResult<bool> {
        if depth > MAX_NESTING {
            return Err(recursion("in comparison"));
        }
        walk.visit()?;
        let equal = match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.eq_at(y, depth + 1, walk)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, v) in a.iter() {
                    match b.get(k) {
                        Some(w) if v.eq_at(w, depth + 1, walk)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (Value::Widget(a), Value::Widget(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Method(ra, na), Value::Method(rb, nb)) => na == nb && ra.is_same(rb),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.num_eq(&b),
                _ => false,
            },
        };
        Ok(equal)
    }

    /// Python `is`: identity for containers, equality for immutable scalars.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Widget(a), Value::Widget(b)) => Rc::ptr_eq(a, b),
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }

    /// Python ordering (`<`, `<=`, ...). Mixed types raise `TypeError`;
    /// `None` means unordered (a NaN was involved).
    pub fn py_cmp(&self, other: &Value, op: &str) -> RaiseResult<Option<Ordering>> {
        self.cmp_at(other, op, 0, &mut Walk::new())
    }

    fn cmp_at(
        &self,
        other: &Value,
        op: &str,
        depth: usize,
        walk: &mut Walk,
    ) -> RaiseResult<Option<Ordering>> {
        if depth > MAX_NESTING {
            return Err(recursion("in comparison"));
        }
        walk.visit()?;
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.eq_at(y, depth + 1, walk)? {
                        return x.cmp_at(y, op, depth + 1, walk);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => Ok(a.num_cmp(&b)),
                _ => Err(type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op,
                    self.type_name(),
                    other.type_name()
                ))),
            },
        }
    }

    pub fn as_number(&self) -> Option<Numeric> {
        match self {
            Value::Bool(b) => Some(Numeric::Int(i64::from(*b))),
            Value::Int(n) => Some(Numeric::Int(*n)),
            Value::Float(f) => Some(Numeric::Float(*f)),
            _ => None,
        }
    }

    /// Index argument for lists and strings.
    pub fn as_index(&self) -> RaiseResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(type_error(format!(
                "indices must be integers, not {}",
                other.type_name()
            ))),
        }
    }

    /// Dict key; only strings are allowed.
    pub fn as_key(&self) -> RaiseResult<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => Err(type_error(format!(
                "dict keys must be str, not {}",
                other.type_name()
            ))),
        }
    }

    /// Materialize an iterable into a vector snapshot.
    pub fn iterate(&self) -> RaiseResult<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Dict(dict) => Ok(dict.borrow().keys().map(|k| Value::Str(k.clone())).collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }
}

/// Numeric view of `bool`, `int` and `float` values.
#[derive(Debug, Clone, Copy)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(n) => *n as f64,
            Numeric::Float(f) => *f,
        }
    }

    fn num_eq(&self, other: &Numeric) -> bool {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }

    fn num_cmp(&self, other: &Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

/// Python float repr: always shows a fractional part for integral values.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Enter a container during JSON conversion.
fn enter_json<T>(walk: &mut Walk, container: &Rc<T>) -> RaiseResult<()> {
    if !walk.enter(container) {
        return Err(value_error("Circular reference detected"));
    }
    if walk.depth() > MAX_NESTING {
        walk.leave();
        return Err(recursion("while encoding a JSON object"));
    }
    Ok(())
}

/// Enter a container during repr; `false` when it is already being printed.
fn enter_repr<T>(walk: &mut Walk, container: &Rc<T>) -> RaiseResult<bool> {
    walk.visit()?;
    if !walk.enter(container) {
        return Ok(false);
    }
    if walk.depth() > MAX_NESTING {
        walk.leave();
        return Err(recursion("while getting the repr of an object"));
    }
    Ok(true)
}

fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_keeps_order() {
        let input = json!({"b": 1, "a": [1.5, "x", null, true], "c": {"d": 2}});
        let value = Value::from_json(&input);
        let output = value.to_json().unwrap();
        assert_eq!(output, input);
        let keys: Vec<_> = output.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_non_finite_float_becomes_null() {
        assert_eq!(Value::Float(f64::INFINITY).to_json().unwrap(), json!(null));
    }

    #[test]
    fn test_cycle_is_reported() {
        let list = Value::new_list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        let err = list.to_json().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
        assert_eq!(err.message, "Circular reference detected");
        assert_eq!(list.repr(), "[[...]]");
        assert!(list.py_eq(&list).unwrap());
    }

    fn self_holding(first: Value, copies: usize) -> Value {
        let list = Value::new_list(vec![first]);
        if let Value::List(items) = &list {
            for _ in 0..copies {
                items.borrow_mut().push(list.clone());
            }
        }
        list
    }

    #[test]
    fn test_branching_cycle_repr_stays_short() {
        let list = self_holding(Value::Int(0), 2);
        assert_eq!(list.try_repr().unwrap(), "[0, [...], [...]]");
        assert_eq!(list.try_str().unwrap(), "[0, [...], [...]]");
    }

    #[test]
    fn test_shared_sibling_is_not_a_cycle() {
        let inner = Value::new_list(vec![Value::Int(1)]);
        let outer = Value::new_list(vec![inner.clone(), inner]);
        assert_eq!(outer.try_repr().unwrap(), "[[1], [1]]");
        assert_eq!(outer.to_json().unwrap(), json!([[1], [1]]));
    }

    #[test]
    fn test_comparing_distinct_cycles_raises() {
        let a = self_holding(Value::Int(1), 1);
        let b = self_holding(Value::Int(1), 1);
        let err = a.py_cmp(&b, "<").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RuntimeError);
        assert_eq!(err.message, "maximum recursion depth exceeded in comparison");
        let err = a.py_eq(&b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RuntimeError);
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let mut value = Value::Int(0);
        for _ in 0..200 {
            value = Value::new_list(vec![value]);
        }
        assert_eq!(value.try_repr().unwrap_err().kind, ErrorKind::RuntimeError);
        assert_eq!(value.to_json().unwrap_err().kind, ErrorKind::RuntimeError);
        assert!(value.repr().ends_with("..."));
    }

    #[test]
    fn test_dropping_deep_nesting_does_not_recurse() {
        let mut value = Value::None;
        for _ in 0..1_000_000 {
            value = Value::new_list(vec![value]);
        }
        drop(value);
    }

    #[test]
    fn test_repr() {
        let value = Value::from_json(&json!({"a": [1, 2.0, "it's"], "b": null}));
        assert_eq!(value.repr(), r#"{'a': [1, 2.0, "it's"], 'b': None}"#);
        assert_eq!(Value::Str("x".into()).to_str(), "x");
        assert_eq!(Value::Bool(true).to_str(), "True");
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)).unwrap());
        assert!(Value::Bool(true).py_eq(&Value::Int(1)).unwrap());
        assert!(!Value::Int(1).py_eq(&Value::Str("1".into())).unwrap());
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            Value::Int(1).py_cmp(&Value::Float(2.5), "<").unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Str("b".into()).py_cmp(&Value::Str("a".into()), "<").unwrap(),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Float(f64::NAN).py_cmp(&Value::Int(1), "<").unwrap(),
            None
        );
        let err = Value::Int(1).py_cmp(&Value::Str("a".into()), "<").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_dict_insert_keeps_position() {
        let mut dict = Dict::new();
        dict.insert("a".into(), Value::Int(1));
        dict.insert("b".into(), Value::Int(2));
        dict.insert("a".into(), Value::Int(3));
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(dict.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::new_list(vec![]).truthy());
        assert!(Value::Int(-1).truthy());
    }
}
