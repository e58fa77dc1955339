//! Tree-walking statement executor.

use super::ast::{BinOp, Expr, Stmt, StmtKind, Target};
use super::builtins::{call_value, has_method, Builtin};
use super::error::{ErrorKind, RaiseResult, Raised, ScriptError};
use super::ops;
use super::value::{Dict, DictRef, Module, Value};

/// Name under which the local namespace is visible to scripts.
pub const SELF_BINDING: &str = "attrs";

enum Flow {
    Normal,
    Break,
    Continue,
}

pub(crate) struct Interpreter<'g> {
    locals: DictRef,
    globals: &'g Dict,
    steps: u64,
    max_steps: u64,
}

impl<'g> Interpreter<'g> {
    pub fn new(locals: DictRef, globals: &'g Dict, max_steps: u64) -> Self {
        Self {
            locals,
            globals,
            steps: 0,
            max_steps,
        }
    }

    pub fn run(&mut self, program: &[Stmt]) -> Result<(), ScriptError> {
        self.exec_block(program).map(|_| ())
    }

    fn tick(&mut self, line: usize) -> Result<(), ScriptError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(ScriptError::new(
                ErrorKind::RuntimeError,
                line,
                "execution step limit exceeded",
            ));
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in block {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        let line = stmt.line;
        self.tick(line)?;
        let at = |e: Raised| e.at(line);

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr).map_err(at)?;
            }
            StmtKind::Assign(targets, expr) => {
                let value = self.eval(expr).map_err(at)?;
                for target in targets {
                    self.assign(target, value.clone()).map_err(at)?;
                }
            }
            StmtKind::AugAssign(target, op, expr) => {
                self.aug_assign(target, *op, expr).map_err(at)?;
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond).map_err(at)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(orelse);
            }
            StmtKind::While(cond, body) => loop {
                self.tick(line)?;
                if !self.eval(cond).map_err(at)?.truthy() {
                    break;
                }
                if let Flow::Break = self.exec_block(body)? {
                    break;
                }
            },
            StmtKind::For(name, iterable, body) => {
                let items = self.eval(iterable).map_err(at)?.iterate().map_err(at)?;
                for item in items {
                    self.tick(line)?;
                    self.locals.borrow_mut().insert(name.clone(), item);
                    if let Flow::Break = self.exec_block(body)? {
                        break;
                    }
                }
            }
            StmtKind::Del(target) => self.delete(target).map_err(at)?,
            StmtKind::Import(module) => {
                return Err(ScriptError::new(
                    ErrorKind::ImportError,
                    line,
                    format!("import of '{module}' is not allowed"),
                ));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Normal)
    }

    // ── names and targets ───────────────────────────────────────────────

    fn lookup(&self, name: &str) -> RaiseResult<Value> {
        if let Some(value) = self.locals.borrow().get(name) {
            return Ok(value.clone());
        }
        if name == SELF_BINDING {
            return Ok(Value::Dict(self.locals.clone()));
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        Builtin::lookup(name).map(Value::Builtin).ok_or_else(|| {
            Raised::new(
                ErrorKind::NameError,
                format!("name '{name}' is not defined"),
            )
        })
    }

    fn assign(&mut self, target: &Target, value: Value) -> RaiseResult<()> {
        match target {
            Target::Name(name) => {
                self.locals.borrow_mut().insert(name.clone(), value);
                Ok(())
            }
            Target::Subscript(obj, index) => {
                let obj = self.eval(obj)?;
                let index = self.eval(index)?;
                ops::set_item(&obj, &index, value)
            }
            Target::Attribute(obj, name) => {
                let obj = self.eval(obj)?;
                set_attr(&obj, name, value)
            }
        }
    }

    fn aug_assign(&mut self, target: &Target, op: BinOp, expr: &Expr) -> RaiseResult<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(expr)?;
                let updated = augment(op, current, &rhs)?;
                self.locals.borrow_mut().insert(name.clone(), updated);
                Ok(())
            }
            Target::Subscript(obj, index) => {
                let obj = self.eval(obj)?;
                let index = self.eval(index)?;
                let current = ops::get_item(&obj, &index)?;
                let rhs = self.eval(expr)?;
                let updated = augment(op, current, &rhs)?;
                ops::set_item(&obj, &index, updated)
            }
            Target::Attribute(obj, name) => {
                let obj = self.eval(obj)?;
                let current = get_attr(&obj, name)?;
                let rhs = self.eval(expr)?;
                let updated = augment(op, current, &rhs)?;
                set_attr(&obj, name, updated)
            }
        }
    }

    fn delete(&mut self, target: &Target) -> RaiseResult<()> {
        match target {
            Target::Name(name) => self
                .locals
                .borrow_mut()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| {
                    Raised::new(
                        ErrorKind::NameError,
                        format!("name '{name}' is not defined"),
                    )
                }),
            Target::Subscript(obj, index) => {
                let obj = self.eval(obj)?;
                let index = self.eval(index)?;
                ops::del_item(&obj, &index)
            }
            Target::Attribute(obj, name) => {
                let obj = self.eval(obj)?;
                Err(Raised::new(
                    ErrorKind::AttributeError,
                    format!(
                        "cannot delete attribute '{name}' of '{}' object",
                        obj.type_name()
                    ),
                ))
            }
        }
    }

    // ── expressions ─────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> RaiseResult<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<RaiseResult<Vec<_>>>()?;
                Ok(Value::new_list(items))
            }
            Expr::Dict(entries) => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let key = self.eval(key)?.as_key()?;
                    let value = self.eval(value)?;
                    dict.insert(key, value);
                }
                Ok(Value::new_dict(dict))
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval(operand)?;
                ops::unary(*op, &operand)
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { func, args, kwargs } => {
                let func = self.eval(func)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<RaiseResult<Vec<_>>>()?;
                let kwargs = kwargs
                    .iter()
                    .map(|(name, arg)| self.eval(arg).map(|value| (name.clone(), value)))
                    .collect::<RaiseResult<Vec<_>>>()?;
                call_value(&func, args, kwargs)
            }
            Expr::Attribute(obj, name) => {
                let obj = self.eval(obj)?;
                get_attr(&obj, name)
            }
            Expr::Subscript(obj, index) => {
                let obj = self.eval(obj)?;
                let index = self.eval(index)?;
                ops::get_item(&obj, &index)
            }
            Expr::Slice(obj, lower, upper) => {
                let obj = self.eval(obj)?;
                let lower = lower.as_deref().map(|e| self.eval(e)).transpose()?;
                let upper = upper.as_deref().map(|e| self.eval(e)).transpose()?;
                ops::slice(&obj, lower.as_ref(), upper.as_ref())
            }
        }
    }
}

/// `current op= rhs`; lists extend in place.
fn augment(op: BinOp, current: Value, rhs: &Value) -> RaiseResult<Value> {
    if let (BinOp::Add, Value::List(items)) = (op, &current) {
        let extra = rhs.iterate()?;
        let mut items = items.borrow_mut();
        if items.len() + extra.len() > ops::MAX_SEQUENCE {
            return Err(super::error::too_large());
        }
        items.extend(extra);
        drop(items);
        return Ok(current);
    }
    ops::binary(op, &current, rhs)
}

fn get_attr(obj: &Value, name: &str) -> RaiseResult<Value> {
    match obj {
        Value::Module(Module::Json) => match name {
            "dumps" => Ok(Value::Builtin(Builtin::JsonDumps)),
            "loads" => Ok(Value::Builtin(Builtin::JsonLoads)),
            _ => Err(Raised::new(
                ErrorKind::AttributeError,
                format!("module 'json' has no attribute '{name}'"),
            )),
        },
        Value::Widget(widget) => widget.borrow().get(name).ok_or_else(|| {
            Raised::new(
                ErrorKind::AttributeError,
                format!("'{}' object has no attribute '{name}'", obj.type_name()),
            )
        }),
        _ if has_method(obj, name) => Ok(Value::Method(Box::new(obj.clone()), name.to_string())),
        _ => Err(Raised::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", obj.type_name()),
        )),
    }
}

fn set_attr(obj: &Value, name: &str, value: Value) -> RaiseResult<()> {
    match obj {
        Value::Widget(widget) => {
            // The value may be this same widget, so edit a copy.
            let mut updated = widget.borrow().clone();
            updated.set(name, &value)?;
            *widget.borrow_mut() = updated;
            Ok(())
        }
        _ if has_method(obj, name) => Err(Raised::new(
            ErrorKind::AttributeError,
            format!(
                "'{}' object attribute '{name}' is read-only",
                obj.type_name()
            ),
        )),
        _ => Err(Raised::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", obj.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;
    use serde_json::json;

    fn run_with(code: &str, attrs: serde_json::Value) -> (Result<(), ScriptError>, serde_json::Value) {
        let Value::Dict(locals) = Value::from_json(&attrs) else {
            panic!("attrs must be an object");
        };
        let mut globals = Dict::new();
        globals.insert("json".to_string(), Value::Module(Module::Json));
        let result = parse(code).and_then(|program| {
            Interpreter::new(locals.clone(), &globals, 10_000).run(&program)
        });
        let out = Value::Dict(locals).to_json().unwrap();
        (result, out)
    }

    fn run(code: &str) -> serde_json::Value {
        let (result, out) = run_with(code, json!({}));
        result.unwrap();
        out
    }

    fn fail(code: &str) -> String {
        run_with(code, json!({})).0.unwrap_err().to_string()
    }

    #[test]
    fn test_attrs_self_binding() {
        let (result, out) = run_with("attrs['x'] = attrs['y'] + 1", json!({"y": 2}));
        result.unwrap();
        assert_eq!(out, json!({"y": 2, "x": 3}));
    }

    #[test]
    fn test_bare_names_write_locals() {
        assert_eq!(run("x = 2\ny = x * 3"), json!({"x": 2, "y": 6}));
    }

    #[test]
    fn test_control_flow() {
        let out = run(
            "total = 0\nfor i in range(10):\n    if i % 2 == 0:\n        continue\n    if i > 7:\n        break\n    total += i\n",
        );
        assert_eq!(out["total"], json!(16));

        let out = run("n = 0\nwhile n < 5:\n    n += 1\nelse_branch = n if n == 5 else -1");
        assert_eq!(out["else_branch"], json!(5));
    }

    #[test]
    fn test_list_augmented_assignment_extends_in_place() {
        let out = run("a = [1]\nb = a\na += [2]");
        assert_eq!(out["b"], json!([1, 2]));
    }

    #[test]
    fn test_short_circuit_returns_operand() {
        let out = run("a = 0 or 'x'\nb = [] and 1\nc = 1 < 2 < 3");
        assert_eq!(out, json!({"a": "x", "b": [], "c": true}));
    }

    #[test]
    fn test_errors_carry_statement_line() {
        assert_eq!(fail("x = 1\ny = x / 0"), "ZeroDivisionError at line 2: division by zero");
        assert_eq!(fail("\n\nz = missing"), "NameError at line 3: name 'missing' is not defined");
        assert_eq!(fail("d = {}\nd['k']"), "KeyError at line 2: k");
        assert_eq!(fail("[1][3]"), "IndexError at line 1: list index out of range");
        assert_eq!(fail("import os"), "ImportError at line 1: import of 'os' is not allowed");
    }

    #[test]
    fn test_error_inside_block_reports_inner_line() {
        assert_eq!(
            fail("for i in [1]:\n    x = 1\n    y = i.nope"),
            "AttributeError at line 3: 'int' object has no attribute 'nope'"
        );
    }

    #[test]
    fn test_side_effects_survive_errors() {
        let (result, out) = run_with("attrs['a'] = 1\nattrs['b'] = 1 / 0", json!({}));
        assert!(result.is_err());
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_step_limit() {
        let err = fail("while True:\n    pass");
        assert!(err.starts_with("RuntimeError at line "));
        assert!(err.ends_with(": execution step limit exceeded"));
    }

    #[test]
    fn test_json_module() {
        let out = run("s = json.dumps({'a': [1, 2]})\nback = json.loads(s)");
        assert_eq!(out["s"], json!("{\"a\": [1, 2]}"));
        assert_eq!(out["back"], json!({"a": [1, 2]}));
    }

    #[test]
    fn test_methods_and_slices() {
        let out = run("w = 'a b c'.split()\nw.append('d')\nfirst = w[:2]\nn = len(w)");
        assert_eq!(out["first"], json!(["a", "b"]));
        assert_eq!(out["n"], json!(4));
    }

    #[test]
    fn test_del() {
        let out = run("a = 1\nb = {'k': 1, 'j': 2}\ndel a\ndel b['k']");
        assert_eq!(out, json!({"b": {"j": 2}}));
        assert_eq!(fail("del nope"), "NameError at line 1: name 'nope' is not defined");
    }
}
