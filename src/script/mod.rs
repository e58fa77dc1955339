//! A small sandboxed interpreter for the Python subset accepted by the exec
//! services.
//!
//! Scripts cannot reach the filesystem, the network or the host process:
//! `import` is rejected, there are no function or class definitions, and
//! every statement and loop iteration is charged against a step budget.
//!
//! ```
//! use sandbox_services::script::{Namespace, Sandbox};
//!
//! let ns = Namespace::from_json(&serde_json::json!({"y": 2})).unwrap();
//! Sandbox::new(1_000).run("attrs['x'] = attrs['y'] + 1", &ns).unwrap();
//! assert_eq!(ns.to_json().unwrap(), serde_json::json!({"y": 2, "x": 3}));
//! ```

mod ast;
mod builtins;
mod error;
mod eval;
mod lexer;
mod ops;
mod parser;
mod value;
mod widget;

use std::rc::Rc;

pub use error::{ErrorKind, ScriptError};
pub use eval::SELF_BINDING;
use parser::parse;
pub use value::{Dict, Value};
pub use widget::{Button, Editbox, Text, Widget, WidgetClass};

use builtins::Builtin;
use eval::Interpreter;
use value::{DictRef, Module};

/// Default statement budget per run.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Execution settings for one kind of service. Cheap to clone and `Send`,
/// so it can be moved onto a blocking worker.
#[derive(Debug, Clone)]
pub struct Sandbox {
    max_steps: u64,
    json_module: bool,
    widgets: bool,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl Sandbox {
    pub fn new(max_steps: u64) -> Self {
        Self {
            max_steps,
            json_module: false,
            widgets: false,
        }
    }

    /// Expose the `json` module as a global.
    pub fn with_json_module(mut self) -> Self {
        self.json_module = true;
        self
    }

    /// Expose the `Text`, `Editbox` and `Button` constructors as globals.
    pub fn with_widgets(mut self) -> Self {
        self.widgets = true;
        self
    }

    fn globals(&self) -> Dict {
        let mut globals = Dict::new();
        if self.json_module {
            globals.insert(
                Module::Json.name().to_string(),
                Value::Module(Module::Json),
            );
        }
        if self.widgets {
            for class in WidgetClass::ALL {
                globals.insert(
                    class.name().to_string(),
                    Value::Builtin(Builtin::Widget(class)),
                );
            }
        }
        globals
    }

    /// Parse and run `code` against `namespace`.
    ///
    /// Assignments made before an error stay in the namespace.
    pub fn run(&self, code: &str, namespace: &Namespace) -> Result<(), ScriptError> {
        let program = parse(code)?;
        let globals = self.globals();
        Interpreter::new(namespace.dict.clone(), &globals, self.max_steps).run(&program)
    }
}

/// The local variables of a script run.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    dict: DictRef,
}

impl Namespace {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a JSON object; `None` for any other JSON value.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match Value::from_json(json) {
            Value::Dict(dict) => Some(Self { dict }),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.dict.borrow().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.dict.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.borrow().is_empty()
    }

    /// Serialize the namespace. Fails with a `ValueError` message when a
    /// value refers back to itself.
    pub fn to_json(&self) -> Result<serde_json::Value, String> {
        Value::Dict(Rc::clone(&self.dict))
            .to_json()
            .map_err(|e| format!("{}: {}", e.kind.class_name(), e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_from_json_requires_object() {
        assert!(Namespace::from_json(&json!([1, 2])).is_none());
        assert!(Namespace::from_json(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_json_module_is_opt_in() {
        let ns = Namespace::empty();
        let err = Sandbox::default().run("x = json.dumps(1)", &ns).unwrap_err();
        assert_eq!(err.to_string(), "NameError at line 1: name 'json' is not defined");

        Sandbox::default()
            .with_json_module()
            .run("x = json.dumps(1)", &ns)
            .unwrap();
        assert_eq!(ns.get("x"), Some(Value::Str("1".into())));
    }

    #[test]
    fn test_widgets_are_opt_in() {
        let ns = Namespace::empty();
        assert!(Sandbox::default().run("sa = Button()", &ns).is_err());

        Sandbox::default()
            .with_widgets()
            .run("sa = Button(label='Go')\nsa.clicked = True", &ns)
            .unwrap();
        let json = ns.to_json().unwrap();
        assert_eq!(json["sa"]["class_name"], "Button");
        assert_eq!(json["sa"]["label"], "Go");
        assert_eq!(json["sa"]["clicked"], true);
    }

    #[test]
    fn test_syntax_error_runs_nothing() {
        let ns = Namespace::empty();
        let err = Sandbox::default().run("x = 1\ny = (", &ns).unwrap_err();
        assert!(err.kind.is_syntax());
        assert!(ns.is_empty());
    }

    #[test]
    fn test_step_budget_is_configurable() {
        let ns = Namespace::empty();
        let code = "n = 0\nwhile n < 100:\n    n += 1";
        assert!(Sandbox::new(50).run(code, &ns).is_err());
        Sandbox::new(1_000).run(code, &ns).unwrap();
        assert_eq!(ns.get("n"), Some(Value::Int(100)));
    }

    #[test]
    fn test_cyclic_namespace_fails_to_serialize() {
        let ns = Namespace::empty();
        Sandbox::default().run("attrs['me'] = attrs", &ns).unwrap();
        let err = ns.to_json().unwrap_err();
        assert_eq!(err, "ValueError: Circular reference detected");
    }
}
