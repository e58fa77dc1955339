//! UI widget descriptors available to scripts run by the widgets service.
//!
//! Each widget is a plain record with a fixed schema. Scripts construct them
//! with keyword arguments (`Button(label="OK")`) and read or write fields as
//! attributes; every write is type-checked against the schema.

use serde::Serialize;

use super::error::{type_error, ErrorKind, RaiseResult, Raised};
use super::value::Value;

const DEFAULT_GRID: [i64; 4] = [0, 0, 1, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetClass {
    Text,
    Editbox,
    Button,
}

impl WidgetClass {
    pub const ALL: [WidgetClass; 3] = [Self::Text, Self::Editbox, Self::Button];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Editbox => "Editbox",
            Self::Button => "Button",
        }
    }

    fn default_widget(&self) -> Widget {
        match self {
            Self::Text => Widget::Text(Text::default()),
            Self::Editbox => Widget::Editbox(Editbox::default()),
            Self::Button => Widget::Button(Button::default()),
        }
    }

    /// Build a widget from call arguments. Only keyword arguments are accepted.
    pub fn construct(&self, args: &[Value], kwargs: &[(String, Value)]) -> RaiseResult<Widget> {
        if !args.is_empty() {
            return Err(type_error(format!(
                "{}() takes no positional arguments",
                self.name()
            )));
        }
        let mut widget = self.default_widget();
        for (name, value) in kwargs {
            if name == "class_name" || widget.get(name).is_none() {
                return Err(type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    self.name(),
                    name
                )));
            }
            widget.set(name, value)?;
        }
        Ok(widget)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub grid: [i64; 4],
    pub label: String,
    pub align: i64,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            label: String::new(),
            align: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Editbox {
    pub grid: [i64; 4],
    pub value: String,
    pub enable: bool,
    pub precision: i64,
    pub ghost: String,
    pub temp_to_value: bool,
}

impl Default for Editbox {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            value: String::new(),
            enable: true,
            precision: 2,
            ghost: String::new(),
            temp_to_value: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    pub grid: [i64; 4],
    pub label: String,
    pub enable: bool,
    #[serde(rename = "type")]
    pub kind: i64,
    pub selected: bool,
    pub clicked: bool,
}

impl Default for Button {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            label: "Click me!".to_string(),
            enable: true,
            kind: 0,
            selected: false,
            clicked: false,
        }
    }
}

/// A widget descriptor, serialized with its class under `class_name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "class_name")]
pub enum Widget {
    Text(Text),
    Editbox(Editbox),
    Button(Button),
}

impl Widget {
    pub fn class(&self) -> WidgetClass {
        match self {
            Self::Text(_) => WidgetClass::Text,
            Self::Editbox(_) => WidgetClass::Editbox,
            Self::Button(_) => WidgetClass::Button,
        }
    }

    /// Read a field by attribute name.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == "class_name" {
            return Some(Value::Str(self.class().name().to_string()));
        }
        let value = match (self, name) {
            (Self::Text(w), "grid") => grid_value(&w.grid),
            (Self::Text(w), "label") => Value::Str(w.label.clone()),
            (Self::Text(w), "align") => Value::Int(w.align),

            (Self::Editbox(w), "grid") => grid_value(&w.grid),
            (Self::Editbox(w), "value") => Value::Str(w.value.clone()),
            (Self::Editbox(w), "enable") => Value::Bool(w.enable),
            (Self::Editbox(w), "precision") => Value::Int(w.precision),
            (Self::Editbox(w), "ghost") => Value::Str(w.ghost.clone()),
            (Self::Editbox(w), "temp_to_value") => Value::Bool(w.temp_to_value),

            (Self::Button(w), "grid") => grid_value(&w.grid),
            (Self::Button(w), "label") => Value::Str(w.label.clone()),
            (Self::Button(w), "enable") => Value::Bool(w.enable),
            (Self::Button(w), "type") => Value::Int(w.kind),
            (Self::Button(w), "selected") => Value::Bool(w.selected),
            (Self::Button(w), "clicked") => Value::Bool(w.clicked),
            _ => return None,
        };
        Some(value)
    }

    /// Write a field by attribute name, checking the value's type.
    pub fn set(&mut self, name: &str, value: &Value) -> RaiseResult<()> {
        let class = self.class().name();
        match (self, name) {
            (_, "class_name") => {
                return Err(Raised::new(
                    ErrorKind::AttributeError,
                    "attribute 'class_name' is read-only",
                ))
            }
            (Self::Text(w), "grid") => w.grid = expect_grid(value)?,
            (Self::Text(w), "label") => w.label = expect_str(name, value)?,
            (Self::Text(w), "align") => w.align = expect_int(name, value)?,

            (Self::Editbox(w), "grid") => w.grid = expect_grid(value)?,
            (Self::Editbox(w), "value") => w.value = expect_str(name, value)?,
            (Self::Editbox(w), "enable") => w.enable = expect_bool(name, value)?,
            (Self::Editbox(w), "precision") => w.precision = expect_int(name, value)?,
            (Self::Editbox(w), "ghost") => w.ghost = expect_str(name, value)?,
            (Self::Editbox(w), "temp_to_value") => w.temp_to_value = expect_bool(name, value)?,

            (Self::Button(w), "grid") => w.grid = expect_grid(value)?,
            (Self::Button(w), "label") => w.label = expect_str(name, value)?,
            (Self::Button(w), "enable") => w.enable = expect_bool(name, value)?,
            (Self::Button(w), "type") => w.kind = expect_int(name, value)?,
            (Self::Button(w), "selected") => w.selected = expect_bool(name, value)?,
            (Self::Button(w), "clicked") => w.clicked = expect_bool(name, value)?,
            _ => {
                return Err(Raised::new(
                    ErrorKind::AttributeError,
                    format!("'{class}' object has no attribute '{name}'"),
                ))
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a plain scalar or array, so this cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn grid_value(grid: &[i64; 4]) -> Value {
    Value::new_list(grid.iter().map(|n| Value::Int(*n)).collect())
}

fn expect_str(field: &str, value: &Value) -> RaiseResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(type_error(format!(
            "'{field}' must be str, not {}",
            other.type_name()
        ))),
    }
}

fn expect_int(field: &str, value: &Value) -> RaiseResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(type_error(format!(
            "'{field}' must be int, not {}",
            other.type_name()
        ))),
    }
}

fn expect_bool(field: &str, value: &Value) -> RaiseResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(type_error(format!(
            "'{field}' must be bool, not {}",
            other.type_name()
        ))),
    }
}

fn expect_grid(value: &Value) -> RaiseResult<[i64; 4]> {
    let err = || type_error("'grid' must be a list of 4 ints");
    let Value::List(items) = value else {
        return Err(err());
    };
    let items = items.borrow();
    if items.len() != 4 {
        return Err(err());
    }
    let mut grid = [0; 4];
    for (slot, item) in grid.iter_mut().zip(items.iter()) {
        match item {
            Value::Int(n) => *slot = *n,
            _ => return Err(err()),
        }
    }
    Ok(grid)
}
