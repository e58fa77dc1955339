//! Script execution handlers.
//!
//! Three flavours share the sandbox:
//! - `attrs`: runs against a caller-supplied namespace and returns it; a
//!   failing script is an HTTP 500.
//! - `exec`: same input, but always answers `{attrs, err}` so callers can
//!   see both partial results and the error.
//! - `widgets`: starts from an empty namespace with the widget constructors
//!   in scope and returns whatever the script bound to `sa`.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::error::ServiceError;
use crate::script::{Namespace, Sandbox, Value};
use crate::server::{parse_json, AppState};
use crate::utils::{last_line, preview};

/// Name the widgets service reads its result from.
pub const RESULT_NAME: &str = "sa";

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default = "empty_object")]
    pub attrs: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct WidgetsRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ExecResponse {
    pub attrs: serde_json::Value,
    pub err: String,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Map::new())
}

fn namespace_from(attrs: &serde_json::Value) -> Result<Namespace, ServiceError> {
    Namespace::from_json(attrs)
        .ok_or_else(|| ServiceError::BadRequest("attrs must be a JSON object".to_string()))
}

/// Run `code` against `attrs` and return the updated namespace.
pub fn exec_attrs(
    sandbox: &Sandbox,
    code: &str,
    attrs: &serde_json::Value,
) -> Result<serde_json::Value, ServiceError> {
    let namespace = namespace_from(attrs)?;
    if code.trim().is_empty() {
        return Ok(attrs.clone());
    }
    sandbox
        .run(code, &namespace)
        .map_err(|e| ServiceError::Fault(e.to_string()))?;
    namespace.to_json().map_err(ServiceError::Fault)
}

/// Run `code` against `attrs`, reporting script errors in-band.
pub fn exec_safe(
    sandbox: &Sandbox,
    code: &str,
    attrs: &serde_json::Value,
) -> Result<ExecResponse, ServiceError> {
    let namespace = namespace_from(attrs)?;
    let mut err = match sandbox.run(code, &namespace) {
        Ok(()) => String::new(),
        Err(e) => e.to_string(),
    };
    let attrs = match namespace.to_json() {
        Ok(attrs) => attrs,
        Err(message) => {
            if err.is_empty() {
                err = message;
            }
            empty_object()
        }
    };
    Ok(ExecResponse { attrs, err })
}

/// Run widget-building `code` and return the walk of `sa`.
pub fn exec_widgets(sandbox: &Sandbox, code: &str) -> ExecResponse {
    if code.trim().is_empty() {
        return ExecResponse {
            attrs: empty_object(),
            err: String::new(),
        };
    }

    let namespace = Namespace::empty();
    let outcome = sandbox.run(code, &namespace);
    let result = namespace.get(RESULT_NAME);

    let mut err = match outcome {
        Ok(()) if result.is_none() => format!(
            "NameError at line {}: name '{RESULT_NAME}' is not defined",
            last_line(code)
        ),
        Ok(()) => String::new(),
        Err(e) => e.to_string(),
    };
    let attrs = match result.as_ref().map(walk_result) {
        Some(Ok(attrs)) => attrs,
        Some(Err(message)) => {
            if err.is_empty() {
                err = message;
            }
            empty_object()
        }
        None => empty_object(),
    };
    ExecResponse { attrs, err }
}

/// One-level walk: widgets expand through their schema, dict values that are
/// widgets expand the same way, everything else converts as-is.
fn walk_result(value: &Value) -> Result<serde_json::Value, String> {
    let convert = |v: &Value| -> Result<serde_json::Value, String> {
        match v {
            Value::Widget(widget) => Ok(widget.borrow().to_json()),
            other => other
                .to_json()
                .map_err(|e| format!("{}: {}", e.kind.class_name(), e.message)),
        }
    };
    match value {
        Value::Dict(dict) => {
            let mut out = Map::new();
            for (key, item) in dict.borrow().iter() {
                out.insert(key.clone(), convert(item)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        other => convert(other),
    }
}

// ── HTTP handlers ───────────────────────────────────────────────────────

async fn run_blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ServiceError::Fault(format!("worker failed: {e}")))
}

pub async fn attrs_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let _turn = state.lock.lock().await;
    let request: ExecRequest = parse_json(&body)?;
    tracing::info!(code = %preview(&request.code, 80), "executing");
    let sandbox = state.sandbox.clone();
    let attrs = run_blocking(move || exec_attrs(&sandbox, &request.code, &request.attrs)).await??;
    Ok(Json(attrs))
}

pub async fn exec_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExecResponse>, ServiceError> {
    let _turn = state.lock.lock().await;
    let request: ExecRequest = parse_json(&body)?;
    tracing::info!(code = %preview(&request.code, 80), "executing");
    let sandbox = state.sandbox.clone();
    let response = run_blocking(move || exec_safe(&sandbox, &request.code, &request.attrs)).await??;
    if !response.err.is_empty() {
        tracing::warn!(err = %response.err, "script failed");
    }
    Ok(Json(response))
}

pub async fn widgets_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExecResponse>, ServiceError> {
    let _turn = state.lock.lock().await;
    let request: WidgetsRequest = parse_json(&body)?;
    tracing::info!(code = %preview(&request.code, 80), "building widgets");
    let sandbox = state.sandbox.clone();
    let response = run_blocking(move || exec_widgets(&sandbox, &request.code)).await?;
    if !response.err.is_empty() {
        tracing::warn!(err = %response.err, "script failed");
    }
    Ok(Json(response))
}

/// Body of the readiness probe sent by callers of the exec service.
pub fn readiness_probe() -> serde_json::Value {
    json!({"code": "", "attrs": {}})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn safe() -> Sandbox {
        Sandbox::default().with_json_module()
    }

    fn widgets() -> Sandbox {
        Sandbox::default().with_widgets()
    }

    #[test]
    fn test_attrs_success_returns_namespace() {
        let out = exec_attrs(&Sandbox::default(), "attrs['x'] = attrs['y'] + 1", &json!({"y": 2}))
            .unwrap();
        assert_eq!(out, json!({"y": 2, "x": 3}));
    }

    #[test]
    fn test_attrs_empty_code_is_identity() {
        let attrs = json!({"a": [1, 2], "b": "c"});
        assert_eq!(exec_attrs(&Sandbox::default(), "", &attrs).unwrap(), attrs);
    }

    #[test]
    fn test_attrs_failure_is_a_fault() {
        let err = exec_attrs(&Sandbox::default(), "x = 1 / 0", &json!({})).unwrap_err();
        assert!(matches!(err, ServiceError::Fault(ref m) if m == "ZeroDivisionError at line 1: division by zero"));
    }

    #[test]
    fn test_attrs_must_be_object() {
        let err = exec_attrs(&Sandbox::default(), "x = 1", &json!([1])).unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[test]
    fn test_safe_readiness_probe() {
        let probe = readiness_probe();
        let out = exec_safe(&safe(), "", &probe["attrs"]).unwrap();
        assert_eq!(out, ExecResponse { attrs: json!({}), err: String::new() });
    }

    #[test]
    fn test_safe_keeps_partial_mutations() {
        let out = exec_safe(&safe(), "attrs['a'] = 1\nattrs['b'] = attrs['missing']", &json!({}))
            .unwrap();
        assert_eq!(out.attrs, json!({"a": 1}));
        assert_eq!(out.err, "KeyError at line 2: missing");
    }

    #[test]
    fn test_safe_syntax_error() {
        let out = exec_safe(&safe(), "x = = 1", &json!({"k": 1})).unwrap();
        assert!(out.err.starts_with("SyntaxError at line 1: "));
        assert_eq!(out.attrs, json!({"k": 1}));
    }

    #[test]
    fn test_safe_json_round_trip() {
        let out = exec_safe(
            &safe(),
            "attrs['copy'] = json.loads(json.dumps(attrs['data']))",
            &json!({"data": {"n": [1, 2.5, null, "s"]}}),
        )
        .unwrap();
        assert_eq!(out.err, "");
        assert_eq!(out.attrs["copy"], json!({"n": [1, 2.5, null, "s"]}));
    }

    #[test]
    fn test_safe_cycle_reports_error() {
        let out = exec_safe(&safe(), "attrs['me'] = attrs", &json!({})).unwrap();
        assert_eq!(out.attrs, json!({}));
        assert_eq!(out.err, "ValueError: Circular reference detected");
    }

    #[test]
    fn test_safe_comparing_self_holding_lists_raises() {
        let code = "a = [1]\na.append(a)\nb = [1]\nb.append(b)\nc = a < b";
        let out = exec_safe(&safe(), code, &json!({})).unwrap();
        assert_eq!(
            out.err,
            "RuntimeError at line 5: maximum recursion depth exceeded in comparison"
        );
    }

    #[test]
    fn test_safe_long_operator_chain_is_rejected() {
        let code = format!("x = {}1", "1+".repeat(100_000));
        let out = exec_safe(&safe(), &code, &json!({})).unwrap();
        assert_eq!(out.err, "SyntaxError at line 1: too many nested levels");
    }

    #[test]
    fn test_safe_huge_dumps_indent_is_a_memory_error() {
        let out = exec_safe(&safe(), "s = json.dumps([1], indent=10**15)", &json!({})).unwrap();
        assert_eq!(out.err, "MemoryError at line 1: result is too large");
    }

    #[test]
    fn test_safe_repeating_empty_list() {
        let out = exec_safe(&safe(), "x = [] * 10**18
y = [1] * 0", &json!({})).unwrap();
        assert_eq!(out.err, "");
        assert_eq!(out.attrs, json!({"x": [], "y": []}));
    }

    #[test]
    fn test_safe_str_of_branching_cycle() {
        let code = "a = []\na.append(a)\na.append(a)\nattrs['s'] = str(a)\na.clear()";
        let out = exec_safe(&safe(), code, &json!({})).unwrap();
        assert_eq!(out.err, "");
        assert_eq!(out.attrs["s"], "[[...], [...]]");
    }

    #[test]
    fn test_widgets_button_defaults() {
        let out = exec_widgets(&widgets(), "sa = Button()");
        assert_eq!(out.err, "");
        assert_eq!(out.attrs["label"], "Click me!");
        assert_eq!(out.attrs["class_name"], "Button");
    }

    #[test]
    fn test_widgets_single_widget() {
        let out = exec_widgets(&widgets(), "sa = Button(label='OK')");
        assert_eq!(out.err, "");
        assert_eq!(out.attrs["class_name"], "Button");
        assert_eq!(out.attrs["label"], "OK");
    }

    #[test]
    fn test_widgets_dict_of_widgets() {
        let out = exec_widgets(
            &widgets(),
            "sa = {'title': Text(label='Hi'), 'count': 3}\nsa['title'].align = 1",
        );
        assert_eq!(out.err, "");
        assert_eq!(out.attrs["title"]["class_name"], "Text");
        assert_eq!(out.attrs["title"]["align"], 1);
        assert_eq!(out.attrs["count"], 3);
    }

    #[test]
    fn test_widgets_missing_result() {
        let out = exec_widgets(&widgets(), "x = 1\ny = 2");
        assert_eq!(out.attrs, json!({}));
        assert_eq!(out.err, "NameError at line 2: name 'sa' is not defined");
    }

    #[test]
    fn test_widgets_empty_code() {
        let out = exec_widgets(&widgets(), "   ");
        assert_eq!(out, ExecResponse { attrs: json!({}), err: String::new() });
    }

    #[test]
    fn test_widgets_partial_result_on_error() {
        let out = exec_widgets(&widgets(), "sa = Editbox(value='1')\nsa.precision = 'x'");
        assert_eq!(out.attrs["value"], "1");
        assert_eq!(out.err, "TypeError at line 2: 'precision' must be int, not str");
    }
}
