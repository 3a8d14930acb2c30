//! JSON contexts in, bindings and error reports out.

use std::path::Path;

use anyhow::{Context, Result};
use sandbox_core::value::is_same_object;
use sandbox_core::{
    ContextInput, ErrorKind, ExceptionKind, GuardedContext, Namespace, SandboxError, TraceFrame,
    Value,
};
use serde::Serialize;

/// Parse a JSON object into a context. Anything but an object is an
/// argument error.
pub fn parse_context(text: &str) -> Result<ContextInput> {
    let json: serde_json::Value = serde_json::from_str(text).context("Context is not valid JSON")?;
    Ok(ContextInput::try_from(json)?)
}

pub fn load_context(path: &Path) -> Result<ContextInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    parse_context(&text).with_context(|| format!("Invalid context file {}", path.display()))
}

/// Add `extra` to a plain context without replacing bindings it already has.
/// Guarded contexts are returned untouched.
pub fn merge_bindings(input: ContextInput, extra: &Namespace) -> ContextInput {
    match input {
        ContextInput::Plain(mut mapping) => {
            for (key, value) in extra {
                mapping.entry(key.clone()).or_insert_with(|| value.clone());
            }
            ContextInput::Plain(mapping)
        }
        guarded => guarded,
    }
}

/// Whether `key` still holds the very value `hidden` put there. A binding the
/// script replaced is reported like any other.
fn is_hidden(hidden: &Namespace, key: &str, value: &Value) -> bool {
    hidden
        .get(key)
        .is_some_and(|injected| is_same_object(injected, value))
}

/// Bindings as a JSON object, leaving out untouched `hidden` bindings.
pub fn bindings_json(context: &GuardedContext, hidden: &Namespace) -> serde_json::Value {
    serde_json::Value::Object(
        context
            .iter()
            .filter(|(key, value)| !is_hidden(hidden, key, value))
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    )
}

/// One `name = repr` line per binding, leaving out untouched `hidden`
/// bindings.
pub fn format_bindings(context: &GuardedContext, hidden: &Namespace) -> String {
    let mut out = String::new();
    for (key, value) in context.iter() {
        if is_hidden(hidden, key, value) {
            continue;
        }
        out.push_str(&format!("{} = {}\n", key, value.repr()));
    }
    out
}

/// Machine-readable form of a [`SandboxError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traceback: Vec<TraceFrame>,
}

impl From<&SandboxError> for ErrorReport {
    fn from(err: &SandboxError) -> Self {
        let script = err.as_script();
        Self {
            kind: err.kind(),
            message: err.to_string(),
            line: err.line(),
            exception: script.map(|script| script.kind),
            traceback: script
                .map(|script| script.traceback.clone())
                .unwrap_or_default(),
        }
    }
}

/// Human-readable form of a [`SandboxError`]; script errors get their
/// traceback.
pub fn format_sandbox_error(err: &SandboxError) -> String {
    match err.as_script() {
        Some(script) => script.format_traceback(),
        None => err.to_string(),
    }
}
