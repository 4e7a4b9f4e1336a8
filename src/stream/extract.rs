//! Shape-sniffing helpers that pull typed values out of heterogeneous
//! backend payloads. Every function here is pure and total.
use std::borrow::Cow;

use serde_json::Value;

use super::event::{ToolCall, ToolResult};
use crate::util::next_call_id;

#[derive(Debug, Clone, Copy)]
enum Seg {
    Key(&'static str),
    Index(usize),
}

/// Paths probed for token text, in priority order.
const TEXT_PATHS: &[&[Seg]] = &[
    &[
        Seg::Key("choices"),
        Seg::Index(0),
        Seg::Key("delta"),
        Seg::Key("content"),
    ],
    &[
        Seg::Key("choices"),
        Seg::Index(0),
        Seg::Key("message"),
        Seg::Key("content"),
    ],
    &[Seg::Key("delta"), Seg::Key("content")],
    &[Seg::Key("content")],
    &[Seg::Key("text")],
    // Ollama-style chat chunks.
    &[Seg::Key("message"), Seg::Key("content")],
];

const UNKNOWN_ERROR: &str = "Unknown streaming error";
const TOOL_FAILED: &str = "Tool execution failed";

fn lookup<'a>(value: &'a Value, path: &[Seg]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, seg| match seg {
        Seg::Key(key) => current.get(key),
        Seg::Index(index) => current.get(index),
    })
}

/// Token text carried by a payload: the first string found along the
/// fallback chain, or the payload itself when it is a bare string.
#[must_use]
pub fn extract_text(payload: &Value) -> Option<&str> {
    TEXT_PATHS
        .iter()
        .find_map(|path| lookup(payload, path).and_then(Value::as_str))
        .or_else(|| payload.as_str())
}

/// Re-decode literal `\uXXXX` escapes left behind by double JSON encoding.
///
/// Falls back to the input untouched when it is not a valid string literal body.
#[must_use]
pub fn redecode_unicode_escapes(raw: &str) -> Cow<'_, str> {
    if !raw.contains("\\u") {
        return Cow::Borrowed(raw);
    }
    let mut literal = String::with_capacity(raw.len() + 2);
    literal.push('"');
    literal.push_str(raw);
    literal.push('"');
    match serde_json::from_str::<String>(&literal) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Unwrap a payload that was JSON-encoded twice (a JSON string whose
/// contents are a JSON object or array).
#[must_use]
pub fn unwrap_double_encoded(payload: Value) -> Value {
    let Value::String(inner) = &payload else {
        return payload;
    };
    let trimmed = inner.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return payload;
    }
    match serde_json::from_str::<Value>(inner) {
        Ok(decoded @ (Value::Object(_) | Value::Array(_))) => decoded,
        _ => payload,
    }
}

/// `done: true` or `done: "true"`.
#[must_use]
pub fn is_done_signal(payload: &Value) -> bool {
    match payload.get("done") {
        Some(Value::Bool(done)) => *done,
        Some(Value::String(done)) => done == "true",
        _ => false,
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Message for a protocol-signalled failure: `error`, then `message`, then a
/// generic fallback.
#[must_use]
pub fn error_message(payload: &Value) -> String {
    payload
        .get("error")
        .and_then(error_text)
        .or_else(|| payload.get("message").and_then(error_text))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// An `error` field that actually reports a failure: a non-empty string, an
/// object with a `message`, or `true` (described by `message` when present).
///
/// `false`, numbers, empty strings and message-less objects are not errors.
#[must_use]
pub fn embedded_error(payload: &Value) -> Option<String> {
    match payload.get("error")? {
        Value::Bool(true) => Some(
            payload
                .get("message")
                .and_then(error_text)
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        ),
        other => error_text(other),
    }
}

fn arguments_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Null) | None => "{}".to_string(),
        Some(Value::String(_)) => "{}".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Build a [`ToolCall`] from `{tool_call: {...}}`, the OpenAI `{id, function}`
/// shape, or a flat `{name, arguments}` object.
///
/// A call without a function name keeps an empty name. Returns `None` only
/// when the payload is not an object.
#[must_use]
pub fn tool_call_from_payload(payload: &Value) -> Option<ToolCall> {
    let source = match payload.get("tool_call") {
        Some(call @ Value::Object(_)) => call,
        _ => payload,
    };
    if !source.is_object() {
        return None;
    }

    let (name, arguments) = match source.get("function") {
        Some(function @ Value::Object(_)) => (
            string_field(function, &["name"]),
            function.get("arguments"),
        ),
        _ => (
            string_field(source, &["name", "function_name", "functionName"]),
            source.get("arguments").or_else(|| source.get("args")),
        ),
    };
    let name = name.unwrap_or_default();
    let id = string_field(source, &["id", "tool_call_id", "toolCallId"]).unwrap_or_else(next_call_id);
    let mut call = ToolCall::new(id, name, arguments_text(arguments));
    if let Some(kind) = string_field(source, &["type"]) {
        call.kind = kind;
    }
    Some(call)
}

/// Build a [`ToolResult`] from one tool result object.
///
/// `result` falls back to the whole object when the field is absent.
#[must_use]
pub fn tool_result_from_payload(payload: &Value) -> ToolResult {
    let tool_call_id = string_field(payload, &["tool_call_id", "toolCallId", "id"]);
    let function_name = string_field(payload, &["function_name", "functionName", "name"])
        .or_else(|| {
            payload
                .get("function")
                .and_then(|function| string_field(function, &["name"]))
        });
    let result = match payload.get("result") {
        Some(value) if !value.is_null() => value.clone(),
        _ => payload.clone(),
    };
    let failed = matches!(payload.get("success"), Some(Value::Bool(false)))
        || matches!(payload.get("status"), Some(Value::String(s)) if s == "error");
    let error = embedded_error(payload).or_else(|| failed.then(|| TOOL_FAILED.to_string()));
    ToolResult {
        tool_call_id,
        function_name,
        result,
        error,
    }
}

/// Elements of the bundled `tool_calls` array, in order.
#[must_use]
pub fn bundled_tool_calls(payload: &Value) -> Vec<ToolCall> {
    payload
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().filter_map(tool_call_from_payload).collect())
        .unwrap_or_default()
}

/// Elements of the bundled `tool_execution_results` array, in order.
#[must_use]
pub fn bundled_tool_results(payload: &Value) -> Vec<ToolResult> {
    payload
        .get("tool_execution_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter(|value| value.is_object())
                .map(tool_result_from_payload)
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the payload bundles tool arrays alongside (or instead of) content.
#[must_use]
pub fn has_tool_arrays(payload: &Value) -> bool {
    payload.get("tool_calls").is_some_and(Value::is_array)
        || payload
            .get("tool_execution_results")
            .is_some_and(Value::is_array)
}
