//! Frame -> [`StreamEvent`] decoding.
//!
//! Decoding is total: a frame that cannot be interpreted degrades to literal
//! token text instead of failing, so one malformed frame never ends a stream.
use serde_json::Value;
use smallvec::SmallVec;

use super::event::StreamEvent;
use super::extract::{
    bundled_tool_calls, bundled_tool_results, embedded_error, error_message, extract_text,
    has_tool_arrays, is_done_signal, redecode_unicode_escapes, tool_call_from_payload,
    tool_result_from_payload, unwrap_double_encoded,
};
use super::Frame;

/// Events decoded from a single frame, primary event first.
pub type DecodedEvents = SmallVec<[StreamEvent; 2]>;

/// OpenAI-compatible end-of-stream sentinel.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Decode one frame into zero or more events.
///
/// Emission order is fixed: the primary event for the frame's label, then one
/// `ToolCallRequested` per `tool_calls` element, then one
/// `ToolResultReceived` per `tool_execution_results` element.
#[must_use]
pub fn decode_frame(frame: &Frame) -> DecodedEvents {
    let mut out = DecodedEvents::new();
    let label = frame.event_type.as_str();

    if frame.data.trim() == DONE_SENTINEL {
        out.push(StreamEvent::Ended { meta: None });
        return out;
    }

    let payload = match serde_json::from_str::<Value>(&frame.data) {
        Ok(value) => unwrap_double_encoded(value),
        Err(_) => {
            out.push(literal_event(label, &frame.data));
            return out;
        }
    };

    if is_done_signal(&payload) {
        out.push(StreamEvent::Ended {
            meta: Some(payload),
        });
        return out;
    }

    match label {
        "start" => out.push(StreamEvent::Started {
            meta: payload.clone(),
        }),
        "tool_call" | "tool_call_start" => {
            let bundled_only = !has_call_fields(&payload) && has_tool_arrays(&payload);
            if !bundled_only {
                match tool_call_from_payload(&payload) {
                    Some(call) => out.push(StreamEvent::ToolCallRequested(call)),
                    None => out.push(StreamEvent::Token {
                        text: frame.data.clone(),
                    }),
                }
            }
        }
        "tool_result" | "tool_execution_result" => {
            let bundled_only = payload.get("result").is_none() && has_tool_arrays(&payload);
            if !bundled_only {
                out.push(StreamEvent::ToolResultReceived(tool_result_from_payload(
                    &payload,
                )));
            }
        }
        "end" => out.push(StreamEvent::Ended {
            meta: Some(payload.clone()),
        }),
        "error" => out.push(StreamEvent::Failed {
            message: error_message(&payload),
        }),
        // "token", "message", "data" and unknown labels all carry content.
        _ => push_content(label, &payload, &mut out),
    }

    out.extend(
        bundled_tool_calls(&payload)
            .into_iter()
            .map(StreamEvent::ToolCallRequested),
    );
    out.extend(
        bundled_tool_results(&payload)
            .into_iter()
            .map(StreamEvent::ToolResultReceived),
    );
    out
}

/// Whether a tool-call frame describes a call itself rather than only
/// carrying bundled arrays.
fn has_call_fields(payload: &Value) -> bool {
    ["tool_call", "function", "name", "function_name", "functionName", "id", "arguments"]
        .iter()
        .any(|key| payload.get(key).is_some())
}

fn literal_event(label: &str, data: &str) -> StreamEvent {
    if label == "error" {
        StreamEvent::Failed {
            message: data.to_string(),
        }
    } else {
        StreamEvent::Token {
            text: data.to_string(),
        }
    }
}

fn push_content(label: &str, payload: &Value, out: &mut DecodedEvents) {
    if let Some(text) = extract_text(payload) {
        if !text.is_empty() {
            out.push(StreamEvent::Token {
                text: redecode_unicode_escapes(text).into_owned(),
            });
        }
        return;
    }

    match payload {
        _ if has_tool_arrays(payload) => {}
        _ => {
            if let Some(message) = embedded_error(payload) {
                out.push(StreamEvent::Failed { message });
            } else {
                tracing::trace!(label, "frame carried no content");
            }
        }
    }
}
