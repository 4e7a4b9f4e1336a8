use serde_json::Value;

use crate::stream::{ToolCall, ToolResult};

/// Receiver for decoded stream events.
///
/// Every method defaults to a no-op; implement only what you need.
/// `on_token` receives each increment, not the accumulated text.
pub trait StreamingCallbacks {
    fn on_start(&mut self, _meta: &Value) {}
    fn on_token(&mut self, _text: &str) {}
    fn on_tool_call(&mut self, _call: &ToolCall) {}
    fn on_tool_result(&mut self, _result: &ToolResult) {}
    fn on_error(&mut self, _message: &str) {}
    fn on_end(&mut self, _meta: Option<&Value>) {}
}

/// Ignores every event.
impl StreamingCallbacks for () {}

impl<C: StreamingCallbacks + ?Sized> StreamingCallbacks for &mut C {
    fn on_start(&mut self, meta: &Value) {
        (**self).on_start(meta);
    }
    fn on_token(&mut self, text: &str) {
        (**self).on_token(text);
    }
    fn on_tool_call(&mut self, call: &ToolCall) {
        (**self).on_tool_call(call);
    }
    fn on_tool_result(&mut self, result: &ToolResult) {
        (**self).on_tool_result(result);
    }
    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }
    fn on_end(&mut self, meta: Option<&Value>) {
        (**self).on_end(meta);
    }
}

/// [`StreamingCallbacks`] assembled from optional closures.
#[derive(Default)]
pub struct CallbackSet {
    start: Option<Box<dyn FnMut(&Value) + Send>>,
    token: Option<Box<dyn FnMut(&str) + Send>>,
    tool_call: Option<Box<dyn FnMut(&ToolCall) + Send>>,
    tool_result: Option<Box<dyn FnMut(&ToolResult) + Send>>,
    error: Option<Box<dyn FnMut(&str) + Send>>,
    end: Option<Box<dyn FnMut(Option<&Value>) + Send>>,
}

impl CallbackSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_start(mut self, f: impl FnMut(&Value) + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_token(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.token = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_tool_call(mut self, f: impl FnMut(&ToolCall) + Send + 'static) -> Self {
        self.tool_call = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_tool_result(mut self, f: impl FnMut(&ToolResult) + Send + 'static) -> Self {
        self.tool_result = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_error(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_end(mut self, f: impl FnMut(Option<&Value>) + Send + 'static) -> Self {
        self.end = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSet")
            .field("start", &self.start.is_some())
            .field("token", &self.token.is_some())
            .field("tool_call", &self.tool_call.is_some())
            .field("tool_result", &self.tool_result.is_some())
            .field("error", &self.error.is_some())
            .field("end", &self.end.is_some())
            .finish()
    }
}

impl StreamingCallbacks for CallbackSet {
    fn on_start(&mut self, meta: &Value) {
        if let Some(f) = self.start.as_mut() {
            f(meta);
        }
    }
    fn on_token(&mut self, text: &str) {
        if let Some(f) = self.token.as_mut() {
            f(text);
        }
    }
    fn on_tool_call(&mut self, call: &ToolCall) {
        if let Some(f) = self.tool_call.as_mut() {
            f(call);
        }
    }
    fn on_tool_result(&mut self, result: &ToolResult) {
        if let Some(f) = self.tool_result.as_mut() {
            f(result);
        }
    }
    fn on_error(&mut self, message: &str) {
        if let Some(f) = self.error.as_mut() {
            f(message);
        }
    }
    fn on_end(&mut self, meta: Option<&Value>) {
        if let Some(f) = self.end.as_mut() {
            f(meta);
        }
    }
}
