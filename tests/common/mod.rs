#![allow(dead_code)]

use std::future::Future;

use chatstream::error::StreamError;
use chatstream::session::StreamingCallbacks;
use chatstream::stream::{ToolCall, ToolResult};
use chatstream::transport::{ChunkSource, StreamRequest, Transport};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Replays fixed text chunks as a response body.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    chunks: Vec<String>,
    fail_with: Option<String>,
    hold_open: bool,
}

impl ScriptedTransport {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// End the body with a network error instead of a clean close.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Keep the body open after the last chunk.
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &self,
        _request: &StreamRequest,
        _cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChunkSource, StreamError>> + Send {
        let mut items: Vec<Result<String, StreamError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.fail_with {
            items.push(Err(StreamError::Network(message.clone())));
        }
        let hold_open = self.hold_open;
        async move {
            let body = futures_util::stream::iter(items);
            let source: ChunkSource = if hold_open {
                Box::pin(body.chain(futures_util::stream::pending()))
            } else {
                Box::pin(body)
            };
            Ok(source)
        }
    }
}

/// One observed callback invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(Value),
    Token(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    Error(String),
    End(Option<Value>),
}

/// Records callbacks in invocation order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
}

impl StreamingCallbacks for Recorder {
    fn on_start(&mut self, meta: &Value) {
        self.calls.push(Call::Start(meta.clone()));
    }
    fn on_token(&mut self, text: &str) {
        self.calls.push(Call::Token(text.to_string()));
    }
    fn on_tool_call(&mut self, call: &ToolCall) {
        self.calls.push(Call::ToolCall(call.clone()));
    }
    fn on_tool_result(&mut self, result: &ToolResult) {
        self.calls.push(Call::ToolResult(result.clone()));
    }
    fn on_error(&mut self, message: &str) {
        self.calls.push(Call::Error(message.to_string()));
    }
    fn on_end(&mut self, meta: Option<&Value>) {
        self.calls.push(Call::End(meta.cloned()));
    }
}

/// Forwards callbacks over a channel so a test can observe a spawned session.
#[derive(Debug)]
pub struct ChannelRecorder {
    tx: mpsc::UnboundedSender<Call>,
}

impl ChannelRecorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Call>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamingCallbacks for ChannelRecorder {
    fn on_start(&mut self, meta: &Value) {
        let _ = self.tx.send(Call::Start(meta.clone()));
    }
    fn on_token(&mut self, text: &str) {
        let _ = self.tx.send(Call::Token(text.to_string()));
    }
    fn on_tool_call(&mut self, call: &ToolCall) {
        let _ = self.tx.send(Call::ToolCall(call.clone()));
    }
    fn on_tool_result(&mut self, result: &ToolResult) {
        let _ = self.tx.send(Call::ToolResult(result.clone()));
    }
    fn on_error(&mut self, message: &str) {
        let _ = self.tx.send(Call::Error(message.to_string()));
    }
    fn on_end(&mut self, meta: Option<&Value>) {
        let _ = self.tx.send(Call::End(meta.cloned()));
    }
}

pub fn chat_request() -> StreamRequest {
    StreamRequest::json(
        "http://127.0.0.1:9/api/chat/stream",
        &json!({"messages": [{"role": "user", "content": "hi"}], "stream": true}),
    )
    .expect("build request")
}
