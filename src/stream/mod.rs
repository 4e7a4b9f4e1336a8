pub mod assembler;
pub mod decoder;
pub mod event;
pub mod extract;
pub mod utf8;

pub use assembler::{FrameAssembler, FramingPolicy};
pub use decoder::{decode_frame, DecodedEvents};
pub use event::{StreamEvent, ToolCall, ToolFunction, ToolResult};
pub use utf8::Utf8ChunkDecoder;

/// One assembled unit of the response body: an event label plus its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// `event:` label, `"token"` when the backend sent none.
    pub event_type: String,
    pub data: String,
    /// Last `id:` seen on the stream, if any.
    pub id: Option<String>,
}

impl Frame {
    pub const DEFAULT_EVENT_TYPE: &'static str = "token";

    #[must_use]
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            id: None,
        }
    }

    /// A frame with the default `token` label.
    #[must_use]
    pub fn token(data: impl Into<String>) -> Self {
        Self::new(Self::DEFAULT_EVENT_TYPE, data)
    }
}
