mod http_transport;
mod request;

pub use http_transport::HttpTransport;
pub use request::{ChatMessage, ChatRequestBody, StreamRequest};

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;

/// UTF-8 text chunks from an open response body, in arrival order.
///
/// The source ends when the backend closes the body; an `Err` item is a
/// transport failure and is the last item yielded.
pub type ChunkSource = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Opens the streaming exchange with the backend.
///
/// Cancelling `cancel` must abandon a pending connect; dropping the returned
/// [`ChunkSource`] closes the connection.
pub trait Transport: Send + Sync {
    fn open(
        &self,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChunkSource, StreamError>> + Send;
}
