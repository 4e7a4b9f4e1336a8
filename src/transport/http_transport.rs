use std::future::Future;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{ChunkSource, StreamRequest, Transport};
use crate::config::BackendConfig;
use crate::error::{classify_reqwest_error, StreamError};
use crate::stream::Utf8ChunkDecoder;
use crate::util::preview;

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

fn build_reqwest_client(backend: &BackendConfig) -> Result<reqwest::Client, StreamError> {
    let mut builder = reqwest::Client::builder()
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(backend.connect_timeout))
        .timeout(Duration::from_secs(backend.timeout));

    if let Some(proxy_url) = backend.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| StreamError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !backend.use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| StreamError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// reqwest-backed [`Transport`] yielding the response body as text chunks.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with timeouts and proxy settings from `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] for an invalid proxy URL or
    /// [`StreamError::Transport`] when the client cannot be built.
    pub fn new(backend: &BackendConfig) -> Result<Self, StreamError> {
        Ok(Self {
            client: build_reqwest_client(backend)?,
        })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn open(
        &self,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChunkSource, StreamError>> + Send {
        let mut outgoing = reqwest::Request::new(request.method.clone(), request.url.clone());
        *outgoing.headers_mut() = request.headers.clone();
        *outgoing.body_mut() = Some(reqwest::Body::from(request.body.clone()));
        let client = self.client.clone();
        let cancel = cancel.clone();

        async move {
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(StreamError::Transport("request cancelled before response".into()));
                }
                result = client.execute(outgoing) => result.map_err(|err| classify_reqwest_error(&err))?,
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!(status = status.as_u16(), "backend rejected stream request");
                return Err(StreamError::Upstream {
                    status: status.as_u16(),
                    message: summarize_error_body(&body),
                });
            }

            Ok(text_chunk_stream(response.bytes_stream()))
        }
    }
}

/// Pull a readable message out of an error response body.
fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .get("error")
            .and_then(|error| match error {
                Value::String(s) => Some(s.as_str()),
                other => other.get("message").and_then(Value::as_str),
            })
            .or_else(|| value.get("message").and_then(Value::as_str))
            .or_else(|| value.get("detail").and_then(Value::as_str));
        if let Some(message) = message {
            return message.to_string();
        }
    }
    preview(trimmed, ERROR_BODY_PREVIEW_CHARS).to_string()
}

/// Adapt a response byte stream into UTF-8 text chunks.
///
/// Ends after the first transport error.
fn text_chunk_stream<S>(byte_stream: S) -> ChunkSource
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    let chunks = futures_util::stream::unfold(
        (Box::pin(byte_stream), Utf8ChunkDecoder::new(), false),
        |(mut stream, mut decoder, finished)| async move {
            if finished {
                return None;
            }
            loop {
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        let text = decoder.decode(&bytes);
                        if !text.is_empty() {
                            return Some((Ok(text), (stream, decoder, false)));
                        }
                    }
                    Some(Err(err)) => {
                        return Some((Err(classify_reqwest_error(&err)), (stream, decoder, true)));
                    }
                    None => {
                        let tail = decoder.finish()?;
                        return Some((Ok(tail), (stream, decoder, true)));
                    }
                }
            }
        },
    );
    Box::pin(chunks)
}
