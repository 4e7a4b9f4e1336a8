use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::StreamError;

/// Everything needed to open one streaming exchange.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub url: url::Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl StreamRequest {
    /// POST `body` as JSON to `url`, accepting an event stream back.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] when the URL does not parse or
    /// the body cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(url: &str, body: &T) -> Result<Self, StreamError> {
        let url = url::Url::parse(url)
            .map_err(|err| StreamError::InvalidRequest(format!("invalid URL '{url}': {err}")))?;
        let body = serde_json::to_vec(body)
            .map_err(|err| StreamError::InvalidRequest(format!("failed to encode body: {err}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        Ok(Self {
            url,
            method: Method::POST,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Build a request against the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] for an unusable URL, method,
    /// header or body.
    pub fn from_backend<T: Serialize + ?Sized>(
        backend: &BackendConfig,
        body: &T,
    ) -> Result<Self, StreamError> {
        let mut request = Self::json(&backend.stream_url(), body)?;
        request.method = Method::from_bytes(backend.method.to_uppercase().as_bytes())
            .map_err(|err| StreamError::InvalidRequest(format!("invalid method: {err}")))?;
        if let Some(api_key) = backend.api_key.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|err| StreamError::InvalidRequest(format!("invalid api_key: {err}")))?;
            request.headers.insert(AUTHORIZATION, value);
        }
        for (name, value) in &backend.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                StreamError::InvalidRequest(format!("invalid header name '{name}': {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                StreamError::InvalidRequest(format!("invalid header value for '{name}': {err}"))
            })?;
            request.headers.insert(name, value);
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body for a streamed chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequestBody {
    #[must_use]
    pub fn user_prompt(model: Option<String>, prompt: impl Into<String>) -> Self {
        Self {
            model,
            messages: vec![ChatMessage::user(prompt)],
            stream: true,
        }
    }
}
