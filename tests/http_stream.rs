mod common;

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chatstream::config::BackendConfig;
use chatstream::session::{CancelHandle, SessionController, SessionStatus};
use chatstream::transport::{ChatRequestBody, HttpTransport, StreamRequest};
use common::{Call, Recorder};
use serde_json::{json, Value};

async fn spawn_backend(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), server)
}

/// Serves `chunks` as an event-stream body, pausing between writes so the
/// client sees them as separate reads.
fn sse_response(chunks: Vec<Bytes>) -> Response {
    let body = futures_util::stream::unfold(chunks.into_iter(), |mut chunks| async move {
        let chunk = chunks.next()?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        Some((Ok::<_, Infallible>(chunk), chunks))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(body))
        .expect("build sse response")
}

fn build_request(base_url: &str, api_key: Option<&str>) -> (HttpTransport, StreamRequest) {
    let mut backend = BackendConfig::with_base_url(base_url);
    backend.api_key = api_key.map(str::to_string);
    backend.model = Some("mock-model".to_string());
    let transport = HttpTransport::new(&backend).expect("build transport");
    let body = ChatRequestBody::user_prompt(backend.model.clone(), "ping");
    let request = StreamRequest::from_backend(&backend, &body).expect("build request");
    (transport, request)
}

#[tokio::test]
async fn test_http_stream_decodes_chunked_body() {
    let app = Router::new().route(
        "/api/chat/stream",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(headers["authorization"], "Bearer sk-mock");
            assert_eq!(body["stream"], json!(true));
            assert_eq!(body["messages"][0]["content"], "ping");
            // "é" is split between two writes.
            let accent = "é".as_bytes();
            sse_response(vec![
                Bytes::from_static(b"event: start\ndata: {\"model\":\"mock-model\"}\n\n"),
                Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"caf"),
                Bytes::copy_from_slice(&accent[..1]),
                Bytes::copy_from_slice(&accent[1..]),
                Bytes::from_static(b"\"}}]}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ])
        }),
    );
    let (base_url, server) = spawn_backend(app).await;

    let (transport, request) = build_request(&base_url, Some("sk-mock"));
    let controller = SessionController::new(transport);
    let mut recorder = Recorder::default();
    let outcome = controller
        .run(&request, &mut recorder, CancelHandle::new())
        .await;

    assert_eq!(
        recorder.calls,
        vec![
            Call::Start(json!({"model": "mock-model"})),
            Call::Token("café".to_string()),
            Call::End(None),
        ]
    );
    assert_eq!(outcome.status, SessionStatus::Ended);

    server.abort();
}

#[tokio::test]
async fn test_http_error_status_fails_session() {
    let app = Router::new().route(
        "/api/chat/stream",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {"message": "slow down"}})),
            )
        }),
    );
    let (base_url, server) = spawn_backend(app).await;

    let (transport, request) = build_request(&base_url, None);
    let controller = SessionController::new(transport);
    let mut recorder = Recorder::default();
    let outcome = controller
        .run(&request, &mut recorder, CancelHandle::new())
        .await;

    assert_eq!(recorder.calls.len(), 1);
    let Call::Error(message) = &recorder.calls[0] else {
        panic!("expected error callback, got {:?}", recorder.calls[0]);
    };
    assert!(message.starts_with("HTTP 429"), "{message}");
    assert!(message.contains("slow down"), "{message}");
    assert_eq!(outcome.status, SessionStatus::Failed);

    server.abort();
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop so the port is known to be closed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let (transport, request) = build_request(&format!("http://{addr}"), None);
    let controller = SessionController::new(transport);
    let mut recorder = Recorder::default();
    let outcome = controller
        .run(&request, &mut recorder, CancelHandle::new())
        .await;

    let Some(Call::Error(message)) = recorder.calls.first() else {
        panic!("expected error callback, got {:?}", recorder.calls);
    };
    assert!(message.starts_with("Network error"), "{message}");
    assert_eq!(outcome.status, SessionStatus::Failed);
}

#[tokio::test]
async fn test_cancel_closes_open_http_stream() {
    let app = Router::new().route(
        "/api/chat/stream",
        post(|| async {
            let first = futures_util::stream::once(async {
                Ok::<_, Infallible>(Bytes::from_static(b"data: {\"content\":\"tick\"}\n\n"))
            });
            let body = futures_util::StreamExt::chain(first, futures_util::stream::pending());
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(body))
                .expect("build sse response")
        }),
    );
    let (base_url, server) = spawn_backend(app).await;

    let (transport, request) = build_request(&base_url, None);
    let controller = SessionController::new(transport);
    let (callbacks, mut rx) = common::ChannelRecorder::new();
    let handle = controller.start(request, callbacks);

    assert_eq!(rx.recv().await, Some(Call::Token("tick".to_string())));
    handle.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("session stopped after cancel")
        .expect("session task");

    assert_eq!(outcome.status, SessionStatus::Aborted);
    assert_eq!(rx.recv().await, None);

    server.abort();
}
