use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use nest_store::MemoryStore;
use nest_video::{FrameCache, IngestMode, VideoConfig};
use serde_json::Value;
use tower::ServiceExt;

use crate::server::{router, state::AppState};

pub(crate) fn app(ingest: IngestMode) -> (Router, AppState<MemoryStore>) {
    let video = VideoConfig {
        width: 32,
        height: 18,
        interval_ms: 5,
        ingest,
        ..Default::default()
    };
    let state = AppState::new(MemoryStore::new(), FrameCache::new(), &video);
    (router(state.clone()), state)
}

pub(crate) async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, headers, body)
}

pub(crate) async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    let (status, _, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
