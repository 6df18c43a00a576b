use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use nest_store::Store;
use nest_video::CodecError;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{error::ApiError, server::state::AppState};

static FIELD: &str = "file";
static JPEG_TYPES: [&str; 2] = ["image/jpeg", "image/jpg"];

pub(crate) fn apply<S: Store>(router: Router<AppState<S>>) -> Router<AppState<S>> {
    router.route("/upload_frame", post(upload_frame::<S>))
}

///Accepts one JPEG in the `file` field of a multipart form and makes it the current frame.
async fn upload_frame<S: Store>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some(FIELD) {
            continue;
        }
        if !field
            .content_type()
            .is_some_and(|ct| JPEG_TYPES.contains(&ct))
        {
            return Err(ApiError::bad_request("Only JPEG images are accepted"));
        }
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("Empty file"));
        }
        let len = data.len();
        let frame = match state.codec.decode_blocking(data).await {
            Ok(frame) => frame,
            Err(CodecError::Task(err)) => return Err(ApiError::Task(err)),
            Err(err) => {
                warn!("rejected uploaded frame: {err}");
                return Err(ApiError::bad_request("Failed to decode JPEG"));
            }
        };
        state.frames.publish(frame);
        debug!("uploaded frame ({len} bytes)");
        return Ok(Json(json!({ "ok": true, "msg": "frame uploaded" })));
    }
    Err(ApiError::Unprocessable(format!("missing `{FIELD}` field")))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use nest_video::IngestMode;
    use serde_json::Value;

    use crate::server::testing::{app, send, send_json};

    static BOUNDARY: &str = "XnestBOUNDARYx";

    fn form(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"frame.jpg\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri("/upload_frame")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn upload(mode: IngestMode, request: Request<Body>) -> (StatusCode, Value, bool) {
        let (app, state) = app(mode);
        let (status, _, body) = send(&app, request).await;
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, body, state.frames.snapshot().is_some())
    }

    fn jpeg() -> Vec<u8> {
        let (_, state) = app(IngestMode::Upload);
        state.codec.encode(&state.codec.placeholder()).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_jpeg() {
        let (status, body, cached) = upload(IngestMode::Upload, form("file", "image/jpeg", &jpeg())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["msg"], "frame uploaded");
        assert!(cached);
    }

    #[tokio::test]
    async fn test_accepts_jpg_alias() {
        let (status, _, cached) = upload(IngestMode::Upload, form("file", "image/jpg", &jpeg())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cached);
    }

    #[tokio::test]
    async fn test_rejects_other_types() {
        let (status, body, cached) = upload(IngestMode::Upload, form("file", "image/png", &jpeg())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Only JPEG images are accepted");
        assert!(!cached);
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let (status, body, cached) = upload(IngestMode::Upload, form("file", "image/jpeg", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Empty file");
        assert!(!cached);
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let (status, body, cached) =
            upload(IngestMode::Upload, form("file", "image/jpeg", b"definitely not a jpeg")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Failed to decode JPEG");
        assert!(!cached);
    }

    #[tokio::test]
    async fn test_missing_field() {
        let (status, _, cached) = upload(IngestMode::Upload, form("picture", "image/jpeg", &jpeg())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!cached);
    }

    #[tokio::test]
    async fn test_not_mounted_outside_upload_mode() {
        for mode in [IngestMode::Udp, IngestMode::Socket] {
            let (status, _, cached) = upload(mode, form("file", "image/jpeg", &jpeg())).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(!cached);
        }
        let (app, _) = app(IngestMode::Udp);
        let (status, _) = send_json(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
