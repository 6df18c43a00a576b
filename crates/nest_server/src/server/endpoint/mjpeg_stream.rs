use std::convert::Infallible;

use axum::{
    body::StreamBody,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use nest_store::Store;
use nest_video::mjpeg;
use tracing::debug;
use uuid::Uuid;

use crate::server::state::AppState;

static NO_CACHE: &str = "no-cache, no-store, must-revalidate";

pub(crate) fn apply<S: Store>(router: Router<AppState<S>>) -> Router<AppState<S>> {
    router
        .route("/video", get(video_feed::<S>))
        .route("/video.jpg", get(latest_frame::<S>))
}

///Endless multipart stream, one part per tick. Ends when the client goes away.
async fn video_feed<S: Store>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let viewer = Uuid::new_v4();
    debug!("mjpeg viewer {viewer} connected");
    let frames = state
        .mjpeg
        .clone()
        .stream(state.interval)
        .map(Ok::<_, Infallible>);
    (
        [
            (header::CONTENT_TYPE, mjpeg::content_type()),
            (header::CACHE_CONTROL, NO_CACHE.to_owned()),
            (header::PRAGMA, "no-cache".to_owned()),
        ],
        StreamBody::new(frames),
    )
}

async fn latest_frame<S: Store>(State(state): State<AppState<S>>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        state.mjpeg.current_jpeg().await,
    )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, HttpBody},
        http::{header, Request, StatusCode},
    };
    use nest_video::{IngestMode, mjpeg};
    use tower::ServiceExt;

    use crate::server::testing::{app, send};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_without_frames_is_placeholder() {
        let (app, state) = app(IngestMode::Upload);
        let (status, headers, body) = send(&app, get("/video.jpg")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(&body[..], &state.codec.placeholder_jpeg()[..]);
        assert_eq!(&body[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_snapshot_follows_cache() {
        let (app, state) = app(IngestMode::Upload);
        let mut frame = state.codec.placeholder();
        frame.pixels_mut().for_each(|p| p.0 = [255, 255, 255]);
        state.frames.publish(frame);

        let (_, _, body) = send(&app, get("/video.jpg")).await;
        assert_ne!(&body[..], &state.codec.placeholder_jpeg()[..]);
        let decoded = state.codec.decode(&body).unwrap();
        assert!(decoded.get_pixel(0, 0).0[0] > 200);
    }

    #[tokio::test]
    async fn test_stream_emits_multipart_parts() {
        let (app, _) = app(IngestMode::Udp);
        let response = app.oneshot(get("/video")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], mjpeg::content_type().as_str());
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );

        let mut body = response.into_body();
        for _ in 0..2 {
            let part = body.data().await.unwrap().unwrap();
            assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
            assert!(part.ends_with(b"\r\n"));
        }
    }
}
