use std::ops::ControlFlow;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use nest_store::Store;
use nest_video::{ingest::push_frame, Codec, FrameCache};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::server::state::AppState;

pub(crate) fn apply<S: Store>(router: Router<AppState<S>>) -> Router<AppState<S>> {
    router.route("/ws/frames", get(frame_socket::<S>))
}

async fn frame_socket<S: Store>(
    State(state): State<AppState<S>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| receive_frames(socket, state.codec, state.frames))
}

///Every binary message is one JPEG frame. Nothing is sent back.
async fn receive_frames(mut socket: WebSocket, codec: Codec, frames: FrameCache) {
    let connection = Uuid::new_v4();
    info!("frame socket {connection} opened");
    let origin = format!("websocket {connection}");
    while let Some(message) = socket.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                warn!("frame socket {connection} failed: {err}");
                break;
            }
        };
        if handle_message(&codec, &frames, message, &origin)
            .await
            .is_break()
        {
            break;
        }
    }
    info!("frame socket {connection} closed");
}

async fn handle_message(
    codec: &Codec,
    frames: &FrameCache,
    message: Message,
    origin: &str,
) -> ControlFlow<()> {
    match message {
        Message::Binary(bytes) => {
            push_frame(codec, frames, bytes, origin).await;
        }
        Message::Close(frame) => {
            debug!("{origin} sent close: {frame:?}");
            return ControlFlow::Break(());
        }
        Message::Ping(_) | Message::Pong(_) => {}
        Message::Text(text) => {
            warn!("{origin} sent a text message ({} bytes), expected binary jpeg", text.len());
        }
    }
    ControlFlow::Continue(())
}
