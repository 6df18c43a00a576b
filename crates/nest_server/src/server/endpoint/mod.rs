pub(crate) mod mjpeg_stream;
pub(crate) mod readings;
pub(crate) mod upload;
pub(crate) mod web_socket;

use axum::Router;
use nest_store::Store;
use nest_video::IngestMode;

use crate::server::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Readings,
    Video,
    Upload,
    WebSocket,
}

impl Endpoint {
    ///The HTTP side of an ingestion mode. UDP frames never arrive over HTTP.
    pub fn ingest(mode: IngestMode) -> Option<Self> {
        match mode {
            IngestMode::Udp => None,
            IngestMode::Upload => Some(Endpoint::Upload),
            IngestMode::Socket => Some(Endpoint::WebSocket),
        }
    }

    pub fn apply<S: Store>(self, router: Router<AppState<S>>) -> Router<AppState<S>> {
        match self {
            Self::Readings => readings::apply(router),
            Self::Video => mjpeg_stream::apply(router),
            Self::Upload => upload::apply(router),
            Self::WebSocket => web_socket::apply(router),
        }
    }
}
