use std::time::Duration;

use nest_store::Store;
use nest_video::{Codec, FrameCache, IngestMode, MjpegSource, VideoConfig};

///Everything a handler may touch. Cheap to clone; every field is a handle.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub frames: FrameCache,
    pub codec: Codec,
    pub mjpeg: MjpegSource,
    pub interval: Duration,
    pub ingest: IngestMode,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, frames: FrameCache, video: &VideoConfig) -> Self {
        let codec = video.codec();
        AppState {
            store,
            mjpeg: MjpegSource::new(frames.clone(), codec),
            frames,
            codec,
            interval: video.interval(),
            ingest: video.ingest,
        }
    }
}
