use std::{sync::Arc, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio::{
    sync::Mutex,
    time::{interval, MissedTickBehavior},
};
use tokio_stream::wrappers::IntervalStream;
use tracing::warn;

use crate::{
    codec::Codec,
    frame::{Frame, FrameCache},
};

pub static BOUNDARY: &str = "frame";

pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

///One multipart part: boundary, part header, jpeg bytes, trailing delimiter.
pub fn chunk(jpeg: &[u8]) -> Bytes {
    let head = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut bytes = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    bytes.put_slice(head.as_bytes());
    bytes.put_slice(jpeg);
    bytes.put_slice(b"\r\n");
    bytes.freeze()
}

///The last frame that went through the encoder. Holding the `Arc` keeps its address unique, so
///pointer equality with the cache slot means "same frame".
struct Encoded {
    frame: Arc<Frame>,
    jpeg: Bytes,
}

///Reads the shared frame cache on behalf of HTTP consumers.
///
///Clones share one encoder slot: each published frame is encoded once, off the async workers, and
///every viewer gets the same bytes.
#[derive(Clone)]
pub struct MjpegSource {
    cache: FrameCache,
    codec: Codec,
    placeholder: Bytes,
    last: Arc<Mutex<Option<Encoded>>>,
}

impl MjpegSource {
    pub fn new(cache: FrameCache, codec: Codec) -> Self {
        let placeholder = codec.placeholder_jpeg();
        Self {
            cache,
            codec,
            placeholder,
            last: Arc::new(Mutex::new(None)),
        }
    }

    ///The current frame as JPEG, or the placeholder if there is no frame or it fails to encode.
    pub async fn current_jpeg(&self) -> Bytes {
        let Some(frame) = self.cache.snapshot() else {
            return self.placeholder.clone();
        };
        let mut last = self.last.lock().await;
        if let Some(encoded) = last.as_ref().filter(|e| Arc::ptr_eq(&e.frame, &frame)) {
            return encoded.jpeg.clone();
        }
        match self.codec.encode_blocking(frame.clone()).await {
            Ok(jpeg) => {
                *last = Some(Encoded {
                    frame,
                    jpeg: jpeg.clone(),
                });
                jpeg
            }
            Err(err) => {
                warn!("frame encode failed, sending placeholder: {err}");
                self.placeholder.clone()
            }
        }
    }

    ///An endless stream of multipart chunks, one per `period`. It ends only when dropped, which is
    ///what happens once the client goes away.
    pub fn stream(self, period: Duration) -> impl Stream<Item = Bytes> + Send + 'static {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        IntervalStream::new(ticker).then(move |_| {
            let source = self.clone();
            async move { chunk(&source.current_jpeg().await) }
        })
    }
}
