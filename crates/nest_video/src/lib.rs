//!The live video path: a single-slot frame cache, the codec that normalizes frames on the way in and
//!encodes them on the way out, the push-style ingestion loop, and the MJPEG chunk generator.
//!
//!Nothing here touches storage. Producers call [`FrameCache::publish`], consumers call
//![`FrameCache::snapshot`], and only the most recent frame is ever kept.

pub mod codec;
pub mod frame;
pub mod ingest;
pub mod mjpeg;

use std::time::Duration;

use serde::Deserialize;

pub use codec::{Codec, CodecError};
pub use frame::{Frame, FrameCache, FrameSize};
pub use ingest::{push_frame, IngestError, UdpConfig, UdpReceiver};
pub use mjpeg::MjpegSource;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VideoConfigError {
    #[error("frame size {width}x{height} is out of range, each side must be 1..=65535")]
    FrameSize { width: u32, height: u32 },
    #[error("jpeg quality {0} is out of range 1..=100")]
    Quality(u8),
    #[error("stream interval must be at least 1 ms")]
    Interval,
}

///Which adapter feeds the frame cache. Exactly one is active per deployment.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    Udp,
    #[default]
    Upload,
    Socket,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub interval_ms: u64,
    pub ingest: IngestMode,
    pub udp: UdpConfig,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            width: 640,
            height: 360,
            quality: 95,
            interval_ms: 30,
            ingest: IngestMode::default(),
            udp: UdpConfig::default(),
        }
    }
}

impl VideoConfig {
    ///Rejects settings the codec cannot honour. Nothing is clamped.
    pub fn validate(&self) -> Result<(), VideoConfigError> {
        let side = 1..=u32::from(u16::MAX);
        if !side.contains(&self.width) || !side.contains(&self.height) {
            return Err(VideoConfigError::FrameSize {
                width: self.width,
                height: self.height,
            });
        }
        if !(1..=100).contains(&self.quality) {
            return Err(VideoConfigError::Quality(self.quality));
        }
        if self.interval_ms == 0 {
            return Err(VideoConfigError::Interval);
        }
        Ok(())
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn codec(&self) -> Codec {
        Codec::new(self.frame_size(), self.quality)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}
