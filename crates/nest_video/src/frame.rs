use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::watch;

///Raw 8-bit RGB pixels at the canonical frame size.
pub type Frame = image::RgbImage;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

///Holds the most recent frame, or nothing before the first publish.
///
///Clones share the same slot. Writes replace the slot wholesale and readers get their own handle
///to an immutable frame, so a reader never sees a half-written buffer and a later publish never
///changes a frame someone is still encoding. The lock inside the watch channel is only held for
///the pointer swap or clone.
#[derive(Clone)]
pub struct FrameCache {
    slot: Arc<watch::Sender<Option<Arc<Frame>>>>,
}

impl FrameCache {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    ///Replaces the current frame. Last writer wins.
    pub fn publish(&self, frame: Frame) {
        self.slot.send_replace(Some(Arc::new(frame)));
    }

    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.slot.borrow().clone()
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}
