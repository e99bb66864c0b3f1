// Latest camera frame holder
use crate::domain::video::VideoFrame;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;

/// Keeps only the most recent frame. Having no frame is a normal state.
#[derive(Default)]
pub struct FrameCache {
    latest: RwLock<Option<VideoFrame>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, data: Bytes) {
        let mut latest = self.latest.write();
        let sequence = latest.as_ref().map_or(0, |f| f.sequence + 1);
        *latest = Some(VideoFrame {
            data,
            captured_at: Utc::now(),
            sequence,
        });
    }

    pub fn latest(&self) -> Option<VideoFrame> {
        self.latest.read().clone()
    }

    pub fn has_frame(&self) -> bool {
        self.latest.read().is_some()
    }
}
