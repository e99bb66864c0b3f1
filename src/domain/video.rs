// Camera frame domain model
use bytes::Bytes;
use chrono::{DateTime, Utc};

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Encoded image, shared without copying between HTTP responses.
    pub data: Bytes,
    pub captured_at: DateTime<Utc>,
    /// Increases by one for every stored frame.
    pub sequence: u64,
}
