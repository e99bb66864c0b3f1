// MJPEG multipart streaming of the latest camera frame
use crate::application::frame_cache::FrameCache;
use crate::domain::video::{JPEG_CONTENT_TYPE, VideoFrame};
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;

const BOUNDARY: &str = "frame";

/// Encode one multipart section holding `frame`.
pub fn encode_part(frame: &VideoFrame) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        JPEG_CONTENT_TYPE,
        frame.data.len()
    );
    let mut part = BytesMut::with_capacity(head.len() + frame.data.len() + 2);
    part.put_slice(head.as_bytes());
    part.put_slice(&frame.data);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// `multipart/x-mixed-replace` stream that polls the cache every `interval`
/// and emits each new frame once. Runs until the client disconnects or
/// shutdown is signalled.
pub fn mjpeg_response(
    frames: Arc<FrameCache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<Response<Body>, StatusCode> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_sequence = None;
    let parts = IntervalStream::new(ticker).filter_map(move |_| {
        let next = frames
            .latest()
            .filter(|frame| last_sequence != Some(frame.sequence))
            .map(|frame| {
                last_sequence = Some(frame.sequence);
                Ok::<Bytes, Infallible>(encode_part(&frame))
            });
        futures::future::ready(next)
    });
    let parts = parts.take_until(async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(parts))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn next_data(body: &mut axum::body::BodyDataStream) -> Option<Bytes> {
        body.next().await.and_then(Result::ok)
    }

    #[test]
    fn test_part_layout() {
        let frame = VideoFrame {
            data: Bytes::from_static(b"JPEG"),
            captured_at: Utc::now(),
            sequence: 3,
        };
        let part = encode_part(&frame);
        let expected = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\nJPEG\r\n";
        assert_eq!(&part[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_stream_emits_each_frame_once() {
        let frames = Arc::new(FrameCache::new());
        frames.store(Bytes::from_static(b"one"));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let response = mjpeg_response(frames.clone(), Duration::from_millis(5), shutdown_rx).unwrap();
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("multipart/x-mixed-replace")
        );

        let mut body = response.into_body().into_data_stream();
        let first = next_data(&mut body).await.unwrap();
        assert!(first.ends_with(b"one\r\n"));

        frames.store(Bytes::from_static(b"two"));
        let second = next_data(&mut body).await.unwrap();
        assert!(second.ends_with(b"two\r\n"));

        shutdown_tx.send(true).unwrap();
        assert!(next_data(&mut body).await.is_none());
    }
}
