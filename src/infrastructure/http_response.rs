// HTTP response utilities for JSON+Brotli encoding
use crate::domain::video::{JPEG_CONTENT_TYPE, VideoFrame};
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Response, StatusCode, header},
};
use serde::Serialize;
use tokio::io::AsyncReadExt;

/// Whether the client listed `br` in `Accept-Encoding`.
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').any(|enc| enc.trim().starts_with("br")))
        .unwrap_or(false)
}

pub async fn brotli_compress(data: Vec<u8>) -> std::io::Result<Vec<u8>> {
    let cursor = std::io::Cursor::new(data);
    let mut encoder = BrotliEncoder::new(cursor);
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}

/// Serialize `data` as JSON, Brotli-compressed when `compress` is set.
pub async fn json_response<T: Serialize>(data: &T, compress: bool) -> Result<Response<Body>, StatusCode> {
    let json_bytes = serde_json::to_vec(data).map_err(|e| {
        tracing::error!("JSON serialization error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let (body_bytes, content_encoding) = if compress {
        let original_len = json_bytes.len();
        let compressed = brotli_compress(json_bytes).await.map_err(|e| {
            tracing::error!("Brotli compression error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tracing::trace!("compressed response {} -> {} bytes", original_len, compressed.len());
        (compressed, Some("br"))
    } else {
        (json_bytes, None)
    };

    let mut response_builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));

    if let Some(encoding) = content_encoding {
        response_builder = response_builder.header(header::CONTENT_ENCODING, encoding);
    }

    response_builder.body(Body::from(body_bytes)).map_err(|e| {
        tracing::error!("Response build error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// The latest camera frame, or `204 No Content` when there is none yet.
pub fn frame_response(frame: Option<VideoFrame>) -> Result<Response<Body>, StatusCode> {
    let builder = Response::builder().header(header::CACHE_CONTROL, "no-store");
    let response = match frame {
        Some(frame) => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, JPEG_CONTENT_TYPE)
            .header(header::CONTENT_LENGTH, HeaderValue::from(frame.data.len()))
            .header(
                header::LAST_MODIFIED,
                frame.captured_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            )
            .body(Body::from(frame.data)),
        None => builder.status(StatusCode::NO_CONTENT).body(Body::empty()),
    };

    response.map_err(|e| {
        tracing::error!("Response build error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;

    #[test]
    fn test_accepts_brotli() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_brotli(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        assert!(!accepts_brotli(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br;q=0.9"));
        assert!(accepts_brotli(&headers));
    }

    #[tokio::test]
    async fn test_json_response_headers() {
        let plain = json_response(&serde_json::json!({"ok": true}), false).await.unwrap();
        assert_eq!(plain.headers()[header::CONTENT_TYPE], "application/json");
        assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());

        let compressed = json_response(&serde_json::json!({"ok": true}), true).await.unwrap();
        assert_eq!(compressed.headers()[header::CONTENT_ENCODING], "br");
    }

    #[test]
    fn test_frame_response() {
        assert_eq!(frame_response(None).unwrap().status(), StatusCode::NO_CONTENT);

        let frame = VideoFrame {
            data: Bytes::from_static(b"jpeg"),
            captured_at: Utc::now(),
            sequence: 0,
        };
        let response = frame_response(Some(frame)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JPEG_CONTENT_TYPE);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
        assert!(response.headers()[header::LAST_MODIFIED].to_str().unwrap().ends_with("GMT"));
    }
}
