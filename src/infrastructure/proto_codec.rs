// Protobuf codec - Streaming telemetry messages and their 4-byte big-endian length framing
use crate::application::ingress::DecodeError;
use crate::domain::telemetry::{self, Resource as DomainResource, TelemetryReadings};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Clone, PartialEq, prost::Message)]
pub struct EmptyRequest {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Position {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Resource {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(message, optional, tag = "2")]
    pub location: Option<Position>,
}

/// `google.protobuf.BytesValue`
#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesValue {
    #[prost(bytes = "bytes", tag = "1")]
    pub value: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SearchMode {
    PatternPursuit = 0,
    ResourceSeeking = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TelemetryData {
    #[prost(float, tag = "1")]
    pub ultrasound_distance: f32,
    #[prost(float, tag = "2")]
    pub odometer: f32,
    #[prost(message, optional, tag = "3")]
    pub position: Option<Position>,
    #[prost(float, tag = "4")]
    pub heading: f32,
    #[prost(enumeration = "SearchMode", tag = "5")]
    pub search_mode: i32,
    #[prost(message, repeated, tag = "6")]
    pub resources_found: Vec<Resource>,
    #[prost(float, tag = "7")]
    pub battery_level: f32,
    #[prost(message, optional, tag = "8")]
    pub camera_image: Option<BytesValue>,
}

impl From<Position> for telemetry::Position {
    fn from(p: Position) -> Self {
        telemetry::Position::new(f64::from(p.x), f64::from(p.y))
    }
}

impl From<SearchMode> for telemetry::SearchMode {
    fn from(mode: SearchMode) -> Self {
        match mode {
            SearchMode::PatternPursuit => telemetry::SearchMode::PatternPursuit,
            SearchMode::ResourceSeeking => telemetry::SearchMode::ResourceSeeking,
        }
    }
}

/// Splits a decoded message into telemetry readings and the optional camera
/// frame it carried.
pub fn into_readings(msg: TelemetryData) -> Result<(TelemetryReadings, Option<Bytes>), DecodeError> {
    let position = msg.position.ok_or(DecodeError::MissingField("position"))?;
    let search_mode = SearchMode::try_from(msg.search_mode)
        .ok()
        .map(telemetry::SearchMode::from);

    let resources_found = msg
        .resources_found
        .into_iter()
        .filter_map(|r| {
            r.location.map(|location| DomainResource {
                kind: r.r#type,
                location: location.into(),
            })
        })
        .collect();

    let readings = TelemetryReadings {
        position: position.into(),
        heading: f64::from(msg.heading),
        battery_level: f64::from(msg.battery_level),
        ultrasound_distance: f64::from(msg.ultrasound_distance),
        odometer: Some(f64::from(msg.odometer)),
        search_mode,
        system_state: None,
        resources_found,
    };
    let frame = msg
        .camera_image
        .map(|image| image.value)
        .filter(|data| !data.is_empty());

    Ok((readings, frame))
}

/// Encodes `msg` as one length-prefixed frame.
pub fn encode_frame<M: prost::Message>(msg: &M) -> Bytes {
    let len = msg.encoded_len();
    let mut frame = BytesMut::with_capacity(4 + len);
    frame.put_u32(len as u32);
    // BytesMut grows on demand, so encoding cannot run out of space.
    msg.encode(&mut frame).ok();
    frame.freeze()
}

/// Reads the next frame. Returns `Ok(None)` when the peer closed the stream
/// cleanly between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> std::io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    if len > max_frame_bytes {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds the {} byte ceiling", len, max_frame_bytes),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn sample() -> TelemetryData {
        TelemetryData {
            ultrasound_distance: 1.25,
            odometer: 42.5,
            position: Some(Position { x: 1.0, y: 2.0 }),
            heading: 90.0,
            search_mode: SearchMode::ResourceSeeking as i32,
            resources_found: vec![
                Resource {
                    r#type: "ice".to_string(),
                    location: Some(Position { x: 3.0, y: 4.0 }),
                },
                Resource {
                    r#type: "nowhere".to_string(),
                    location: None,
                },
            ],
            battery_level: 50.0,
            camera_image: Some(BytesValue {
                value: Bytes::from_static(b"\xff\xd8jpeg"),
            }),
        }
    }

    #[test]
    fn test_into_readings() {
        let (readings, frame) = into_readings(sample()).unwrap();
        assert_eq!(readings.position, telemetry::Position::new(1.0, 2.0));
        assert_eq!(readings.heading, 90.0);
        assert_eq!(readings.battery_level, 50.0);
        assert_eq!(readings.ultrasound_distance, 1.25);
        assert_eq!(readings.odometer, Some(42.5));
        assert_eq!(readings.search_mode, Some(telemetry::SearchMode::ResourceSeeking));
        assert_eq!(readings.resources_found.len(), 1);
        assert_eq!(readings.resources_found[0].kind, "ice");
        assert_eq!(frame, Some(Bytes::from_static(b"\xff\xd8jpeg")));
    }

    #[test]
    fn test_missing_position_is_rejected() {
        let mut msg = sample();
        msg.position = None;
        assert!(matches!(into_readings(msg), Err(DecodeError::MissingField("position"))));
    }

    #[test]
    fn test_unknown_search_mode_is_dropped() {
        let mut msg = sample();
        msg.search_mode = 7;
        msg.camera_image = None;
        let (readings, frame) = into_readings(msg).unwrap();
        assert_eq!(readings.search_mode, None);
        assert!(frame.is_none());
    }

    #[test]
    fn test_field_numbers_match_service_definition() {
        // ultrasound_distance = 1.25 as field 1 (fixed32), then position as field 3.
        let msg = TelemetryData {
            ultrasound_distance: 1.25,
            position: Some(Position { x: 0.0, y: 0.0 }),
            ..TelemetryData::default()
        };
        let bytes = msg.encode_to_vec();
        assert_eq!(bytes[0], 0x0d);
        assert_eq!(&bytes[1..5], &1.25f32.to_le_bytes());
        assert_eq!(bytes[5], 0x1a);
    }

    #[tokio::test]
    async fn test_frames_are_read_in_sequence() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_frame(&sample()));
        wire.extend_from_slice(&encode_frame(&EmptyRequest {}));
        let mut reader = wire.as_slice();

        let first = read_frame(&mut reader, 1024).await.unwrap().unwrap();
        assert_eq!(TelemetryData::decode(first).unwrap(), sample());
        let second = read_frame(&mut reader, 1024).await.unwrap().unwrap();
        assert!(second.is_empty());
        assert!(read_frame(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let wire = encode_frame(&sample());
        let mut reader = &wire[..];
        let err = read_frame(&mut reader, 4).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        let wire = encode_frame(&sample());
        let mut reader = &wire[..wire.len() - 2];
        assert!(read_frame(&mut reader, 1024).await.is_err());
    }
}
