// JSON datagram decoding (UDP wire format)
use crate::application::ingress::DecodeError;
use crate::domain::telemetry::{Position, Resource, SearchMode, SystemState, TelemetryReadings};
use serde::Deserialize;
use serde::de::IgnoredAny;

#[derive(Debug, Deserialize)]
struct WirePosition {
    x: f64,
    y: f64,
}

/// The rover reports unreadable sensors as a string such as `"N/A"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireReading {
    Number(f64),
    #[allow(dead_code)]
    Text(String),
}

impl WireReading {
    fn value(reading: Option<WireReading>) -> Option<f64> {
        match reading {
            Some(WireReading::Number(v)) => Some(v),
            _ => None,
        }
    }
}

/// Rovers report the mode as its enum number, its constant name or its
/// display label. Anything else means the mode is unknown.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSearchMode {
    Code(i64),
    Name(String),
    #[allow(dead_code)]
    Other(IgnoredAny),
}

impl WireSearchMode {
    fn mode(&self) -> Option<SearchMode> {
        match self {
            WireSearchMode::Code(0) => Some(SearchMode::PatternPursuit),
            WireSearchMode::Code(1) => Some(SearchMode::ResourceSeeking),
            WireSearchMode::Name(name) => parse_search_mode(name),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSystemState {
    cpu_usage: Option<WireReading>,
    memory_available: Option<WireReading>,
    memory_total: Option<WireReading>,
    disk_usage: Option<WireReading>,
    temperature: Option<WireReading>,
    uptime: Option<WireReading>,
}

#[derive(Debug, Deserialize)]
struct WireResource {
    #[serde(rename = "type")]
    kind: String,
    location: WirePosition,
}

#[derive(Debug, Deserialize)]
struct WireTelemetry {
    position: WirePosition,
    heading: f64,
    battery_level: f64,
    ultrasound_distance: f64,
    #[serde(default)]
    system_state: Option<WireSystemState>,
    #[serde(default)]
    odometer: Option<WireReading>,
    #[serde(default)]
    search_mode: Option<WireSearchMode>,
    #[serde(default)]
    resources_found: Vec<WireResource>,
}

fn parse_search_mode(mode: &str) -> Option<SearchMode> {
    let normalized = mode.trim().to_ascii_uppercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "PATTERN_PURSUIT" => Some(SearchMode::PatternPursuit),
        "RESOURCE_SEEKING" => Some(SearchMode::ResourceSeeking),
        _ => None,
    }
}

impl From<WireTelemetry> for TelemetryReadings {
    fn from(wire: WireTelemetry) -> Self {
        Self {
            position: Position::new(wire.position.x, wire.position.y),
            heading: wire.heading,
            battery_level: wire.battery_level,
            ultrasound_distance: wire.ultrasound_distance,
            odometer: WireReading::value(wire.odometer),
            search_mode: wire.search_mode.as_ref().and_then(WireSearchMode::mode),
            system_state: wire.system_state.map(|s| SystemState {
                cpu_usage: WireReading::value(s.cpu_usage),
                memory_available: WireReading::value(s.memory_available),
                memory_total: WireReading::value(s.memory_total),
                disk_usage: WireReading::value(s.disk_usage),
                temperature: WireReading::value(s.temperature),
                uptime_secs: WireReading::value(s.uptime),
            }),
            resources_found: wire
                .resources_found
                .into_iter()
                .map(|r| Resource {
                    kind: r.kind,
                    location: Position::new(r.location.x, r.location.y),
                })
                .collect(),
        }
    }
}

/// Decodes one UTF-8 JSON datagram. Missing required fields are errors;
/// unknown fields are ignored.
pub fn decode_datagram(payload: &[u8]) -> Result<TelemetryReadings, DecodeError> {
    let wire: WireTelemetry = serde_json::from_slice(payload)?;
    Ok(wire.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_datagram() {
        let payload = br#"{"position":{"x":1,"y":2},"heading":90,"battery_level":50,"ultrasound_distance":1.2}"#;
        let readings = decode_datagram(payload).unwrap();
        assert_eq!(readings.position, Position::new(1.0, 2.0));
        assert_eq!(readings.heading, 90.0);
        assert_eq!(readings.battery_level, 50.0);
        assert_eq!(readings.ultrasound_distance, 1.2);
        assert!(readings.system_state.is_none());
        assert!(readings.resources_found.is_empty());
    }

    #[test]
    fn test_decode_system_state_with_unknown_readings() {
        let payload = br#"{
            "position": {"x": 0.5, "y": -1.5},
            "heading": 270.0,
            "battery_level": 88.0,
            "ultrasound_distance": 0.3,
            "system_state": {
                "cpu_usage": 12.5,
                "memory_available": 1024,
                "memory_total": 4096,
                "disk_usage": 40.0,
                "temperature": "N/A",
                "uptime": 360.0
            },
            "search_mode": "RESOURCE_SEEKING",
            "resources_found": [{"type": "water", "location": {"x": 3.0, "y": 4.0}}],
            "firmware": "1.2.3"
        }"#;
        let readings = decode_datagram(payload).unwrap();
        let system = readings.system_state.unwrap();
        assert_eq!(system.cpu_usage, Some(12.5));
        assert_eq!(system.memory_available, Some(1024.0));
        assert_eq!(system.temperature, None);
        assert_eq!(system.uptime_secs, Some(360.0));
        assert_eq!(readings.search_mode, Some(SearchMode::ResourceSeeking));
        assert_eq!(readings.resources_found.len(), 1);
        assert_eq!(readings.resources_found[0].kind, "water");
    }

    #[test]
    fn test_numeric_search_mode_from_udp_emitter() {
        let payload = br#"{"ultrasound_distance": 5.0, "odometer": 12.3, "position": {"x": 10.5, "y": -3.2}, "heading": 45.0, "search_mode": 0, "resources_found": [{"type": "rock", "location": {"x": 7.2, "y": -1.5}}], "battery_level": 87.5}"#;
        let readings = decode_datagram(payload).unwrap();
        assert_eq!(readings.position, Position::new(10.5, -3.2));
        assert_eq!(readings.odometer, Some(12.3));
        assert_eq!(readings.search_mode, Some(SearchMode::PatternPursuit));
        assert_eq!(readings.resources_found[0].kind, "rock");
    }

    #[test]
    fn test_search_mode_spellings() {
        let mode = |value: &str| {
            let payload = format!(
                r#"{{"position":{{"x":0,"y":0}},"heading":0,"battery_level":50,"ultrasound_distance":1,"search_mode":{}}}"#,
                value
            );
            decode_datagram(payload.as_bytes()).unwrap().search_mode
        };

        assert_eq!(mode("1"), Some(SearchMode::ResourceSeeking));
        assert_eq!(mode(r#""RESOURCE_SEEKING""#), Some(SearchMode::ResourceSeeking));
        assert_eq!(mode(r#""Pattern Pursuit""#), Some(SearchMode::PatternPursuit));
        assert_eq!(mode(r#""resource seeking""#), Some(SearchMode::ResourceSeeking));
        assert_eq!(mode(r#""N/A""#), None);
        assert_eq!(mode("7"), None);
        assert_eq!(mode("2.5"), None);
        assert_eq!(mode(r#"{"mode": 1}"#), None);
        assert_eq!(mode("null"), None);
    }

    #[test]
    fn test_partial_system_state() {
        let payload = br#"{"position":{"x":0,"y":0},"heading":0,"battery_level":10,"ultrasound_distance":0,"system_state":{"cpu_usage":5}}"#;
        let system = decode_datagram(payload).unwrap().system_state.unwrap();
        assert_eq!(system.cpu_usage, Some(5.0));
        assert_eq!(system.disk_usage, None);
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(matches!(decode_datagram(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_datagram(b"{\"position\":"), Err(DecodeError::Json(_))));
        assert!(decode_datagram(&[0xff, 0xfe, 0x00]).is_err());

        let missing_heading = br#"{"position":{"x":1,"y":2},"battery_level":50,"ultrasound_distance":1.2}"#;
        assert!(decode_datagram(missing_heading).is_err());

        let wrong_type = br#"{"position":{"x":"a","y":2},"heading":1,"battery_level":50,"ultrasound_distance":1.2}"#;
        assert!(decode_datagram(wrong_type).is_err());
    }
}
