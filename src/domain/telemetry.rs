// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    PatternPursuit,
    ResourceSeeking,
}

impl SearchMode {
    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::PatternPursuit => "Pattern pursuit",
            SearchMode::ResourceSeeking => "Resource seeking",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Position,
}

/// Host health reported by the rover. Every field is optional because the
/// rover reports `"N/A"` for sensors it cannot read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemState {
    pub cpu_usage: Option<f64>,
    pub memory_available: Option<f64>,
    pub memory_total: Option<f64>,
    pub disk_usage: Option<f64>,
    pub temperature: Option<f64>,
    pub uptime_secs: Option<f64>,
}

impl SystemState {
    fn sanitized(self) -> Self {
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        Self {
            cpu_usage: finite(self.cpu_usage),
            memory_available: finite(self.memory_available),
            memory_total: finite(self.memory_total),
            disk_usage: finite(self.disk_usage),
            temperature: finite(self.temperature),
            uptime_secs: finite(self.uptime_secs),
        }
    }
}

/// Decoded wire payload, before arrival metadata and validation are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReadings {
    pub position: Position,
    pub heading: f64,
    pub battery_level: f64,
    pub ultrasound_distance: f64,
    pub odometer: Option<f64>,
    pub search_mode: Option<SearchMode>,
    pub system_state: Option<SystemState>,
    pub resources_found: Vec<Resource>,
}

impl TelemetryReadings {
    pub fn new(position: Position, heading: f64, battery_level: f64, ultrasound_distance: f64) -> Self {
        Self {
            position,
            heading,
            battery_level,
            ultrasound_distance,
            odometer: None,
            search_mode: None,
            system_state: None,
            resources_found: Vec::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("field {0} is not a finite number")]
    NonFinite(&'static str),

    #[error("ultrasound distance {0} is negative")]
    NegativeDistance(f64),
}

/// One validated snapshot of rover state plus its receipt time.
///
/// Records are shared behind `Arc` once published and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub position: Position,
    pub heading: f64,
    pub battery_level: f64,
    /// Set when the reported battery level was outside [0, 100] and clamped.
    pub battery_clamped: bool,
    pub ultrasound_distance: f64,
    pub odometer: Option<f64>,
    pub search_mode: Option<SearchMode>,
    pub system_state: Option<SystemState>,
    pub resources_found: Vec<Resource>,
    pub received_at: Instant,
    pub received_wall: DateTime<Utc>,
}

impl TelemetryRecord {
    pub fn new(
        readings: TelemetryReadings,
        received_at: Instant,
        received_wall: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        if !readings.position.is_finite() {
            return Err(RecordError::NonFinite("position"));
        }
        if !readings.heading.is_finite() {
            return Err(RecordError::NonFinite("heading"));
        }
        if !readings.battery_level.is_finite() {
            return Err(RecordError::NonFinite("battery_level"));
        }
        if !readings.ultrasound_distance.is_finite() {
            return Err(RecordError::NonFinite("ultrasound_distance"));
        }
        if readings.ultrasound_distance < 0.0 {
            return Err(RecordError::NegativeDistance(readings.ultrasound_distance));
        }

        let battery_level = readings.battery_level.clamp(0.0, 100.0);
        let resources_found = readings
            .resources_found
            .into_iter()
            .filter(|r| r.location.is_finite())
            .collect();

        Ok(Self {
            position: readings.position,
            heading: normalize_heading(readings.heading),
            battery_clamped: battery_level != readings.battery_level,
            battery_level,
            ultrasound_distance: readings.ultrasound_distance,
            odometer: readings.odometer.filter(|v| v.is_finite()),
            search_mode: readings.search_mode,
            system_state: readings.system_state.map(SystemState::sanitized),
            resources_found,
            received_at,
            received_wall,
        })
    }

    /// Stamps the readings with the current monotonic and wall-clock time.
    pub fn received_now(readings: TelemetryReadings) -> Result<Self, RecordError> {
        Self::new(readings, Instant::now(), Utc::now())
    }
}

/// Folds any finite heading into [0, 360).
fn normalize_heading(heading: f64) -> f64 {
    let folded = heading.rem_euclid(360.0);
    // rem_euclid rounds up to exactly 360 for tiny negative inputs
    if folded >= 360.0 { 0.0 } else { folded }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

/// Scalar fields that keep a bounded trailing history for charting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesField {
    Battery,
    Ultrasound,
    Heading,
    PositionX,
    PositionY,
    Odometer,
    CpuUsage,
    DiskUsage,
    Temperature,
}

impl SeriesField {
    pub const ALL: [SeriesField; 9] = [
        SeriesField::Battery,
        SeriesField::Ultrasound,
        SeriesField::Heading,
        SeriesField::PositionX,
        SeriesField::PositionY,
        SeriesField::Odometer,
        SeriesField::CpuUsage,
        SeriesField::DiskUsage,
        SeriesField::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesField::Battery => "battery",
            SeriesField::Ultrasound => "ultrasound",
            SeriesField::Heading => "heading",
            SeriesField::PositionX => "x",
            SeriesField::PositionY => "y",
            SeriesField::Odometer => "odometer",
            SeriesField::CpuUsage => "cpu",
            SeriesField::DiskUsage => "disk",
            SeriesField::Temperature => "temperature",
        }
    }

    /// Value of this field in `record`, if the record carries it.
    pub fn value_of(&self, record: &TelemetryRecord) -> Option<f64> {
        let system = record.system_state.as_ref();
        match self {
            SeriesField::Battery => Some(record.battery_level),
            SeriesField::Ultrasound => Some(record.ultrasound_distance),
            SeriesField::Heading => Some(record.heading),
            SeriesField::PositionX => Some(record.position.x),
            SeriesField::PositionY => Some(record.position.y),
            SeriesField::Odometer => record.odometer,
            SeriesField::CpuUsage => system.and_then(|s| s.cpu_usage),
            SeriesField::DiskUsage => system.and_then(|s| s.disk_usage),
            SeriesField::Temperature => system.and_then(|s| s.temperature),
        }
    }
}

impl Serialize for SeriesField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for SeriesField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown series field: {0}")]
pub struct UnknownSeriesField(pub String);

impl FromStr for SeriesField {
    type Err = UnknownSeriesField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeriesField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownSeriesField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings() -> TelemetryReadings {
        TelemetryReadings::new(Position::new(1.0, 2.0), 90.0, 50.0, 1.2)
    }

    #[test]
    fn test_record_keeps_valid_readings() {
        let record = TelemetryRecord::received_now(readings()).unwrap();
        assert_eq!(record.position, Position::new(1.0, 2.0));
        assert_eq!(record.heading, 90.0);
        assert_eq!(record.battery_level, 50.0);
        assert!(!record.battery_clamped);
        assert_eq!(record.ultrasound_distance, 1.2);
    }

    #[test]
    fn test_battery_out_of_range_is_clamped_and_flagged() {
        let mut high = readings();
        high.battery_level = 140.0;
        let record = TelemetryRecord::received_now(high).unwrap();
        assert_eq!(record.battery_level, 100.0);
        assert!(record.battery_clamped);

        let mut low = readings();
        low.battery_level = -3.0;
        let record = TelemetryRecord::received_now(low).unwrap();
        assert_eq!(record.battery_level, 0.0);
        assert!(record.battery_clamped);
    }

    #[test]
    fn test_heading_is_normalized() {
        let mut r = readings();
        r.heading = -90.0;
        assert_eq!(TelemetryRecord::received_now(r).unwrap().heading, 270.0);

        let mut r = readings();
        r.heading = 360.0;
        assert_eq!(TelemetryRecord::received_now(r).unwrap().heading, 0.0);

        let mut r = readings();
        r.heading = -1e-20;
        let heading = TelemetryRecord::received_now(r).unwrap().heading;
        assert!((0.0..360.0).contains(&heading));
    }

    #[test]
    fn test_invalid_readings_are_rejected() {
        let mut r = readings();
        r.ultrasound_distance = -0.5;
        assert_eq!(
            TelemetryRecord::received_now(r).unwrap_err(),
            RecordError::NegativeDistance(-0.5)
        );

        let mut r = readings();
        r.position.x = f64::NAN;
        assert_eq!(
            TelemetryRecord::received_now(r).unwrap_err(),
            RecordError::NonFinite("position")
        );

        let mut r = readings();
        r.battery_level = f64::INFINITY;
        assert_eq!(
            TelemetryRecord::received_now(r).unwrap_err(),
            RecordError::NonFinite("battery_level")
        );
    }

    #[test]
    fn test_non_finite_optional_values_become_unknown() {
        let mut r = readings();
        r.odometer = Some(f64::NAN);
        r.system_state = Some(SystemState {
            cpu_usage: Some(12.5),
            temperature: Some(f64::INFINITY),
            ..SystemState::default()
        });
        let record = TelemetryRecord::received_now(r).unwrap();
        assert_eq!(record.odometer, None);
        let system = record.system_state.unwrap();
        assert_eq!(system.cpu_usage, Some(12.5));
        assert_eq!(system.temperature, None);
    }

    #[test]
    fn test_series_field_names() {
        assert_eq!("battery".parse::<SeriesField>(), Ok(SeriesField::Battery));
        assert_eq!("cpu".parse::<SeriesField>(), Ok(SeriesField::CpuUsage));
        assert!("voltage".parse::<SeriesField>().is_err());
        for field in SeriesField::ALL {
            assert_eq!(field.as_str().parse::<SeriesField>(), Ok(field));
        }
    }
}
