// Dashboard domain model
use super::telemetry::{Position, Resource, TimeSeriesPoint};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

pub const UNAVAILABLE_TEXT: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Display text for one field, or the marker for a value we cannot show.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Available(String),
    Unavailable,
}

impl FieldValue {
    pub fn from_option(text: Option<String>) -> Self {
        text.map_or(FieldValue::Unavailable, FieldValue::Available)
    }

    pub fn text(&self) -> &str {
        match self {
            FieldValue::Available(text) => text,
            FieldValue::Unavailable => UNAVAILABLE_TEXT,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, FieldValue::Available(_))
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileData {
    pub id: String,
    pub title: String,
    pub value: FieldValue,
    pub available: bool,
    pub warning: bool,
}

impl TileData {
    pub fn new(id: &str, title: &str, value: FieldValue) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            available: value.is_available(),
            value,
            warning: false,
        }
    }

    pub fn with_warning(mut self, warning: bool) -> Self {
        self.warning = warning;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesData {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub points: Vec<TimeSeriesPoint>,
}

impl SeriesData {
    pub fn new(id: String, name: String, color: Option<String>, points: Vec<TimeSeriesPoint>) -> Self {
        Self {
            id,
            name,
            color,
            points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Line,
    MultiLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub id: String,
    pub title: String,
    pub unit: Option<String>,
    pub kind: ChartKind,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub series: Vec<SeriesData>,
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
}

impl Viewport {
    pub fn centered(center: Position, half_width: f64) -> Self {
        Self {
            x_range: [center.x - half_width, center.x + half_width],
            y_range: [center.y - half_width, center.y + half_width],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathTrace {
    pub points: Vec<Position>,
    /// Segment from the current position along the heading.
    pub heading: Option<[Position; 2]>,
    pub viewport: Viewport,
}

/// Display-ready projection of the store, produced once per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub status: ConnectionStatus,
    pub title: String,
    pub last_update: Option<DateTime<Utc>>,
    pub tiles: Vec<TileData>,
    pub charts: Vec<ChartData>,
    pub path: PathTrace,
    pub resources: Vec<Resource>,
    pub video_available: bool,
}

impl DashboardSnapshot {
    pub fn tile(&self, id: &str) -> Option<&TileData> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn chart(&self, id: &str) -> Option<&ChartData> {
        self.charts.iter().find(|c| c.id == id)
    }
}
