// Presenter - Per-tick projection of the store into dashboard widgets
use crate::application::frame_cache::FrameCache;
use crate::application::telemetry_store::{LatestReading, StoreSnapshot, TelemetryStore};
use crate::domain::dashboard::{
    ChartData, ChartKind, ConnectionStatus, DashboardSnapshot, FieldValue, PathTrace, SeriesData,
    TileData, Viewport,
};
use crate::domain::telemetry::{Position, SeriesField, TelemetryRecord, TimeSeriesPoint};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONNECTED_TITLE: &str = "Rover Telemetry Dashboard";
const DISCONNECTED_TITLE: &str = "No telemetry data available";

/// How the path trace picks its visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathFraming {
    /// Fixed window around the world origin.
    Origin,
    /// Window that follows the rover.
    Rover,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenterConfig {
    pub staleness: Duration,
    pub path_framing: PathFraming,
    pub rover_half_width: f64,
    pub origin_half_width: f64,
    pub heading_indicator_length: f64,
    pub show_heading_chart: bool,
    pub show_system_charts: bool,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(5),
            path_framing: PathFraming::Rover,
            rover_half_width: 10.0,
            origin_half_width: 20.0,
            heading_indicator_length: 5.0,
            show_heading_chart: true,
            show_system_charts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

struct SeriesSpec {
    field: SeriesField,
    name: &'static str,
    color: &'static str,
}

struct ChartSpec {
    id: &'static str,
    title: &'static str,
    unit: &'static str,
    kind: ChartKind,
    y_min: Option<f64>,
    y_max: Option<f64>,
    series: &'static [SeriesSpec],
}

const BATTERY_CHART: ChartSpec = ChartSpec {
    id: "battery",
    title: "Battery Over Time",
    unit: "%",
    kind: ChartKind::Line,
    y_min: Some(0.0),
    y_max: Some(100.0),
    series: &[SeriesSpec { field: SeriesField::Battery, name: "Battery", color: "#2ca02c" }],
};

const ULTRASOUND_CHART: ChartSpec = ChartSpec {
    id: "ultrasound",
    title: "Ultrasound Over Time",
    unit: "m",
    kind: ChartKind::Line,
    y_min: Some(0.0),
    y_max: None,
    series: &[SeriesSpec { field: SeriesField::Ultrasound, name: "Distance", color: "#1f77b4" }],
};

const HEADING_CHART: ChartSpec = ChartSpec {
    id: "heading",
    title: "Heading Over Time",
    unit: "°",
    kind: ChartKind::Line,
    y_min: Some(0.0),
    y_max: Some(360.0),
    series: &[SeriesSpec { field: SeriesField::Heading, name: "Heading", color: "#d62728" }],
};

const SYSTEM_CHART: ChartSpec = ChartSpec {
    id: "system",
    title: "System Load",
    unit: "%",
    kind: ChartKind::MultiLine,
    y_min: Some(0.0),
    y_max: Some(100.0),
    series: &[
        SeriesSpec { field: SeriesField::CpuUsage, name: "CPU", color: "#ff7f0e" },
        SeriesSpec { field: SeriesField::DiskUsage, name: "Disk", color: "#9467bd" },
    ],
};

const TEMPERATURE_CHART: ChartSpec = ChartSpec {
    id: "temperature",
    title: "Temperature",
    unit: "°C",
    kind: ChartKind::Line,
    y_min: None,
    y_max: None,
    series: &[SeriesSpec { field: SeriesField::Temperature, name: "Temperature", color: "#8c564b" }],
};

/// Builds dashboard snapshots from the store. Holds no state of its own
/// beyond its configuration, so ticking twice without a publish in between
/// yields the same snapshot.
pub struct Presenter {
    store: Arc<TelemetryStore>,
    frames: Arc<FrameCache>,
    config: PresenterConfig,
}

impl Presenter {
    pub fn new(store: Arc<TelemetryStore>, frames: Arc<FrameCache>, config: PresenterConfig) -> Self {
        Self {
            store,
            frames,
            config,
        }
    }

    pub fn tick(&self) -> DashboardSnapshot {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, now: Instant) -> DashboardSnapshot {
        match self.store.snapshot_at(now) {
            Some(snapshot) if self.freshness(&snapshot.latest) == Freshness::Fresh => {
                self.connected(&snapshot)
            }
            _ => self.disconnected(),
        }
    }

    /// A reading is stale once its age exceeds the staleness threshold.
    pub fn freshness(&self, latest: &LatestReading) -> Freshness {
        if latest.age > self.config.staleness {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    fn connected(&self, snapshot: &StoreSnapshot) -> DashboardSnapshot {
        let record = &snapshot.latest.record;
        DashboardSnapshot {
            status: ConnectionStatus::Connected,
            title: CONNECTED_TITLE.to_string(),
            last_update: Some(record.received_wall),
            tiles: record_tiles(record),
            charts: self.charts(|field| snapshot.history(field)),
            path: PathTrace {
                points: snapshot.path.clone(),
                heading: heading_indicator(
                    record.position,
                    record.heading,
                    self.config.heading_indicator_length,
                ),
                viewport: self.viewport(Some(record.position)),
            },
            resources: record.resources_found.clone(),
            video_available: self.frames.has_frame(),
        }
    }

    fn disconnected(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            status: ConnectionStatus::Disconnected,
            title: DISCONNECTED_TITLE.to_string(),
            last_update: None,
            tiles: unavailable_tiles(),
            charts: self.charts(|_| Vec::new()),
            path: PathTrace {
                points: Vec::new(),
                heading: None,
                viewport: self.viewport(None),
            },
            resources: Vec::new(),
            video_available: self.frames.has_frame(),
        }
    }

    fn charts(&self, history: impl Fn(SeriesField) -> Vec<TimeSeriesPoint>) -> Vec<ChartData> {
        let mut specs = vec![&BATTERY_CHART, &ULTRASOUND_CHART];
        if self.config.show_heading_chart {
            specs.push(&HEADING_CHART);
        }
        if self.config.show_system_charts {
            specs.push(&SYSTEM_CHART);
            specs.push(&TEMPERATURE_CHART);
        }

        specs
            .into_iter()
            .map(|spec| ChartData {
                id: spec.id.to_string(),
                title: spec.title.to_string(),
                unit: Some(spec.unit.to_string()),
                kind: spec.kind,
                y_min: spec.y_min,
                y_max: spec.y_max,
                series: spec
                    .series
                    .iter()
                    .map(|s| {
                        SeriesData::new(
                            s.field.as_str().to_string(),
                            s.name.to_string(),
                            Some(s.color.to_string()),
                            history(s.field),
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    fn viewport(&self, position: Option<Position>) -> Viewport {
        frame_viewport(
            self.config.path_framing,
            position,
            self.config.rover_half_width,
            self.config.origin_half_width,
        )
    }
}

/// Visible window of the path trace. Rover framing without a known position
/// falls back to centering on the origin.
pub fn frame_viewport(
    framing: PathFraming,
    position: Option<Position>,
    rover_half_width: f64,
    origin_half_width: f64,
) -> Viewport {
    let origin = Position::new(0.0, 0.0);
    match (framing, position) {
        (PathFraming::Rover, Some(center)) => Viewport::centered(center, rover_half_width),
        (PathFraming::Rover, None) => Viewport::centered(origin, rover_half_width),
        (PathFraming::Origin, _) => Viewport::centered(origin, origin_half_width),
    }
}

/// Heading 0° points along +y and increases clockwise.
pub fn heading_indicator(start: Position, heading_deg: f64, length: f64) -> Option<[Position; 2]> {
    let rad = heading_deg.to_radians();
    let end = Position::new(start.x + length * rad.sin(), start.y + length * rad.cos());
    end.is_finite().then_some([start, end])
}

const TILE_IDS: [(&str, &str); 11] = [
    ("position", "Position"),
    ("heading", "Heading"),
    ("battery", "Battery"),
    ("ultrasound", "Ultrasound"),
    ("odometer", "Odometer"),
    ("search_mode", "Search Mode"),
    ("cpu", "CPU"),
    ("memory", "Memory"),
    ("disk", "Disk"),
    ("temperature", "Temperature"),
    ("uptime", "Uptime"),
];

fn unavailable_tiles() -> Vec<TileData> {
    TILE_IDS
        .iter()
        .map(|(id, title)| TileData::new(id, title, FieldValue::Unavailable))
        .collect()
}

fn record_tiles(record: &TelemetryRecord) -> Vec<TileData> {
    let system = record.system_state.as_ref();
    TILE_IDS
        .iter()
        .map(|&(id, title)| {
            let text = match id {
                "position" => format_position(record.position),
                "heading" => finite(record.heading).map(|h| format!("{:.2}°", h)),
                "battery" => finite(record.battery_level).map(|b| format!("{:.2}%", b)),
                "ultrasound" => finite(record.ultrasound_distance).map(|d| format!("{:.2} m", d)),
                "odometer" => record.odometer.and_then(finite).map(|d| format!("{:.2} m", d)),
                "search_mode" => record.search_mode.map(|m| m.label().to_string()),
                "cpu" => system.and_then(|s| s.cpu_usage).and_then(finite).map(|v| format!("{:.1}%", v)),
                "memory" => system.and_then(|s| format_memory(s.memory_available, s.memory_total)),
                "disk" => system.and_then(|s| s.disk_usage).and_then(finite).map(|v| format!("{:.1}%", v)),
                "temperature" => system
                    .and_then(|s| s.temperature)
                    .and_then(finite)
                    .map(|t| format!("{:.1} °C", t)),
                "uptime" => system.and_then(|s| s.uptime_secs).and_then(format_uptime),
                _ => None,
            };
            TileData::new(id, title, FieldValue::from_option(text))
                .with_warning(id == "battery" && record.battery_clamped)
        })
        .collect()
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn format_position(position: Position) -> Option<String> {
    position
        .is_finite()
        .then(|| format!("x: {:.2}, y: {:.2}", position.x, position.y))
}

fn format_memory(available: Option<f64>, total: Option<f64>) -> Option<String> {
    match (available.and_then(finite), total.and_then(finite)) {
        (Some(available), Some(total)) => Some(format!("{:.0}/{:.0} MB", available, total)),
        (Some(available), None) => Some(format!("{:.0} MB free", available)),
        _ => None,
    }
}

fn format_uptime(secs: f64) -> Option<String> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let total = secs as u64;
    Some(format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60))
}
