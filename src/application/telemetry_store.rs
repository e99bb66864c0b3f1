// Shared telemetry store - Latest record plus bounded trailing history
use crate::domain::telemetry::{Position, SeriesField, TelemetryRecord, TimeSeriesPoint};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_PATH_CAPACITY: usize = 1000;
pub const DEFAULT_SERIES_CAPACITY: usize = 100;

/// The latest published record and how long ago it was received.
#[derive(Debug, Clone)]
pub struct LatestReading {
    pub record: Arc<TelemetryRecord>,
    pub age: Duration,
}

/// Latest record together with the history it was appended to, all taken
/// under one read lock.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub latest: LatestReading,
    pub series: HashMap<SeriesField, Vec<TimeSeriesPoint>>,
    pub path: Vec<Position>,
}

impl StoreSnapshot {
    pub fn history(&self, field: SeriesField) -> Vec<TimeSeriesPoint> {
        self.series.get(&field).cloned().unwrap_or_default()
    }
}

#[derive(Default)]
struct StoreState {
    latest: Option<Arc<TelemetryRecord>>,
    series: HashMap<SeriesField, VecDeque<TimeSeriesPoint>>,
    path: VecDeque<Position>,
    published: u64,
}

/// Holds what we know about the rover. Deciding what to show is left to the
/// presenter; the store only reports ages.
///
/// The write lock is held only while swapping the latest record and pushing
/// onto the ring buffers, never across I/O or formatting.
pub struct TelemetryStore {
    state: RwLock<StoreState>,
    path_capacity: usize,
    series_capacity: usize,
}

impl TelemetryStore {
    pub fn new(path_capacity: usize, series_capacity: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path_capacity: path_capacity.max(1),
            series_capacity: series_capacity.max(1),
        }
    }

    pub fn publish(&self, record: TelemetryRecord) {
        let record = Arc::new(record);
        let time_ms = record.received_wall.timestamp_millis();
        let samples: Vec<(SeriesField, TimeSeriesPoint)> = SeriesField::ALL
            .into_iter()
            .filter_map(|field| {
                field
                    .value_of(&record)
                    .map(|value| (field, TimeSeriesPoint::new(time_ms, value)))
            })
            .collect();

        let mut state = self.state.write();
        push_bounded(&mut state.path, record.position, self.path_capacity);
        for (field, point) in samples {
            let series = state
                .series
                .entry(field)
                .or_insert_with(|| VecDeque::with_capacity(self.series_capacity));
            push_bounded(series, point, self.series_capacity);
        }
        state.latest = Some(record);
        state.published += 1;
    }

    pub fn read_latest(&self) -> Option<LatestReading> {
        self.read_latest_at(Instant::now())
    }

    /// Like [`read_latest`](Self::read_latest) with the age measured at `now`.
    pub fn read_latest_at(&self, now: Instant) -> Option<LatestReading> {
        let record = self.state.read().latest.clone()?;
        let age = now.saturating_duration_since(record.received_at);
        Some(LatestReading { record, age })
    }

    /// Latest record, series and path as of a single publish. `None` until
    /// the first publish.
    pub fn snapshot_at(&self, now: Instant) -> Option<StoreSnapshot> {
        let state = self.state.read();
        let record = state.latest.clone()?;
        let age = now.saturating_duration_since(record.received_at);
        Some(StoreSnapshot {
            latest: LatestReading { record, age },
            series: state
                .series
                .iter()
                .map(|(field, points)| (*field, points.iter().copied().collect()))
                .collect(),
            path: state.path.iter().copied().collect(),
        })
    }

    /// Bounded history of one scalar field, oldest first.
    pub fn read_history(&self, field: SeriesField) -> Vec<TimeSeriesPoint> {
        self.state
            .read()
            .series
            .get(&field)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn read_path_history(&self) -> Vec<Position> {
        self.state.read().path.iter().copied().collect()
    }

    pub fn publish_count(&self) -> u64 {
        self.state.read().published
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CAPACITY, DEFAULT_SERIES_CAPACITY)
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, value: T, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(value);
}
