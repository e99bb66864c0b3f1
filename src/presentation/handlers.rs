// HTTP request handlers
use crate::application::ingress::IngressCounters;
use crate::application::presenter::Freshness;
use crate::domain::telemetry::{
    Position, Resource, SearchMode, SeriesField, SystemState, TimeSeriesPoint,
};
use chrono::{DateTime, Utc};
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, frame_response, json_response};
use crate::infrastructure::mjpeg::mjpeg_response;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub ingress: IngressCounters,
    pub store_publishes: u64,
    pub video_frame_available: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub field: SeriesField,
    pub points: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub position: Position,
    pub heading: f64,
    pub battery_level: f64,
    pub battery_clamped: bool,
    pub ultrasound_distance: f64,
    pub odometer: Option<f64>,
    pub search_mode: Option<SearchMode>,
    pub system_state: Option<SystemState>,
    pub resources_found: Vec<Resource>,
    pub received_at: DateTime<Utc>,
    pub age_ms: u64,
    pub stale: bool,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// One projection of the current store state
pub async fn get_snapshot(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let snapshot = state.presenter.tick();

    match json_response(&snapshot, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Stream one projection per presenter tick until the client disconnects
pub async fn stream_dashboard(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let rx = state.streaming_service.stream_dashboard();
    stream_from_receiver(rx, compress).await
}

/// Raw latest record with its age, or `204 No Content` before the first publish
pub async fn get_latest(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(latest) = state.store.read_latest() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let stale = state.presenter.freshness(&latest) == Freshness::Stale;
    let record = &latest.record;
    let body = LatestResponse {
        position: record.position,
        heading: record.heading,
        battery_level: record.battery_level,
        battery_clamped: record.battery_clamped,
        ultrasound_distance: record.ultrasound_distance,
        odometer: record.odometer,
        search_mode: record.search_mode,
        system_state: record.system_state.clone(),
        resources_found: record.resources_found.clone(),
        received_at: record.received_wall,
        age_ms: u64::try_from(latest.age.as_millis()).unwrap_or(u64::MAX),
        stale,
    };

    match json_response(&body, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Bounded trail of past positions, oldest first
pub async fn get_path(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let path = state.store.read_path_history();
    match json_response(&path, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Bounded history of one scalar field, oldest first
pub async fn get_history(
    Path(field): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let field: SeriesField = match field.parse() {
        Ok(field) => field,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let history = HistoryResponse {
        field,
        points: state.store.read_history(field),
    };

    match json_response(&history, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Ingress counters
pub async fn get_stats(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = StatsResponse {
        ingress: state.stats.counters(),
        store_publishes: state.store.publish_count(),
        video_frame_available: state.frames.has_frame(),
    };

    match json_response(&stats, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Latest camera frame
pub async fn get_video_frame(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match frame_response(state.frames.latest()) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// MJPEG stream of camera frames
pub async fn stream_video(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match mjpeg_response(state.frames.clone(), state.video_interval, state.shutdown.clone()) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
