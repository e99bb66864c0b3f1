// Domain layer - Telemetry records, dashboard projections and camera frames
pub mod dashboard;
pub mod telemetry;
pub mod video;
