// Application layer - Store, ingest boundary, presenter and streaming use cases
pub mod frame_cache;
pub mod ingress;
pub mod presenter;
pub mod streaming_service;
pub mod telemetry_store;
