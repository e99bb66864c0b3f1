// Ingest boundary - Decoded telemetry in, published records and counters out
use crate::application::telemetry_store::TelemetryStore;
use crate::domain::telemetry::{RecordError, TelemetryReadings, TelemetryRecord};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Reasons an inbound message is discarded instead of published.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed protobuf payload: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid telemetry: {0}")]
    Invalid(#[from] RecordError),

    #[error("payload exceeds the {limit} byte ceiling ({len} bytes read)")]
    Oversized { len: usize, limit: usize },
}

/// Counters maintained by the ingress listeners.
#[derive(Debug, Default)]
pub struct IngressStats {
    received: AtomicU64,
    published: AtomicU64,
    decode_failures: AtomicU64,
    receive_errors: AtomicU64,
    forwarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngressCounters {
    pub received: u64,
    pub published: u64,
    pub decode_failures: u64,
    pub receive_errors: u64,
    pub forwarded: u64,
}

impl IngressStats {
    pub fn counters(&self) -> IngressCounters {
        IngressCounters {
            received: self.received.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
        }
    }

    pub fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Turns decode results into store publishes. Failures are counted and
/// logged here and go no further.
#[derive(Clone)]
pub struct TelemetryIngest {
    store: Arc<TelemetryStore>,
    stats: Arc<IngressStats>,
}

impl TelemetryIngest {
    pub fn new(store: Arc<TelemetryStore>, stats: Arc<IngressStats>) -> Self {
        Self { store, stats }
    }

    pub fn stats(&self) -> &IngressStats {
        &self.stats
    }

    /// Publishes `decoded` if it is a valid record. Returns whether a record
    /// was published.
    pub fn accept(&self, decoded: Result<TelemetryReadings, DecodeError>, source: &str) -> bool {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let record = decoded
            .and_then(|readings| TelemetryRecord::received_now(readings).map_err(DecodeError::from));

        match record {
            Ok(record) => {
                tracing::debug!(
                    source,
                    x = record.position.x,
                    y = record.position.y,
                    battery = record.battery_level,
                    "publishing telemetry"
                );
                if record.battery_clamped {
                    tracing::warn!(source, "battery level out of range, clamped to {}", record.battery_level);
                }
                self.store.publish(record);
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                let failures = self.stats.decode_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(source, failures, "discarding telemetry: {}", e);
                false
            }
        }
    }
}
