// Application state for HTTP handlers
use crate::application::frame_cache::FrameCache;
use crate::application::ingress::IngressStats;
use crate::application::presenter::Presenter;
use crate::application::streaming_service::StreamingDashboardService;
use crate::application::telemetry_store::TelemetryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub presenter: Arc<Presenter>,
    pub streaming_service: StreamingDashboardService,
    pub store: Arc<TelemetryStore>,
    pub stats: Arc<IngressStats>,
    pub frames: Arc<FrameCache>,
    pub video_interval: Duration,
    pub shutdown: watch::Receiver<bool>,
}
