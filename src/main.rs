// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::frame_cache::FrameCache;
use crate::application::ingress::{IngressStats, TelemetryIngest};
use crate::application::presenter::Presenter;
use crate::application::streaming_service::StreamingDashboardService;
use crate::application::telemetry_store::TelemetryStore;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::rpc_client::{RpcIngress, TcpTelemetryClient};
use crate::infrastructure::udp_listener::UdpListener;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_history, get_latest, get_path, get_snapshot, get_stats, get_video_frame, health_check,
    stream_dashboard, stream_video,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rover_telemetry=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let settings = load_settings().context("failed to load configuration")?;

    // Shared state (application layer)
    let store = Arc::new(TelemetryStore::new(
        settings.store.path_capacity,
        settings.store.series_capacity,
    ));
    let stats = Arc::new(IngressStats::default());
    let frames = Arc::new(FrameCache::new());
    let ingest = TelemetryIngest::new(store.clone(), stats.clone());
    let presenter = Arc::new(Presenter::new(
        store.clone(),
        frames.clone(),
        settings.presenter.to_presenter_config(),
    ));

    // Ingress tasks (infrastructure layer)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    if settings.ingress.enabled {
        let listener = UdpListener::bind(&settings.ingress, ingest.clone())
            .await
            .context("telemetry listener could not start")?;
        tasks.push(listener.spawn(shutdown_rx.clone()));
    } else {
        tracing::info!("UDP telemetry listener disabled");
    }

    if let Some(endpoint) = settings.rpc.endpoint.clone() {
        tracing::info!("streaming telemetry from {}", endpoint);
        let client = TcpTelemetryClient::new(endpoint, settings.rpc.max_frame_bytes);
        let rpc = RpcIngress::new(
            client,
            ingest.clone(),
            frames.clone(),
            Duration::from_millis(settings.rpc.reconnect_interval_ms),
        );
        tasks.push(rpc.spawn(shutdown_rx.clone()));
    }

    // Create application state
    let streaming_service = StreamingDashboardService::new(
        presenter.clone(),
        settings.presenter.tick_interval(),
        shutdown_rx.clone(),
    );
    let state = Arc::new(AppState {
        presenter,
        streaming_service,
        store,
        stats,
        frames,
        video_interval: Duration::from_millis(settings.video.frame_interval_ms),
        shutdown: shutdown_rx,
    });

    // Build router (presentation layer)
    // Note: We handle compression manually in our response builders,
    // so we don't use CompressionLayer to avoid double compression/decompression
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/snapshot", get(get_snapshot))
        .route("/dashboard/stream", get(stream_dashboard))
        .route("/latest", get(get_latest))
        .route("/path", get(get_path))
        .route("/history/:field", get(get_history))
        .route("/stats", get(get_stats))
        .route("/video/frame", get(get_video_frame))
        .route("/video/stream", get(stream_video))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = settings.http.bind_addr;
    let http_listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server on {}", addr))?;
    tracing::info!("Starting rover-telemetry service on {}", addr);

    // Open dashboard and video streams end on the same signal, so the
    // server can drain its connections.
    axum::serve(http_listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Wait for ingress tasks
    tracing::info!("waiting for ingress tasks to stop");
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("ingress task failed: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
