// Simulated rover - Sends JSON telemetry datagrams once per second
use anyhow::Context;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

const DEFAULT_TARGET: &str = "127.0.0.1:50055";
const SEND_INTERVAL: Duration = Duration::from_secs(1);
const PATH_RADIUS: f64 = 10.0;

fn telemetry_at(elapsed_secs: f64) -> serde_json::Value {
    let uptime = elapsed_secs.floor();
    json!({
        "position": {
            "x": PATH_RADIUS * elapsed_secs.cos(),
            "y": PATH_RADIUS * elapsed_secs.sin(),
        },
        "heading": (elapsed_secs * 10.0) % 360.0,
        "battery_level": 100.0 - (elapsed_secs % 100.0),
        "ultrasound_distance": 5.0,
        "odometer": PATH_RADIUS * elapsed_secs,
        "search_mode": "pattern_pursuit",
        "system_state": {
            "cpu_usage": 20.0 + 10.0 * (elapsed_secs / 7.0).sin().abs(),
            "memory_available": 2048.0,
            "memory_total": 4096.0,
            "disk_usage": 42.0,
            "temperature": 45.0 + 5.0 * (elapsed_secs / 30.0).sin(),
            "uptime": uptime,
        },
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let target: SocketAddr = std::env::var("ROVER_TARGET")
        .unwrap_or_else(|_| DEFAULT_TARGET.to_string())
        .parse()
        .context("ROVER_TARGET must be a socket address")?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    tracing::info!("sending dummy telemetry to {}", target);

    let started = Instant::now();
    let mut ticker = tokio::time::interval(SEND_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let payload = serde_json::to_vec(&telemetry_at(started.elapsed().as_secs_f64()))?;
        match socket.send_to(&payload, target).await {
            Ok(len) => tracing::debug!("sent {} bytes", len),
            Err(e) => tracing::warn!("send failed: {}", e),
        }
    }

    tracing::info!("dummy rover stopped");
    Ok(())
}
