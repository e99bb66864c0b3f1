use crate::application::presenter::{PathFraming, PresenterConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Largest payload a single UDP datagram can carry over IPv4.
const MAX_UDP_PAYLOAD: usize = 65507;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub ingress: IngressSettings,
    #[serde(default)]
    pub rpc: RpcSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub presenter: PresenterSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub video: VideoSettings,
}

/// UDP/JSON telemetry listener
#[derive(Debug, Deserialize, Clone)]
pub struct IngressSettings {
    #[serde(default = "default_ingress_enabled")]
    pub enabled: bool,

    #[serde(default = "default_ingress_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,

    /// Listen on an OS-assigned port when `bind_addr` is taken.
    #[serde(default)]
    pub fallback_to_ephemeral: bool,

    /// Relay every raw datagram to this address as well.
    #[serde(default)]
    pub forward_addr: Option<SocketAddr>,
}

/// Streaming RPC telemetry source
#[derive(Debug, Deserialize, Clone)]
pub struct RpcSettings {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    #[serde(default = "default_path_capacity")]
    pub path_capacity: usize,

    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PresenterSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,

    #[serde(default = "default_path_framing")]
    pub path_framing: PathFraming,

    #[serde(default = "default_rover_half_width")]
    pub rover_half_width: f64,

    #[serde(default = "default_origin_half_width")]
    pub origin_half_width: f64,

    #[serde(default = "default_heading_indicator_length")]
    pub heading_indicator_length: f64,

    #[serde(default = "default_show_chart")]
    pub show_heading_chart: bool,

    #[serde(default = "default_show_chart")]
    pub show_system_charts: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    #[serde(default = "default_http_bind_addr")]
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoSettings {
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

// Default value functions
fn default_ingress_enabled() -> bool { true }
fn default_ingress_bind_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 50055)) }
fn default_max_datagram_bytes() -> usize { 4096 }

fn default_reconnect_interval_ms() -> u64 { 2000 }
fn default_max_frame_bytes() -> usize { 4 * 1024 * 1024 }

fn default_path_capacity() -> usize { 1000 }
fn default_series_capacity() -> usize { 100 }

fn default_tick_interval_ms() -> u64 { 1000 }
fn default_staleness_ms() -> u64 { 5000 }
fn default_path_framing() -> PathFraming { PathFraming::Rover }
fn default_rover_half_width() -> f64 { 10.0 }
fn default_origin_half_width() -> f64 { 20.0 }
fn default_heading_indicator_length() -> f64 { 5.0 }
fn default_show_chart() -> bool { true }

fn default_http_bind_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 8080)) }
fn default_frame_interval_ms() -> u64 { 100 }

impl Default for IngressSettings {
    fn default() -> Self {
        Self {
            enabled: default_ingress_enabled(),
            bind_addr: default_ingress_bind_addr(),
            max_datagram_bytes: default_max_datagram_bytes(),
            fallback_to_ephemeral: false,
            forward_addr: None,
        }
    }
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path_capacity: default_path_capacity(),
            series_capacity: default_series_capacity(),
        }
    }
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            staleness_ms: default_staleness_ms(),
            path_framing: default_path_framing(),
            rover_half_width: default_rover_half_width(),
            origin_half_width: default_origin_half_width(),
            heading_indicator_length: default_heading_indicator_length(),
            show_heading_chart: default_show_chart(),
            show_system_charts: default_show_chart(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_http_bind_addr(),
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl PresenterSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn to_presenter_config(&self) -> PresenterConfig {
        PresenterConfig {
            staleness: Duration::from_millis(self.staleness_ms),
            path_framing: self.path_framing,
            rover_half_width: self.rover_half_width,
            origin_half_width: self.origin_half_width,
            heading_indicator_length: self.heading_indicator_length,
            show_heading_chart: self.show_heading_chart,
            show_system_charts: self.show_system_charts,
        }
    }
}

impl Settings {
    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let datagram = self.ingress.max_datagram_bytes;
        if !(64..=MAX_UDP_PAYLOAD).contains(&datagram) {
            anyhow::bail!("ingress.max_datagram_bytes must be between 64 and {}", MAX_UDP_PAYLOAD);
        }
        if self.rpc.reconnect_interval_ms == 0 {
            anyhow::bail!("rpc.reconnect_interval_ms must be greater than 0");
        }
        if self.rpc.max_frame_bytes == 0 {
            anyhow::bail!("rpc.max_frame_bytes must be greater than 0");
        }
        if self.store.path_capacity == 0 || self.store.series_capacity == 0 {
            anyhow::bail!("store capacities must be greater than 0");
        }
        if self.presenter.tick_interval_ms == 0 {
            anyhow::bail!("presenter.tick_interval_ms must be greater than 0");
        }
        if self.presenter.staleness_ms == 0 {
            anyhow::bail!("presenter.staleness_ms must be greater than 0");
        }
        for (name, value) in [
            ("rover_half_width", self.presenter.rover_half_width),
            ("origin_half_width", self.presenter.origin_half_width),
        ] {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("presenter.{} must be a positive number", name);
            }
        }
        if !self.presenter.heading_indicator_length.is_finite()
            || self.presenter.heading_indicator_length < 0.0
        {
            anyhow::bail!("presenter.heading_indicator_length must not be negative");
        }
        if self.video.frame_interval_ms == 0 {
            anyhow::bail!("video.frame_interval_ms must be greater than 0");
        }
        Ok(())
    }
}

/// `ROVER__SECTION__KEY` overrides. `vars` replaces the process environment
/// when given.
fn environment(vars: Option<config::Map<String, String>>) -> config::Environment {
    config::Environment::with_prefix("ROVER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(vars)
}

/// Loads `config/rover.toml` if present, then `ROVER__SECTION__KEY`
/// environment overrides.
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name("config/rover").required(false))
        .add_source(environment(None))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}
