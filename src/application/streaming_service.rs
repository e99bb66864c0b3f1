// Streaming dashboard service - One snapshot per presenter tick
use crate::application::presenter::Presenter;
use crate::domain::dashboard::DashboardSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Snapshots buffered per viewer before ticks start being skipped.
const VIEWER_BUFFER: usize = 4;

#[derive(Clone)]
pub struct StreamingDashboardService {
    presenter: Arc<Presenter>,
    tick_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StreamingDashboardService {
    pub fn new(presenter: Arc<Presenter>, tick_interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            presenter,
            tick_interval,
            shutdown,
        }
    }

    /// Starts a ticker that pushes a snapshot every tick until the receiver
    /// is dropped or shutdown is signalled. A slow viewer misses ticks rather
    /// than stalling the ticker.
    pub fn stream_dashboard(&self) -> mpsc::Receiver<DashboardSnapshot> {
        let (tx, rx) = mpsc::channel(VIEWER_BUFFER);
        let presenter = self.presenter.clone();
        let tick_interval = self.tick_interval;
        let mut shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                let snapshot = presenter.tick();
                match tx.try_send(snapshot) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!("dashboard viewer is behind, skipping tick");
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!("dashboard viewer disconnected");
                        break;
                    }
                }
            }
        });

        rx
    }
}
