//! Recurring scan schedule and keep-alive heartbeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::orchestrator::ScanOrchestrator;
use crate::status::StatusHandle;

/// Runs a first scan after `stabilization`, then one every `interval`.
///
/// Each run is spawned on its own so ticks keep their cadence however long a
/// scan takes; the orchestrator skips a run that would overlap.
#[derive(Clone)]
pub struct ScanScheduler {
    orchestrator: Arc<ScanOrchestrator>,
    status: StatusHandle,
    stabilization: Duration,
    interval: Duration,
}

impl ScanScheduler {
    pub fn new(
        orchestrator: Arc<ScanOrchestrator>,
        status: StatusHandle,
        stabilization: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            status,
            stabilization,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// One extra run after `stabilization`, outside the recurring schedule.
    ///
    /// Used when the channel comes back, so a tick skipped during the outage
    /// does not leave subscribers waiting for the next interval.
    pub fn spawn_catch_up(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            info!(
                delay_secs = this.stabilization.as_secs(),
                "channel ready again, scanning after session stabilizes"
            );
            tokio::time::sleep(this.stabilization).await;
            this.trigger().await;
        })
    }

    async fn run(self) {
        info!(
            delay_secs = self.stabilization.as_secs(),
            "waiting for session stability"
        );
        tokio::time::sleep(self.stabilization).await;

        info!("executing first forecast scan");
        self.trigger().await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_hours = self.interval.as_secs_f64() / 3600.0,
            "scheduled recurring scans"
        );

        loop {
            ticker.tick().await;
            self.trigger().await;
        }
    }

    async fn trigger(&self) {
        let state = self.status.channel_state().await;
        if !state.is_ready() {
            warn!(channel_state = %state, "channel not ready, skipping scheduled scan");
            return;
        }
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.run_scan().await;
        });
    }
}

/// Log a keep-alive line every `period`.
pub fn spawn_heartbeat(status: StatusHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let snap = status.snapshot().await;
            info!(
                ready = snap.channel.state.is_ready(),
                authenticated = snap.channel.authenticated,
                total_alerts_sent = snap.total_alerts_sent(),
                "keep-alive: bot is running"
            );
        }
    })
}
