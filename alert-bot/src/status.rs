//! Process-wide bot status, shared between the scan pipeline, the channel
//! lifecycle, and the health endpoint.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::ScanReport;

/// State of the outbound messaging channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Waiting for the operator to complete pairing.
    Unpaired,
    /// Paired; transport still starting.
    Authenticated,
    Ready,
    Disconnected,
}

impl ChannelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaired => write!(f, "unpaired"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Ready => write!(f, "ready"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub state: ChannelState,
    /// Set by authentication, cleared by an auth failure. Disconnects leave it alone.
    pub authenticated: bool,
    pub last_pairing_challenge: Option<DateTime<Utc>>,
    pub last_auth_time: Option<DateTime<Utc>>,
    pub ready_since: Option<DateTime<Utc>>,
    pub last_disconnect: Option<DateTime<Utc>>,
    pub disconnect_reason: Option<String>,
    pub auth_error: Option<String>,
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self {
            state: ChannelState::Unpaired,
            authenticated: false,
            last_pairing_challenge: None,
            last_auth_time: None,
            ready_since: None,
            last_disconnect: None,
            disconnect_reason: None,
            auth_error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotStatus {
    pub channel: ChannelStatus,
    pub started_at: DateTime<Utc>,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_scan_result: Option<ScanReport>,
    total_alerts_sent: u64,
}

impl BotStatus {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            channel: ChannelStatus::default(),
            started_at,
            last_scan: None,
            last_scan_result: None,
            total_alerts_sent: 0,
        }
    }

    pub fn total_alerts_sent(&self) -> u64 {
        self.total_alerts_sent
    }

    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

/// Cloneable handle to the single [`BotStatus`].
///
/// Writers hold the lock only for field updates; readers get a snapshot so a
/// half-written report is never observed.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<BotStatus>>,
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BotStatus::new(Utc::now()))),
        }
    }

    pub async fn snapshot(&self) -> BotStatus {
        self.inner.read().await.clone()
    }

    pub async fn channel_state(&self) -> ChannelState {
        self.inner.read().await.channel.state
    }

    pub async fn update_channel(&self, f: impl FnOnce(&mut ChannelStatus)) {
        let mut status = self.inner.write().await;
        f(&mut status.channel);
    }

    pub async fn record_scan_started(&self, at: DateTime<Utc>) {
        self.inner.write().await.last_scan = Some(at);
    }

    /// Add delivered messages to the running total as soon as a city is done.
    pub async fn add_sent(&self, messages: usize) {
        self.inner.write().await.total_alerts_sent += messages as u64;
    }

    /// Replace the latest report. The total is kept by [`Self::add_sent`].
    pub async fn publish_report(&self, report: ScanReport) {
        self.inner.write().await.last_scan_result = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_replaces_report_and_total_accumulates() {
        let status = StatusHandle::new();
        status.add_sent(3).await;
        status
            .publish_report(ScanReport {
                cities_checked: 2,
                alerts_triggered: 1,
                messages_sent: 3,
                errors: vec![],
            })
            .await;
        status.add_sent(2).await;
        status
            .publish_report(ScanReport {
                cities_checked: 1,
                alerts_triggered: 1,
                messages_sent: 2,
                errors: vec![],
            })
            .await;

        let snap = status.snapshot().await;
        assert_eq!(snap.total_alerts_sent(), 5);
        assert_eq!(snap.last_scan_result.unwrap().cities_checked, 1);
    }

    #[tokio::test]
    async fn channel_updates_are_visible() {
        let status = StatusHandle::new();
        assert_eq!(status.channel_state().await, ChannelState::Unpaired);
        status
            .update_channel(|c| {
                c.state = ChannelState::Ready;
                c.authenticated = true;
            })
            .await;
        assert!(status.channel_state().await.is_ready());
        assert!(status.snapshot().await.channel.authenticated);
    }

    #[test]
    fn uptime_never_negative() {
        let now = Utc::now();
        let status = BotStatus::new(now + chrono::Duration::seconds(5));
        assert_eq!(status.uptime_seconds(now), 0);
    }

    #[test]
    fn state_names() {
        assert_eq!(ChannelState::Disconnected.to_string(), "disconnected");
        assert_eq!(
            serde_json::to_value(ChannelState::Authenticated).unwrap(),
            serde_json::json!("authenticated")
        );
    }
}
