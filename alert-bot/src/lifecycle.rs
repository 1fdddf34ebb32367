//! Messaging channel lifecycle: pairing, readiness, and reconnects.
//!
//! ```text
//! Unpaired ──qr──▶ Unpaired ──authenticated──▶ Authenticated ──ready──▶ Ready
//!    ▲                                                                   │
//!    └──── re-initialized ◀──── Disconnected ◀──── disconnected ─────────┘
//! ```
//!
//! A disconnect can arrive in any state. Reconnection waits the policy delay
//! and re-initializes the channel, looping until it succeeds. Every `Ready`
//! leads to a scan after the stabilization delay; the recurring schedule is
//! started by the first one only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::channel::{ChannelEvent, MessagingChannel};
use crate::error::ChannelFault;
use crate::pairing;
use crate::reconnect::ReconnectPolicy;
use crate::scheduler::ScanScheduler;
use crate::status::{ChannelState, StatusHandle};

pub struct ChannelLifecycleManager {
    channel: Arc<dyn MessagingChannel>,
    status: StatusHandle,
    policy: Box<dyn ReconnectPolicy>,
    pairing_expiry: Duration,
    scheduler: ScanScheduler,
    /// Set by the first `Ready` event.
    scheduler_task: Option<JoinHandle<()>>,
}

impl ChannelLifecycleManager {
    pub fn new(
        channel: Arc<dyn MessagingChannel>,
        status: StatusHandle,
        policy: Box<dyn ReconnectPolicy>,
        pairing_expiry: Duration,
        scheduler: ScanScheduler,
    ) -> Self {
        Self {
            channel,
            status,
            policy,
            pairing_expiry,
            scheduler,
            scheduler_task: None,
        }
    }

    pub fn scheduler_started(&self) -> bool {
        self.scheduler_task.is_some()
    }

    /// Initialize the channel and process its events until the sender side closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<ChannelEvent>) {
        info!("initializing messaging channel");
        if let Err(e) = self.channel.initialize().await {
            error!(error = %e, "initial channel initialization failed");
            self.reconnect().await;
        }

        while let Some(event) = events.recv().await {
            let reinitialized = matches!(event, ChannelEvent::Disconnected { .. });
            self.handle_event(event).await;
            if reinitialized {
                self.drop_stale_disconnects(&mut events).await;
            }
        }

        warn!("channel event stream closed");
        if let Some(task) = self.scheduler_task.take() {
            task.abort();
        }
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Qr { code } => {
                match pairing::challenge_banner(&code, self.pairing_expiry) {
                    Ok(banner) => eprintln!("{banner}"),
                    Err(e) => warn!(error = %e, "could not render pairing QR code"),
                }
                warn!(
                    pairing_code = %code,
                    expires_in_secs = self.pairing_expiry.as_secs(),
                    "scan this pairing code to authenticate the messaging channel"
                );
                self.status
                    .update_channel(|c| {
                        c.state = ChannelState::Unpaired;
                        c.last_pairing_challenge = Some(Utc::now());
                    })
                    .await;
            }
            ChannelEvent::Authenticated => {
                info!("messaging channel authenticated");
                self.status
                    .update_channel(|c| {
                        c.state = ChannelState::Authenticated;
                        c.authenticated = true;
                        c.last_auth_time = Some(Utc::now());
                    })
                    .await;
            }
            ChannelEvent::Ready => {
                info!("messaging channel ready");
                self.status
                    .update_channel(|c| {
                        c.state = ChannelState::Ready;
                        c.authenticated = true;
                        c.ready_since = Some(Utc::now());
                    })
                    .await;
                if self.scheduler_task.is_none() {
                    self.scheduler_task = Some(self.scheduler.clone().spawn());
                } else {
                    self.scheduler.spawn_catch_up();
                }
            }
            ChannelEvent::AuthFailure { message } => {
                let fault = ChannelFault::AuthFailed(message.clone());
                error!(error = %fault, "messaging channel fault");
                self.status
                    .update_channel(|c| {
                        c.authenticated = false;
                        c.auth_error = Some(message);
                    })
                    .await;
            }
            ChannelEvent::Disconnected { reason } => {
                let fault = ChannelFault::Disconnected(reason.clone());
                error!(error = %fault, "messaging channel fault");
                self.status
                    .update_channel(|c| {
                        c.state = ChannelState::Disconnected;
                        c.last_disconnect = Some(Utc::now());
                        c.disconnect_reason = Some(reason);
                    })
                    .await;
                self.reconnect().await;
            }
        }
    }

    /// Handle what queued up while `reconnect` was sleeping, minus the
    /// disconnects: the session they refer to has already been replaced.
    async fn drop_stale_disconnects(&mut self, events: &mut mpsc::Receiver<ChannelEvent>) {
        let mut pending = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                ChannelEvent::Disconnected { reason } => {
                    info!(%reason, "dropping disconnect queued before reinitialization");
                }
                other => pending.push(other),
            }
        }
        for event in pending {
            self.handle_event(event).await;
        }
    }

    /// Retry initialization until it succeeds. There is no attempt limit.
    async fn reconnect(&self) {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let delay = self.policy.next_delay(attempt);
            info!(attempt, delay_secs = delay.as_secs(), "reconnecting messaging channel");
            tokio::time::sleep(delay).await;

            match self.channel.initialize().await {
                Ok(()) => {
                    info!(attempt, "messaging channel reinitialized");
                    self.status
                        .update_channel(|c| c.state = ChannelState::Unpaired)
                        .await;
                    return;
                }
                Err(e) => warn!(attempt, error = %e, "channel reinitialization failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use crate::config::ScanSettings;
    use crate::directory::InMemoryDirectory;
    use crate::dispatcher::NotificationDispatcher;
    use crate::forecast::StaticForecasts;
    use crate::models::{ForecastPoint, Subscriber};
    use crate::orchestrator::ScanOrchestrator;
    use crate::phone::IndonesiaNormalizer;
    use crate::reconnect::FixedDelay;

    const RECONNECT: Duration = Duration::from_secs(30);

    fn manager(channel: RecordingChannel, status: StatusHandle) -> ChannelLifecycleManager {
        let directory = InMemoryDirectory::new(vec![Subscriber {
            full_name: "Ani".into(),
            whatsapp_no: "0811".into(),
            location: "Dumai".into(),
        }]);
        let settings = ScanSettings::default();
        let dispatcher = NotificationDispatcher::new(
            Arc::new(directory.clone()),
            Arc::new(channel.clone()),
            Arc::new(IndonesiaNormalizer),
            settings.clone(),
        );
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::new(directory),
            Arc::new(StaticForecasts::new().with(
                "Dumai",
                vec![ForecastPoint { hour: 12, pm25: 55.0, aqi: 140 }],
            )),
            dispatcher,
            status.clone(),
            settings,
        ));
        let scheduler = ScanScheduler::new(
            orchestrator,
            status.clone(),
            Duration::from_secs(10),
            Duration::from_secs(3 * 60 * 60),
        );
        ChannelLifecycleManager::new(
            Arc::new(channel),
            status,
            Box::new(FixedDelay(RECONNECT)),
            Duration::from_secs(60),
            scheduler,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn pairing_then_authentication() {
        let status = StatusHandle::new();
        let mut mgr = manager(RecordingChannel::new(), status.clone());

        mgr.handle_event(ChannelEvent::Qr { code: "2@xyz".into() }).await;
        let snap = status.snapshot().await;
        assert_eq!(snap.channel.state, ChannelState::Unpaired);
        assert!(snap.channel.last_pairing_challenge.is_some());

        mgr.handle_event(ChannelEvent::Authenticated).await;
        let snap = status.snapshot().await;
        assert_eq!(snap.channel.state, ChannelState::Authenticated);
        assert!(snap.channel.authenticated);
        assert!(!mgr.scheduler_started());
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_keeps_state() {
        let status = StatusHandle::new();
        let mut mgr = manager(RecordingChannel::new(), status.clone());

        mgr.handle_event(ChannelEvent::Authenticated).await;
        mgr.handle_event(ChannelEvent::AuthFailure {
            message: "session revoked".into(),
        })
        .await;

        let snap = status.snapshot().await;
        assert_eq!(snap.channel.state, ChannelState::Authenticated);
        assert!(!snap.channel.authenticated);
        assert_eq!(snap.channel.auth_error.as_deref(), Some("session revoked"));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_retries_forever_at_fixed_delay() {
        let channel = RecordingChannel::new();
        channel.fail_next_inits(7);
        let status = StatusHandle::new();
        let mut mgr = manager(channel.clone(), status.clone());

        let start = tokio::time::Instant::now();
        mgr.handle_event(ChannelEvent::Disconnected {
            reason: "LOGOUT".into(),
        })
        .await;

        assert_eq!(channel.init_calls(), 8);
        assert!(start.elapsed() >= RECONNECT * 8);
        let snap = status.snapshot().await;
        assert_eq!(snap.channel.state, ChannelState::Unpaired);
        assert_eq!(snap.channel.disconnect_reason.as_deref(), Some("LOGOUT"));
        assert!(snap.channel.last_disconnect.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn status_is_disconnected_while_reconnecting() {
        let channel = RecordingChannel::new();
        channel.fail_next_inits(3);
        let status = StatusHandle::new();
        let mut mgr = manager(channel.clone(), status.clone());
        mgr.handle_event(ChannelEvent::Ready).await;

        let reconnecting = tokio::spawn(async move {
            mgr.handle_event(ChannelEvent::Disconnected {
                reason: "NAVIGATION".into(),
            })
            .await;
            mgr
        });

        tokio::time::sleep(RECONNECT * 2 + Duration::from_secs(1)).await;
        assert_eq!(status.channel_state().await, ChannelState::Disconnected);
        assert_eq!(channel.init_calls(), 2);

        let mgr = reconnecting.await.unwrap();
        assert!(mgr.scheduler_started());
        assert_eq!(status.channel_state().await, ChannelState::Unpaired);
    }

    #[tokio::test(start_paused = true)]
    async fn every_ready_scans_but_schedule_starts_once() {
        let channel = RecordingChannel::new();
        let status = StatusHandle::new();
        let mut mgr = manager(channel.clone(), status.clone());

        mgr.handle_event(ChannelEvent::Ready).await;
        assert!(mgr.scheduler_started());
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(channel.sent().len(), 1);

        mgr.handle_event(ChannelEvent::Disconnected {
            reason: "NAVIGATION".into(),
        })
        .await;
        mgr.handle_event(ChannelEvent::Authenticated).await;
        mgr.handle_event(ChannelEvent::Ready).await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(channel.sent().len(), 2);

        // Only the first schedule ticks at the interval mark.
        tokio::time::sleep(Duration::from_secs(3 * 60 * 60)).await;
        assert_eq!(channel.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_initializes_and_drains_events() {
        let channel = RecordingChannel::new();
        let status = StatusHandle::new();
        let mgr = manager(channel.clone(), status.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(ChannelEvent::Authenticated).await.unwrap();
        tx.send(ChannelEvent::Ready).await.unwrap();
        drop(tx);
        mgr.run(rx).await;

        assert_eq!(channel.init_calls(), 1);
        assert!(status.channel_state().await.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnects_queued_during_reconnect_are_dropped() {
        let channel = RecordingChannel::new();
        let status = StatusHandle::new();
        let mgr = manager(channel.clone(), status.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(ChannelEvent::Disconnected { reason: "CONFLICT".into() }).await.unwrap();
        tx.send(ChannelEvent::Disconnected { reason: "bridge unreachable".into() }).await.unwrap();
        tx.send(ChannelEvent::Authenticated).await.unwrap();
        drop(tx);
        mgr.run(rx).await;

        // Start-up plus a single reinitialization.
        assert_eq!(channel.init_calls(), 2);
        let snap = status.snapshot().await;
        assert_eq!(snap.channel.state, ChannelState::Authenticated);
        assert_eq!(snap.channel.disconnect_reason.as_deref(), Some("CONFLICT"));
    }

    #[tokio::test(start_paused = true)]
    async fn qr_event_with_unrenderable_code_still_updates_status() {
        let status = StatusHandle::new();
        let mut mgr = manager(RecordingChannel::new(), status.clone());
        mgr.handle_event(ChannelEvent::Qr { code: "x".repeat(8_000) }).await;
        assert!(status.snapshot().await.channel.last_pairing_challenge.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_is_retried() {
        let channel = RecordingChannel::new();
        channel.fail_next_inits(2);
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        manager(channel.clone(), StatusHandle::new()).run(rx).await;
        assert_eq!(channel.init_calls(), 3);
    }
}
