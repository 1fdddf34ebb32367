//! Alert bot entry point.
//!
//! Wires the subscriber directory, forecast client, and WhatsApp bridge
//! into the scan pipeline, then serves `/health` while the channel
//! lifecycle drives scans. See [`alert_bot::config`] for environment
//! variables; secrets follow [`alert_bot::secrets`].

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use alert_bot::bridge::{run_event_pump, BridgeChannel};
use alert_bot::channel::MessagingChannel;
use alert_bot::config::AppConfig;
use alert_bot::directory::{PgSubscriberDirectory, SubscriberDirectory};
use alert_bot::dispatcher::NotificationDispatcher;
use alert_bot::forecast::HttpForecastClient;
use alert_bot::handlers::{self, AppState};
use alert_bot::lifecycle::ChannelLifecycleManager;
use alert_bot::orchestrator::ScanOrchestrator;
use alert_bot::phone::{normalizer_for_region, IndonesiaNormalizer, PhoneNormalizer};
use alert_bot::reconnect::FixedDelay;
use alert_bot::scheduler::{spawn_heartbeat, ScanScheduler};
use alert_bot::secrets::{self, SecretsClient};
use alert_bot::status::StatusHandle;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("alert_bot=info".parse()?),
        )
        .json()
        .init();

    let config = AppConfig::from_env();
    info!(
        pm25_threshold = config.scan.pm25_threshold,
        forecast_hour = config.scan.forecast_hour,
        scan_interval_secs = config.timings.scan_interval.as_secs(),
        "configuration loaded"
    );

    // Resolve secrets (Bitwarden → env fallback).
    let secrets_client = SecretsClient::from_env();
    let database_url = secrets_client.resolve(secrets::DATABASE_URL).await?;
    let bridge_token = secrets_client.resolve(secrets::BRIDGE_TOKEN).await.ok();

    let normalizer: Arc<dyn PhoneNormalizer> = match normalizer_for_region(&config.phone_region) {
        Some(n) => Arc::from(n),
        None => {
            warn!(region = %config.phone_region, "no phone rule for region, using ID");
            Arc::new(IndonesiaNormalizer)
        }
    };

    let status = StatusHandle::new();
    let directory: Arc<dyn SubscriberDirectory> =
        Arc::new(PgSubscriberDirectory::connect_lazy(&database_url)?);
    let forecasts = Arc::new(HttpForecastClient::new(
        &config.forecast_api_url,
        config.timings.forecast_timeout,
    )?);
    let bridge = Arc::new(BridgeChannel::new(&config.bridge_url, bridge_token)?);
    let channel: Arc<dyn MessagingChannel> = bridge.clone();

    let dispatcher = NotificationDispatcher::new(
        directory.clone(),
        channel.clone(),
        normalizer,
        config.scan.clone(),
    );
    let orchestrator = Arc::new(ScanOrchestrator::new(
        directory,
        forecasts,
        dispatcher,
        status.clone(),
        config.scan.clone(),
    ));
    let scheduler = ScanScheduler::new(
        orchestrator,
        status.clone(),
        config.timings.stabilization_delay,
        config.timings.scan_interval,
    );

    let (event_tx, event_rx) = mpsc::channel(64);
    tokio::spawn(run_event_pump(bridge, event_tx));

    let lifecycle = ChannelLifecycleManager::new(
        channel,
        status.clone(),
        Box::new(FixedDelay(config.timings.reconnect_delay)),
        config.timings.pairing_expiry,
        scheduler,
    );
    tokio::spawn(lifecycle.run(event_rx));

    spawn_heartbeat(status.clone(), config.timings.heartbeat_interval);

    let state = Arc::new(AppState {
        status,
        config: config.summary(),
    });
    let app = handlers::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = bind_addr, "health check server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
