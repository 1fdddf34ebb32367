//! One scan over every subscribed location.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::ScanSettings;
use crate::directory::SubscriberDirectory;
use crate::dispatcher::NotificationDispatcher;
use crate::error::FetchError;
use crate::forecast::ForecastSource;
use crate::models::{ScanError, ScanReport};
use crate::status::StatusHandle;
use crate::threshold;

/// What happened for one city.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CityOutcome {
    NoData,
    Safe,
    Alerted { messages_sent: usize },
}

pub struct ScanOrchestrator {
    directory: Arc<dyn SubscriberDirectory>,
    forecasts: Arc<dyn ForecastSource>,
    dispatcher: NotificationDispatcher,
    status: StatusHandle,
    settings: ScanSettings,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when the scan future completes or is dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScanOrchestrator {
    pub fn new(
        directory: Arc<dyn SubscriberDirectory>,
        forecasts: Arc<dyn ForecastSource>,
        dispatcher: NotificationDispatcher,
        status: StatusHandle,
        settings: ScanSettings,
    ) -> Self {
        Self {
            directory,
            forecasts,
            dispatcher,
            status,
            settings,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one scan and publish its report.
    ///
    /// Returns `None` without doing anything if another scan is still in
    /// flight.
    pub async fn run_scan(&self) -> Option<ScanReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("previous scan still running, skipping this run");
            return None;
        }
        let _guard = RunGuard(&self.in_progress);

        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", %scan_id);
        let report = self.scan_all().instrument(span).await;
        self.status.publish_report(report.clone()).await;
        Some(report)
    }

    async fn scan_all(&self) -> ScanReport {
        info!(horizon = self.settings.forecast_hour, "starting forecast scan");
        let started = Utc::now();
        let clock = tokio::time::Instant::now();
        self.status.record_scan_started(started).await;

        let mut report = ScanReport::default();

        match self.directory.locations().await {
            Ok(cities) => {
                info!(cities = %cities.join(", "), "checking forecasts");
                report.cities_checked = cities.len();

                for city in &cities {
                    match self.check_city(city).await {
                        Ok(CityOutcome::Alerted { messages_sent }) => {
                            report.alerts_triggered += 1;
                            report.messages_sent += messages_sent;
                        }
                        Ok(CityOutcome::Safe | CityOutcome::NoData) => {}
                        Err(e) => {
                            error!(city = %city, error = %e, "forecast check failed");
                            report.errors.push(ScanError::city(city.as_str(), &e.cause));
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "scan failed: could not list locations");
                report.errors.push(ScanError::general(e));
            }
        }

        info!(
            cities_checked = report.cities_checked,
            alerts_triggered = report.alerts_triggered,
            messages_sent = report.messages_sent,
            errors = report.errors.len(),
            duration_ms = clock.elapsed().as_millis() as u64,
            "scan completed"
        );
        report
    }

    async fn check_city(&self, city: &str) -> Result<CityOutcome, FetchError> {
        info!(city = %city, "fetching forecast");
        let points = self.forecasts.fetch(city).await?;

        let assessment = match threshold::evaluate(
            &points,
            self.settings.forecast_hour,
            self.settings.pm25_threshold,
        ) {
            Ok(a) => a,
            Err(no_data) => {
                info!(city = %city, %no_data, "no forecast at horizon");
                return Ok(CityOutcome::NoData);
            }
        };

        if !assessment.alert {
            info!(city = %city, pm25 = assessment.pm25, "air quality safe at horizon");
            return Ok(CityOutcome::Safe);
        }

        info!(
            city = %city,
            pm25 = assessment.pm25,
            threshold = self.settings.pm25_threshold,
            "PM2.5 threshold exceeded"
        );
        let messages_sent = self
            .dispatcher
            .dispatch_alert(city, assessment.pm25, assessment.aqi)
            .await;
        self.status.add_sent(messages_sent).await;
        Ok(CityOutcome::Alerted { messages_sent })
    }
}
