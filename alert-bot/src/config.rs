//! Process configuration, fixed at start-up.
//!
//! | Env var               | Default                  |
//! |-----------------------|--------------------------|
//! | `PM25_THRESHOLD`      | `20`                     |
//! | `FORECAST_HOUR`       | `12`                     |
//! | `SCAN_INTERVAL_HOURS` | `3`                      |
//! | `MESSAGE_DELAY_MS`    | `3000`                   |
//! | `PORT`                | `3000`                   |
//! | `FORECAST_API_URL`    | HazeRadar production API |
//! | `WHATSAPP_BRIDGE_URL` | `http://127.0.0.1:3001`  |
//! | `PHONE_REGION`        | `ID`                     |

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

pub const DEFAULT_FORECAST_API_URL: &str =
    "https://haze-radargnnmodelrealtime-production-2194.up.railway.app";

/// Settings that shape a single scan.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Alert trigger in µg/m³.
    pub pm25_threshold: f64,
    /// Forecast hour evaluated.
    pub forecast_hour: u32,
    /// Pause after every send attempt.
    pub message_delay: Duration,
    /// Upper bound for a single message submission.
    pub send_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            pm25_threshold: 20.0,
            forecast_hour: 12,
            message_delay: Duration::from_secs(3),
            send_timeout: Duration::from_secs(60),
        }
    }
}

/// Timers driving the channel lifecycle and scan schedule.
#[derive(Debug, Clone)]
pub struct Timings {
    pub scan_interval: Duration,
    pub stabilization_delay: Duration,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub forecast_timeout: Duration,
    pub pairing_expiry: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(3 * 60 * 60),
            stabilization_delay: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(5 * 60),
            forecast_timeout: Duration::from_secs(15),
            pairing_expiry: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scan: ScanSettings,
    pub timings: Timings,
    pub port: u16,
    pub forecast_api_url: String,
    pub bridge_url: String,
    pub phone_region: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            timings: Timings::default(),
            port: 3000,
            forecast_api_url: DEFAULT_FORECAST_API_URL.to_string(),
            bridge_url: "http://127.0.0.1:3001".to_string(),
            phone_region: "ID".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        cfg.scan.pm25_threshold = parse_or(&lookup, "PM25_THRESHOLD", cfg.scan.pm25_threshold);
        cfg.scan.forecast_hour = parse_or(&lookup, "FORECAST_HOUR", cfg.scan.forecast_hour);
        let delay_ms = parse_or(&lookup, "MESSAGE_DELAY_MS", 3000_u64);
        cfg.scan.message_delay = Duration::from_millis(delay_ms);

        let hours = parse_or(&lookup, "SCAN_INTERVAL_HOURS", 3_u64).max(1);
        cfg.timings.scan_interval = Duration::from_secs(hours * 60 * 60);

        cfg.port = parse_or(&lookup, "PORT", cfg.port);
        if let Some(url) = lookup("FORECAST_API_URL") {
            cfg.forecast_api_url = url;
        }
        if let Some(url) = lookup("WHATSAPP_BRIDGE_URL") {
            cfg.bridge_url = url;
        }
        if let Some(region) = lookup("PHONE_REGION") {
            cfg.phone_region = region;
        }

        cfg
    }

    /// The subset echoed by the health endpoint.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            pm25_threshold: self.scan.pm25_threshold,
            forecast_hour: self.scan.forecast_hour,
            scan_interval_hours: self.timings.scan_interval.as_secs_f64() / 3600.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub pm25_threshold: f64,
    pub forecast_hour: u32,
    pub scan_interval_hours: f64,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "invalid config value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = AppConfig::from_lookup(|_| None);
        assert_eq!(cfg.scan.pm25_threshold, 20.0);
        assert_eq!(cfg.scan.forecast_hour, 12);
        assert_eq!(cfg.scan.message_delay, Duration::from_secs(3));
        assert_eq!(cfg.timings.scan_interval, Duration::from_secs(10_800));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.phone_region, "ID");
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("PM25_THRESHOLD", "35.5"),
            ("FORECAST_HOUR", "24"),
            ("SCAN_INTERVAL_HOURS", "6"),
            ("MESSAGE_DELAY_MS", "500"),
            ("PORT", "8080"),
            ("FORECAST_API_URL", "http://localhost:9000"),
        ]));
        assert_eq!(cfg.scan.pm25_threshold, 35.5);
        assert_eq!(cfg.scan.forecast_hour, 24);
        assert_eq!(cfg.timings.scan_interval, Duration::from_secs(6 * 3600));
        assert_eq!(cfg.scan.message_delay, Duration::from_millis(500));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.forecast_api_url, "http://localhost:9000");
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("PORT", "not-a-port"), ("FORECAST_HOUR", "-3")]));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.scan.forecast_hour, 12);
    }

    #[test]
    fn summary_reports_hours() {
        let summary = AppConfig::default().summary();
        assert_eq!(summary.scan_interval_hours, 3.0);
        assert_eq!(summary.forecast_hour, 12);
    }
}
