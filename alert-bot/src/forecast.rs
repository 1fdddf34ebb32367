//! Forecast provider client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::{FetchCause, FetchError};
use crate::models::ForecastPoint;

/// Source of hourly forecasts for a location. No retries.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<ForecastPoint>, FetchError>;
}

// ------------------------------------------------------------------ //
//  HttpForecastClient (production)                                    //
// ------------------------------------------------------------------ //

/// `GET <base>/api/forecast/{location}` returning a JSON array of points.
pub struct HttpForecastClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpForecastClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("forecast base URL {base_url} cannot carry a path");
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    /// Location names may contain spaces; they are percent-encoded as one segment.
    pub fn forecast_url(&self, location: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::new(
                    location,
                    FetchCause::InvalidLocation(self.base_url.to_string()),
                )
            })?
            .pop_if_empty()
            .extend(["api", "forecast", location]);
        Ok(url)
    }
}

#[async_trait]
impl ForecastSource for HttpForecastClient {
    async fn fetch(&self, location: &str) -> Result<Vec<ForecastPoint>, FetchError> {
        let url = self.forecast_url(location)?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(location, e))?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(location, e))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::new(location, FetchCause::Decode(e.to_string())))
    }
}

// ------------------------------------------------------------------ //
//  StaticForecasts (for tests)                                        //
// ------------------------------------------------------------------ //

/// In-memory forecasts keyed by location. Unknown locations fail as if the
/// provider were unreachable.
#[derive(Debug, Default, Clone)]
pub struct StaticForecasts {
    series: HashMap<String, Vec<ForecastPoint>>,
}

impl StaticForecasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, points: Vec<ForecastPoint>) -> Self {
        self.series.insert(location.to_string(), points);
        self
    }
}

#[async_trait]
impl ForecastSource for StaticForecasts {
    async fn fetch(&self, location: &str) -> Result<Vec<ForecastPoint>, FetchError> {
        self.series.get(location).cloned().ok_or_else(|| {
            FetchError::new(location, FetchCause::Transport("connection refused".into()))
        })
    }
}
