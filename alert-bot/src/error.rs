//! Error taxonomy for the scan-and-notify pipeline.
//!
//! Each error is contained at the smallest scope that keeps the scan moving:
//! a failed fetch skips one city, a failed send skips one recipient. Only a
//! failed location listing degrades a whole scan.

use thiserror::Error;

/// The subscriber store could not be queried.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("subscriber query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("subscriber directory unavailable: {0}")]
    Unavailable(String),
}

/// The forecast for one location could not be obtained.
#[derive(Debug, Error)]
#[error("forecast fetch for {location} failed: {cause}")]
pub struct FetchError {
    pub location: String,
    pub cause: FetchCause,
}

#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("request timed out")]
    Timeout,
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed forecast body: {0}")]
    Decode(String),
    #[error("invalid location path: {0}")]
    InvalidLocation(String),
}

impl FetchError {
    pub fn new(location: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            location: location.into(),
            cause,
        }
    }

    pub(crate) fn from_reqwest(location: &str, e: reqwest::Error) -> Self {
        let cause = if e.is_timeout() {
            FetchCause::Timeout
        } else if let Some(status) = e.status() {
            FetchCause::Status(status.as_u16())
        } else if e.is_decode() {
            FetchCause::Decode(e.to_string())
        } else {
            FetchCause::Transport(e.to_string())
        };
        Self::new(location, cause)
    }
}

/// The configured horizon is absent from a forecast series. Informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no forecast point at hour {horizon}")]
pub struct NoDataError {
    pub horizon: u32,
}

/// A single outbound message could not be delivered.
#[derive(Debug, Error)]
#[error("send to {address} failed: {cause}")]
pub struct SendError {
    pub address: String,
    pub cause: String,
}

impl SendError {
    pub fn new(address: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            cause: cause.into(),
        }
    }
}

/// Faults raised by the messaging transport itself.
#[derive(Debug, Clone, Error)]
pub enum ChannelFault {
    #[error("channel disconnected: {0}")]
    Disconnected(String),
    #[error("channel authentication failed: {0}")]
    AuthFailed(String),
    #[error("channel initialization failed: {0}")]
    Init(String),
}
