//! PM2.5 forecast evaluation at a fixed horizon.

use tracing::warn;

use crate::error::NoDataError;
use crate::models::ForecastPoint;

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// The forecast reading at the configured horizon and whether it breaches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub alert: bool,
    pub pm25: f64,
    pub aqi: u32,
}

// ------------------------------------------------------------------ //
//  Evaluation                                                         //
// ------------------------------------------------------------------ //

/// Evaluate a forecast series at `horizon_hours`.
///
/// The series is not assumed sorted or complete. The first point whose hour
/// matches is used; a duplicate hour is logged since the provider should
/// never send one. `pm25` equal to the threshold does not alert.
pub fn evaluate(
    points: &[ForecastPoint],
    horizon_hours: u32,
    threshold: f64,
) -> Result<Assessment, NoDataError> {
    let mut matching = points.iter().filter(|p| p.hour == horizon_hours);
    let point = matching.next().ok_or(NoDataError {
        horizon: horizon_hours,
    })?;

    let duplicates = matching.count();
    if duplicates > 0 {
        warn!(
            hour = horizon_hours,
            duplicates, "forecast series has duplicate hour entries, using the first"
        );
    }

    Ok(Assessment {
        alert: exceeds(point.pm25, threshold),
        pm25: point.pm25,
        aqi: point.aqi,
    })
}

/// Strict comparison; exactly at the threshold is safe.
pub fn exceeds(pm25: f64, threshold: f64) -> bool {
    pm25 > threshold
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
