//! Domain records shared across the pipeline.

use serde::{de, Deserialize, Deserializer, Serialize};

// ------------------------------------------------------------------ //
//  Inbound (directory / forecast provider → bot)                      //
// ------------------------------------------------------------------ //

/// A person subscribed to alerts for one location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subscriber {
    pub full_name: String,
    /// Raw phone number as entered by the subscriber; formatting is arbitrary.
    pub whatsapp_no: String,
    pub location: String,
}

/// One hourly prediction from the forecast provider.
///
/// The provider sends extra fields which are ignored. Integer fields may
/// arrive as JSON floats (`12.0`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ForecastPoint {
    /// Hours from now.
    #[serde(deserialize_with = "whole_number")]
    pub hour: u32,
    /// PM2.5 concentration in µg/m³.
    pub pm25: f64,
    #[serde(deserialize_with = "rounded_index")]
    pub aqi: u32,
}

/// Accepts `12` and `12.0`; `12.5` is not an hour.
fn whole_number<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = f64::deserialize(d)?;
    if v.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&v) {
        return Err(de::Error::custom(format!("expected a whole hour, got {v}")));
    }
    Ok(v as u32)
}

/// AQI is reported as an integer; fractional values are rounded.
fn rounded_index<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = f64::deserialize(d)?;
    if !v.is_finite() || v < 0.0 {
        return Err(de::Error::custom(format!("invalid AQI {v}")));
    }
    Ok(v.round().min(u32::MAX as f64) as u32)
}

// ------------------------------------------------------------------ //
//  Outbound (scan → status)                                           //
// ------------------------------------------------------------------ //

/// A failure recorded during one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ScanError {
    City { city: String, message: String },
    General { message: String },
}

impl ScanError {
    pub fn city(city: impl Into<String>, message: impl ToString) -> Self {
        ScanError::City {
            city: city.into(),
            message: message.to_string(),
        }
    }

    pub fn general(message: impl ToString) -> Self {
        ScanError::General {
            message: message.to_string(),
        }
    }
}

/// Outcome of one full scan over all subscribed locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub cities_checked: usize,
    pub alerts_triggered: usize,
    pub messages_sent: usize,
    pub errors: Vec<ScanError>,
}
