//! HazeRadar air-quality alert bot.
//!
//! Periodically scans PM2.5 forecasts for every subscribed location and
//! messages subscribers over WhatsApp when the forecast at the configured
//! horizon exceeds the threshold.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod forecast;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod pairing;
pub mod phone;
pub mod reconnect;
pub mod scheduler;
pub mod secrets;
pub mod status;
pub mod threshold;
