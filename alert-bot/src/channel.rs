//! Outbound messaging channel: trait, lifecycle events, and a recording fake.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ChannelFault, SendError};

// ------------------------------------------------------------------ //
//  Events                                                             //
// ------------------------------------------------------------------ //

/// Lifecycle events emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A pairing challenge for the operator to scan.
    Qr { code: String },
    Authenticated,
    Ready,
    Disconnected { reason: String },
    AuthFailure { message: String },
}

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Account-based chat transport. Events arrive separately on an mpsc channel.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Start (or restart) the session; pairing and readiness follow as events.
    async fn initialize(&self) -> Result<(), ChannelFault>;

    async fn send(&self, address: &str, text: &str) -> Result<(), SendError>;
}

// ------------------------------------------------------------------ //
//  RecordingChannel (for tests)                                       //
// ------------------------------------------------------------------ //

/// A message accepted by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub text: String,
    pub at: tokio::time::Instant,
}

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<SentMessage>,
    attempts: usize,
    failing: HashSet<String>,
    init_calls: usize,
    init_failures_left: usize,
}

/// In-memory channel that records sends and can be told to fail.
#[derive(Debug, Default, Clone)]
pub struct RecordingChannel {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `address` fails.
    pub fn fail_address(&self, address: &str) {
        self.lock().failing.insert(address.to_string());
    }

    /// The next `n` calls to `initialize` fail.
    pub fn fail_next_inits(&self, n: usize) {
        self.lock().init_failures_left = n;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    /// Sends attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn init_calls(&self) -> usize {
        self.lock().init_calls
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn initialize(&self) -> Result<(), ChannelFault> {
        let mut rec = self.lock();
        rec.init_calls += 1;
        if rec.init_failures_left > 0 {
            rec.init_failures_left -= 1;
            return Err(ChannelFault::Init("browser session failed to launch".into()));
        }
        Ok(())
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), SendError> {
        let mut rec = self.lock();
        rec.attempts += 1;
        if rec.failing.contains(address) {
            return Err(SendError::new(address, "recipient not on network"));
        }
        rec.sent.push(SentMessage {
            address: address.to_string(),
            text: text.to_string(),
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }
}
