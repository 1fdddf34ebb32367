//! HTTP client for the WhatsApp web bridge sidecar.
//!
//! The sidecar owns the browser session; this side only starts it, submits
//! messages, and long-polls lifecycle events.
//!
//! | Route                | Purpose                          |
//! |----------------------|----------------------------------|
//! | `POST /session/start`| (re)initialize the session       |
//! | `POST /messages`     | `{chat_id, text}`                |
//! | `GET /events`        | JSON array of tagged events      |
//!
//! The sidecar forwards every event its browser client raises. Types the bot
//! has no use for (`change_state`, `loading_screen`, ...) are dropped one by
//! one; they never spoil the rest of the batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, MessagingChannel};
use crate::error::{ChannelFault, SendError};

const POLL_TIMEOUT: Duration = Duration::from_secs(35);
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct BridgeChannel {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl BridgeChannel {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// One long-poll round. An empty vec means the poll window elapsed.
    pub async fn poll_events(&self) -> reqwest::Result<Vec<ChannelEvent>> {
        let raw: Vec<Value> = self
            .request(reqwest::Method::GET, "/events")
            .timeout(POLL_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(decode_events(raw))
    }
}

/// Keep the events the lifecycle understands, in order.
pub fn decode_events(raw: Vec<Value>) -> Vec<ChannelEvent> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<ChannelEvent>(value.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                let kind = value.get("type").and_then(Value::as_str).unwrap_or("<untyped>");
                debug!(event_type = kind, error = %e, "ignoring bridge event");
                None
            }
        })
        .collect()
}

#[async_trait]
impl MessagingChannel for BridgeChannel {
    async fn initialize(&self) -> Result<(), ChannelFault> {
        self.request(reqwest::Method::POST, "/session/start")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChannelFault::Init(e.to_string()))?;
        Ok(())
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), SendError> {
        self.request(reqwest::Method::POST, "/messages")
            .json(&OutgoingMessage {
                chat_id: address,
                text,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SendError::new(address, e.to_string()))?;
        Ok(())
    }
}

/// Forward bridge events into `tx` until the receiver is dropped.
///
/// Losing the bridge is reported once as a `Disconnected` event; polling
/// continues so a recovered bridge resumes delivering events.
pub async fn run_event_pump(bridge: std::sync::Arc<BridgeChannel>, tx: mpsc::Sender<ChannelEvent>) {
    let mut reachable = true;
    loop {
        match bridge.poll_events().await {
            Ok(events) => {
                if !reachable {
                    info!("messaging bridge reachable again");
                    reachable = true;
                }
                for event in events {
                    debug!(?event, "bridge event");
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.is_timeout() => continue,
            // The bridge answered; only its body was unusable.
            Err(e) if e.is_decode() => {
                warn!(error = %e, "malformed bridge event batch");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
            Err(e) => {
                warn!(error = %e, "messaging bridge poll failed");
                if reachable {
                    reachable = false;
                    let event = ChannelEvent::Disconnected {
                        reason: format!("bridge unreachable: {e}"),
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}
