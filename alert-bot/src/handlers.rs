//! Axum HTTP handlers for the health surface.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::config::ConfigSummary;
use crate::models::ScanReport;
use crate::status::{ChannelState, StatusHandle};

// ------------------------------------------------------------------ //
//  Shared application state                                           //
// ------------------------------------------------------------------ //

/// Shared state injected into every Axum handler via `State`.
pub struct AppState {
    pub status: StatusHandle,
    pub config: ConfigSummary,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ------------------------------------------------------------------ //
//  Response models                                                    //
// ------------------------------------------------------------------ //

#[derive(Debug, Serialize)]
pub struct HealthErrors {
    pub last_disconnect: Option<DateTime<Utc>>,
    pub disconnect_reason: Option<String>,
    pub auth_error: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub authenticated: bool,
    pub channel_state: ChannelState,
    pub uptime_seconds: i64,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_scan_result: Option<ScanReport>,
    pub total_alerts_sent: u64,
    pub config: ConfigSummary,
    pub errors: HealthErrors,
}

// ------------------------------------------------------------------ //
//  GET /health                                                        //
// ------------------------------------------------------------------ //

/// 200 while the channel is ready, 503 otherwise.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = state.status.snapshot().await;
    let ready = snap.channel.state.is_ready();

    let body = HealthResponse {
        status: if ready { "running" } else { "not_ready" },
        authenticated: snap.channel.authenticated,
        channel_state: snap.channel.state,
        uptime_seconds: snap.uptime_seconds(Utc::now()),
        last_scan: snap.last_scan,
        total_alerts_sent: snap.total_alerts_sent(),
        last_scan_result: snap.last_scan_result,
        config: state.config.clone(),
        errors: HealthErrors {
            last_disconnect: snap.channel.last_disconnect,
            disconnect_reason: snap.channel.disconnect_reason,
            auth_error: snap.channel.auth_error,
        },
    };

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

// ------------------------------------------------------------------ //
//  GET /                                                              //
// ------------------------------------------------------------------ //

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = state.status.snapshot().await;
    let yes_no = |b: bool| if b { "YES" } else { "NO" };
    let last_scan = snap
        .last_scan
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "Never".to_string());

    Html(format!(
        r#"<html>
<head><title>HazeRadar WhatsApp Alert Bot</title></head>
<body>
    <h1>HazeRadar WhatsApp Alert System</h1>
    <p><strong>Status:</strong> {status}</p>
    <p><strong>Authenticated:</strong> {auth}</p>
    <p><strong>Total Alerts Sent:</strong> {total}</p>
    <p><strong>Last Scan:</strong> {last_scan}</p>
    <p><a href="/health">View Health Check (JSON)</a></p>
</body>
</html>"#,
        status = if snap.channel.state.is_ready() {
            "RUNNING"
        } else {
            "NOT READY"
        },
        auth = yes_no(snap.channel.authenticated),
        total = snap.total_alerts_sent(),
    ))
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;

    fn app(status: StatusHandle) -> Router {
        router(Arc::new(AppState {
            status,
            config: AppConfig::default().summary(),
        }))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let code = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (code, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_ready_returns_503() {
        let (code, body) = get_json(app(StatusHandle::new()), "/health").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["last_scan"], serde_json::Value::Null);
        assert_eq!(body["last_scan_result"], serde_json::Value::Null);
        assert_eq!(body["config"]["pm25_threshold"], 20.0);
        assert_eq!(body["config"]["forecast_hour"], 12);
        assert_eq!(body["config"]["scan_interval_hours"], 3.0);
    }

    #[tokio::test]
    async fn ready_returns_200_with_latest_report() {
        let status = StatusHandle::new();
        status
            .update_channel(|c| {
                c.state = ChannelState::Ready;
                c.authenticated = true;
            })
            .await;
        status.record_scan_started(Utc::now()).await;
        status.add_sent(4).await;
        status
            .publish_report(ScanReport {
                cities_checked: 3,
                alerts_triggered: 1,
                messages_sent: 4,
                errors: vec![crate::models::ScanError::city("Jambi", "timeout")],
            })
            .await;

        let (code, body) = get_json(app(status), "/health").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["channel_state"], "ready");
        assert_eq!(body["total_alerts_sent"], 4);
        assert_eq!(body["last_scan_result"]["cities_checked"], 3);
        assert_eq!(body["last_scan_result"]["errors"][0]["city"], "Jambi");
        assert!(body["last_scan"].is_string());
    }

    #[tokio::test]
    async fn authenticated_flag_tracks_status_not_readiness() {
        let status = StatusHandle::new();
        status
            .update_channel(|c| {
                c.state = ChannelState::Disconnected;
                c.authenticated = true;
                c.disconnect_reason = Some("NAVIGATION".into());
            })
            .await;

        let (code, body) = get_json(app(status), "/health").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["errors"]["disconnect_reason"], "NAVIGATION");
    }

    #[tokio::test]
    async fn index_links_to_health() {
        let resp = app(StatusHandle::new())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec())
            .unwrap();
        assert!(html.contains("NOT READY"));
        assert!(html.contains("Never"));
        assert!(html.contains(r#"href="/health""#));
    }
}
