//! Secret resolution for the database URL and bridge token.
//!
//! Secrets come from Bitwarden Secrets Manager when `BWS_ACCESS_TOKEN` is
//! present, otherwise from plain environment variables.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Where a secret may be found.
#[derive(Debug, Clone, Copy)]
pub struct SecretRef {
    /// Env var holding the Bitwarden secret id.
    pub id_var: &'static str,
    /// Secret id used when `id_var` is unset.
    pub default_id: &'static str,
    /// Plain env var consulted when Bitwarden is unavailable.
    pub env_fallback: &'static str,
}

pub const DATABASE_URL: SecretRef = SecretRef {
    id_var: "BWS_DATABASE_URL_ID",
    default_id: "haze-alert-database-url",
    env_fallback: "DATABASE_URL",
};

pub const BRIDGE_TOKEN: SecretRef = SecretRef {
    id_var: "BWS_BRIDGE_TOKEN_ID",
    default_id: "haze-alert-bridge-token",
    env_fallback: "WHATSAPP_BRIDGE_TOKEN",
};

#[derive(Deserialize)]
struct BwsSecret {
    value: String,
}

pub struct SecretsClient {
    access_token: Option<String>,
    api_url: String,
    http: reqwest::Client,
}

impl SecretsClient {
    pub fn from_env() -> Self {
        Self {
            access_token: std::env::var("BWS_ACCESS_TOKEN").ok(),
            api_url: std::env::var("BWS_API_URL")
                .unwrap_or_else(|_| "https://api.bitwarden.com".to_string()),
            http: reqwest::Client::new(),
        }
    }

    /// Resolve `secret`, trying Bitwarden first when a token is configured.
    pub async fn resolve(&self, secret: SecretRef) -> Result<String> {
        if let Some(token) = &self.access_token {
            let id = std::env::var(secret.id_var).unwrap_or_else(|_| secret.default_id.to_string());
            match self.fetch(token, &id).await {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!(
                    secret_id = %id,
                    error = %e,
                    "Bitwarden lookup failed, falling back to env var"
                ),
            }
        }

        std::env::var(secret.env_fallback).with_context(|| {
            format!(
                "secret '{}' unavailable: Bitwarden lookup skipped or failed and {} is not set",
                secret.default_id, secret.env_fallback
            )
        })
    }

    async fn fetch(&self, token: &str, id: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/secrets/{}", self.api_url, id))
            .bearer_auth(token)
            .send()
            .await
            .context("request to Bitwarden Secrets Manager failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Bitwarden API returned status {}", resp.status()));
        }

        let body: BwsSecret = resp.json().await.context("malformed Bitwarden response")?;
        Ok(body.value)
    }
}
