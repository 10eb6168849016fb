//! White-label registry client: users and the campaigns they own.

use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::config::clean_prefix;
use crate::error::AppError;
use crate::http::{self, HttpTransport, LoggingMode, RawResponse};
use crate::storage::CampaignCredentials;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// A campaign as stored in the registry.
///
/// The bearer token is never serialized back out and `Debug` redacts it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignData {
    pub id: String,
    #[serde(default)]
    pub campaign_name: String,
    pub outbound_id: String,
    #[serde(skip_serializing)]
    pub bearer_token: SecretString,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl fmt::Debug for CampaignData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CampaignData")
            .field("id", &self.id)
            .field("campaign_name", &self.campaign_name)
            .field("outbound_id", &self.outbound_id)
            .field("bearer_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl CampaignData {
    /// Credentials for acting on this campaign.
    pub fn credentials(&self) -> CampaignCredentials {
        CampaignCredentials {
            outbound_id: self.outbound_id.trim().to_string(),
            bearer_token: self.bearer_token.clone(),
            campaign_id: Some(self.id.clone()),
        }
    }
}

/// A registry user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub oauth_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// WhiteLabelClient
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WhiteLabelClient {
    transport: HttpTransport,
    /// Path prefix for user lookups, e.g. `api/v1`.
    prefix: String,
}

impl WhiteLabelClient {
    pub fn new(base_url: &str, prefix: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            transport: HttpTransport::new(base_url, "WL", timeout)?,
            prefix: clean_prefix(prefix),
        })
    }

    pub fn logging_mode(&self) -> LoggingMode {
        self.transport.logging_mode()
    }

    /// Updates the logging mode for URL sanitization.
    pub fn with_logging_mode(mut self, mode: LoggingMode) -> Self {
        self.transport = self.transport.with_logging_mode(mode);
        self
    }

    fn get_request(&self, segments: &[&str]) -> Result<(reqwest::RequestBuilder, Url), AppError> {
        let (request, url) = self.transport.request(Method::GET, segments)?;
        let request = request
            .header(CACHE_CONTROL, "no-cache")
            .header(ACCEPT, "application/json");
        Ok((request, url))
    }

    async fn get(&self, segments: &[&str]) -> Result<reqwest::Response, AppError> {
        let (request, url) = self.get_request(segments)?;
        self.transport.execute(&Method::GET, request, &url).await
    }

    async fn forward(&self, segments: &[&str]) -> Result<RawResponse, AppError> {
        let (request, url) = self.get_request(segments)?;
        self.transport.execute_raw(&Method::GET, request, &url).await
    }

    fn user_segments<'a>(&'a self, user_id: &'a str) -> Vec<&'a str> {
        self.prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .chain(["getUser", user_id])
            .collect()
    }

    /// Campaigns registered for a user's email.
    ///
    /// A 404 or a body that is not an array yields an empty list.
    pub async fn campaigns_by_email(&self, email: &str) -> Result<Vec<CampaignData>, AppError> {
        let response = self.get(&["users", "email", email, "userdata"]).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(registry_error(status.as_u16()));
        }

        let text = http::read_text(response).await?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|_| AppError::MalformedResponse("registry answered with non-JSON".into()))?;

        if !value.is_array() {
            return Ok(Vec::new());
        }

        let campaigns: Vec<CampaignData> = serde_json::from_value(value)
            .map_err(|e| AppError::MalformedResponse(format!("unexpected campaign shape: {}", e)))?;

        info!("[WL] Loaded {} campaigns", campaigns.len());
        Ok(campaigns)
    }

    /// A single registry user.
    pub async fn user(&self, user_id: &str) -> Result<UserData, AppError> {
        let response = self.get(&self.user_segments(user_id)).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("user".into()));
        }
        if !status.is_success() {
            return Err(registry_error(status.as_u16()));
        }

        let text = http::read_text(response).await?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedResponse(format!("unexpected user shape: {}", e)))
    }

    // ── Raw forwarding ───────────────────────────────────────────────────────

    pub async fn forward_campaigns(&self, email: &str) -> Result<RawResponse, AppError> {
        self.forward(&["users", "email", email, "userdata"]).await
    }

    pub async fn forward_user(&self, user_id: &str) -> Result<RawResponse, AppError> {
        self.forward(&self.user_segments(user_id)).await
    }
}

fn registry_error(status: u16) -> AppError {
    if (500..600).contains(&status) {
        AppError::UpstreamServer
    } else {
        AppError::UpstreamStatus { status }
    }
}
