//! Pearl calling API client.
//!
//! Every operation authenticates with the campaign bearer token. Tokens are
//! accepted with or without a leading `Bearer ` and never logged.

use std::time::Duration;

use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::http::{self, HttpTransport, LoggingMode, RawResponse};
use crate::pearl::types::{
    AnalyticsData, CallDetails, CallPersonalization, CallsFilters, CallsResponse,
    CampaignActivity, DateRange, PlaceCallRequest, PlacedCall,
};
use crate::storage::CampaignCredentials;

/// Analytics requests give up sooner than the client-wide timeout.
const ANALYTICS_TIMEOUT: Duration = Duration::from_secs(15);

/// Strips surrounding whitespace and a leading `Bearer ` (any case).
pub fn normalize_bearer(token: &str) -> &str {
    let trimmed = token.trim();
    match trimmed.get(..6) {
        Some(prefix)
            if prefix.eq_ignore_ascii_case("bearer")
                && trimmed[6..].starts_with(char::is_whitespace) =>
        {
            trimmed[6..].trim_start()
        }
        _ => trimmed,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireCampaign {
    status: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// PearlClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Pearl calling API.
#[derive(Debug, Clone)]
pub struct PearlClient {
    transport: HttpTransport,
}

impl PearlClient {
    /// Creates a client for the given API base URL (e.g. `https://api.nlpearl.ai/v2`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            transport: HttpTransport::new(base_url, "PEARL", timeout)?,
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

    /// Sends an authenticated request with an optional JSON body.
    async fn send<B: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        token: &str,
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, AppError> {
        let (mut request, url) = self.transport.request(method.clone(), segments)?;
        request = request.bearer_auth(normalize_bearer(token));

        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        self.transport.execute(&method, request, &url).await
    }

    /// Same as [`send`](Self::send), returning the raw status and body.
    async fn send_raw<B: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        token: &str,
        body: Option<&B>,
    ) -> Result<RawResponse, AppError> {
        let response = self.send(method, segments, token, body, None).await?;
        let status = response.status().as_u16();
        let text = http::read_text(response).await?;

        Ok(RawResponse {
            status,
            body: http::parse_json_safe(&text),
        })
    }

    // ── Calls ────────────────────────────────────────────────────────────────

    /// Places one outbound call: `POST /Pearl/{outboundId}/Call`.
    ///
    /// # Errors
    ///
    /// - Non-success status → [`AppError::from_upstream_status`]
    /// - Success without a non-empty `id` → `AppError::MalformedResponse`
    pub async fn place_call(
        &self,
        creds: &CampaignCredentials,
        to: &str,
        personalization: CallPersonalization,
    ) -> Result<PlacedCall, AppError> {
        let body = PlaceCallRequest {
            to: to.to_string(),
            call_data: personalization,
        };

        let response = self
            .send(
                Method::POST,
                &["Pearl", creds.outbound_id.trim(), "Call"],
                creds.bearer_token.expose_secret(),
                Some(&body),
                None,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::from_upstream_status(status.as_u16()));
        }

        let text = http::read_text(response).await?;
        let placed: PlacedCall = serde_json::from_str(&text)
            .map_err(|_| AppError::MalformedResponse("call response is not a call object".into()))?;

        if placed.id.trim().is_empty() {
            return Err(AppError::MalformedResponse("no request id in response".into()));
        }

        Ok(placed)
    }

    /// Lists calls of the campaign: `POST /Pearl/{id}/Calls`.
    pub async fn list_calls(
        &self,
        creds: &CampaignCredentials,
        filters: &CallsFilters,
    ) -> Result<CallsResponse, AppError> {
        let response = self
            .send(
                Method::POST,
                &["Pearl", creds.outbound_id.trim(), "Calls"],
                creds.bearer_token.expose_secret(),
                Some(&filters.to_upstream()),
                None,
            )
            .await?;

        decode(response).await
    }

    /// Fetches a single call: `GET /Call/{id}`.
    pub async fn call_details(&self, token: &str, call_id: &str) -> Result<CallDetails, AppError> {
        let response = self
            .send::<()>(Method::GET, &["Call", call_id], token, None, None)
            .await?;

        decode(response).await
    }

    // ── Campaign ─────────────────────────────────────────────────────────────

    /// Reads the campaign on/off state: `GET /Pearl/{id}`.
    pub async fn campaign_status(
        &self,
        creds: &CampaignCredentials,
    ) -> Result<CampaignActivity, AppError> {
        let response = self
            .send::<()>(
                Method::GET,
                &["Pearl", creds.outbound_id.trim()],
                creds.bearer_token.expose_secret(),
                None,
                None,
            )
            .await?;

        let wire: WireCampaign = decode(response).await?;
        let activity = CampaignActivity::from_status(wire.status);

        if let CampaignActivity::Unknown(status) = activity {
            warn!("[PEARL] Unexpected campaign status {:?}", status);
        }

        Ok(activity)
    }

    /// Turns the campaign on or off: `POST /Pearl/{id}/Active`.
    pub async fn set_campaign_active(
        &self,
        creds: &CampaignCredentials,
        is_active: bool,
    ) -> Result<(), AppError> {
        let response = self
            .send(
                Method::POST,
                &["Pearl", creds.outbound_id.trim(), "Active"],
                creds.bearer_token.expose_secret(),
                Some(&serde_json::json!({ "isActive": is_active })),
                None,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::from_upstream_status(status.as_u16()));
        }

        info!(
            "[PEARL] Campaign {} set {}",
            creds.outbound_id,
            if is_active { "active" } else { "inactive" }
        );
        Ok(())
    }

    /// Fetches campaign analytics for a window: `POST /Pearl/{id}/Analytics`.
    ///
    /// Unlike the other operations, an upstream `message` (or the raw body)
    /// is surfaced for statuses without a dedicated error.
    pub async fn analytics(
        &self,
        creds: &CampaignCredentials,
        range: &DateRange,
    ) -> Result<AnalyticsData, AppError> {
        let response = self
            .send(
                Method::POST,
                &["Pearl", creds.outbound_id.trim(), "Analytics"],
                creds.bearer_token.expose_secret(),
                Some(range),
                Some(ANALYTICS_TIMEOUT),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return decode(response).await;
        }

        let code = status.as_u16();
        if matches!(code, 401 | 403 | 404) {
            return Err(AppError::from_upstream_status(code));
        }

        let body = http::read_text(response).await.unwrap_or_default();
        Err(analytics_error(code, &body))
    }

    /// Probes the credentials with a one-row query: `POST /Outbound/{id}/Calls`.
    pub async fn validate(&self, outbound_id: &str, token: &str) -> Result<RawResponse, AppError> {
        self.send_raw(
            Method::POST,
            &["Outbound", outbound_id, "Calls"],
            token,
            Some(&validation_probe()),
        )
        .await
    }

    // ── Raw forwarding ───────────────────────────────────────────────────────

    /// `POST /Pearl/{id}/Calls`, status and body passed through.
    pub async fn forward_list_calls(
        &self,
        outbound_id: &str,
        token: &str,
        filters: &CallsFilters,
    ) -> Result<RawResponse, AppError> {
        self.send_raw(
            Method::POST,
            &["Pearl", outbound_id, "Calls"],
            token,
            Some(&filters.to_upstream()),
        )
        .await
    }

    /// `GET /Call/{id}`, status and body passed through.
    pub async fn forward_call_details(
        &self,
        call_id: &str,
        token: &str,
    ) -> Result<RawResponse, AppError> {
        self.send_raw::<()>(Method::GET, &["Call", call_id], token, None)
            .await
    }
}

/// One-row query used to check that a token can read the outbound campaign.
fn validation_probe() -> serde_json::Value {
    serde_json::json!({
        "sortProp": "startTime",
        "isAscending": false,
        "tags": [],
        "status": [],
        "statuses": [],
        "conversationStatus": [],
        "conversationStatuses": [],
        "limit": 1,
        "skip": 0,
    })
}

/// Builds the error for a failed analytics request from its body.
fn analytics_error(status: u16, body: &str) -> AppError {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return AppError::from_upstream_status(status);
    }

    match serde_json::from_str::<WireError>(trimmed) {
        Ok(WireError {
            message: Some(message),
        }) if !message.trim().is_empty() => AppError::UpstreamMessage(message),
        _ => AppError::UpstreamMessage(trimmed.to_string()),
    }
}

/// Maps non-success statuses and decodes a JSON body.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::from_upstream_status(status.as_u16()));
    }

    let text = http::read_text(response).await?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::MalformedResponse(format!("unexpected response shape: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
