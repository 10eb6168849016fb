//! Campaign commands: registry lookup, selection, on/off state, calls and
//! analytics of the selected campaign.

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analytics::{self, SentimentShare};
use crate::error::AppError;
use crate::notify::NotificationLevel;
use crate::pearl::types::CostPoint;
use crate::pearl::{AnalyticsData, CallDetails, CallsFilters, CallsResponse, CampaignActivity, DateRange};
use crate::state::AppState;
use crate::storage::CampaignCredentials;
use crate::whitelabel::CampaignData;

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// The selected campaign, without its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCampaign {
    pub outbound_id: String,
    pub campaign_id: Option<String>,
}

impl From<&CampaignCredentials> for SelectedCampaign {
    fn from(creds: &CampaignCredentials) -> Self {
        Self {
            outbound_id: creds.outbound_id.clone(),
            campaign_id: creds.campaign_id.clone(),
        }
    }
}

/// Analytics of the selected campaign plus the figures derived locally.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub range: DateRange,
    pub data: AnalyticsData,
    pub cost_timeline: Vec<CostPoint>,
    pub sentiment: SentimentShare,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn require_credentials(state: &AppState) -> Result<CampaignCredentials, AppError> {
    state
        .credentials
        .load()
        .await?
        .ok_or(AppError::NoCampaignSelected)
}

/// Forgets the stored credentials when `err` says they are stale.
async fn forget_if_stale(state: &AppState, err: &AppError) {
    if err.invalidates_credentials() {
        warn!("[CAMPAIGN] Clearing credentials after: {}", err);
        if let Err(e) = state.credentials.invalidate().await {
            error!("[CAMPAIGN] Failed to clear credentials: {}", e);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Loads the campaigns registered for `email` and caches them for selection.
pub async fn load_campaigns(state: &AppState, email: &str) -> Result<Vec<CampaignData>, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::NotFound("email".into()));
    }

    let campaigns = state.whitelabel.campaigns_by_email(email).await?;
    state.set_campaigns(campaigns.clone()).await;
    Ok(campaigns)
}

/// Makes a loaded campaign the one calls and analytics act on.
pub async fn select_campaign(state: &AppState, campaign_id: &str) -> Result<SelectedCampaign, AppError> {
    let campaign = state
        .find_campaign(campaign_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("campaign {}", campaign_id)))?;

    let creds = campaign.credentials();
    state.credentials.save(&creds).await?;

    info!("[CAMPAIGN] Selected {}", campaign.id);
    state.notifier.success(
        "Campaign selected",
        format!("{} is now active for calls", campaign.campaign_name),
    );
    Ok(SelectedCampaign::from(&creds))
}

/// Stores a credential pair entered by hand (no registry lookup).
pub async fn set_campaign_credentials(
    state: &AppState,
    outbound_id: &str,
    bearer_token: &str,
) -> Result<SelectedCampaign, AppError> {
    let creds = CampaignCredentials::new(
        outbound_id.trim(),
        crate::pearl::normalize_bearer(bearer_token),
    );
    if creds.outbound_id.is_empty() {
        return Err(AppError::NoCampaignSelected);
    }

    state.credentials.save(&creds).await?;
    Ok(SelectedCampaign::from(&creds))
}

pub async fn selected_campaign(state: &AppState) -> Result<Option<SelectedCampaign>, AppError> {
    Ok(state
        .credentials
        .load()
        .await?
        .as_ref()
        .map(SelectedCampaign::from))
}

pub async fn clear_campaign(state: &AppState) -> Result<(), AppError> {
    state.credentials.invalidate().await
}

/// Whether the selected campaign is dialing.
pub async fn campaign_status(state: &AppState) -> Result<CampaignActivity, AppError> {
    let creds = require_credentials(state).await?;

    match state.pearl.campaign_status(&creds).await {
        Ok(activity) => Ok(activity),
        Err(e) => {
            forget_if_stale(state, &e).await;
            Err(e)
        }
    }
}

/// Flips the selected campaign on or off. An unknown state is turned on.
pub async fn toggle_campaign(state: &AppState) -> Result<CampaignActivity, AppError> {
    let creds = require_credentials(state).await?;

    let result = async {
        let current = state.pearl.campaign_status(&creds).await?;
        let activate = !current.is_active().unwrap_or(false);
        state.pearl.set_campaign_active(&creds, activate).await?;
        Ok::<_, AppError>(activate)
    }
    .await;

    match result {
        Ok(true) => {
            state.notifier.success("Campaign activated", "The campaign is now dialing");
            Ok(CampaignActivity::Active)
        }
        Ok(false) => {
            state.notifier.success("Campaign paused", "The campaign stopped dialing");
            Ok(CampaignActivity::Inactive)
        }
        Err(e) => {
            forget_if_stale(state, &e).await;
            state.notifier.app_error(NotificationLevel::Error, &e);
            Err(e)
        }
    }
}

/// Lists calls of the selected campaign, re-filtered locally.
pub async fn list_calls(state: &AppState, filters: &CallsFilters) -> Result<CallsResponse, AppError> {
    let creds = require_credentials(state).await?;

    let mut response = match state.pearl.list_calls(&creds, filters).await {
        Ok(response) => response,
        Err(e) => {
            forget_if_stale(state, &e).await;
            return Err(e);
        }
    };

    response.results = analytics::apply_local_filters(std::mem::take(&mut response.results), filters);
    Ok(response)
}

pub async fn call_details(state: &AppState, call_id: &str) -> Result<CallDetails, AppError> {
    let creds = require_credentials(state).await?;
    state
        .pearl
        .call_details(creds.bearer_token.expose_secret(), call_id)
        .await
}

/// Fetches analytics for `range` (default: the last 30 days).
///
/// Unauthorized, forbidden and not-found answers clear the stored
/// credentials.
pub async fn load_analytics(
    state: &AppState,
    range: Option<DateRange>,
) -> Result<AnalyticsReport, AppError> {
    let creds = require_credentials(state).await?;
    let range = range.unwrap_or_else(|| analytics::default_range(Utc::now()));

    match state.pearl.analytics(&creds, &range).await {
        Ok(data) => {
            let cost_timeline = analytics::cost_timeline(&data);
            let sentiment = analytics::sentiment_percentages(&data.calls_sentiment_overview);
            Ok(AnalyticsReport {
                range,
                data,
                cost_timeline,
                sentiment,
            })
        }
        Err(e) => {
            if e.invalidates_credentials() || matches!(e, AppError::Forbidden) {
                warn!("[CAMPAIGN] Analytics rejected ({}), clearing credentials", e);
                state.credentials.invalidate().await?;
            }
            state.notifier.app_error(NotificationLevel::Error, &e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn with_campaign(server: &MockServer) -> (AppState, tempfile::TempDir) {
        Mock::given(method("GET"))
            .and(path("/users/email/ada@example.com/userdata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "c1",
                "campaignName": "Spring",
                "outboundId": " out-1 ",
                "bearerToken": "tok",
                "userId": "u1"
            }])))
            .mount(server)
            .await;

        let (state, _rx, dir) = test_state(&server.uri()).await;
        let campaigns = load_campaigns(&state, "ada@example.com").await.unwrap();
        assert_eq!(campaigns.len(), 1);
        select_campaign(&state, "c1").await.unwrap();
        (state, dir)
    }

    #[tokio::test]
    async fn select_persists_trimmed_credentials() {
        let server = MockServer::start().await;
        let (state, _dir) = with_campaign(&server).await;

        let selected = selected_campaign(&state).await.unwrap().unwrap();
        assert_eq!(selected.outbound_id, "out-1");
        assert_eq!(selected.campaign_id.as_deref(), Some("c1"));

        assert!(select_campaign(&state, "c2").await.is_err());

        clear_campaign(&state).await.unwrap();
        assert!(selected_campaign(&state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn manual_credentials_strip_bearer_prefix() {
        let (state, _rx, _dir) = test_state("http://127.0.0.1:9").await;

        set_campaign_credentials(&state, " out-2 ", "Bearer tok").await.unwrap();

        let creds = state.credentials.load().await.unwrap().unwrap();
        assert_eq!(creds.outbound_id, "out-2");
        assert_eq!(creds.bearer_token.expose_secret(), "tok");
    }

    #[tokio::test]
    async fn toggle_flips_active_campaign_off() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Pearl/out-1"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": 1 })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Pearl/out-1/Active"))
            .and(body_json(serde_json::json!({ "isActive": false })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (state, _dir) = with_campaign(&server).await;

        assert_eq!(campaign_status(&state).await.unwrap(), CampaignActivity::Active);
        assert_eq!(toggle_campaign(&state).await.unwrap(), CampaignActivity::Inactive);
    }

    #[tokio::test]
    async fn status_not_found_clears_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Pearl/out-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (state, _dir) = with_campaign(&server).await;

        assert!(matches!(
            campaign_status(&state).await,
            Err(AppError::CampaignNotFound)
        ));
        assert!(selected_campaign(&state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn analytics_report_includes_cost_timeline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Pearl/out-1/Analytics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "callsAverageTimeLine": [{ "date": "2025-03-01", "averageCallDuration": 150.0 }],
                "callsStatusTimeLine": [{ "date": "2025-03-01", "totalCalls": 4 }],
                "callsSentimentOverview": { "positive": 1, "negative": 1 }
            })))
            .mount(&server)
            .await;

        let (state, _dir) = with_campaign(&server).await;
        let range = DateRange {
            from: "2025-03-01T00:00:00Z".to_string(),
            to: "2025-03-02T00:00:00Z".to_string(),
        };

        let report = load_analytics(&state, Some(range.clone())).await.unwrap();

        assert_eq!(report.range, range);
        assert_eq!(report.cost_timeline.len(), 1);
        assert_eq!(report.cost_timeline[0].average_cost_per_call, 1.0);
        assert_eq!(report.cost_timeline[0].total_price, 4.0);
        assert_eq!(report.sentiment.positive, 50.0);
    }

    #[tokio::test]
    async fn analytics_forbidden_clears_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Pearl/out-1/Analytics"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let (state, _dir) = with_campaign(&server).await;

        assert!(matches!(load_analytics(&state, None).await, Err(AppError::Forbidden)));
        assert!(selected_campaign(&state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_calls_applies_local_filters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Pearl/out-1/Calls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 2,
                "totalCount": 2,
                "results": [
                    { "id": "a", "status": 4, "conversationStatus": 100 },
                    { "id": "b", "status": 6, "conversationStatus": 500 }
                ]
            })))
            .mount(&server)
            .await;

        let (state, _dir) = with_campaign(&server).await;
        let filters = CallsFilters {
            statuses: vec![4],
            ..CallsFilters::default()
        };

        let response = list_calls(&state, &filters).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].id, "a");
    }

    #[tokio::test]
    async fn commands_need_a_selected_campaign() {
        let (state, _rx, _dir) = test_state("http://127.0.0.1:9").await;

        assert!(matches!(campaign_status(&state).await, Err(AppError::NoCampaignSelected)));
        assert!(matches!(load_analytics(&state, None).await, Err(AppError::NoCampaignSelected)));
        assert!(matches!(
            list_calls(&state, &CallsFilters::default()).await,
            Err(AppError::NoCampaignSelected)
        ));
    }
}
