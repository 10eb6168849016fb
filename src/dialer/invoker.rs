//! Places a single call for a lead.
//!
//! The dispatcher only sees the [`CallInvoker`] trait; [`PearlCallInvoker`]
//! is the production implementation and tests provide fakes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::leads::Lead;
use crate::pearl::{CallPersonalization, PearlClient, PlacedCall};
use crate::storage::history::{INITIAL_CALL_STATUS, INITIAL_CONVERSATION_STATUS};
use crate::storage::{CallHistorySink, CallRecord, CredentialStore};

/// Caller number recorded when the upstream does not report one.
const UNKNOWN_CALLER: &str = "unknown";

// ─────────────────────────────────────────────────────────────────────────────
// CallInvoker Trait
// ─────────────────────────────────────────────────────────────────────────────

pub trait CallInvoker: Send + Sync {
    /// True when a campaign credential is available.
    fn is_configured<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AppError>> + Send + 'a>>;

    /// Places one call. Errors are per-call failures; none are fatal.
    fn place_call<'a>(
        &'a self,
        lead: &'a Lead,
    ) -> Pin<Box<dyn Future<Output = Result<PlacedCall, AppError>> + Send + 'a>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// PearlCallInvoker
// ─────────────────────────────────────────────────────────────────────────────

/// Places calls through the Pearl API with the stored campaign credentials.
///
/// Unauthorized and not-found answers clear the stored credentials; every
/// accepted call is appended to the call history.
#[derive(Clone)]
pub struct PearlCallInvoker {
    client: PearlClient,
    credentials: CredentialStore,
    history: Arc<dyn CallHistorySink>,
}

impl PearlCallInvoker {
    pub fn new(
        client: PearlClient,
        credentials: CredentialStore,
        history: Arc<dyn CallHistorySink>,
    ) -> Self {
        Self {
            client,
            credentials,
            history,
        }
    }

    async fn place(&self, lead: &Lead) -> Result<PlacedCall, AppError> {
        let creds = self
            .credentials
            .load()
            .await?
            .ok_or(AppError::NoCampaignSelected)?;

        let personalization = CallPersonalization {
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone().unwrap_or_default(),
        };

        let placed = match self
            .client
            .place_call(&creds, &lead.phone_number, personalization)
            .await
        {
            Ok(placed) => placed,
            Err(e) => {
                if e.invalidates_credentials() {
                    warn!("[DIALER] Call rejected ({}), clearing stored credentials", e);
                    if let Err(inv) = self.credentials.invalidate().await {
                        error!("[DIALER] Failed to clear credentials: {}", inv);
                    }
                }
                return Err(e);
            }
        };

        info!("[DIALER] Call placed for lead {} (request {})", lead.id, placed.id);

        let record = history_record(lead, &placed);
        if let Err(e) = self.history.append(record).await {
            error!("[DIALER] Failed to append call history: {}", e);
        }

        Ok(placed)
    }
}

impl CallInvoker for PearlCallInvoker {
    fn is_configured<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AppError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.credentials.load().await?.is_some()) })
    }

    fn place_call<'a>(
        &'a self,
        lead: &'a Lead,
    ) -> Pin<Box<dyn Future<Output = Result<PlacedCall, AppError>> + Send + 'a>> {
        Box::pin(self.place(lead))
    }
}

/// History entry for an accepted call.
fn history_record(lead: &Lead, placed: &PlacedCall) -> CallRecord {
    CallRecord {
        id: placed.id.clone(),
        lead_id: lead.id.clone(),
        lead_name: lead.full_name(),
        from: placed
            .from
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string()),
        to: placed
            .to
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| lead.phone_number.clone()),
        started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        status: INITIAL_CALL_STATUS.to_string(),
        conversation_status: INITIAL_CONVERSATION_STATUS.to_string(),
        queue_position: placed.queue_position.unwrap_or(0),
    }
}
