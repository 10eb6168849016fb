//! Campaign credential storage.
//!
//! The selected campaign is remembered as three entries in a
//! [`KeyValueStore`]: the bearer token, the outbound ID and the campaign ID.
//! Tokens are never logged - [`CampaignCredentials`] implements a custom
//! `Debug` that redacts the secret.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::error::AppError;
use crate::storage::KeyValueStore;

/// Storage key for the campaign bearer token.
pub const BEARER_TOKEN_KEY: &str = "analytics_bearer_token";

/// Storage key for the campaign outbound ID.
pub const OUTBOUND_ID_KEY: &str = "analytics_outbound_id";

/// Storage key for the registry campaign ID.
pub const CAMPAIGN_ID_KEY: &str = "analytics_campaign_id";

/// Credential pair needed to act on one outbound campaign.
///
/// # Security
/// The bearer token is wrapped in `SecretString`; `Debug` prints a placeholder.
#[derive(Clone)]
pub struct CampaignCredentials {
    pub outbound_id: String,
    pub bearer_token: SecretString,
    /// Registry ID of the campaign, when it was picked from the registry.
    pub campaign_id: Option<String>,
}

impl fmt::Debug for CampaignCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CampaignCredentials")
            .field("outbound_id", &self.outbound_id)
            .field("bearer_token", &"[REDACTED]")
            .field("campaign_id", &self.campaign_id)
            .finish()
    }
}

impl CampaignCredentials {
    pub fn new(outbound_id: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            outbound_id: outbound_id.into(),
            bearer_token: SecretString::from(bearer_token.into()),
            campaign_id: None,
        }
    }

    pub fn with_campaign_id(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }
}

/// Reads, writes and forgets the selected campaign's credentials.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the stored credentials, or `None` unless both the token and
    /// the outbound ID are present and non-empty.
    pub async fn load(&self) -> Result<Option<CampaignCredentials>, AppError> {
        let token = self.store.get(BEARER_TOKEN_KEY).await?;
        let outbound_id = self.store.get(OUTBOUND_ID_KEY).await?;

        let (token, outbound_id) = match (token, outbound_id) {
            (Some(t), Some(o)) if !t.trim().is_empty() && !o.trim().is_empty() => (t, o),
            _ => return Ok(None),
        };

        let campaign_id = self
            .store
            .get(CAMPAIGN_ID_KEY)
            .await?
            .filter(|id| !id.is_empty());

        Ok(Some(CampaignCredentials {
            outbound_id,
            bearer_token: SecretString::from(token),
            campaign_id,
        }))
    }

    /// Persists the credentials, replacing any previous selection.
    pub async fn save(&self, creds: &CampaignCredentials) -> Result<(), AppError> {
        self.store
            .set(BEARER_TOKEN_KEY, creds.bearer_token.expose_secret())
            .await?;
        self.store.set(OUTBOUND_ID_KEY, &creds.outbound_id).await?;

        match &creds.campaign_id {
            Some(id) => self.store.set(CAMPAIGN_ID_KEY, id).await?,
            None => self.store.remove(CAMPAIGN_ID_KEY).await?,
        }

        info!("[CREDS] Campaign selected (outbound {})", creds.outbound_id);
        Ok(())
    }

    /// Removes all three entries. Idempotent.
    pub async fn invalidate(&self) -> Result<(), AppError> {
        self.store.remove(BEARER_TOKEN_KEY).await?;
        self.store.remove(OUTBOUND_ID_KEY).await?;
        self.store.remove(CAMPAIGN_ID_KEY).await?;

        info!("[CREDS] Stored campaign credentials cleared");
        Ok(())
    }
}
