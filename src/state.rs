//! Application state shared by the commands and the proxy.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::Settings;
use crate::dialer::{BulkDispatcher, PearlCallInvoker};
use crate::error::AppError;
use crate::leads::LeadStore;
use crate::notify::Notifier;
use crate::pearl::PearlClient;
use crate::storage::{CredentialStore, Database, KeyValueStore};
use crate::whitelabel::{CampaignData, WhiteLabelClient};

// ─────────────────────────────────────────────────────────────────────────────
// Application State
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a command needs. One instance per running shell.
pub struct AppState {
    pub settings: Settings,
    /// Settings table and call history.
    pub db: Arc<Database>,
    pub credentials: CredentialStore,
    pub leads: LeadStore,
    pub pearl: PearlClient,
    pub whitelabel: WhiteLabelClient,
    pub dialer: BulkDispatcher,
    pub notifier: Notifier,
    /// Campaigns last loaded for the signed-in user.
    campaigns: RwLock<Vec<CampaignData>>,
}

impl AppState {
    /// Opens the database and keeps campaign credentials in its settings table.
    pub async fn init(settings: Settings, notifier: Notifier) -> Result<Self, AppError> {
        let db = Arc::new(Database::init(settings.db_path.clone()).await?);
        let backend: Arc<dyn KeyValueStore> = db.clone();
        Self::with_credential_backend(settings, db, backend, notifier)
    }

    /// Builds the state with a chosen credential backend (keychain, memory).
    pub fn with_credential_backend(
        settings: Settings,
        db: Arc<Database>,
        credential_backend: Arc<dyn KeyValueStore>,
        notifier: Notifier,
    ) -> Result<Self, AppError> {
        let credentials = CredentialStore::new(credential_backend);
        let pearl = PearlClient::new(&settings.pearl_api_base_url, settings.request_timeout)?
            .with_logging_mode(settings.logging_mode);
        let whitelabel = WhiteLabelClient::new(
            &settings.white_label_api_base_url,
            &settings.white_label_api_prefix,
            settings.request_timeout,
        )?
        .with_logging_mode(settings.logging_mode);

        let leads = LeadStore::new();
        let invoker = PearlCallInvoker::new(pearl.clone(), credentials.clone(), db.clone());
        let dialer = BulkDispatcher::new(Arc::new(invoker), leads.clone(), notifier.clone());

        info!("[STATE] Ready, database at {}", db.db_path().display());

        Ok(Self {
            settings,
            db,
            credentials,
            leads,
            pearl,
            whitelabel,
            dialer,
            notifier,
            campaigns: RwLock::new(Vec::new()),
        })
    }

    pub async fn campaigns(&self) -> Vec<CampaignData> {
        self.campaigns.read().await.clone()
    }

    pub async fn set_campaigns(&self, campaigns: Vec<CampaignData>) {
        *self.campaigns.write().await = campaigns;
    }

    pub async fn find_campaign(&self, campaign_id: &str) -> Option<CampaignData> {
        self.campaigns
            .read()
            .await
            .iter()
            .find(|c| c.id == campaign_id)
            .cloned()
    }
}
