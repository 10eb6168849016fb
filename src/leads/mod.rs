//! Lead store: the in-memory list of people to call.

pub mod export;
pub mod import;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of the last call attempt for a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Pending,
    Called,
    Failed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Called => "called",
            LeadStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone_number: String,
    pub status: LeadStatus,
    /// Request ID of the call that reached this lead.
    #[serde(default)]
    pub call_id: Option<String>,
}

impl Lead {
    /// Creates a pending lead with a fresh ID. Empty email becomes `None`.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.filter(|e| !e.trim().is_empty()),
            phone_number: phone_number.into(),
            status: LeadStatus::Pending,
            call_id: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status == LeadStatus::Pending
    }
}

/// A lead entered by hand.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone_number: String,
}

impl NewLead {
    /// First name, last name and phone are required.
    pub fn into_lead(self) -> Result<Lead, AppError> {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        let phone = self.phone_number.trim();

        if first.is_empty() || last.is_empty() || phone.is_empty() {
            return Err(AppError::MissingLeadFields);
        }

        Ok(Lead::new(
            first,
            last,
            self.email.map(|e| e.trim().to_string()),
            phone,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LeadStore
// ─────────────────────────────────────────────────────────────────────────────

/// Shared, ordered collection of leads.
///
/// Cloning is cheap; clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct LeadStore {
    leads: Arc<RwLock<Vec<Lead>>>,
}

impl LeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends one lead.
    pub async fn add(&self, new_lead: NewLead) -> Result<Lead, AppError> {
        let lead = new_lead.into_lead()?;
        self.leads.write().await.push(lead.clone());
        info!("[LEADS] Added lead {}", lead.id);
        Ok(lead)
    }

    /// Appends already-built leads (imports). Returns how many were added.
    pub async fn extend(&self, leads: Vec<Lead>) -> usize {
        let count = leads.len();
        self.leads.write().await.extend(leads);
        info!("[LEADS] Imported {} leads", count);
        count
    }

    pub async fn remove(&self, id: &str) -> Result<Lead, AppError> {
        let mut leads = self.leads.write().await;
        let index = leads
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| AppError::LeadNotFound(id.to_string()))?;
        let removed = leads.remove(index);
        info!("[LEADS] Removed lead {}", id);
        Ok(removed)
    }

    pub async fn get(&self, id: &str) -> Option<Lead> {
        self.leads.read().await.iter().find(|l| l.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.leads.read().await.is_empty()
    }

    pub async fn pending_ids(&self) -> Vec<String> {
        self.leads
            .read()
            .await
            .iter()
            .filter(|l| l.is_pending())
            .map(|l| l.id.clone())
            .collect()
    }

    /// Leads whose ID is in the selection, in list order.
    ///
    /// The selection is a set: duplicates and unknown IDs have no effect.
    pub async fn resolve_selection(&self, ids: &[String]) -> Vec<Lead> {
        let selected: HashSet<&str> = ids.iter().map(String::as_str).collect();

        self.leads
            .read()
            .await
            .iter()
            .filter(|l| selected.contains(l.id.as_str()))
            .cloned()
            .collect()
    }

    /// Records a successful call. Returns false if the lead no longer exists.
    pub async fn mark_called(&self, id: &str, call_id: &str) -> bool {
        self.update(id, |lead| {
            lead.status = LeadStatus::Called;
            lead.call_id = Some(call_id.to_string());
        })
        .await
    }

    /// Records a failed call. Returns false if the lead no longer exists.
    pub async fn mark_failed(&self, id: &str) -> bool {
        self.update(id, |lead| lead.status = LeadStatus::Failed)
            .await
    }

    async fn update(&self, id: &str, apply: impl FnOnce(&mut Lead)) -> bool {
        let mut leads = self.leads.write().await;
        match leads.iter_mut().find(|l| l.id == id) {
            Some(lead) => {
                apply(lead);
                true
            }
            None => {
                debug!("[LEADS] Outcome for removed lead {} ignored", id);
                false
            }
        }
    }
}
