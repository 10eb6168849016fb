//! Lead management commands: manual entry, import, removal and export.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::leads::export::{export_file_name, template_csv, write_csv_atomic};
use crate::leads::import::{parse_csv, parse_pasted};
use crate::leads::{Lead, NewLead};
use crate::notify::NotificationLevel;
use crate::state::AppState;

/// Adds one lead entered by hand.
pub async fn add_lead(state: &AppState, new_lead: NewLead) -> Result<Lead, AppError> {
    match state.leads.add(new_lead).await {
        Ok(lead) => {
            state.notifier.success(
                "Lead added",
                format!("{} has been added to the list", lead.full_name()),
            );
            Ok(lead)
        }
        Err(e) => {
            state.notifier.app_error(NotificationLevel::Warning, &e);
            Err(e)
        }
    }
}

async fn import(state: &AppState, parsed: Result<Vec<Lead>, AppError>) -> Result<usize, AppError> {
    let leads = match parsed {
        Ok(leads) => leads,
        Err(e) => {
            state.notifier.app_error(NotificationLevel::Error, &e);
            return Err(e);
        }
    };

    let count = state.leads.extend(leads).await;
    state
        .notifier
        .success("CSV import successful", format!("Imported {} leads", count));
    Ok(count)
}

/// Imports leads from CSV text with a header row.
pub async fn import_leads_csv(state: &AppState, text: &str) -> Result<usize, AppError> {
    import(state, parse_csv(text)).await
}

/// Imports pasted `first,last,email,phone` lines.
pub async fn import_leads_text(state: &AppState, text: &str) -> Result<usize, AppError> {
    import(state, parse_pasted(text)).await
}

/// Imports a CSV file from disk.
pub async fn import_leads_file(state: &AppState, path: &Path) -> Result<usize, AppError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::CsvInvalid(format!("cannot read {}: {}", path.display(), e))
    })?;
    info!("[LEADS] Importing {}", path.display());
    import_leads_csv(state, &text).await
}

pub async fn remove_lead(state: &AppState, lead_id: &str) -> Result<Lead, AppError> {
    state.leads.remove(lead_id).await
}

pub async fn list_leads(state: &AppState) -> Vec<Lead> {
    state.leads.list().await
}

/// Writes all leads to `path`, or to `leads-YYYY-MM-DD.csv` in the working
/// directory.
///
/// Returns `None`, after a warning, when there is nothing to export.
pub async fn export_leads(
    state: &AppState,
    path: Option<PathBuf>,
) -> Result<Option<PathBuf>, AppError> {
    let leads = state.leads.list().await;
    if leads.is_empty() {
        state
            .notifier
            .warning("No leads to export", "Add or import leads first");
        return Ok(None);
    }

    let path = path.unwrap_or_else(|| {
        PathBuf::from(export_file_name(chrono::Local::now().date_naive()))
    });

    let written = tokio::task::spawn_blocking(move || write_csv_atomic(path, &leads))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    state
        .notifier
        .success("Export complete", format!("Leads saved to {}", written.display()));
    Ok(Some(written))
}

/// Example CSV showing the import columns.
pub fn lead_template() -> Result<String, AppError> {
    template_csv()
}
