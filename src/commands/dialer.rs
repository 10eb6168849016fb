//! Dialing commands: single calls, bulk sessions and call history.

use crate::config::clamp_bulk_delay;
use crate::dialer::BulkProgress;
use crate::error::AppError;
use crate::pearl::PlacedCall;
use crate::state::AppState;
use crate::storage::CallRecord;

/// Calls one lead right away.
pub async fn call_lead(state: &AppState, lead_id: &str) -> Result<PlacedCall, AppError> {
    state.dialer.call_one(lead_id).await
}

/// Starts a bulk session over the selected leads.
///
/// `delay_secs` is clamped to the allowed range; `None` uses the configured
/// default.
pub async fn start_bulk_call(
    state: &AppState,
    lead_ids: &[String],
    delay_secs: Option<u64>,
) -> Result<BulkProgress, AppError> {
    let delay = delay_secs
        .map(clamp_bulk_delay)
        .unwrap_or(state.settings.bulk_delay);
    state.dialer.start(lead_ids, delay).await
}

/// Starts a bulk session over every pending lead, in list order.
pub async fn start_bulk_call_pending(
    state: &AppState,
    delay_secs: Option<u64>,
) -> Result<BulkProgress, AppError> {
    let pending = state.leads.pending_ids().await;
    start_bulk_call(state, &pending, delay_secs).await
}

pub async fn pause_bulk_call(state: &AppState) -> Result<BulkProgress, AppError> {
    state.dialer.pause().await
}

pub async fn resume_bulk_call(state: &AppState) -> Result<BulkProgress, AppError> {
    state.dialer.resume().await
}

pub async fn cancel_bulk_call(state: &AppState) -> Result<BulkProgress, AppError> {
    state.dialer.cancel().await
}

pub fn bulk_progress(state: &AppState) -> BulkProgress {
    state.dialer.progress()
}

/// Most recent placed calls, oldest first.
pub async fn call_history(state: &AppState, limit: Option<u32>) -> Result<Vec<CallRecord>, AppError> {
    state.db.list_call_history(limit).await
}
