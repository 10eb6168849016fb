//! Bulk call progress as seen by the UI.

use serde::Serialize;
use tokio::sync::watch;

/// Snapshot of the bulk call session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkProgress {
    pub in_progress: bool,
    pub paused: bool,
    /// Calls completed so far in this session.
    pub current_index: usize,
    pub total: usize,
    pub delay_secs: u64,
    /// Leads still queued.
    pub remaining: usize,
}

impl BulkProgress {
    /// Completed share of the session, 0-100. Zero when there is no session.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current_index.min(self.total) * 100) / self.total) as u8
    }
}

/// Read side of the progress channel.
pub type ProgressReceiver = watch::Receiver<BulkProgress>;
