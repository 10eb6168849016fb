//! Call history sink.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::storage::{CallRecord, Database};

/// Placeholder status of a freshly placed call.
pub const INITIAL_CALL_STATUS: &str = "in_progress";

/// Placeholder conversation status of a freshly placed call.
pub const INITIAL_CONVERSATION_STATUS: &str = "queued";

/// Receives a summary of every successfully placed call.
pub trait CallHistorySink: Send + Sync {
    fn append<'a>(
        &'a self,
        record: CallRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

impl CallHistorySink for Database {
    fn append<'a>(
        &'a self,
        record: CallRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(self.insert_call_record(record))
    }
}

/// Keeps records in memory, in append order.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<CallRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<CallRecord> {
        self.records.lock().await.clone()
    }
}

impl CallHistorySink for MemoryHistory {
    fn append<'a>(
        &'a self,
        record: CallRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(async move {
            self.records.lock().await.push(record);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> CallRecord {
        CallRecord {
            id: id.to_string(),
            lead_id: "lead-1".to_string(),
            lead_name: "Ada Lovelace".to_string(),
            from: String::new(),
            to: "+15551112222".to_string(),
            started_at: "2025-01-01T10:00:00Z".to_string(),
            status: INITIAL_CALL_STATUS.to_string(),
            conversation_status: INITIAL_CONVERSATION_STATUS.to_string(),
            queue_position: 2,
        }
    }

    #[tokio::test]
    async fn memory_history_keeps_append_order() {
        let history = MemoryHistory::new();
        let sink: &dyn CallHistorySink = &history;

        sink.append(record("r1")).await.unwrap();
        sink.append(record("r2")).await.unwrap();

        let ids: Vec<String> = history.records().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(record("r1")).unwrap();
        assert_eq!(json["leadName"], "Ada Lovelace");
        assert_eq!(json["startedAt"], "2025-01-01T10:00:00Z");
        assert_eq!(json["conversationStatus"], "queued");
        assert_eq!(json["queuePosition"], 2);
    }
}
