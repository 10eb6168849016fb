//! Request and response types of the Pearl calling API.
//!
//! Field names follow the upstream JSON (camelCase). Response types default
//! missing fields so that a partial payload still deserializes.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Placing calls
// ─────────────────────────────────────────────────────────────────────────────

/// Personalization data sent with a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPersonalization {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Body of `POST /Pearl/{outboundId}/Call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceCallRequest {
    pub to: String,
    pub call_data: CallPersonalization,
}

/// Successful answer to a call placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedCall {
    /// Request identifier assigned upstream. Never empty.
    pub id: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub queue_position: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Campaign status
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the outbound campaign is currently dialing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "status", rename_all = "camelCase")]
pub enum CampaignActivity {
    Active,
    Inactive,
    /// Status code other than 1 (on) or 2 (off).
    Unknown(Option<i64>),
}

impl CampaignActivity {
    pub fn from_status(status: Option<i64>) -> Self {
        match status {
            Some(1) => CampaignActivity::Active,
            Some(2) => CampaignActivity::Inactive,
            other => CampaignActivity::Unknown(other),
        }
    }

    pub fn is_active(&self) -> Option<bool> {
        match self {
            CampaignActivity::Active => Some(true),
            CampaignActivity::Inactive => Some(false),
            CampaignActivity::Unknown(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call listing
// ─────────────────────────────────────────────────────────────────────────────

/// Paging, sorting and filtering of the call list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallsFilters {
    pub skip: u64,
    pub limit: u64,
    pub sort_prop: String,
    pub is_ascending: bool,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub tags: Vec<String>,
    pub statuses: Vec<i64>,
    pub conversation_statuses: Vec<i64>,
}

impl Default for CallsFilters {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            sort_prop: "startTime".to_string(),
            is_ascending: false,
            from_date: None,
            to_date: None,
            tags: Vec::new(),
            statuses: Vec::new(),
            conversation_statuses: Vec::new(),
        }
    }
}

/// Upstream shape of [`CallsFilters`]: status lists are renamed and empty
/// filters are left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpstreamCallsQuery<'a> {
    skip: u64,
    limit: u64,
    sort_prop: &'a str,
    is_ascending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_date: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    tags: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    status: &'a [i64],
    #[serde(skip_serializing_if = "is_empty")]
    conversation_status: &'a [i64],
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl CallsFilters {
    pub(crate) fn to_upstream(&self) -> UpstreamCallsQuery<'_> {
        UpstreamCallsQuery {
            skip: self.skip,
            limit: self.limit,
            sort_prop: &self.sort_prop,
            is_ascending: self.is_ascending,
            from_date: non_empty(&self.from_date),
            to_date: non_empty(&self.to_date),
            tags: &self.tags,
            status: &self.statuses,
            conversation_status: &self.conversation_statuses,
        }
    }
}

/// One row of the call list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallSummary {
    pub id: String,
    pub start_time: String,
    pub conversation_status: i64,
    pub status: i64,
    pub from: String,
    pub to: String,
    pub from_name: Option<String>,
    pub to_name: Option<String>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    /// Seconds.
    pub duration: f64,
    pub tags: Option<Vec<String>>,
}

impl Default for CallSummary {
    fn default() -> Self {
        Self {
            id: String::new(),
            start_time: String::new(),
            conversation_status: 0,
            status: 0,
            from: String::new(),
            to: String::new(),
            from_name: None,
            to_name: None,
            from_email: None,
            to_email: None,
            duration: 0.0,
            tags: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallsResponse {
    pub count: Option<u64>,
    pub total_count: Option<u64>,
    pub results: Vec<CallSummary>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Call details
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptEntry {
    pub role: i64,
    pub content: String,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectedInfo {
    pub id: String,
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallDetails {
    pub id: String,
    pub related_id: Option<String>,
    pub start_time: String,
    pub conversation_status: i64,
    pub status: i64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub name: Option<String>,
    pub from_name: Option<String>,
    pub to_name: Option<String>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub duration: f64,
    pub recording: Option<String>,
    pub transcript: Option<Vec<TranscriptEntry>>,
    pub summary: Option<String>,
    pub collected_info: Option<Vec<CollectedInfo>>,
    pub tags: Option<Vec<String>>,
    pub is_call_transferred: bool,
    pub overall_sentiment: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Analytics
// ─────────────────────────────────────────────────────────────────────────────

/// Inclusive analytics window, rendered as `YYYY-MM-DDTHH:MM:SSZ`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusCounts {
    pub total_calls: u64,
    pub total_leads: u64,
    pub need_retry: u64,
    pub wrong_country_code: u64,
    pub need_follow_up: u64,
    pub voice_mail_left: u64,
    pub successful: u64,
    pub unsuccessful: u64,
    pub wrong_number: u64,
    pub completed: u64,
    pub unreachable: u64,
    pub error: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusTimelinePoint {
    pub date: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentimentOverview {
    pub negative: u64,
    pub slightly_negative: u64,
    pub neutral: u64,
    pub slightly_positive: u64,
    pub positive: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AverageDurationPoint {
    pub date: String,
    /// Seconds.
    pub average_call_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostPoint {
    pub date: String,
    pub total_price: f64,
    pub average_cost_per_call: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PickupRatePoint {
    pub date: String,
    pub pickup_rate_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuccessRatePoint {
    pub date: String,
    pub success_rate_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelCount {
    pub id: String,
    pub name: String,
    pub color: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallEventsCounts {
    pub take_message_count: u64,
    pub sms_sent_count: u64,
    pub call_transferred_count: u64,
    pub calendar_booked_count: u64,
    pub email_sent_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HourDayCount {
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallsTimelinePoint {
    pub date: String,
    pub total_calls: u64,
    pub successful: u64,
}

/// Body of `POST /Pearl/{id}/Analytics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsData {
    pub calls_status_overview: StatusCounts,
    pub calls_sentiment_overview: SentimentOverview,
    pub calls_status_time_line: Vec<StatusTimelinePoint>,
    pub calls_average_time_line: Vec<AverageDurationPoint>,
    pub calls_cost_time_line: Vec<CostPoint>,
    pub calls_pickup_rate_time_line: Vec<PickupRatePoint>,
    pub calls_success_rate_time_line: Vec<SuccessRatePoint>,
    pub call_label_count: Vec<LabelCount>,
    pub call_events_counts: CallEventsCounts,
    pub calls_by_hour_day_of_weeks: Vec<HourDayCount>,
    pub calls_timeline: Vec<CallsTimelinePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_activity_from_status_codes() {
        assert_eq!(CampaignActivity::from_status(Some(1)), CampaignActivity::Active);
        assert_eq!(CampaignActivity::from_status(Some(2)), CampaignActivity::Inactive);
        assert_eq!(
            CampaignActivity::from_status(Some(7)),
            CampaignActivity::Unknown(Some(7))
        );
        assert_eq!(CampaignActivity::from_status(None), CampaignActivity::Unknown(None));
        assert_eq!(CampaignActivity::Unknown(None).is_active(), None);
    }

    #[test]
    fn upstream_query_renames_and_omits_empty_filters() {
        let filters = CallsFilters {
            statuses: vec![4, 6],
            from_date: Some(String::new()),
            to_date: Some("2025-01-31T23:59:59Z".to_string()),
            ..CallsFilters::default()
        };

        let json = serde_json::to_value(filters.to_upstream()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "skip": 0,
                "limit": 100,
                "sortProp": "startTime",
                "isAscending": false,
                "toDate": "2025-01-31T23:59:59Z",
                "status": [4, 6]
            })
        );
    }

    #[test]
    fn place_call_request_shape() {
        let request = PlaceCallRequest {
            to: "+15551112222".to_string(),
            call_data: CallPersonalization {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: String::new(),
            },
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "to": "+15551112222",
                "callData": {"firstName": "Ada", "lastName": "Lovelace", "email": ""}
            })
        );
    }

    #[test]
    fn analytics_tolerates_partial_payload() {
        let data: AnalyticsData = serde_json::from_value(serde_json::json!({
            "callsStatusOverview": {"totalCalls": 12, "successful": 3},
            "callsStatusTimeLine": [{"date": "2025-01-02", "totalCalls": 5}],
            "callsAverageTimeLine": [{"date": "2025-01-02", "averageCallDuration": 90}]
        }))
        .unwrap();

        assert_eq!(data.calls_status_overview.total_calls, 12);
        assert_eq!(data.calls_status_time_line[0].counts.total_calls, 5);
        assert_eq!(data.calls_average_time_line[0].average_call_duration, 90.0);
        assert!(data.call_label_count.is_empty());
    }
}
