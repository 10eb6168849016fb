//! Derived dashboard state: local call filtering, cost estimates, date range
//! presets and display labels.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pearl::types::{CostPoint, SentimentOverview};
use crate::pearl::{AnalyticsData, CallSummary, CallsFilters, DateRange};

/// Our per-minute calling rate, in USD.
pub const CALL_RATE_PER_MIN: f64 = 0.4;

/// Days covered by the default analytics range.
pub const DEFAULT_RANGE_DAYS: i64 = 30;

const RANGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ─────────────────────────────────────────────────────────────────────────────
// Local filtering
// ─────────────────────────────────────────────────────────────────────────────

/// Re-applies the status, conversation status and tag filters to a call
/// list, since the upstream does not always honor them.
///
/// Empty filter lists let everything through. Tags match when a call carries
/// any of the requested tags.
pub fn apply_local_filters(calls: Vec<CallSummary>, filters: &CallsFilters) -> Vec<CallSummary> {
    let statuses: HashSet<i64> = filters.statuses.iter().copied().collect();
    let conversation: HashSet<i64> = filters.conversation_statuses.iter().copied().collect();
    let tags: HashSet<&str> = filters.tags.iter().map(String::as_str).collect();

    calls
        .into_iter()
        .filter(|c| statuses.is_empty() || statuses.contains(&c.status))
        .filter(|c| conversation.is_empty() || conversation.contains(&c.conversation_status))
        .filter(|c| {
            tags.is_empty()
                || c.tags
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .any(|t| tags.contains(t.as_str()))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Cost estimation
// ─────────────────────────────────────────────────────────────────────────────

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Sort key for timeline dates. Unparseable dates sort last, by text.
fn date_key(date: &str) -> (Option<NaiveDateTime>, String) {
    let parsed = DateTime::parse_from_rfc3339(date)
        .map(|d| d.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        });

    // None sorts before Some; push unparseable dates to the end
    (parsed.or(Some(NaiveDateTime::MAX)), date.to_string())
}

/// Estimates our cost per day from the average duration and status
/// timelines, at [`CALL_RATE_PER_MIN`].
///
/// Covers every date present in either timeline, in chronological order. A
/// date missing from one timeline counts as zero seconds or zero calls.
pub fn cost_timeline(data: &AnalyticsData) -> Vec<CostPoint> {
    let averages: HashMap<&str, f64> = data
        .calls_average_time_line
        .iter()
        .map(|p| (p.date.as_str(), p.average_call_duration))
        .collect();
    let calls: HashMap<&str, u64> = data
        .calls_status_time_line
        .iter()
        .map(|p| (p.date.as_str(), p.counts.total_calls))
        .collect();

    let mut dates: Vec<&str> = averages
        .keys()
        .chain(calls.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    dates.sort_by_cached_key(|d| date_key(d));

    dates
        .into_iter()
        .map(|date| {
            let avg_secs = averages.get(date).copied().unwrap_or(0.0);
            let count = calls.get(date).copied().unwrap_or(0);

            let average_cost_per_call = round_to(avg_secs / 60.0 * CALL_RATE_PER_MIN, 3);
            let total_price = round_to(count as f64 * average_cost_per_call, 2);

            CostPoint {
                date: date.to_string(),
                total_price,
                average_cost_per_call,
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Date ranges
// ─────────────────────────────────────────────────────────────────────────────

/// Analytics window presets. Weeks start on Monday; all ranges are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "preset", content = "days", rename_all = "camelCase")]
pub enum DatePreset {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    /// The last N days including today (at least one).
    CustomDays(u32),
}

fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    // 23:59:59 always exists
    day.and_hms_opt(23, 59, 59).unwrap_or_else(|| start_of_day(day))
}

fn monday_of(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

fn render(from: NaiveDateTime, to: NaiveDateTime) -> DateRange {
    DateRange {
        from: from.format(RANGE_FORMAT).to_string(),
        to: to.format(RANGE_FORMAT).to_string(),
    }
}

/// Resolves a preset relative to `now`.
pub fn range_for(preset: DatePreset, now: DateTime<Utc>) -> DateRange {
    let today = now.date_naive();

    let (from, to) = match preset {
        DatePreset::Today => (start_of_day(today), end_of_day(today)),
        DatePreset::Yesterday => {
            let yesterday = today - Duration::days(1);
            (start_of_day(yesterday), end_of_day(yesterday))
        }
        DatePreset::ThisWeek => (start_of_day(monday_of(today)), end_of_day(today)),
        DatePreset::LastWeek => {
            let monday = monday_of(today) - Duration::days(7);
            (start_of_day(monday), end_of_day(monday + Duration::days(6)))
        }
        DatePreset::ThisMonth => {
            let first = today.with_day(1).unwrap_or(today);
            (start_of_day(first), end_of_day(today))
        }
        DatePreset::CustomDays(days) => {
            let back = i64::from(days.max(1)) - 1;
            // Ranges reaching past the calendar start from its first day
            let first = today
                .checked_sub_signed(Duration::days(back))
                .unwrap_or(NaiveDate::MIN);
            (start_of_day(first), end_of_day(today))
        }
    };

    render(from, to)
}

/// The last [`DEFAULT_RANGE_DAYS`] days up to `now`, to the second.
pub fn default_range(now: DateTime<Utc>) -> DateRange {
    let now = now.naive_utc();
    render(now - Duration::days(DEFAULT_RANGE_DAYS), now)
}

// ─────────────────────────────────────────────────────────────────────────────
// Labels
// ─────────────────────────────────────────────────────────────────────────────

pub fn call_status_label(status: i64) -> &'static str {
    match status {
        3 => "In progress",
        4 => "Completed",
        5 => "Busy",
        6 => "Failed",
        7 => "No answer",
        8 => "Cancelled",
        _ => "Unknown",
    }
}

pub fn conversation_status_label(status: i64) -> &'static str {
    match status {
        10 => "Need retry",
        20 => "In call queue",
        70 => "Voicemail left",
        100 => "Successful",
        110 => "Unsuccessful",
        130 => "Completed",
        150 => "Unreachable",
        500 => "Error",
        _ => "Unknown",
    }
}

pub fn sentiment_label(sentiment: i64) -> &'static str {
    match sentiment {
        1 => "Negative",
        2 => "Slightly negative",
        3 => "Neutral",
        4 => "Slightly positive",
        5 => "Positive",
        _ => "Unknown",
    }
}

/// Renders seconds as `MM:SS`. Minutes are not capped at 59.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Share of calls per sentiment bucket, in percent with one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentShare {
    pub negative: f64,
    pub slightly_negative: f64,
    pub neutral: f64,
    pub slightly_positive: f64,
    pub positive: f64,
}

/// All zeros when no call has a sentiment.
pub fn sentiment_percentages(overview: &SentimentOverview) -> SentimentShare {
    let total = overview.negative
        + overview.slightly_negative
        + overview.neutral
        + overview.slightly_positive
        + overview.positive;
    if total == 0 {
        return SentimentShare::default();
    }

    let pct = |n: u64| round_to(n as f64 * 100.0 / total as f64, 1);
    SentimentShare {
        negative: pct(overview.negative),
        slightly_negative: pct(overview.slightly_negative),
        neutral: pct(overview.neutral),
        slightly_positive: pct(overview.slightly_positive),
        positive: pct(overview.positive),
    }
}
