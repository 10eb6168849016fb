//! Lenient parsing of proxy request bodies.
//!
//! Browsers send loosely typed JSON: numbers as strings, stray nulls,
//! missing fields. Everything is read from a `serde_json::Value` and coerced
//! to the typed filters the Pearl client expects.

use serde_json::{Map, Value};

use crate::pearl::CallsFilters;

/// Credential pair plus filters of a `POST /api/pearl/calls` body.
#[derive(Debug, Clone, PartialEq)]
pub struct CallsRequest {
    pub outbound_id: String,
    pub bearer_token: String,
    pub filters: CallsFilters,
}

/// Outbound ID and token of a `POST /api/pearl/validate` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateRequest {
    pub outbound_id: String,
    pub bearer_token: String,
}

/// A non-empty string field.
fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers and numeric strings; anything non-integral or non-finite is
/// dropped. Call and conversation status codes are integers, so a fractional
/// value can never match one upstream.
pub fn to_num_array(value: Option<&Value>) -> Vec<i64> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(integral),
            _ => None,
        })
        .collect()
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// Strings as-is, scalars rendered as text; nulls and empty strings dropped.
pub fn to_str_array(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads a calls request. `None` when the outbound ID or token is missing.
///
/// Defaults: `skip` 0, `limit` 100, `sortProp` `startTime`, descending.
pub fn parse_calls_request(body: &Value) -> Option<CallsRequest> {
    let obj = body.as_object()?;
    let outbound_id = non_empty_str(obj, "outboundId")?;
    let bearer_token = non_empty_str(obj, "bearerToken")?;

    let defaults = CallsFilters::default();
    let filters = CallsFilters {
        skip: obj.get("skip").and_then(Value::as_u64).unwrap_or(defaults.skip),
        limit: obj.get("limit").and_then(Value::as_u64).unwrap_or(defaults.limit),
        sort_prop: non_empty_str(obj, "sortProp").unwrap_or(defaults.sort_prop),
        is_ascending: obj
            .get("isAscending")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.is_ascending),
        from_date: non_empty_str(obj, "fromDate"),
        to_date: non_empty_str(obj, "toDate"),
        tags: to_str_array(obj.get("tags")),
        statuses: to_num_array(obj.get("statuses")),
        conversation_statuses: to_num_array(obj.get("conversationStatuses")),
    };

    Some(CallsRequest {
        outbound_id,
        bearer_token,
        filters,
    })
}

pub fn parse_validate_request(body: &Value) -> Option<ValidateRequest> {
    let obj = body.as_object()?;
    Some(ValidateRequest {
        outbound_id: non_empty_str(obj, "outboundId")?,
        bearer_token: non_empty_str(obj, "bearerToken")?,
    })
}
