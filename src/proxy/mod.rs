//! Server-side proxy for the dashboard.
//!
//! Forwards browser requests to the Pearl API and the white-label registry,
//! mirroring the upstream status and body. Bodies that are not JSON come
//! back as `{ "raw": text }`; transport failures become `500 { "error" }`.

pub mod body;

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Settings;
use crate::error::AppError;
use crate::http::RawResponse;
use crate::pearl::{normalize_bearer, PearlClient};
use crate::whitelabel::WhiteLabelClient;

use self::body::{parse_calls_request, parse_validate_request};

/// Header carrying the bearer token for call detail lookups.
pub const BEARER_HEADER: &str = "x-bearer-token";

#[derive(Clone)]
pub struct ProxyState {
    pearl: PearlClient,
    whitelabel: WhiteLabelClient,
}

impl ProxyState {
    pub fn new(pearl: PearlClient, whitelabel: WhiteLabelClient) -> Self {
        Self { pearl, whitelabel }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        Ok(Self {
            pearl: PearlClient::new(&settings.pearl_api_base_url, settings.request_timeout)?
                .with_logging_mode(settings.logging_mode),
            whitelabel: WhiteLabelClient::new(
                &settings.white_label_api_base_url,
                &settings.white_label_api_prefix,
                settings.request_timeout,
            )?
            .with_logging_mode(settings.logging_mode),
        })
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/pearl/calls", post(list_calls))
        .route("/api/pearl/call/{id}", get(call_details))
        .route("/api/pearl/validate", post(validate))
        .route("/api/pearl/campaigns", get(campaigns))
        .route("/api/pearl/user/{user_id}", get(user))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Mirrors the upstream answer, or reports the transport failure as a 500.
fn mirror(route: &str, result: Result<RawResponse, AppError>) -> Response {
    match result {
        Ok(raw) => {
            let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(raw.body)).into_response()
        }
        Err(e) => {
            error!("[PROXY] {} failed: {}", route, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Request body as JSON. A body that does not parse is a 500, like any
/// other failure inside the handler.
fn json_body(route: &str, bytes: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(bytes).map_err(|e| {
        error!("[PROXY] {} got an unreadable body: {}", route, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Invalid JSON body: {}", e) })),
        )
            .into_response()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn healthz() -> &'static str {
    "ok"
}

async fn list_calls(State(st): State<ProxyState>, bytes: Bytes) -> Response {
    let body = match json_body("/api/pearl/calls", &bytes) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(req) = parse_calls_request(&body) else {
        return bad_request("Missing outboundId or bearerToken");
    };

    let result = st
        .pearl
        .forward_list_calls(&req.outbound_id, normalize_bearer(&req.bearer_token), &req.filters)
        .await;
    mirror("/api/pearl/calls", result)
}

async fn call_details(
    State(st): State<ProxyState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let token = headers
        .get(BEARER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(normalize_bearer)
        .unwrap_or("");

    if id.is_empty() || token.is_empty() {
        return bad_request("Missing call id or x-bearer-token");
    }

    let result = st.pearl.forward_call_details(&id, token).await;
    mirror("/api/pearl/call/:id", result)
}

async fn validate(State(st): State<ProxyState>, bytes: Bytes) -> Response {
    let body = match json_body("/api/pearl/validate", &bytes) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(req) = parse_validate_request(&body) else {
        return bad_request("Missing outboundId or bearerToken");
    };

    let result = st.pearl.validate(&req.outbound_id, &req.bearer_token).await;
    mirror("/api/pearl/validate", result)
}

async fn campaigns(
    State(st): State<ProxyState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(email) = params.get("email").filter(|e| !e.is_empty()) else {
        return bad_request("Missing email");
    };

    let result = st.whitelabel.forward_campaigns(email).await;
    mirror("/api/pearl/campaigns", result)
}

async fn user(State(st): State<ProxyState>, Path(user_id): Path<String>) -> Response {
    if user_id.is_empty() {
        return bad_request("Missing userId");
    }

    let result = st.whitelabel.forward_user(&user_id).await;
    mirror("/api/pearl/user/:userId", result)
}
