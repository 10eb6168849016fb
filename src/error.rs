use serde::Serialize;
use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "bearertoken",
    "bearer_token",
    "x-bearer-token",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for UI display.
/// If sensitive content is detected, returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("No campaign selected")]
    NoCampaignSelected,

    #[error("No leads selected")]
    NoLeadsSelected,

    #[error("No pending leads in selection")]
    NoPendingLeads,

    // ── Upstream (Pearl / white-label) ────────────────────────────────────────
    #[error("Bearer token rejected")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Upstream rejected the request body")]
    BadRequest,

    #[error("Upstream server error")]
    UpstreamServer,

    #[error("Upstream API error: HTTP {status}")]
    UpstreamStatus { status: u16 },

    #[error("Upstream error: {0}")]
    UpstreamMessage(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    // ── Bulk dialing ──────────────────────────────────────────────────────────
    #[error("A bulk call session is already active")]
    BulkCallInProgress,

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    // ── Leads / CSV ───────────────────────────────────────────────────────────
    #[error("Lead is missing required fields")]
    MissingLeadFields,

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Lead was already called: {0}")]
    LeadAlreadyCalled(String),

    #[error("Invalid CSV: {0}")]
    CsvInvalid(String),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classifies a non-success HTTP status returned by the calling API.
    pub fn from_upstream_status(status: u16) -> Self {
        match status {
            400 => AppError::BadRequest,
            401 => AppError::Unauthorized,
            403 => AppError::Forbidden,
            404 => AppError::CampaignNotFound,
            500..=599 => AppError::UpstreamServer,
            other => AppError::UpstreamStatus { status: other },
        }
    }

    /// True when the stored campaign credential must be forgotten.
    ///
    /// Applies to every unauthorized/not-found response, including one from a
    /// single call in the middle of a bulk session.
    pub fn invalidates_credentials(&self) -> bool {
        matches!(self, AppError::Unauthorized | AppError::CampaignNotFound)
    }

    /// Converts the error into a user-friendly presentation suitable for UI display.
    /// Never leaks bearer tokens or authorization headers.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Configuration ─────────────────────────────────────────────────
            AppError::NoCampaignSelected => ErrorPresentation {
                title: "No Campaign Selected".into(),
                message: "Select a campaign on the overview page before placing calls.".into(),
                action: Some("Select a campaign".into()),
            },

            AppError::NoLeadsSelected => ErrorPresentation {
                title: "No Leads Selected".into(),
                message: "Select at least one lead to call.".into(),
                action: Some("Select leads".into()),
            },

            AppError::NoPendingLeads => ErrorPresentation {
                title: "No Valid Leads".into(),
                message: "All selected leads have already been called.".into(),
                action: None,
            },

            // ── Upstream ──────────────────────────────────────────────────────
            AppError::Unauthorized => ErrorPresentation {
                title: "Credentials Rejected".into(),
                message: "The campaign credentials were rejected and have been cleared.".into(),
                action: Some("Select the campaign again".into()),
            },

            AppError::Forbidden => ErrorPresentation {
                title: "Access Denied".into(),
                message: "The campaign credentials do not allow this operation.".into(),
                action: Some("Check the campaign permissions".into()),
            },

            AppError::CampaignNotFound => ErrorPresentation {
                title: "Campaign Not Found".into(),
                message: "The outbound ID was not found and the stored credentials have been cleared.".into(),
                action: Some("Select the campaign again".into()),
            },

            AppError::BadRequest => ErrorPresentation {
                title: "Invalid Request".into(),
                message: "The calling service rejected the request.".into(),
                action: None,
            },

            AppError::UpstreamServer => ErrorPresentation {
                title: "Server Error".into(),
                message: "The calling service reported an internal error.".into(),
                action: Some("Try again later".into()),
            },

            AppError::UpstreamStatus { status } => ErrorPresentation {
                title: "API Error".into(),
                message: format!("The calling service answered with HTTP {}.", status),
                action: None,
            },

            AppError::UpstreamMessage(msg) => ErrorPresentation {
                title: "API Error".into(),
                message: sanitize_message(msg, "The calling service returned an error."),
                action: None,
            },

            AppError::MalformedResponse(_) => ErrorPresentation {
                title: "Unexpected Response".into(),
                message: "The calling service returned a response without the expected data.".into(),
                action: Some("Try again".into()),
            },

            // ── Bulk dialing ──────────────────────────────────────────────────
            AppError::BulkCallInProgress => ErrorPresentation {
                title: "Bulk Call Running".into(),
                message: "A bulk call session is already active.".into(),
                action: Some("Wait for it to finish or cancel it".into()),
            },

            AppError::InvalidTransition { action, state } => ErrorPresentation {
                title: "Not Available".into(),
                message: format!("Cannot {} while the bulk call is {}.", action, state),
                action: None,
            },

            // ── Leads / CSV ───────────────────────────────────────────────────
            AppError::MissingLeadFields => ErrorPresentation {
                title: "Missing Information".into(),
                message: "First name, last name and phone number are required.".into(),
                action: Some("Fill in all required fields".into()),
            },

            AppError::LeadNotFound(_) => ErrorPresentation {
                title: "Lead Not Found".into(),
                message: "The lead no longer exists.".into(),
                action: None,
            },

            AppError::LeadAlreadyCalled(_) => ErrorPresentation {
                title: "Already Called".into(),
                message: "This lead has already been called.".into(),
                action: None,
            },

            AppError::CsvInvalid(msg) => ErrorPresentation {
                title: "Invalid CSV".into(),
                message: format!("The data has a formatting problem: {}", msg),
                action: Some("Fix the data and try again".into()),
            },

            // ── Network ───────────────────────────────────────────────────────
            AppError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: "Could not reach the calling service. Please check your internet connection.".into(),
                action: Some("Check network and retry".into()),
            },

            AppError::Timeout => ErrorPresentation {
                title: "Request Timed Out".into(),
                message: "The request took too long to complete.".into(),
                action: Some("Retry".into()),
            },

            // ── Generic ───────────────────────────────────────────────────────
            AppError::NotFound(_) => ErrorPresentation {
                title: "Not Found".into(),
                message: "The requested item could not be found.".into(),
                action: None,
            },

            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

// Commands return AppError straight to the UI shell
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
