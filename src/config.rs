//! Runtime settings shared by the library and the binary.
//!
//! The binary fills these from CLI flags that fall back to the same
//! environment variables the hosted dashboard reads
//! (`NLPEARL_API_BASE_URL`, `WHITE_LABEL_API_BASE_URL`, `WHITE_LABEL_API_PREFIX`).

use std::path::PathBuf;
use std::time::Duration;

use crate::http::LoggingMode;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default Pearl API base URL (calls, campaign status, toggle, analytics).
pub const DEFAULT_PEARL_API_BASE_URL: &str = "https://api.nlpearl.ai/v2";

/// Default white-label registry base URL (users and their campaigns).
pub const DEFAULT_WHITE_LABEL_API_BASE_URL: &str = "https://whitelabel-server.onrender.com";

/// Default white-label path prefix for user lookups.
pub const DEFAULT_WHITE_LABEL_API_PREFIX: &str = "api/v1";

/// Default delay between two bulk calls, in seconds.
pub const DEFAULT_BULK_DELAY_SECS: u64 = 5;

/// Allowed range for the delay between two bulk calls, in seconds.
pub const MIN_BULK_DELAY_SECS: u64 = 3;
pub const MAX_BULK_DELAY_SECS: u64 = 30;

/// Default request timeout for upstream calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the upstream clients and local storage.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pearl_api_base_url: String,
    pub white_label_api_base_url: String,
    /// Path prefix for white-label user lookups, without surrounding slashes.
    pub white_label_api_prefix: String,
    /// SQLite database file for settings and call history.
    pub db_path: PathBuf,
    pub bulk_delay: Duration,
    pub request_timeout: Duration,
    /// How upstream request URLs appear in logs.
    pub logging_mode: LoggingMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pearl_api_base_url: DEFAULT_PEARL_API_BASE_URL.to_string(),
            white_label_api_base_url: DEFAULT_WHITE_LABEL_API_BASE_URL.to_string(),
            white_label_api_prefix: DEFAULT_WHITE_LABEL_API_PREFIX.to_string(),
            db_path: PathBuf::from("outbound-console.db"),
            bulk_delay: Duration::from_secs(DEFAULT_BULK_DELAY_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            logging_mode: LoggingMode::PathOnly,
        }
    }
}

impl Settings {
    /// Sets the white-label prefix, stripping leading and trailing slashes.
    pub fn with_white_label_prefix(mut self, prefix: &str) -> Self {
        self.white_label_api_prefix = clean_prefix(prefix);
        self
    }

    /// Sets the bulk delay, clamped to the allowed range.
    pub fn with_bulk_delay_secs(mut self, secs: u64) -> Self {
        self.bulk_delay = clamp_bulk_delay(secs);
        self
    }
}

/// Normalizes a path prefix such as `/api/v1/` to `api/v1`.
pub fn clean_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

/// Clamps a bulk delay to `MIN_BULK_DELAY_SECS..=MAX_BULK_DELAY_SECS`.
pub fn clamp_bulk_delay(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_BULK_DELAY_SECS, MAX_BULK_DELAY_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_hosted_services() {
        let settings = Settings::default();
        assert_eq!(settings.pearl_api_base_url, "https://api.nlpearl.ai/v2");
        assert_eq!(settings.white_label_api_prefix, "api/v1");
        assert_eq!(settings.bulk_delay, Duration::from_secs(5));
        assert_eq!(settings.logging_mode, LoggingMode::PathOnly);
    }

    #[test]
    fn clean_prefix_strips_slashes() {
        assert_eq!(clean_prefix("/api/v1/"), "api/v1");
        assert_eq!(clean_prefix("//v2"), "v2");
        assert_eq!(clean_prefix("api"), "api");
        assert_eq!(clean_prefix("/"), "");
    }

    #[test]
    fn bulk_delay_is_clamped() {
        assert_eq!(clamp_bulk_delay(0), Duration::from_secs(3));
        assert_eq!(clamp_bulk_delay(10), Duration::from_secs(10));
        assert_eq!(clamp_bulk_delay(120), Duration::from_secs(30));

        let settings = Settings::default().with_bulk_delay_secs(1);
        assert_eq!(settings.bulk_delay, Duration::from_secs(3));
    }
}
