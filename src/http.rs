//! Shared HTTP transport with safe request logging.
//!
//! Both upstream services (the Pearl calling API and the white-label campaign
//! registry) go through [`HttpTransport`]: URL building with per-segment
//! encoding, one log line per request, and transport errors that never carry
//! raw URLs or tokens.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all upstream requests.
const CLIENT_USER_AGENT: &str = concat!("OutboundConsole/", env!("CARGO_PKG_VERSION"));

/// Query parameter keys (case-insensitive) that should have their values redacted.
const SENSITIVE_QUERY_PARAMS: &[&str] = &[
    "token",
    "bearertoken",
    "bearer_token",
    "access_token",
    "authorization",
    "email",
];

// ─────────────────────────────────────────────────────────────────────────────
// LoggingMode
// ─────────────────────────────────────────────────────────────────────────────

/// Controls how URLs are sanitized for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggingMode {
    /// Log only the path component. Strips scheme, host, query, and fragment.
    /// Example: `/v2/Pearl/abc/Call`
    #[default]
    PathOnly,

    /// Log path and query parameters, but redact sensitive values.
    /// Example: `/api/pearl/campaigns?email=***`
    PathAndQueryRedacted,
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

fn is_sensitive_param(key: &str) -> bool {
    let key_lower = key.to_ascii_lowercase();
    SENSITIVE_QUERY_PARAMS
        .iter()
        .any(|&sensitive| key_lower == sensitive)
}

/// Sanitizes a URL for safe logging based on the specified mode.
///
/// The result never contains the scheme, host, or fragment.
pub fn sanitize_url_for_logs(url: &Url, mode: LoggingMode) -> String {
    let path = url.path();

    match mode {
        LoggingMode::PathOnly => path.to_string(),
        LoggingMode::PathAndQueryRedacted => {
            let query_pairs: Vec<_> = url.query_pairs().collect();
            if query_pairs.is_empty() {
                return path.to_string();
            }

            let redacted_pairs: Vec<String> = query_pairs
                .into_iter()
                .map(|(key, value)| {
                    if is_sensitive_param(&key) {
                        format!("{}=***", key)
                    } else {
                        format!("{}={}", key, value)
                    }
                })
                .collect();

            format!("{}?{}", path, redacted_pairs.join("&"))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream status and body, passed through unchanged by the proxy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Parses a body as JSON; anything else becomes `{ "raw": text }`.
pub fn parse_json_safe(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpTransport
// ─────────────────────────────────────────────────────────────────────────────

/// Base URL plus a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    /// Log line prefix, e.g. `PEARL`.
    tag: &'static str,
    logging_mode: LoggingMode,
}

impl HttpTransport {
    /// Creates a transport for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the base URL cannot be parsed or the
    /// HTTP client fails to initialize.
    pub fn new(base_url: &str, tag: &'static str, timeout: Duration) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|_| AppError::Internal(format!("Invalid {} base URL", tag)))?;

        if base_url.cannot_be_a_base() {
            return Err(AppError::Internal(format!("Invalid {} base URL", tag)));
        }

        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            tag,
            logging_mode: LoggingMode::default(),
        })
    }

    pub fn logging_mode(&self) -> LoggingMode {
        self.logging_mode
    }

    /// Updates the logging mode for URL sanitization.
    pub fn with_logging_mode(mut self, mode: LoggingMode) -> Self {
        self.logging_mode = mode;
        self
    }

    /// Appends path segments to the base URL. Each segment is percent-encoded,
    /// so IDs containing `/` or `?` stay inside their segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Invalid base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Starts a request for `segments` under the base URL.
    pub fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<(reqwest::RequestBuilder, Url), AppError> {
        let url = self.url(segments)?;
        let builder = self.http.request(method, url.as_str());
        Ok((builder, url))
    }

    /// Sends a request with timing, logging, and error handling.
    ///
    /// Never logs headers or bodies; the URL is sanitized first.
    pub async fn execute(
        &self,
        method: &Method,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(url, self.logging_mode);

        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!(
                        "[{}] {} {} {} {}ms",
                        self.tag,
                        method,
                        sanitized_url,
                        status.as_u16(),
                        duration_ms
                    );
                } else {
                    warn!(
                        "[{}] {} {} {} {}ms",
                        self.tag,
                        method,
                        sanitized_url,
                        status.as_u16(),
                        duration_ms
                    );
                }
                Ok(response)
            }
            Err(e) => {
                // The reqwest error may carry the full URL; only its kind is kept
                warn!(
                    "[{}] {} {} FAILED {}ms",
                    self.tag, method, sanitized_url, duration_ms
                );
                if e.is_timeout() {
                    Err(AppError::Timeout)
                } else {
                    Err(AppError::ConnectionFailed(format!(
                        "Connection to {} failed",
                        self.tag
                    )))
                }
            }
        }
    }

    /// Sends a request and returns its status and body, JSON or `{raw}`.
    pub async fn execute_raw(
        &self,
        method: &Method,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<RawResponse, AppError> {
        let response = self.execute(method, request, url).await?;
        let status = response.status().as_u16();
        let text = read_text(response).await?;

        Ok(RawResponse {
            status,
            body: parse_json_safe(&text),
        })
    }
}

/// Reads a response body as text.
pub async fn read_text(response: reqwest::Response) -> Result<String, AppError> {
    response
        .text()
        .await
        .map_err(|_| AppError::ConnectionFailed("Failed to read response body".to_string()))
}

/// Builds the configured HTTP client.
fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ─────────────────────────────────────────────────────────────────────────
    // URL Sanitization Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn sanitize_strips_scheme_and_host() {
        let url = Url::parse("https://api.nlpearl.ai/v2/Pearl/out-1/Call").unwrap();

        let result = sanitize_url_for_logs(&url, LoggingMode::PathOnly);

        assert_eq!(result, "/v2/Pearl/out-1/Call");
        assert!(!result.contains("https"));
        assert!(!result.contains("api.nlpearl.ai"));
    }

    #[test]
    fn path_only_excludes_query_and_fragment() {
        let url = Url::parse("https://example.com/path?token=secret#anchor").unwrap();

        let result = sanitize_url_for_logs(&url, LoggingMode::PathOnly);

        assert_eq!(result, "/path");
    }

    #[test]
    fn path_and_query_redacted_redacts_sensitive_keys() {
        let url = Url::parse(
            "https://example.com/api/pearl/campaigns?email=a%40b.c&bearerToken=xyz&limit=5",
        )
        .unwrap();

        let result = sanitize_url_for_logs(&url, LoggingMode::PathAndQueryRedacted);

        assert!(result.contains("email=***"));
        assert!(result.contains("bearerToken=***"));
        assert!(result.contains("limit=5"));
        assert!(!result.contains("xyz"));
        assert!(!result.contains("a@b.c"));
    }

    #[test]
    fn path_and_query_redacted_without_query_is_path() {
        let url = Url::parse("https://example.com/path").unwrap();
        assert_eq!(
            sanitize_url_for_logs(&url, LoggingMode::PathAndQueryRedacted),
            "/path"
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // URL building
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn url_appends_segments_to_base_path() {
        let transport =
            HttpTransport::new("https://api.nlpearl.ai/v2", "PEARL", Duration::from_secs(5))
                .unwrap();

        let url = transport.url(&["Pearl", "out-1", "Call"]).unwrap();
        assert_eq!(url.as_str(), "https://api.nlpearl.ai/v2/Pearl/out-1/Call");

        let with_slash =
            HttpTransport::new("https://api.nlpearl.ai/v2/", "PEARL", Duration::from_secs(5))
                .unwrap();
        let url = with_slash.url(&["Pearl", "out-1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.nlpearl.ai/v2/Pearl/out-1");
    }

    #[test]
    fn url_encodes_each_segment() {
        let transport =
            HttpTransport::new("https://example.com", "WL", Duration::from_secs(5)).unwrap();

        let url = transport
            .url(&["users", "email", "a b/c@d.e", "userdata"])
            .unwrap();

        assert_eq!(url.path(), "/users/email/a%20b%2Fc@d.e/userdata");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpTransport::new("not a url", "PEARL", Duration::from_secs(5)).is_err());
        assert!(HttpTransport::new("mailto:x@y.z", "PEARL", Duration::from_secs(5)).is_err());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Raw bodies
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn parse_json_safe_wraps_non_json() {
        assert_eq!(parse_json_safe(r#"{"a":1}"#), serde_json::json!({"a": 1}));
        assert_eq!(
            parse_json_safe("<html>Bad Gateway</html>"),
            serde_json::json!({"raw": "<html>Bad Gateway</html>"})
        );
        assert_eq!(parse_json_safe(""), serde_json::json!({"raw": ""}));
    }

    #[tokio::test]
    async fn execute_raw_mirrors_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport =
            HttpTransport::new(&mock_server.uri(), "TEST", Duration::from_secs(5)).unwrap();
        let (request, url) = transport.request(Method::GET, &["thing"]).unwrap();

        let raw = transport
            .execute_raw(&Method::GET, request, &url)
            .await
            .expect("non-success status is still a response");

        assert_eq!(raw.status, 502);
        assert_eq!(raw.body, serde_json::json!({"raw": "upstream down"}));
    }

    #[tokio::test]
    async fn connection_failure_is_sanitized() {
        // Nothing listens on port 9 of localhost in test environments
        let transport =
            HttpTransport::new("http://127.0.0.1:9", "TEST", Duration::from_secs(5)).unwrap();
        let (request, url) = transport.request(Method::GET, &["x"]).unwrap();

        let err = transport
            .execute(&Method::GET, request, &url)
            .await
            .expect_err("request should fail");

        match err {
            AppError::ConnectionFailed(msg) => assert!(!msg.contains("127.0.0.1")),
            AppError::Timeout => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
