//! HTTP utilities for DuploCloud REST API calls

use crate::error::{ProviderError, ProviderResult};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Appended to 400/404 messages from the legacy (non-v3) endpoints, which use
/// those codes for "no such object" as well as for bad input.
const LEGACY_NOT_FOUND_HINT: &str = "Please verify object exists in duplocloud.";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Bodies the API sends when there is no object to return
fn is_empty_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || trimmed == "null" || trimmed == "\"\""
}

/// Transport settings for the HTTP client
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub ssl_no_verify: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ssl_no_verify: false,
        }
    }
}

/// HTTP client wrapper for DuploCloud API calls
#[derive(Clone)]
pub struct DuploHttpClient {
    client: Client,
    token: String,
}

impl std::fmt::Debug for DuploHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuploHttpClient")
            .field("token", &"(sensitive)")
            .finish()
    }
}

impl DuploHttpClient {
    /// Create a new HTTP client authenticating with `token`
    pub fn new(token: &str, settings: &HttpSettings) -> ProviderResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("duplo-provider/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.ssl_no_verify)
            .build()
            .map_err(|e| ProviderError::upstream("failed to create HTTP client", "", e.to_string()))?;

        Ok(Self {
            client,
            token: token.to_string(),
        })
    }

    /// Send a request and classify the response.
    ///
    /// 404 becomes [`ProviderError::NotFound`], every other non-2xx status becomes
    /// [`ProviderError::Upstream`] carrying the remote body verbatim.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ProviderResult<Option<Value>> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            ProviderError::upstream(format!("{} request failed", method), url, e.to_string())
        })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| {
            ProviderError::upstream(
                format!("{} response could not be read", method),
                url,
                e.to_string(),
            )
        })?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));

            let mut message = response_body;
            let legacy = !url.contains("/v3/");
            if legacy && (status.as_u16() == 400 || status.as_u16() == 404) {
                if !message.is_empty() {
                    message.push(' ');
                }
                message.push_str(LEGACY_NOT_FOUND_HINT);
            }

            if status.as_u16() == 404 {
                return Err(ProviderError::NotFound {
                    url: url.to_string(),
                    message,
                });
            }
            return Err(ProviderError::Upstream {
                context: format!("{} request failed", method),
                status: Some(status.as_u16()),
                url: url.to_string(),
                message,
            });
        }

        if is_empty_body(&response_body) {
            return Ok(None);
        }

        serde_json::from_str(&response_body).map(Some).map_err(|e| {
            tracing::error!(
                "Failed to parse response JSON: {} - {}",
                e,
                sanitize_for_log(&response_body)
            );
            ProviderError::upstream(
                format!("{} response was not valid JSON", method),
                url,
                e.to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.contains("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc d"), "abc d");
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = format!("{}é{}", "a".repeat(199), "b".repeat(100));
        let out = sanitize_for_log(&body);
        assert!(out.contains("[truncated"));
    }

    #[test]
    fn test_empty_body_variants() {
        assert!(is_empty_body(""));
        assert!(is_empty_body("null"));
        assert!(is_empty_body("\"\""));
        assert!(is_empty_body("  \n"));
        assert!(!is_empty_body("{}"));
        assert!(!is_empty_body("[]"));
    }
}
