//! DuploCloud Client
//!
//! Main client for the DuploCloud management API, combining the portal
//! host with the authenticated HTTP client.

use super::http::{DuploHttpClient, HttpSettings};
use crate::error::{ProviderError, ProviderResult};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Main DuploCloud client
#[derive(Clone, Debug)]
pub struct DuploClient {
    pub http: DuploHttpClient,
    pub host: Url,
}

impl DuploClient {
    /// Create a new client for the portal at `host`
    pub fn new(host: &str, token: &str, settings: &HttpSettings) -> ProviderResult<Self> {
        let host = parse_host(host)?;
        let http = DuploHttpClient::new(token, settings)?;
        Ok(Self { http, host })
    }

    /// Build an absolute API URL from a path relative to the portal root
    pub fn url(&self, path: &str) -> ProviderResult<String> {
        self.host
            .join(path.trim_start_matches('/'))
            .map(|u| u.to_string())
            .map_err(|e| ProviderError::Registry(format!("invalid API path '{}': {}", path, e)))
    }

    /// Send a request to a path relative to the portal root.
    /// `None` means the API returned no object.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ProviderResult<Option<Value>> {
        let url = self.url(path)?;
        self.http.request(method, &url, body).await
    }
}

fn parse_host(host: &str) -> ProviderResult<Url> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::validation(
            "provider",
            "duplo_host",
            "must not be empty",
        ));
    }
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&normalized).map_err(|e| {
        ProviderError::validation("provider", "duplo_host", format!("'{}' is not a URL: {}", host, e))
    })
}

/// Deserialize an API response into a typed struct
pub fn decode<T: DeserializeOwned>(value: Value, url: &str) -> ProviderResult<T> {
    serde_json::from_value(value).map_err(|e| {
        ProviderError::upstream("unexpected response shape", url, e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str) -> DuploClient {
        DuploClient::new(host, "token", &HttpSettings::default()).unwrap()
    }

    #[test]
    fn test_url_joins_relative_paths() {
        let c = client("https://portal.duplocloud.net");
        assert_eq!(
            c.url("v3/admin/plans/default/images").unwrap(),
            "https://portal.duplocloud.net/v3/admin/plans/default/images"
        );
    }

    #[test]
    fn test_url_strips_leading_slash_and_keeps_host_prefix() {
        let c = client("https://example.com/duplo/");
        assert_eq!(
            c.url("/admin/AddTenant").unwrap(),
            "https://example.com/duplo/admin/AddTenant"
        );
    }

    #[test]
    fn test_empty_host_is_rejected() {
        let err = DuploClient::new("  ", "t", &HttpSettings::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }

    #[test]
    fn test_decode_reports_shape_errors_as_upstream() {
        let err = decode::<Vec<String>>(serde_json::json!({"a": 1}), "http://x").unwrap_err();
        assert!(matches!(err, ProviderError::Upstream { .. }));
    }
}
