//! Configuration Management
//!
//! Connection settings for the DuploCloud portal. Values are taken from the
//! command line, then the environment, then the config file.

use crate::duplo::http::HttpSettings;
use crate::error::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const HOST_ENV: &str = "duplo_host";
pub const TOKEN_ENV: &str = "duplo_token";

/// Default HTTP request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Portal base URL
    #[serde(default)]
    pub host: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub ssl_no_verify: bool,
    /// HTTP request timeout in seconds
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    /// Last state file used
    #[serde(default)]
    pub state_path: Option<String>,
}

/// Settings resolved for one run
#[derive(Clone, PartialEq)]
pub struct Connection {
    pub host: String,
    pub token: String,
    pub http: HttpSettings,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("token", &"(sensitive)")
            .field("http", &self.http)
            .finish()
    }
}

/// Read an environment variable under its lower- or upper-case name
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .or_else(|_| std::env::var(name.to_uppercase()))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("duplo-provider").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk. The token is never written.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective host (CLI > env > config)
    pub fn effective_host(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| env_var(HOST_ENV))
            .or_else(|| self.host.clone())
    }

    /// Get effective HTTP settings (CLI > config > defaults)
    pub fn effective_http(&self, cli_timeout: Option<u64>, cli_ssl_no_verify: bool) -> HttpSettings {
        let secs = cli_timeout
            .or(self.http_timeout_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        HttpSettings {
            timeout: Duration::from_secs(secs),
            ssl_no_verify: cli_ssl_no_verify || self.ssl_no_verify,
        }
    }

    /// Resolve everything needed to reach the portal
    pub fn connection(
        &self,
        cli_host: Option<&str>,
        cli_token: Option<&str>,
        cli_timeout: Option<u64>,
        cli_ssl_no_verify: bool,
    ) -> ProviderResult<Connection> {
        let host = self.effective_host(cli_host).ok_or_else(|| {
            ProviderError::validation(
                "provider",
                "duplo_host",
                "not set: pass --host or set duplo_host",
            )
        })?;
        let token = cli_token
            .map(str::to_string)
            .or_else(|| env_var(TOKEN_ENV))
            .ok_or_else(|| {
                ProviderError::validation(
                    "provider",
                    "duplo_token",
                    "not set: pass --token or set duplo_token",
                )
            })?;

        Ok(Connection {
            host,
            token,
            http: self.effective_http(cli_timeout, cli_ssl_no_verify),
        })
    }

    /// Remember the host and state path for the next run
    pub fn remember(&mut self, host: &str, state_path: &str) -> anyhow::Result<()> {
        if self.host.as_deref() == Some(host) && self.state_path.as_deref() == Some(state_path) {
            return Ok(());
        }
        self.host = Some(host.to_string());
        self.state_path = Some(state_path.to_string());
        self.save()
    }
}
