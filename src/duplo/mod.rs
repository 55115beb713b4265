//! DuploCloud API interaction module
//!
//! This module provides the HTTP plumbing for the DuploCloud management API.
//!
//! # Module Structure
//!
//! - [`client`] - Main client, resolves API paths against the portal host
//! - [`http`] - HTTP utilities, bearer auth and response classification
//!
//! # Example
//!
//! ```ignore
//! use duplo_provider::duplo::client::DuploClient;
//! use duplo_provider::duplo::http::HttpSettings;
//!
//! async fn example() -> duplo_provider::error::ProviderResult<()> {
//!     let client = DuploClient::new("https://portal.duplocloud.net", "token", &HttpSettings::default())?;
//!     let images: Option<serde_json::Value> = client.get("v3/admin/plans/default/images").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
