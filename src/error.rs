//! Error types for provider operations
//!
//! Every variant carries the identifying context of the failing resource so a
//! message read out of a log is enough to find the object on the remote side.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Main error type for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote API answered 404 for the addressed object
    #[error("not found: {url}")]
    NotFound {
        /// Request URL that returned 404
        url: String,
        /// Remote response body, verbatim
        message: String,
    },

    /// A persisted composite identifier did not split into the expected segments
    #[error("invalid identifier '{id}': expected {expected} segment(s) separated by '/'")]
    InvalidIdentifier {
        /// The offending identifier
        id: String,
        /// Number of segments the resource type requires
        expected: usize,
    },

    /// Any non-404 failure reported by the remote API or the transport
    #[error("{context}: url: {url}, status: {}, message: {message}", status_label(.status))]
    Upstream {
        /// What was being attempted, including the resource identity
        context: String,
        /// HTTP status, absent for transport failures
        status: Option<u16>,
        /// Request URL
        url: String,
        /// Remote error text, verbatim
        message: String,
    },

    /// A wait loop ran out of time before the resource reached its target state
    #[error("timed out after {timeout:?} waiting for {what} '{id}'")]
    Timeout {
        /// What the wait was for (e.g. "gcp redis instance to be READY")
        what: String,
        /// Identity of the resource being waited on
        id: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// A wait loop was aborted by its cancellation token
    #[error("cancelled while waiting for {what} '{id}'")]
    Cancelled {
        /// What the wait was for
        what: String,
        /// Identity of the resource being waited on
        id: String,
    },

    /// A declaration failed schema or resource-level validation
    #[error("validation error for {resource_type}.{field}: {message}")]
    Validation {
        /// Resource type the declaration belongs to
        resource_type: String,
        /// Field path of the invalid value
        field: String,
        /// Description of what's invalid
        message: String,
    },

    /// Malformed embedded resource definition or unknown resource type
    #[error("registry error: {0}")]
    Registry(String),

    /// State file or manifest could not be read or written
    #[error("state error: {message}")]
    State {
        /// Description of what failed
        message: String,
    },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl ProviderError {
    /// Create a validation error
    pub fn validation(
        resource_type: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource_type: resource_type.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an upstream error that did not come from an HTTP response
    pub fn upstream(context: impl Into<String>, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            context: context.into(),
            status: None,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Check if this error means the remote object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Prefix the context of an upstream error with the operation being attempted.
    /// Other variants are returned unchanged.
    pub fn with_context(self, what: impl Into<String>) -> Self {
        match self {
            Self::Upstream {
                context,
                status,
                url,
                message,
            } => {
                let what = what.into();
                let context = if context.is_empty() {
                    what
                } else {
                    format!("{}: {}", what, context)
                };
                Self::Upstream {
                    context,
                    status,
                    url,
                    message,
                }
            }
            other => other,
        }
    }
}
