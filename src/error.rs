//! Error types for wo.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WoError>;

#[derive(Debug, Error)]
pub enum WoError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Internal consistency check failed. Never retried.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("remote call failed with HTTP {status}{}: {message}", code_suffix(.code))]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("transient remote failure: {0}")]
    TransientRemote(String),

    #[error("operation {operation} still {status} after polling")]
    OperationPending { operation: String, status: String },

    #[error("operation {operation} ended {status}: {message}")]
    OperationFailed {
        operation: String,
        status: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WoError {
    /// Whether a retry has a reasonable chance of a different outcome.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientRemote(_) | Self::OperationPending { .. } => true,
            Self::Remote { status, .. } => is_transient_status(*status),
            Self::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().is_some_and(|s| is_transient_status(s.as_u16()))
            }
            _ => false,
        }
    }

    /// Whether the failure came from the control plane (or the way to it).
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Remote { .. }
                | Self::TransientRemote(_)
                | Self::OperationPending { .. }
                | Self::OperationFailed { .. }
                | Self::Http(_)
        )
    }

    /// Stable code used in robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::MissingConfig(_) => "missing_config",
            Self::Validation(_) => "validation",
            Self::Invariant(_) => "invariant",
            Self::Auth(_) => "auth",
            Self::Remote { .. } => "remote",
            Self::TransientRemote(_) => "transient_remote",
            Self::OperationPending { .. } => "operation_pending",
            Self::OperationFailed { .. } => "operation_failed",
            Self::Http(_) => "http",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

const fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}
