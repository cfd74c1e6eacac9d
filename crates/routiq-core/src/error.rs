//! Error types for the Routiq core library.

use thiserror::Error;

/// Core error type for webhook verification and configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutiqError {
    #[error("Missing required parameters for webhook verification")]
    MissingParameters,

    #[error("Missing required webhook headers: {}", .0.join(", "))]
    MissingHeaders(Vec<&'static str>),

    #[error("Webhook timestamp is too old or invalid")]
    InvalidTimestamp,

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Webhook secret is not valid base64")]
    InvalidSecretEncoding,

    #[error("Invalid JSON payload: {0}")]
    InvalidPayloadEncoding(String),

    #[error("Webhook secret is not configured (set CLERK_WEBHOOK_SECRET)")]
    MissingSecretConfiguration,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RoutiqError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RoutiqError::MissingParameters => "MISSING_PARAMETERS",
            RoutiqError::MissingHeaders(_) => "MISSING_HEADERS",
            RoutiqError::InvalidTimestamp => "INVALID_TIMESTAMP",
            RoutiqError::InvalidSignature => "INVALID_SIGNATURE",
            RoutiqError::InvalidSecretEncoding => "INVALID_SECRET_ENCODING",
            RoutiqError::InvalidPayloadEncoding(_) => "INVALID_PAYLOAD",
            RoutiqError::MissingSecretConfiguration => "MISSING_SECRET",
            RoutiqError::Configuration(_) => "CONFIGURATION",
        }
    }
}

impl From<serde_json::Error> for RoutiqError {
    fn from(e: serde_json::Error) -> Self {
        RoutiqError::InvalidPayloadEncoding(e.to_string())
    }
}

/// Result type alias for Routiq operations.
pub type Result<T> = std::result::Result<T, RoutiqError>;
