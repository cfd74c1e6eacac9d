//! Webhook configuration loaded from environment.

use secrecy::{ExposeSecret, SecretString};

use crate::crypto::decode_secret;
use crate::error::{Result, RoutiqError};
use crate::webhook::DEFAULT_TOLERANCE_SECS;

/// Environment variable holding the signing secret.
pub const SECRET_ENV: &str = "CLERK_WEBHOOK_SECRET";
/// Environment variable overriding the replay window.
pub const TOLERANCE_ENV: &str = "ROUTIQ_WEBHOOK_TOLERANCE_SECS";

/// Webhook verification settings, read once at startup.
#[derive(Debug)]
pub struct WebhookConfig {
    /// Signing secret, possibly `whsec_` prefixed.
    pub secret: Option<SecretString>,
    /// Replay window in seconds.
    pub tolerance_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl WebhookConfig {
    /// Loads configuration from environment variables.
    ///
    /// An empty secret counts as unset; a secret that does not decode is
    /// rejected.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(SECRET_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let tolerance_secs = match std::env::var(TOLERANCE_ENV) {
            Ok(value) => value.trim().parse::<u64>().map_err(|e| {
                RoutiqError::Configuration(format!("Invalid {}: {}", TOLERANCE_ENV, e))
            })?,
            Err(_) => DEFAULT_TOLERANCE_SECS,
        };

        if secret.is_none() {
            tracing::warn!("{} is not set; webhook deliveries will be rejected", SECRET_ENV);
        }

        let config = Self {
            secret,
            tolerance_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the secret, if any, is valid base64 after `whsec_`.
    pub fn validate(&self) -> Result<()> {
        match &self.secret {
            Some(secret) => decode_secret(secret.expose_secret()).map(drop).map_err(|_| {
                RoutiqError::Configuration(format!("{} is not valid base64", SECRET_ENV))
            }),
            None => Ok(()),
        }
    }

    /// Configuration with the given secret and the default replay window.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(SecretString::from(secret.into())),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Checks if a signing secret is configured.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars_unset([SECRET_ENV, TOLERANCE_ENV], || {
            let config = WebhookConfig::from_env().unwrap();
            assert!(!config.is_configured());
            assert_eq!(config.tolerance_secs, DEFAULT_TOLERANCE_SECS);
        });
    }

    #[test]
    fn test_from_env_reads_values() {
        temp_env::with_vars(
            [(SECRET_ENV, Some("whsec_dGVzdA==")), (TOLERANCE_ENV, Some("120"))],
            || {
                let config = WebhookConfig::from_env().unwrap();
                assert_eq!(config.secret.unwrap().expose_secret(), "whsec_dGVzdA==");
                assert_eq!(config.tolerance_secs, 120);
            },
        );
    }

    #[test]
    fn test_from_env_empty_secret_is_unset() {
        temp_env::with_vars([(SECRET_ENV, Some("  ")), (TOLERANCE_ENV, None)], || {
            assert!(!WebhookConfig::from_env().unwrap().is_configured());
        });
    }

    #[test]
    fn test_from_env_rejects_undecodable_secret() {
        temp_env::with_vars(
            [(SECRET_ENV, Some("whsec_not base64!!")), (TOLERANCE_ENV, None)],
            || {
                let err = WebhookConfig::from_env().unwrap_err();
                assert_eq!(err.code(), "CONFIGURATION");
                assert_eq!(
                    err.to_string(),
                    format!("Configuration error: {} is not valid base64", SECRET_ENV)
                );
            },
        );
    }

    #[test]
    fn test_validate() {
        assert!(WebhookConfig::default().validate().is_ok());
        assert!(WebhookConfig::with_secret("whsec_dGVzdA==").validate().is_ok());
        assert!(WebhookConfig::with_secret("dGVzdA==").validate().is_ok());
        assert!(WebhookConfig::with_secret("whsec_invalid-base64!").validate().is_err());
    }

    #[test]
    fn test_from_env_invalid_tolerance() {
        temp_env::with_vars([(SECRET_ENV, None::<&str>), (TOLERANCE_ENV, Some("five"))], || {
            let err = WebhookConfig::from_env().unwrap_err();
            assert_eq!(err.code(), "CONFIGURATION");
            assert!(err.to_string().contains(TOLERANCE_ENV));
        });
    }
}
