//! Webhook signature and envelope verification.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::event::WebhookEvent;
use super::headers::{HeaderSource, extract_envelope_headers};
use super::timestamp::{DEFAULT_TOLERANCE_SECS, is_timestamp_fresh};
use crate::config::WebhookConfig;
use crate::crypto::{
    SIGNATURE_VERSION, constant_time_eq, decode_secret, decode_signature, hmac_sha256,
    signed_content,
};
use crate::error::{Result, RoutiqError};

/// Splits a signature header into `(version, signature)` pairs.
///
/// Tokens without a comma are skipped.
pub fn parse_signature_header(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header.split_whitespace().filter_map(|token| token.split_once(','))
}

/// Checks a signature header against `{timestamp}.{payload}`.
///
/// Succeeds if any `v1` token matches the HMAC-SHA256 of the signed content.
pub fn check_signature(
    payload: &str,
    signature_header: &str,
    timestamp: &str,
    secret: &str,
) -> Result<()> {
    if payload.is_empty()
        || signature_header.is_empty()
        || timestamp.is_empty()
        || secret.is_empty()
    {
        return Err(RoutiqError::MissingParameters);
    }

    let key = decode_secret(secret)?;
    let expected = hmac_sha256(&key, signed_content(timestamp, payload).as_bytes());

    let matched = parse_signature_header(signature_header)
        .filter(|(version, _)| *version == SIGNATURE_VERSION)
        .filter_map(|(_, value)| decode_signature(value))
        .any(|provided| constant_time_eq(&expected, &provided));

    if matched {
        Ok(())
    } else {
        Err(RoutiqError::InvalidSignature)
    }
}

/// Verifies a webhook signature. Any failure, including a malformed secret,
/// yields `false`.
pub fn verify_signature(
    payload: &str,
    signature_header: &str,
    timestamp: &str,
    secret: &str,
) -> bool {
    match check_signature(payload, signature_header, timestamp, secret) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(code = e.code(), "Webhook signature check failed: {}", e);
            false
        }
    }
}

/// Outcome of envelope verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<WebhookEvent>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub error: Option<RoutiqError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<RoutiqError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl VerificationResult {
    pub fn valid(event: WebhookEvent) -> Self {
        Self {
            is_valid: true,
            event: Some(event),
            error: None,
        }
    }

    pub fn invalid(error: RoutiqError) -> Self {
        Self {
            is_valid: false,
            event: None,
            error: Some(error),
        }
    }

    /// Human-readable failure message, if verification failed.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    pub fn into_result(self) -> Result<WebhookEvent> {
        match (self.event, self.error) {
            (Some(event), None) => Ok(event),
            (_, Some(error)) => Err(error),
            (None, None) => Err(RoutiqError::InvalidSignature),
        }
    }
}

impl From<Result<WebhookEvent>> for VerificationResult {
    fn from(result: Result<WebhookEvent>) -> Self {
        match result {
            Ok(event) => Self::valid(event),
            Err(error) => Self::invalid(error),
        }
    }
}

/// Verifies signed deliveries against a secret injected at startup.
#[derive(Debug)]
pub struct WebhookVerifier {
    secret: Option<SecretString>,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            secret: config.secret,
            tolerance_secs: config.tolerance_secs,
        }
    }

    /// Like [`WebhookVerifier::new`], but rejects a secret that does not decode.
    pub fn try_new(config: WebhookConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// A verifier with no configured secret; callers must pass one explicitly.
    pub fn unconfigured() -> Self {
        Self {
            secret: None,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self::new(WebhookConfig::with_secret(secret))
    }

    pub fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    /// Runs every check on a delivery and never fails outright.
    ///
    /// `secret` overrides the configured secret when given and non-empty.
    /// The payload is only deserialized after the timestamp and signature
    /// checks pass.
    pub fn verify_envelope<H: HeaderSource + ?Sized>(
        &self,
        payload: &str,
        headers: &H,
        secret: Option<&str>,
    ) -> VerificationResult {
        let result = self.verify(payload, headers, secret);
        if let Err(ref e) = result {
            tracing::warn!(code = e.code(), "Webhook verification failed: {}", e);
        }
        result.into()
    }

    fn verify<H: HeaderSource + ?Sized>(
        &self,
        payload: &str,
        headers: &H,
        secret: Option<&str>,
    ) -> Result<WebhookEvent> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .or_else(|| self.secret.as_ref().map(|s| s.expose_secret()))
            .ok_or(RoutiqError::MissingSecretConfiguration)?;

        let envelope = extract_envelope_headers(headers)?;

        if !is_timestamp_fresh(&envelope.timestamp, self.tolerance_secs) {
            return Err(RoutiqError::InvalidTimestamp);
        }

        if !verify_signature(payload, &envelope.signature, &envelope.timestamp, secret) {
            return Err(RoutiqError::InvalidSignature);
        }

        Ok(serde_json::from_str(payload)?)
    }
}

/// Verifies a delivery with an explicit secret and the default replay window.
pub fn verify_envelope<H: HeaderSource + ?Sized>(
    payload: &str,
    headers: &H,
    secret: Option<&str>,
) -> VerificationResult {
    WebhookVerifier::unconfigured().verify_envelope(payload, headers, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hmac_sha256_base64, sign_payload};
    use crate::webhook::headers::{HEADER_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP};
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
    use chrono::Utc;

    const PAYLOAD: &str = r#"{"test": "data"}"#;
    const TIMESTAMP: &str = "1640995200";
    const EVENT_PAYLOAD: &str = r#"{"type":"user.created","data":{"id":"user_123"}}"#;

    fn test_secret() -> String {
        format!("whsec_{}", BASE64_STANDARD.encode("test-secret-key"))
    }

    fn now() -> String {
        Utc::now().timestamp().to_string()
    }

    fn envelope(timestamp: &str, signature: &str) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_ID, "test-id".to_string()),
            (HEADER_TIMESTAMP, timestamp.to_string()),
            (HEADER_SIGNATURE, signature.to_string()),
        ]
    }

    #[test]
    fn test_valid_signature() {
        let signature = sign_payload(PAYLOAD, TIMESTAMP, &test_secret()).unwrap();
        assert!(verify_signature(PAYLOAD, &signature, TIMESTAMP, &test_secret()));
    }

    #[test]
    fn test_invalid_signature() {
        assert!(!verify_signature(PAYLOAD, "v1,invalid-signature", TIMESTAMP, &test_secret()));
        assert_eq!(
            check_signature(PAYLOAD, "v1,invalid-signature", TIMESTAMP, &test_secret()),
            Err(RoutiqError::InvalidSignature)
        );
    }

    #[test]
    fn test_tamper_sensitivity() {
        let secret = test_secret();
        let signature = sign_payload(PAYLOAD, TIMESTAMP, &secret).unwrap();

        assert!(!verify_signature(r#"{"test": "datA"}"#, &signature, TIMESTAMP, &secret));
        assert!(!verify_signature(PAYLOAD, &signature, "1640995201", &secret));

        // Flip one base64 character of the signature value.
        let mut tampered: Vec<char> = signature.chars().collect();
        tampered[3] = if tampered[3] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();
        assert!(!verify_signature(PAYLOAD, &tampered, TIMESTAMP, &secret));
    }

    #[test]
    fn test_reserialized_payload_fails() {
        let secret = test_secret();
        let signature = sign_payload(PAYLOAD, TIMESTAMP, &secret).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(PAYLOAD).unwrap();
        let reserialized = serde_json::to_string(&parsed).unwrap();
        assert_ne!(reserialized, PAYLOAD);
        assert!(!verify_signature(&reserialized, &signature, TIMESTAMP, &secret));
    }

    #[test]
    fn test_multiple_signatures() {
        let secret = test_secret();
        let valid = sign_payload(PAYLOAD, TIMESTAMP, &secret).unwrap();

        let header = format!("v1,invalid-sig {}", valid);
        assert!(verify_signature(PAYLOAD, &header, TIMESTAMP, &secret));

        let header = format!("{} v1,invalid-sig", valid);
        assert!(verify_signature(PAYLOAD, &header, TIMESTAMP, &secret));
    }

    #[test]
    fn test_unsupported_version_ignored() {
        let secret = test_secret();
        let valid = sign_payload(PAYLOAD, TIMESTAMP, &secret).unwrap();
        let v2 = valid.replacen("v1,", "v2,", 1);
        assert!(!verify_signature(PAYLOAD, &v2, TIMESTAMP, &secret));
    }

    #[test]
    fn test_malformed_tokens_skipped() {
        let secret = test_secret();
        let valid = sign_payload(PAYLOAD, TIMESTAMP, &secret).unwrap();
        let header = format!("garbage   {}\tnocomma", valid);
        assert!(verify_signature(PAYLOAD, &header, TIMESTAMP, &secret));
        assert!(!verify_signature(PAYLOAD, "garbage nocomma", TIMESTAMP, &secret));
    }

    #[test]
    fn test_unequal_length_signature_is_non_match() {
        let secret = test_secret();
        let content = format!("{}.{}", TIMESTAMP, PAYLOAD);
        let full = hmac_sha256_base64(b"test-secret-key", content.as_bytes());
        let digest = BASE64_STANDARD.decode(&full).unwrap();
        let truncated = BASE64_STANDARD.encode(&digest[..16]);
        assert!(!verify_signature(PAYLOAD, &format!("v1,{}", truncated), TIMESTAMP, &secret));
    }

    #[test]
    fn test_secret_without_prefix() {
        let unprefixed = BASE64_STANDARD.encode("test-secret-key");
        let signature = sign_payload(PAYLOAD, TIMESTAMP, &unprefixed).unwrap();

        assert!(verify_signature(PAYLOAD, &signature, TIMESTAMP, &unprefixed));
        assert!(verify_signature(PAYLOAD, &signature, TIMESTAMP, &test_secret()));
    }

    #[test]
    fn test_missing_parameters() {
        let secret = test_secret();
        let signature = sign_payload(PAYLOAD, TIMESTAMP, &secret).unwrap();

        assert!(!verify_signature("", "sig", "time", "secret"));
        assert!(!verify_signature(PAYLOAD, "", TIMESTAMP, &secret));
        assert!(!verify_signature(PAYLOAD, &signature, "", &secret));
        assert!(!verify_signature(PAYLOAD, &signature, TIMESTAMP, ""));
        assert_eq!(
            check_signature(PAYLOAD, &signature, TIMESTAMP, ""),
            Err(RoutiqError::MissingParameters)
        );
    }

    #[test]
    fn test_invalid_base64_secret() {
        assert!(!verify_signature(PAYLOAD, "v1,sig", TIMESTAMP, "whsec_invalid-base64!"));
        assert_eq!(
            check_signature(PAYLOAD, "v1,sig", TIMESTAMP, "whsec_invalid-base64!"),
            Err(RoutiqError::InvalidSecretEncoding)
        );
    }

    #[test]
    fn test_verify_envelope_valid() {
        let timestamp = now();
        let signature = sign_payload(EVENT_PAYLOAD, &timestamp, &test_secret()).unwrap();
        let headers = envelope(&timestamp, &signature);

        let result = verify_envelope(EVENT_PAYLOAD, headers.as_slice(), Some(&test_secret()));
        assert!(result.is_valid);
        assert!(result.error.is_none());
        let event = result.event.unwrap();
        assert_eq!(event.event_type, "user.created");
        assert_eq!(event.data_id(), Some("user_123"));
    }

    #[test]
    fn test_verify_envelope_uses_configured_secret() {
        let timestamp = now();
        let signature = sign_payload(EVENT_PAYLOAD, &timestamp, &test_secret()).unwrap();
        let headers = envelope(&timestamp, &signature);

        let verifier = WebhookVerifier::with_secret(test_secret());
        assert!(verifier.verify_envelope(EVENT_PAYLOAD, headers.as_slice(), None).is_valid);
        assert!(verifier.verify_envelope(EVENT_PAYLOAD, headers.as_slice(), Some("")).is_valid);
    }

    #[test]
    fn test_explicit_secret_overrides_configured() {
        let timestamp = now();
        let signature = sign_payload(EVENT_PAYLOAD, &timestamp, &test_secret()).unwrap();
        let headers = envelope(&timestamp, &signature);

        let verifier = WebhookVerifier::with_secret(BASE64_STANDARD.encode("other-key"));
        assert!(!verifier.verify_envelope(EVENT_PAYLOAD, headers.as_slice(), None).is_valid);
        assert!(
            verifier
                .verify_envelope(EVENT_PAYLOAD, headers.as_slice(), Some(&test_secret()))
                .is_valid
        );
    }

    #[test]
    fn test_try_new_rejects_undecodable_secret() {
        let err =
            WebhookVerifier::try_new(WebhookConfig::with_secret("whsec_not base64!!")).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION");

        let verifier = WebhookVerifier::try_new(WebhookConfig::with_secret(test_secret())).unwrap();
        assert!(verifier.is_configured());
        assert!(WebhookVerifier::try_new(WebhookConfig::default()).is_ok());
    }

    #[test]
    fn test_verify_envelope_missing_secret() {
        let headers = envelope(&now(), "v1,signature");

        let result = WebhookVerifier::new(WebhookConfig::default()).verify_envelope(
            EVENT_PAYLOAD,
            headers.as_slice(),
            None,
        );
        assert!(!result.is_valid);
        assert_eq!(result.error, Some(RoutiqError::MissingSecretConfiguration));
        assert!(result.error_message().unwrap().contains("not configured"));
    }

    #[test]
    fn test_verify_envelope_stale_timestamp() {
        let old = (Utc::now().timestamp() - 400).to_string();
        let signature = sign_payload(EVENT_PAYLOAD, &old, &test_secret()).unwrap();
        let headers = envelope(&old, &signature);

        let result = verify_envelope(EVENT_PAYLOAD, headers.as_slice(), Some(&test_secret()));
        assert!(!result.is_valid);
        assert_eq!(result.error, Some(RoutiqError::InvalidTimestamp));
        assert!(result.error_message().unwrap().contains("timestamp"));
    }

    #[test]
    fn test_verify_envelope_custom_tolerance() {
        let old = (Utc::now().timestamp() - 400).to_string();
        let signature = sign_payload(EVENT_PAYLOAD, &old, &test_secret()).unwrap();
        let headers = envelope(&old, &signature);

        let verifier = WebhookVerifier::with_secret(test_secret()).with_tolerance(600);
        assert!(verifier.verify_envelope(EVENT_PAYLOAD, headers.as_slice(), None).is_valid);
    }

    #[test]
    fn test_verify_envelope_invalid_signature() {
        let headers = envelope(&now(), "v1,invalid-signature");

        let result = verify_envelope(EVENT_PAYLOAD, headers.as_slice(), Some(&test_secret()));
        assert_eq!(result.error, Some(RoutiqError::InvalidSignature));
        assert_eq!(
            result.error_message().as_deref(),
            Some("Webhook signature verification failed")
        );
    }

    #[test]
    fn test_verify_envelope_invalid_json() {
        let payload = "invalid-json{";
        let timestamp = now();
        let signature = sign_payload(payload, &timestamp, &test_secret()).unwrap();
        let headers = envelope(&timestamp, &signature);

        let result = verify_envelope(payload, headers.as_slice(), Some(&test_secret()));
        assert!(!result.is_valid);
        assert_eq!(result.error.as_ref().map(|e| e.code()), Some("INVALID_PAYLOAD"));
        assert!(result.error_message().unwrap().contains("Invalid JSON payload"));
    }

    #[test]
    fn test_verify_envelope_missing_headers() {
        let headers = [(HEADER_ID, "test-id")];

        let result = verify_envelope(EVENT_PAYLOAD, &headers, Some(&test_secret()));
        assert!(!result.is_valid);
        assert!(result.error_message().unwrap().contains("Missing required webhook headers"));
    }

    #[test]
    fn test_stale_forged_payload_not_parsed() {
        // Invalid JSON with a bad signature reports the signature, not the payload.
        let headers = envelope(&now(), "v1,AAAA");
        let result = verify_envelope("not json", headers.as_slice(), Some(&test_secret()));
        assert_eq!(result.error, Some(RoutiqError::InvalidSignature));
    }

    #[test]
    fn test_into_result() {
        let event = WebhookEvent {
            event_type: "user.created".to_string(),
            data: serde_json::Value::Null,
            object: None,
            timestamp: None,
        };
        assert_eq!(VerificationResult::valid(event.clone()).into_result(), Ok(event));
        assert_eq!(
            VerificationResult::invalid(RoutiqError::InvalidTimestamp).into_result(),
            Err(RoutiqError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_result_serializes_error_message() {
        let result = VerificationResult::invalid(RoutiqError::InvalidSignature);
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["error"], "Webhook signature verification failed");
        assert!(json.get("event").is_none());
    }
}
