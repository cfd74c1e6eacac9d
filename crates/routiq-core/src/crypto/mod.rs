//! Cryptographic utilities for webhook signing and verification.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{Result, RoutiqError};

type HmacSha256 = Hmac<Sha256>;

/// Prefix on secrets copied from the provider dashboard.
pub const SECRET_PREFIX: &str = "whsec_";

/// Signature scheme version accepted in the signature header.
pub const SIGNATURE_VERSION: &str = "v1";

/// Maximum webhook payload size (1MB).
pub const MAX_WEBHOOK_SIZE: usize = 1024 * 1024;

/// Strips exactly one leading `whsec_` from a secret, if present.
pub fn normalize_secret(secret: &str) -> &str {
    secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret)
}

/// Decodes a (possibly prefixed) base64 secret into raw key bytes.
pub fn decode_secret(secret: &str) -> Result<Zeroizing<Vec<u8>>> {
    BASE64_STANDARD
        .decode(normalize_secret(secret))
        .map(Zeroizing::new)
        .map_err(|_| RoutiqError::InvalidSecretEncoding)
}

/// Computes HMAC-SHA256 of data with the given key.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Computes HMAC-SHA256 of data with the given key and returns it as base64.
pub fn hmac_sha256_base64(key: &[u8], data: &[u8]) -> String {
    BASE64_STANDARD.encode(hmac_sha256(key, data))
}

/// Builds the exact content that gets signed: `{timestamp}.{payload}`.
pub fn signed_content(timestamp: &str, payload: &str) -> String {
    format!("{}.{}", timestamp, payload)
}

/// Signs a payload and returns a single `v1,<base64>` signature token.
///
/// Useful for producing test deliveries; receivers never call this.
pub fn sign_payload(payload: &str, timestamp: &str, secret: &str) -> Result<String> {
    let key = decode_secret(secret)?;
    let digest = hmac_sha256_base64(&key, signed_content(timestamp, payload).as_bytes());
    Ok(format!("{},{}", SIGNATURE_VERSION, digest))
}

/// Generates a new `whsec_` prefixed secret from 32 random bytes.
pub fn generate_secret() -> String {
    let mut bytes = Zeroizing::new([0u8; 32]);
    rand::thread_rng().fill_bytes(&mut *bytes);
    format!("{}{}", SECRET_PREFIX, BASE64_STANDARD.encode(&*bytes))
}

/// Decodes a base64 signature value from the signature header.
pub fn decode_signature(value: &str) -> Option<Vec<u8>> {
    BASE64_STANDARD.decode(value).ok()
}

/// Constant-time equality comparison.
///
/// Inputs of different length never match.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
