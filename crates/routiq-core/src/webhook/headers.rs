//! Envelope header extraction.

use std::collections::HashMap;

use http::HeaderMap;
use serde::Serialize;

use crate::crypto::sign_payload;
use crate::error::{Result, RoutiqError};

/// Header carrying the delivery id (idempotency key).
pub const HEADER_ID: &str = "svix-id";
/// Header carrying the signing time in Unix seconds.
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
/// Header carrying space-separated `version,signature` tokens.
pub const HEADER_SIGNATURE: &str = "svix-signature";

/// Case-insensitive header lookup.
pub trait HeaderSource {
    /// Returns the value of the named header, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> HeaderSource for [(K, V)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.as_ref().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    }
}

impl<K: AsRef<str>, V: AsRef<str>, const N: usize> HeaderSource for [(K, V); N] {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

/// The three headers every signed delivery must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}

impl EnvelopeHeaders {
    /// Builds the headers of a delivery signed with `secret`.
    pub fn signed(id: &str, timestamp: i64, payload: &str, secret: &str) -> Result<Self> {
        let timestamp = timestamp.to_string();
        let signature = sign_payload(payload, &timestamp, secret)?;
        Ok(Self {
            id: id.to_string(),
            timestamp,
            signature,
        })
    }

    /// Header name/value pairs in wire order.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (HEADER_ID, self.id.as_str()),
            (HEADER_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }
}

/// Extracts the envelope headers, failing if any is missing or empty.
pub fn extract_envelope_headers<H: HeaderSource + ?Sized>(headers: &H) -> Result<EnvelopeHeaders> {
    let lookup = |name: &str| headers.header(name).filter(|v| !v.is_empty());

    let id = lookup(HEADER_ID);
    let timestamp = lookup(HEADER_TIMESTAMP);
    let signature = lookup(HEADER_SIGNATURE);

    match (id, timestamp, signature) {
        (Some(id), Some(timestamp), Some(signature)) => Ok(EnvelopeHeaders {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            signature: signature.to_string(),
        }),
        (id, timestamp, signature) => {
            let missing = [
                (HEADER_ID, id.is_none()),
                (HEADER_TIMESTAMP, timestamp.is_none()),
                (HEADER_SIGNATURE, signature.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            Err(RoutiqError::MissingHeaders(missing))
        }
    }
}
