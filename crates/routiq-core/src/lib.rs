//! Routiq Core Library
//!
//! Signature verification, envelope checks and event types for inbound
//! identity-provider webhooks.

pub mod config;
pub mod crypto;
pub mod error;
pub mod webhook;

pub use config::WebhookConfig;
pub use error::{Result, RoutiqError};
pub use webhook::{VerificationResult, WebhookEvent, WebhookVerifier};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
