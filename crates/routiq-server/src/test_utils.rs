//! Test utilities for routiq-server integration tests.

use axum::Router;
use chrono::Utc;
use routiq_core::{WebhookConfig, WebhookVerifier, webhook::EnvelopeHeaders};
use tokio::sync::mpsc;

use crate::events::EventLog;
use crate::state::{AppState, ServerConfig};
use crate::worker::WebhookJob;

/// Signing secret used in all tests (`whsec_` + base64 of `test-secret-key`).
pub const TEST_SECRET: &str = "whsec_dGVzdC1zZWNyZXQta2V5";

/// Handles kept by tests to observe what the server queued.
pub struct TestConfig {
    pub events: EventLog,
    pub webhook_rx: mpsc::Receiver<WebhookJob>,
}

/// Creates test application state. Without a secret the verifier is unconfigured.
pub fn setup_test_state(secret: Option<&str>) -> (AppState, TestConfig) {
    setup_test_state_with_capacity(secret, 100)
}

pub fn setup_test_state_with_capacity(
    secret: Option<&str>,
    queue_capacity: usize,
) -> (AppState, TestConfig) {
    let config = match secret {
        Some(secret) => WebhookConfig::with_secret(secret),
        None => WebhookConfig::default(),
    };
    let events = EventLog::for_tolerance(config.tolerance_secs);
    let (webhook_tx, webhook_rx) = mpsc::channel(queue_capacity);

    let state = AppState::new(
        WebhookVerifier::new(config),
        events.clone(),
        webhook_tx,
        ServerConfig::default(),
    );

    (state, TestConfig { events, webhook_rx })
}

/// Creates a test application signed with [`TEST_SECRET`].
pub fn create_test_app_with_state() -> (Router, TestConfig) {
    let (state, config) = setup_test_state(Some(TEST_SECRET));
    (crate::routes::create_app(state), config)
}

/// Signs `payload` with [`TEST_SECRET`] at the current time.
pub fn signed_headers(id: &str, payload: &str) -> EnvelopeHeaders {
    signed_headers_at(id, payload, Utc::now().timestamp())
}

pub fn signed_headers_at(id: &str, payload: &str, timestamp: i64) -> EnvelopeHeaders {
    EnvelopeHeaders::signed(id, timestamp, payload, TEST_SECRET)
        .expect("test secret is valid base64")
}
