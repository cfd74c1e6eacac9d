//! Routiq webhook server library.
//!
//! This library exposes the server components for use in integration tests.

pub mod events;
pub mod routes;
pub mod state;
pub mod worker;

pub use events::{EventLog, ReceivedEvent, ReceivedEventId, Recorded};
pub use routes::{api_router, create_app};
pub use state::{AppState, ServerConfig};
pub use worker::WebhookJob;

// Re-export routiq_core for convenience
pub use routiq_core;

// Test utilities are available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
