//! Application state for the Routiq webhook server.

use routiq_core::WebhookVerifier;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::EventLog;
use crate::worker::WebhookJob;

/// Server configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Allowed CORS origin for the dashboard.
    pub dashboard_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            dashboard_origin: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let bind_addr = match std::env::var("ROUTIQ_BIND_ADDR") {
            Ok(addr) => addr
                .parse()
                .map_err(|e| format!("Invalid ROUTIQ_BIND_ADDR: {}", e))?,
            Err(_) => Self::default().bind_addr,
        };

        Ok(Self {
            bind_addr,
            dashboard_origin: std::env::var("ROUTIQ_DASHBOARD_ORIGIN").ok(),
        })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Verifier holding the signing secret.
    pub verifier: Arc<WebhookVerifier>,
    /// Recently accepted deliveries.
    pub events: EventLog,
    /// Channel for sending webhook jobs to the worker.
    pub webhook_tx: mpsc::Sender<WebhookJob>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        verifier: WebhookVerifier,
        events: EventLog,
        webhook_tx: mpsc::Sender<WebhookJob>,
        config: ServerConfig,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            events,
            webhook_tx,
            config: Arc::new(config),
        }
    }
}
