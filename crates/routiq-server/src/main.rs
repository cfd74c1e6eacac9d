mod cli;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use routiq_core::{
    WebhookConfig, WebhookVerifier, crypto::generate_secret, webhook::EnvelopeHeaders,
};
use routiq_server::{
    AppState, EventLog, ServerConfig, create_app, worker::start_webhook_processor,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; variables may come from the service manager
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "routiq_server=debug,routiq_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or_default() {
        Commands::Run => run().await,
        Commands::Sign {
            payload,
            timestamp,
            id,
            secret,
        } => {
            let id = id.unwrap_or_else(|| format!("msg_{}", ulid::Ulid::new()));
            let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
            let headers = EnvelopeHeaders::signed(&id, timestamp, &payload, &secret)
                .context("Failed to sign payload")?;
            for (name, value) in headers.pairs() {
                println!("{}: {}", name, value);
            }
            Ok(())
        }
        Commands::GenerateSecret => {
            println!("{}", generate_secret());
            Ok(())
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let webhook_config = WebhookConfig::from_env().context("Invalid webhook configuration")?;
    let server_config = ServerConfig::from_env().map_err(anyhow::Error::msg)?;
    let bind_addr = server_config.bind_addr;

    let events = EventLog::for_tolerance(webhook_config.tolerance_secs);
    let verifier = WebhookVerifier::try_new(webhook_config)?;
    let (webhook_tx, worker) = start_webhook_processor(events.clone());

    let state = AppState::new(
        verifier,
        events,
        webhook_tx,
        server_config,
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Routiq webhook server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The app (and with it the last job sender) is gone; let the worker drain
    if let Err(e) = worker.await {
        tracing::error!("Webhook processor task failed: {}", e);
    }

    tracing::info!("Routiq webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
