//! Webhook processing worker.

use routiq_core::{
    RoutiqError,
    webhook::{EventCategory, WebhookEvent, log_webhook_event},
};
use tokio::sync::mpsc;

use crate::events::{EventLog, ReceivedEventId};

/// Capacity of the job queue between the handler and the worker.
pub const WEBHOOK_QUEUE_CAPACITY: usize = 1000;

/// A webhook processing job.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    /// The ID of the received event.
    pub event_id: ReceivedEventId,
    /// Delivery id the event is keyed by in the log.
    pub delivery_id: String,
}

/// Starts the webhook processor worker.
///
/// Returns a sender for submitting jobs and a handle to the worker task.
pub fn start_webhook_processor(
    events: EventLog,
) -> (mpsc::Sender<WebhookJob>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<WebhookJob>(WEBHOOK_QUEUE_CAPACITY);

    let handle = tokio::spawn(async move {
        run_webhook_processor(events, rx).await;
    });

    (tx, handle)
}

/// Main processor loop.
pub async fn run_webhook_processor(events: EventLog, mut rx: mpsc::Receiver<WebhookJob>) {
    tracing::info!("Webhook processor started");

    while let Some(job) = rx.recv().await {
        tracing::debug!("Processing webhook event {} ({})", job.event_id, job.delivery_id);

        let Some(received) = events.get_by_delivery(&job.delivery_id) else {
            tracing::warn!("Webhook event {} expired before processing", job.event_id);
            continue;
        };

        if let Err(e) = process_event(&received.event) {
            tracing::error!("Failed to process webhook {}: {}", job.event_id, e);
            events.set_error(&job.delivery_id, &e.to_string());
        }

        // Mark as processed regardless of success/failure
        events.mark_processed(&job.delivery_id);
    }

    tracing::info!("Webhook processor stopped");
}

/// Processes a single verified event.
pub fn process_event(event: &WebhookEvent) -> routiq_core::Result<()> {
    log_webhook_event(event, "WEBHOOK");

    let action = event.action().unwrap_or("unknown");

    match event.category() {
        EventCategory::User => {
            let user_id = require_str(event, &["id"])?;
            tracing::info!("User {} {}", user_id, action);
        }
        EventCategory::Organization => {
            let org_id = require_str(event, &["id"])?;
            tracing::info!("Organization {} {}", org_id, action);
        }
        EventCategory::OrganizationMembership => {
            let org_id = require_str(event, &["organization", "id"])?;
            let user_id = require_str(event, &["public_user_data", "user_id"])?;
            tracing::info!("Membership of {} in {} {}", user_id, org_id, action);
        }
        EventCategory::Other => {
            tracing::debug!("Ignoring webhook event type {}", event.event_type);
        }
    }

    Ok(())
}

/// Looks up a string at `path` inside `data`.
fn require_str<'a>(event: &'a WebhookEvent, path: &[&str]) -> routiq_core::Result<&'a str> {
    path.iter()
        .try_fold(&event.data, |value, key| value.get(*key))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            RoutiqError::InvalidPayloadEncoding(format!(
                "{} event is missing data.{}",
                event.event_type,
                path.join(".")
            ))
        })
}
