//! Webhook endpoint handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use routiq_core::{
    RoutiqError,
    crypto::MAX_WEBHOOK_SIZE,
    webhook::{HEADER_ID, HeaderSource},
};
use serde_json::{Value, json};

use crate::events::{ReceivedEventId, Recorded};
use crate::state::AppState;
use crate::worker::WebhookJob;

/// Maps a verification failure to the response status.
pub fn error_status(error: &RoutiqError) -> StatusCode {
    match error {
        RoutiqError::MissingSecretConfiguration => StatusCode::SERVICE_UNAVAILABLE,
        RoutiqError::InvalidSignature => StatusCode::UNAUTHORIZED,
        RoutiqError::InvalidSecretEncoding | RoutiqError::Configuration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

fn error_response(error: &RoutiqError) -> (StatusCode, Json<Value>) {
    (
        error_status(error),
        Json(json!({"error": error.to_string(), "code": error.code()})),
    )
}

/// Handler for identity-provider webhooks.
///
/// POST /api/webhooks/clerk
pub async fn handle_clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // 1. Check body size limit
    if body.len() > MAX_WEBHOOK_SIZE {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({"error": "Payload too large"})),
        );
    }

    // 2. The raw body is verified as-is, so it must already be UTF-8
    let Ok(payload) = std::str::from_utf8(&body) else {
        return error_response(&RoutiqError::InvalidPayloadEncoding(
            "body is not valid UTF-8".to_string(),
        ));
    };

    // 3. Verify headers, timestamp and signature, then parse
    let event = match state.verifier.verify_envelope(payload, &headers, None).into_result() {
        Ok(event) => event,
        Err(e) => return error_response(&e),
    };

    // Present once verification has passed
    let delivery_id = headers.header(HEADER_ID).unwrap_or_default().to_string();

    // 4. Reserve a queue slot (non-blocking) before anything is recorded
    let permit = match state.webhook_tx.try_reserve() {
        Ok(permit) => permit,
        Err(e) => {
            if state.events.contains(&delivery_id) {
                return (StatusCode::OK, Json(json!({"status": "duplicate"})));
            }
            tracing::warn!("Webhook queue unavailable ({}), rejecting delivery {}", e, delivery_id);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "Webhook queue is full, retry later"})),
            );
        }
    };

    // 5. Check idempotency, then queue for async processing
    let event_id = match state.events.record(&delivery_id, event) {
        Recorded::New(id) => id,
        Recorded::Duplicate(id) => {
            tracing::debug!("Duplicate webhook delivery: {} (event {})", delivery_id, id);
            return (StatusCode::OK, Json(json!({"status": "duplicate"})));
        }
    };
    permit.send(WebhookJob {
        event_id,
        delivery_id,
    });

    // 6. Return 202 Accepted
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "event_id": event_id.to_string()
        })),
    )
}

/// List received webhook events.
///
/// GET /api/webhooks/events
pub async fn list_webhook_events(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!(state.events.list())))
}

/// Get a received webhook event by ID.
///
/// GET /api/webhooks/events/{id}
pub async fn get_webhook_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let event_id = match ReceivedEventId::from_string(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid event ID"})),
            );
        }
    };

    match state.events.get(&event_id) {
        Some(event) => (StatusCode::OK, Json(json!(event))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Event not found"})),
        ),
    }
}
