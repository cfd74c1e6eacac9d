//! In-memory log of recently accepted deliveries.
//!
//! Keyed by delivery id so that redelivered events are answered as
//! duplicates instead of being processed twice.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use routiq_core::webhook::{EventCategory, WebhookEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Unique identifier for a received event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceivedEventId(pub Ulid);

impl ReceivedEventId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for ReceivedEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReceivedEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A verified delivery and its processing state.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedEvent {
    pub id: ReceivedEventId,
    pub delivery_id: String,
    pub event_type: String,
    pub category: EventCategory,
    pub data_id: Option<String>,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(skip)]
    pub event: WebhookEvent,
}

/// Result of recording a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    New(ReceivedEventId),
    Duplicate(ReceivedEventId),
}

/// Shared log of received events.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: Arc<DashMap<String, ReceivedEvent>>,
    /// Event id to delivery id.
    ids: Arc<DashMap<ReceivedEventId, String>>,
    retention: Duration,
}

impl EventLog {
    /// Creates a log that forgets deliveries after `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ids: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Creates a log that remembers a delivery while its timestamp can still
    /// pass the replay window.
    ///
    /// A delivery stamped at the far edge of the window in the future stays
    /// replayable until the far edge in the past. Freshness is checked in
    /// whole seconds, so the last fresh instant is up to a second later than
    /// `2 * tolerance_secs` after receipt.
    pub fn for_tolerance(tolerance_secs: u64) -> Self {
        let secs = tolerance_secs.min(u64::from(u32::MAX)) as i64;
        Self::new(Duration::seconds(secs * 2 + 1))
    }

    /// Records a delivery unless its id was already seen.
    pub fn record(&self, delivery_id: &str, event: WebhookEvent) -> Recorded {
        self.record_at(delivery_id, event, Utc::now())
    }

    pub fn record_at(
        &self,
        delivery_id: &str,
        event: WebhookEvent,
        now: DateTime<Utc>,
    ) -> Recorded {
        self.prune(now);

        match self.entries.entry(delivery_id.to_string()) {
            Entry::Occupied(existing) => Recorded::Duplicate(existing.get().id),
            Entry::Vacant(slot) => {
                let id = ReceivedEventId::new();
                self.ids.insert(id, delivery_id.to_string());
                slot.insert(ReceivedEvent {
                    id,
                    delivery_id: delivery_id.to_string(),
                    event_type: event.event_type.clone(),
                    category: event.category(),
                    data_id: event.data_id().map(String::from),
                    processed: false,
                    error_message: None,
                    received_at: now,
                    event,
                });
                Recorded::New(id)
            }
        }
    }

    /// Checks whether a delivery id was already accepted.
    pub fn contains(&self, delivery_id: &str) -> bool {
        self.entries.contains_key(delivery_id)
    }

    /// Removes entries older than the retention window.
    pub fn prune(&self, now: DateTime<Utc>) {
        if let Some(cutoff) = now.checked_sub_signed(self.retention) {
            self.entries.retain(|_, e| {
                let keep = e.received_at >= cutoff;
                if !keep {
                    self.ids.remove(&e.id);
                }
                keep
            });
        }
    }

    pub fn get(&self, id: &ReceivedEventId) -> Option<ReceivedEvent> {
        let delivery_id = self.ids.get(id)?.value().clone();
        self.get_by_delivery(&delivery_id).filter(|event| event.id == *id)
    }

    pub fn get_by_delivery(&self, delivery_id: &str) -> Option<ReceivedEvent> {
        self.entries.get(delivery_id).map(|e| e.value().clone())
    }

    /// Lists events, newest first.
    pub fn list(&self) -> Vec<ReceivedEvent> {
        let mut events: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        events.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(b.id.0.cmp(&a.id.0)));
        events
    }

    pub fn mark_processed(&self, delivery_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(delivery_id) {
            entry.processed = true;
        }
    }

    pub fn set_error(&self, delivery_id: &str, message: &str) {
        if let Some(mut entry) = self.entries.get_mut(delivery_id) {
            entry.error_message = Some(message.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
