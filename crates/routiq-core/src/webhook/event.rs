//! Parsed webhook events and their classification.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A verified identity-provider event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Namespaced type, e.g. `user.created` or `organizationMembership.updated`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event body; shape depends on the type.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Sender-side creation time in milliseconds, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl WebhookEvent {
    /// Returns `data.id` when present.
    pub fn data_id(&self) -> Option<&str> {
        self.data.get("id").and_then(|v| v.as_str())
    }

    /// Returns the segment after the last `.`, e.g. `created`.
    pub fn action(&self) -> Option<&str> {
        self.event_type.rsplit_once('.').map(|(_, action)| action)
    }

    pub fn category(&self) -> EventCategory {
        EventCategory::classify(&self.event_type)
    }
}

/// Namespace of an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    User,
    Organization,
    OrganizationMembership,
    Other,
}

impl EventCategory {
    /// Classifies an event type by prefix.
    ///
    /// `organizationMembership.` is tested before `organization` since the
    /// latter is a prefix of the former.
    pub fn classify(event_type: &str) -> Self {
        if event_type.starts_with("organizationMembership.") {
            EventCategory::OrganizationMembership
        } else if event_type.starts_with("organization") {
            EventCategory::Organization
        } else if event_type.starts_with("user.") {
            EventCategory::User
        } else {
            EventCategory::Other
        }
    }

    /// True for organization events, including membership events.
    pub fn is_organization(&self) -> bool {
        matches!(
            self,
            EventCategory::Organization | EventCategory::OrganizationMembership
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::User => "user",
            EventCategory::Organization => "organization",
            EventCategory::OrganizationMembership => "organization_membership",
            EventCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn is_user_event(event: &WebhookEvent) -> bool {
    event.category() == EventCategory::User
}

/// Also true for organization membership events.
pub fn is_organization_event(event: &WebhookEvent) -> bool {
    event.category().is_organization()
}

pub fn is_organization_membership_event(event: &WebhookEvent) -> bool {
    event.category() == EventCategory::OrganizationMembership
}

/// Logs a received event at info level.
pub fn log_webhook_event(event: &WebhookEvent, prefix: &str) {
    tracing::info!(
        event_type = %event.event_type,
        id = event.data_id().unwrap_or("unknown"),
        received_at = %Utc::now().to_rfc3339(),
        "[{}] Event received",
        prefix
    );
}
