use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus, UserId};

/// Event type tag carried on every review outcome.
pub const AUDIT_COMPLETED: &str = "AuditCompleted";

/// Emitted once per successful review, after the new status has been saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditCompleted {
    pub event_type: String,
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub new_status: ApplicationStatus,
    pub portfolio_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditCompleted {
    /// Returns `None` for records that have not been saved yet.
    pub fn from_record(record: &ApplicationRecord, occurred_at: DateTime<Utc>) -> Option<Self> {
        let application_id = record.id?;
        Some(Self {
            event_type: AUDIT_COMPLETED.to_string(),
            application_id,
            user_id: record.user_id,
            new_status: record.status,
            portfolio_url: record.portfolio_url.clone(),
            occurred_at,
        })
    }
}

/// Outbound sink for review events. Delivery is fire-and-forget: `publish` only reports
/// whether the event could be handed off.
pub trait AuditEventPublisher: Send + Sync {
    fn publish(&self, event: AuditCompleted) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event sink is full")]
    Backpressure,
    #[error("event sink closed")]
    Closed,
    #[error("event transport unavailable: {0}")]
    Transport(String),
}
