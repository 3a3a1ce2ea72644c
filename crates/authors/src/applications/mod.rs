//! Author application intake, review, and approval status lookups.
//!
//! The workflow service owns every state transition and authorization check. Storage and the
//! review event sink are injected through the [`ApplicationRepository`] and
//! [`AuditEventPublisher`] traits.

pub mod domain;
pub mod events;
pub mod identity;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use domain::{ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus, UserId};
pub use events::{AuditCompleted, AuditEventPublisher, PublishError, AUDIT_COMPLETED};
pub use identity::{CallerIdentity, CallerInfo, Role, USER_ID_HEADER, USER_ROLE_HEADER};
pub use repository::{ApplicationRepository, RepositoryError};
pub use router::{application_router, ApiResponse, ReviewRequest, SimpleResponse};
pub use service::{AuthorApplicationService, AuthorServiceError, WorkflowPolicy};
pub use sqlite::SqliteApplicationRepository;
