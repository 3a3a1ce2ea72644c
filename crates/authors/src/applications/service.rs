use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus, UserId,
};
use super::events::{AuditCompleted, AuditEventPublisher, PublishError};
use super::identity::{CallerIdentity, CallerInfo, Role};
use super::repository::{ApplicationRepository, RepositoryError};

/// Roles allowed to submit an application.
const APPLICANT_ROLES: [Role; 3] = [Role::User, Role::Author, Role::Admin];

/// Switches for the stricter workflow guards. The defaults keep re-review and duplicate
/// submissions permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub allow_re_review: bool,
    pub single_application_per_user: bool,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            allow_re_review: true,
            single_application_per_user: false,
        }
    }
}

/// Service owning the author application workflow and its authorization rules.
pub struct AuthorApplicationService<R, P> {
    repository: Arc<R>,
    events: Arc<P>,
    policy: WorkflowPolicy,
}

impl<R, P> AuthorApplicationService<R, P>
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    pub fn new(repository: Arc<R>, events: Arc<P>) -> Self {
        Self::with_policy(repository, events, WorkflowPolicy::default())
    }

    pub fn with_policy(repository: Arc<R>, events: Arc<P>, policy: WorkflowPolicy) -> Self {
        Self {
            repository,
            events,
            policy,
        }
    }

    pub fn policy(&self) -> WorkflowPolicy {
        self.policy
    }

    /// Submit a new application on behalf of the caller. Always stored as `PENDING`.
    pub fn submit(
        &self,
        caller: &CallerIdentity,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, AuthorServiceError> {
        let user_id = require_authenticated(caller)?;
        if !caller.has_any_role(&APPLICANT_ROLES) {
            warn!(%user_id, "submission refused: caller lacks applicant role");
            return Err(AuthorServiceError::Forbidden);
        }

        if self.policy.single_application_per_user
            && self.repository.find_by_user_id(&user_id)?.is_some()
        {
            return Err(AuthorServiceError::Conflict(
                "an application already exists for this user",
            ));
        }

        let record = ApplicationRecord::pending(user_id, draft, Utc::now());
        let stored = self.repository.save(record)?;
        info!(
            application_id = ?stored.id,
            %user_id,
            "author application submitted"
        );
        Ok(stored)
    }

    /// Applications still awaiting review. Admin only.
    pub fn list_pending(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<ApplicationRecord>, AuthorServiceError> {
        require_admin(caller)?;
        Ok(self.repository.find_by_status(ApplicationStatus::Pending)?)
    }

    /// Every application regardless of status. Admin only.
    pub fn list_all(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<ApplicationRecord>, AuthorServiceError> {
        require_admin(caller)?;
        Ok(self.repository.find_all()?)
    }

    /// Record an admin decision and publish `AuditCompleted` once the save succeeds.
    pub fn review(
        &self,
        caller: &CallerIdentity,
        application_id: &ApplicationId,
        approved: bool,
    ) -> Result<ApplicationRecord, AuthorServiceError> {
        require_admin(caller)?;

        let mut record = self
            .repository
            .find_by_id(application_id)?
            .ok_or(AuthorServiceError::NotFound)?;

        if !self.policy.allow_re_review && record.status.is_decided() {
            return Err(AuthorServiceError::Conflict(
                "application has already been reviewed",
            ));
        }

        let now = Utc::now();
        record.status = ApplicationStatus::from_decision(approved);
        record.updated_at = now;

        let stored = self.repository.save(record)?;
        info!(
            %application_id,
            status = %stored.status,
            "author application reviewed"
        );

        let event = AuditCompleted::from_record(&stored, now).ok_or_else(|| {
            RepositoryError::Unavailable("saved record is missing its identifier".to_string())
        })?;
        self.events.publish(event)?;

        Ok(stored)
    }

    /// Unrestricted lookup used by other services.
    pub fn get_by_id(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, AuthorServiceError> {
        self.repository
            .find_by_id(application_id)?
            .ok_or(AuthorServiceError::NotFound)
    }

    /// Resolve the owning user of an application.
    pub fn get_user_id(&self, application_id: &ApplicationId) -> Result<UserId, AuthorServiceError> {
        self.get_by_id(application_id).map(|record| record.user_id)
    }

    /// The caller's own application.
    pub fn get_mine(
        &self,
        caller: &CallerIdentity,
    ) -> Result<ApplicationRecord, AuthorServiceError> {
        let user_id = require_authenticated(caller)?;
        self.repository
            .find_by_user_id(&user_id)?
            .ok_or(AuthorServiceError::NotFound)
    }

    pub fn caller_info(&self, caller: &CallerIdentity) -> Result<CallerInfo, AuthorServiceError> {
        let user_id = require_authenticated(caller)?;
        Ok(CallerInfo {
            user_id,
            role: caller.role(),
        })
    }
}

fn require_authenticated(caller: &CallerIdentity) -> Result<UserId, AuthorServiceError> {
    caller.user_id().ok_or(AuthorServiceError::Unauthenticated)
}

fn require_admin(caller: &CallerIdentity) -> Result<(), AuthorServiceError> {
    let user_id = require_authenticated(caller)?;
    if caller.is_admin() {
        Ok(())
    } else {
        warn!(%user_id, "admin operation refused");
        Err(AuthorServiceError::Forbidden)
    }
}

/// Error raised by the author application service.
#[derive(Debug, thiserror::Error)]
pub enum AuthorServiceError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("caller lacks the required role")]
    Forbidden,
    #[error("application not found")]
    NotFound,
    #[error("{0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}
