use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;
use uuid::Uuid;

use crate::applications::domain::{
    ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus, UserId,
};
use crate::applications::events::{AuditCompleted, AuditEventPublisher, PublishError};
use crate::applications::identity::{CallerIdentity, Role, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::applications::repository::{ApplicationRepository, RepositoryError};
use crate::applications::{application_router, AuthorApplicationService, WorkflowPolicy};

pub(super) fn draft() -> ApplicationDraft {
    ApplicationDraft {
        name: Some("Alice".to_string()),
        bio: Some("Writes serialized fantasy fiction.".to_string()),
        portfolio_url: Some("http://a".to_string()),
        status: None,
    }
}

pub(super) fn user(role: Role) -> CallerIdentity {
    CallerIdentity::authenticated(UserId(Uuid::new_v4()), Some(role))
}

pub(super) fn admin() -> CallerIdentity {
    user(Role::Admin)
}

pub(super) fn build_service() -> (
    AuthorApplicationService<MemoryRepository, MemoryEvents>,
    Arc<MemoryRepository>,
    Arc<MemoryEvents>,
) {
    build_service_with_policy(WorkflowPolicy::default())
}

pub(super) fn build_service_with_policy(
    policy: WorkflowPolicy,
) -> (
    AuthorApplicationService<MemoryRepository, MemoryEvents>,
    Arc<MemoryRepository>,
    Arc<MemoryEvents>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let events = Arc::new(MemoryEvents::with_repository(repository.clone()));
    let service = AuthorApplicationService::with_policy(repository.clone(), events.clone(), policy);
    (service, repository, events)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
    order: Arc<Mutex<Vec<ApplicationId>>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl ApplicationRepository for MemoryRepository {
    fn save(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let id = *record.id.get_or_insert_with(ApplicationId::new);
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.insert(id, record.clone()).is_none() {
            self.order.lock().expect("order mutex poisoned").push(id);
        }
        Ok(record)
    }

    fn find_by_id(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self
            .find_all()?
            .into_iter()
            .rev()
            .find(|record| record.user_id == *user_id))
    }

    fn find_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|record| record.status == status)
            .collect())
    }

    fn find_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let order = self.order.lock().expect("order mutex poisoned");
        Ok(order.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }
}

/// Records published events together with the stored status seen at publish time.
#[derive(Default, Clone)]
pub(super) struct MemoryEvents {
    events: Arc<Mutex<Vec<AuditCompleted>>>,
    observed: Arc<Mutex<Vec<Option<ApplicationStatus>>>>,
    repository: Option<Arc<MemoryRepository>>,
}

impl MemoryEvents {
    fn with_repository(repository: Arc<MemoryRepository>) -> Self {
        Self {
            repository: Some(repository),
            ..Self::default()
        }
    }

    pub(super) fn events(&self) -> Vec<AuditCompleted> {
        self.events.lock().expect("event mutex poisoned").clone()
    }

    pub(super) fn observed_statuses(&self) -> Vec<Option<ApplicationStatus>> {
        self.observed.lock().expect("event mutex poisoned").clone()
    }
}

impl AuditEventPublisher for MemoryEvents {
    fn publish(&self, event: AuditCompleted) -> Result<(), PublishError> {
        let stored = match &self.repository {
            Some(repository) => repository
                .find_by_id(&event.application_id)
                .map_err(|err| PublishError::Transport(err.to_string()))?
                .map(|record| record.status),
            None => None,
        };
        self.observed.lock().expect("event mutex poisoned").push(stored);
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }
}

pub(super) struct ClosedEvents;

impl AuditEventPublisher for ClosedEvents {
    fn publish(&self, _event: AuditCompleted) -> Result<(), PublishError> {
        Err(PublishError::Closed)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn save(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_id(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_user_id(
        &self,
        _user_id: &UserId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_status(
        &self,
        _status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn with_identity(
    builder: axum::http::request::Builder,
    caller: &CallerIdentity,
) -> axum::http::request::Builder {
    let builder = match caller.user_id() {
        Some(user_id) => builder.header(USER_ID_HEADER, user_id.to_string()),
        None => builder,
    };
    match caller.role() {
        Some(role) => builder.header(USER_ROLE_HEADER, role.label()),
        None => builder,
    }
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    caller: &CallerIdentity,
    body: Value,
) -> Request<axum::body::Body> {
    with_identity(Request::builder().method(method).uri(uri), caller)
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn get_request(uri: &str, caller: &CallerIdentity) -> Request<axum::body::Body> {
    with_identity(Request::builder().method("GET").uri(uri), caller)
        .body(axum::body::Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn application_router_with_service(
    service: AuthorApplicationService<MemoryRepository, MemoryEvents>,
) -> axum::Router {
    application_router(Arc::new(service))
}
