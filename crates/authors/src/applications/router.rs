use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{ApplicationDraft, ApplicationId, ApplicationRecord, UserId};
use super::events::AuditEventPublisher;
use super::identity::CallerIdentity;
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::{AuthorApplicationService, AuthorServiceError};

/// Router builder exposing the `/authors` endpoints.
pub fn application_router<R, P>(service: Arc<AuthorApplicationService<R, P>>) -> Router
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    Router::new()
        .route("/authors/apply", post(apply_handler::<R, P>))
        .route("/authors/list", get(list_handler::<R, P>))
        .route("/authors/review", patch(review_handler::<R, P>))
        .route("/authors/status", get(status_handler::<R, P>))
        .route("/authors/user", get(caller_handler::<R, P>))
        .route(
            "/authors/:application_id/userId",
            get(user_id_handler::<R, P>),
        )
        .route("/authors/:application_id", get(detail_handler::<R, P>))
        .with_state(service)
}

/// Bare success flag returned by mutating endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub success: bool,
}

/// Envelope returned by query endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[serde(alias = "authorId")]
    pub application_id: ApplicationId,
    pub status: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    #[default]
    Pending,
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub scope: ListScope,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdResponse {
    pub user_id: UserId,
}

/// HTTP status for a workflow failure.
pub fn status_for(error: &AuthorServiceError) -> StatusCode {
    match error {
        AuthorServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AuthorServiceError::Forbidden => StatusCode::FORBIDDEN,
        AuthorServiceError::NotFound
        | AuthorServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AuthorServiceError::Conflict(_)
        | AuthorServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        AuthorServiceError::Repository(_) | AuthorServiceError::Publish(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn log_failure(operation: &'static str, error: &AuthorServiceError) -> StatusCode {
    let status = status_for(error);
    if status.is_server_error() {
        error!(operation, %error, "author request failed");
    }
    status
}

fn simple_failure(operation: &'static str, error: AuthorServiceError) -> Response {
    let status = log_failure(operation, &error);
    (status, axum::Json(SimpleResponse { success: false })).into_response()
}

fn envelope_failure(operation: &'static str, error: AuthorServiceError) -> Response {
    let status = log_failure(operation, &error);
    let body = ApiResponse::<()>::failed(error.to_string());
    (status, axum::Json(body)).into_response()
}

fn invalid_id_response(raw: &str) -> Response {
    let body = ApiResponse::<()>::failed(format!("'{raw}' is not a valid application id"));
    (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
}

pub(crate) async fn apply_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    caller: CallerIdentity,
    axum::Json(draft): axum::Json<ApplicationDraft>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    match service.submit(&caller, draft) {
        Ok(_) => (StatusCode::OK, axum::Json(SimpleResponse { success: true })).into_response(),
        Err(error) => simple_failure("apply", error),
    }
}

pub(crate) async fn list_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    caller: CallerIdentity,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    let (result, message) = match query.scope {
        ListScope::Pending => (
            service.list_pending(&caller),
            "pending author applications retrieved",
        ),
        ListScope::All => (service.list_all(&caller), "author applications retrieved"),
    };

    match result {
        Ok(records) => (StatusCode::OK, axum::Json(ApiResponse::ok(message, records))).into_response(),
        Err(error) => envelope_failure("list", error),
    }
}

pub(crate) async fn review_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    caller: CallerIdentity,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    match service.review(&caller, &request.application_id, request.status) {
        Ok(_) => (StatusCode::OK, axum::Json(SimpleResponse { success: true })).into_response(),
        Err(error) => simple_failure("review", error),
    }
}

pub(crate) async fn status_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    caller: CallerIdentity,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    match service.get_mine(&caller) {
        Ok(record) => (
            StatusCode::OK,
            axum::Json(ApiResponse::ok("author application status retrieved", record)),
        )
            .into_response(),
        Err(error) => envelope_failure("status", error),
    }
}

pub(crate) async fn caller_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    caller: CallerIdentity,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    match service.caller_info(&caller) {
        Ok(info) => (StatusCode::OK, axum::Json(info)).into_response(),
        Err(error) => {
            let status = log_failure("user", &error);
            let payload = json!({ "error": error.to_string() });
            (status, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn user_id_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    let Ok(id) = application_id.parse::<ApplicationId>() else {
        return invalid_id_response(&application_id);
    };

    match service.get_user_id(&id) {
        Ok(user_id) => (
            StatusCode::OK,
            axum::Json(ApiResponse::ok(
                "application owner retrieved",
                UserIdResponse { user_id },
            )),
        )
            .into_response(),
        Err(error) => envelope_failure("user_id", error),
    }
}

pub(crate) async fn detail_handler<R, P>(
    State(service): State<Arc<AuthorApplicationService<R, P>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: AuditEventPublisher + 'static,
{
    let Ok(id) = application_id.parse::<ApplicationId>() else {
        return invalid_id_response(&application_id);
    };

    match service.get_by_id(&id) {
        Ok(record) => (
            StatusCode::OK,
            axum::Json(ApiResponse::<ApplicationRecord>::ok(
                "author application retrieved",
                record,
            )),
        )
            .into_response(),
        Err(error) => envelope_failure("detail", error),
    }
}
