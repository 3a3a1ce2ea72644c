//! End-to-end scenarios for author applications driven through the public service facade and
//! HTTP router, backed by the SQLite store.

mod common {
    use std::sync::{Arc, Mutex};

    use authors::applications::{
        AuditCompleted, AuditEventPublisher, AuthorApplicationService, PublishError,
        SqliteApplicationRepository,
    };

    #[derive(Default, Clone)]
    pub(super) struct RecordingPublisher {
        events: Arc<Mutex<Vec<AuditCompleted>>>,
    }

    impl RecordingPublisher {
        pub(super) fn events(&self) -> Vec<AuditCompleted> {
            self.events.lock().expect("lock").clone()
        }
    }

    impl AuditEventPublisher for RecordingPublisher {
        fn publish(&self, event: AuditCompleted) -> Result<(), PublishError> {
            self.events.lock().expect("lock").push(event);
            Ok(())
        }
    }

    pub(super) type Service = AuthorApplicationService<SqliteApplicationRepository, RecordingPublisher>;

    pub(super) fn build() -> (Arc<Service>, Arc<RecordingPublisher>) {
        let repository =
            Arc::new(SqliteApplicationRepository::in_memory().expect("open sqlite store"));
        let events = Arc::new(RecordingPublisher::default());
        let service = Arc::new(AuthorApplicationService::new(repository, events.clone()));
        (service, events)
    }
}

use authors::applications::{
    application_router, ApplicationStatus, AuthorServiceError, CallerIdentity, Role, UserId,
    USER_ID_HEADER, USER_ROLE_HEADER,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn applicant_is_approved_over_http() {
    let (service, events) = common::build();
    let router = application_router(service.clone());
    let applicant = Uuid::new_v4().to_string();
    let admin = Uuid::new_v4().to_string();

    let apply = router
        .clone()
        .oneshot(
            Request::post("/authors/apply")
                .header(header::CONTENT_TYPE, "application/json")
                .header(USER_ID_HEADER, &applicant)
                .header(USER_ROLE_HEADER, "USER")
                .body(Body::from(
                    json!({ "name": "Alice", "bio": "...", "portfolioUrl": "http://a" })
                        .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("apply executes");
    assert_eq!(apply.status(), StatusCode::OK);

    let pending = router
        .clone()
        .oneshot(
            Request::get("/authors/list")
                .header(USER_ID_HEADER, &admin)
                .header(USER_ROLE_HEADER, "ADMIN")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("list executes");
    let payload = body_json(pending).await;
    let application_id = payload["data"][0]["id"]
        .as_str()
        .expect("pending application id")
        .to_string();

    let review = router
        .clone()
        .oneshot(
            Request::patch("/authors/review")
                .header(header::CONTENT_TYPE, "application/json")
                .header(USER_ID_HEADER, &admin)
                .header(USER_ROLE_HEADER, "ADMIN")
                .body(Body::from(
                    json!({ "applicationId": application_id, "status": true }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("review executes");
    assert_eq!(review.status(), StatusCode::OK);

    let status = router
        .oneshot(
            Request::get("/authors/status")
                .header(USER_ID_HEADER, &applicant)
                .header(USER_ROLE_HEADER, "USER")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("status executes");
    assert_eq!(status.status(), StatusCode::OK);
    let payload = body_json(status).await;
    assert_eq!(payload["data"]["status"], json!("APPROVED"));
    assert_eq!(payload["data"]["userId"], json!(applicant));

    let published = events.events();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].application_id.to_string(), application_id);
    assert_eq!(published[0].new_status, ApplicationStatus::Approved);
}

#[tokio::test]
async fn forged_identity_headers_fail_closed() {
    let (service, _) = common::build();
    let router = application_router(service);

    let response = router
        .oneshot(
            Request::get("/authors/list")
                .header(USER_ID_HEADER, "admin")
                .header(USER_ROLE_HEADER, "ADMIN")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("list executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn rejected_application_stays_queryable_by_id() {
    let (service, events) = common::build();
    let applicant = CallerIdentity::authenticated(UserId(Uuid::new_v4()), Some(Role::Author));
    let admin = CallerIdentity::authenticated(UserId(Uuid::new_v4()), Some(Role::Admin));

    let record = service
        .submit(&applicant, Default::default())
        .expect("submit");
    let id = record.id.expect("id");
    service.review(&admin, &id, false).expect("review");

    let stored = service.get_by_id(&id).expect("lookup");
    assert_eq!(stored.status, ApplicationStatus::Rejected);
    assert_eq!(Some(stored.user_id), applicant.user_id());
    assert_eq!(events.events()[0].new_status, ApplicationStatus::Rejected);

    assert!(matches!(
        service.list_pending(&applicant),
        Err(AuthorServiceError::Forbidden)
    ));
    assert!(service.list_pending(&admin).expect("pending").is_empty());
}
