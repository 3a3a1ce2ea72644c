use crate::infra::{ChannelEventPublisher, InMemoryApplicationRepository};
use authors::applications::{
    ApplicationDraft, ApplicationRecord, AuditCompleted, AuthorApplicationService,
    AuthorServiceError, CallerIdentity, Role, UserId,
};
use authors::error::AppError;
use clap::Args;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reject the application instead of approving it.
    #[arg(long)]
    pub(crate) reject: bool,
}

/// Outcome of the in-process walkthrough.
#[derive(Debug)]
pub(crate) struct DemoRun {
    pub(crate) submitted: ApplicationRecord,
    pub(crate) reviewed: ApplicationRecord,
    pub(crate) status: ApplicationRecord,
    pub(crate) events: Vec<AuditCompleted>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let run = execute_demo(!args.reject)?;
    render_demo(&run);
    Ok(())
}

pub(crate) fn execute_demo(approve: bool) -> Result<DemoRun, AppError> {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let (publisher, mut receiver) = ChannelEventPublisher::new(8);
    let service = AuthorApplicationService::new(repository, Arc::new(publisher));

    let applicant = CallerIdentity::authenticated(UserId(Uuid::new_v4()), Some(Role::User));
    let admin = CallerIdentity::authenticated(UserId(Uuid::new_v4()), Some(Role::Admin));

    let submitted = service.submit(
        &applicant,
        ApplicationDraft {
            name: Some("Alice".to_string()),
            bio: Some("Short fiction and essays.".to_string()),
            portfolio_url: Some("http://a".to_string()),
            status: None,
        },
    )?;
    let application_id = submitted.id.ok_or(AuthorServiceError::NotFound)?;

    let reviewed = service.review(&admin, &application_id, approve)?;
    let status = service.get_mine(&applicant)?;

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }

    Ok(DemoRun {
        submitted,
        reviewed,
        status,
        events,
    })
}

fn describe(record: &ApplicationRecord) -> String {
    let id = record
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<unsaved>".to_string());
    format!(
        "id {} | user {} | status {} | name {}",
        id,
        record.user_id,
        record.status,
        record.name.as_deref().unwrap_or("-")
    )
}

fn render_demo(run: &DemoRun) {
    println!("Author application demo");
    println!("\nSubmitted: {}", describe(&run.submitted));
    println!("Reviewed:  {}", describe(&run.reviewed));
    println!("Status:    {}", describe(&run.status));

    if run.events.is_empty() {
        println!("\nEvents: none");
    } else {
        println!("\nEvents");
        for event in &run.events {
            match serde_json::to_string(event) {
                Ok(payload) => println!("- {payload}"),
                Err(err) => println!("- <unencodable event: {err}>"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authors::applications::ApplicationStatus;

    #[test]
    fn demo_approves_and_emits_one_event() {
        let run = execute_demo(true).expect("demo runs");

        assert_eq!(run.submitted.status, ApplicationStatus::Pending);
        assert_eq!(run.reviewed.status, ApplicationStatus::Approved);
        assert_eq!(run.status.id, run.submitted.id);
        assert_eq!(run.status.status, ApplicationStatus::Approved);
        assert_eq!(run.events.len(), 1);
        assert_eq!(Some(run.events[0].application_id), run.submitted.id);
        assert_eq!(run.events[0].new_status, ApplicationStatus::Approved);
    }

    #[test]
    fn demo_can_reject() {
        let run = execute_demo(false).expect("demo runs");
        assert_eq!(run.status.status, ApplicationStatus::Rejected);
        assert_eq!(run.events[0].new_status, ApplicationStatus::Rejected);
    }
}
