use authors::applications::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, AuditCompleted,
    AuditEventPublisher, PublishError, RepositoryError, SqliteApplicationRepository, UserId,
};
use authors::config::StorageConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct MemoryTable {
    records: HashMap<ApplicationId, ApplicationRecord>,
    insertion_order: Vec<ApplicationId>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    table: Arc<Mutex<MemoryTable>>,
}

impl InMemoryApplicationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryTable>, RepositoryError> {
        self.table
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    fn ordered(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let table = self.lock()?;
        Ok(table
            .insertion_order
            .iter()
            .filter_map(|id| table.records.get(id).cloned())
            .collect())
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn save(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let id = *record.id.get_or_insert_with(ApplicationId::new);
        let mut table = self.lock()?;
        if table.records.insert(id, record.clone()).is_none() {
            table.insertion_order.push(id);
        }
        Ok(record)
    }

    fn find_by_id(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self
            .ordered()?
            .into_iter()
            .rev()
            .find(|record| record.user_id == *user_id))
    }

    fn find_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .ordered()?
            .into_iter()
            .filter(|record| record.status == status)
            .collect())
    }

    fn find_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.ordered()
    }
}

/// Store selected at startup from [`StorageConfig`].
pub(crate) enum ApplicationStore {
    Memory(InMemoryApplicationRepository),
    Sqlite(SqliteApplicationRepository),
}

impl ApplicationStore {
    pub(crate) fn open(config: &StorageConfig) -> Result<Self, RepositoryError> {
        match &config.database_path {
            Some(path) => {
                info!(path = %path.display(), "opening sqlite application store");
                SqliteApplicationRepository::open(path).map(Self::Sqlite)
            }
            None => Ok(Self::Memory(InMemoryApplicationRepository::default())),
        }
    }

    fn inner(&self) -> &dyn ApplicationRepository {
        match self {
            ApplicationStore::Memory(store) => store,
            ApplicationStore::Sqlite(store) => store,
        }
    }
}

impl ApplicationRepository for ApplicationStore {
    fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner().save(record)
    }

    fn find_by_id(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner().find_by_id(id)
    }

    fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner().find_by_user_id(user_id)
    }

    fn find_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner().find_by_status(status)
    }

    fn find_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner().find_all()
    }
}

/// Hands review events to the dispatcher task without waiting for delivery.
#[derive(Clone)]
pub(crate) struct ChannelEventPublisher {
    sender: mpsc::Sender<AuditCompleted>,
}

impl ChannelEventPublisher {
    pub(crate) fn new(buffer: usize) -> (Self, mpsc::Receiver<AuditCompleted>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, receiver)
    }
}

impl AuditEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: AuditCompleted) -> Result<(), PublishError> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PublishError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

/// Drains the review event channel, emitting each event on `topic`.
/// Resolves to the number of delivered events once every sender is dropped.
pub(crate) fn spawn_event_dispatcher(
    mut receiver: mpsc::Receiver<AuditCompleted>,
    topic: String,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut delivered = 0;
        while let Some(event) = receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    info!(
                        topic = %topic,
                        event_type = %event.event_type,
                        application_id = %event.application_id,
                        new_status = %event.new_status,
                        payload = %payload,
                        "review event delivered"
                    );
                    delivered += 1;
                }
                Err(err) => {
                    error!(topic = %topic, application_id = %event.application_id, %err, "failed to encode review event");
                }
            }
        }
        delivered
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn pending(user: UserId) -> ApplicationRecord {
        ApplicationRecord::pending(user, Default::default(), Utc::now())
    }

    #[test]
    fn memory_store_returns_latest_application_per_user() {
        let store = InMemoryApplicationRepository::default();
        let user = UserId(Uuid::new_v4());

        store.save(pending(user)).expect("first");
        let latest = store.save(pending(user)).expect("second");

        let found = store
            .find_by_user_id(&user)
            .expect("query")
            .expect("present");
        assert_eq!(found.id, latest.id);
        assert_eq!(store.find_all().expect("all").len(), 2);
    }

    #[test]
    fn store_defaults_to_memory_without_database_path() {
        let store = ApplicationStore::open(&StorageConfig::default()).expect("open");
        assert!(matches!(store, ApplicationStore::Memory(_)));
        assert!(store.find_all().expect("empty").is_empty());
    }

    #[tokio::test]
    async fn channel_publisher_reports_backpressure_and_closure() {
        let (publisher, receiver) = ChannelEventPublisher::new(1);
        let mut record = pending(UserId(Uuid::new_v4()));
        record.id = Some(ApplicationId::new());
        let event = AuditCompleted::from_record(&record, Utc::now()).expect("saved record");

        publisher.publish(event.clone()).expect("first event fits");
        assert!(matches!(
            publisher.publish(event.clone()),
            Err(PublishError::Backpressure)
        ));

        drop(receiver);
        assert!(matches!(publisher.publish(event), Err(PublishError::Closed)));
    }

    #[tokio::test]
    async fn dispatcher_drains_until_publishers_drop() {
        let (publisher, receiver) = ChannelEventPublisher::new(8);
        let dispatcher = spawn_event_dispatcher(receiver, "author-review-out".to_string());

        for _ in 0..3 {
            let mut record = pending(UserId(Uuid::new_v4()));
            record.id = Some(ApplicationId::new());
            record.status = ApplicationStatus::Approved;
            let event = AuditCompleted::from_record(&record, Utc::now()).expect("saved record");
            publisher.publish(event).expect("enqueue");
        }
        drop(publisher);

        assert_eq!(dispatcher.await.expect("dispatcher joins"), 3);
    }
}
