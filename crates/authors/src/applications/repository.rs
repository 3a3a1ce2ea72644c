use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus, UserId};

/// Storage abstraction so the service module can be exercised in isolation.
///
/// `save` is insert-or-update keyed by `id`; a record without an id is inserted under a
/// freshly generated one. Listing methods return records in creation order.
pub trait ApplicationRepository: Send + Sync {
    fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn find_by_id(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Latest application owned by `user_id`.
    fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn find_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn find_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<r2d2::Error> for RepositoryError {
    fn from(value: r2d2::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}
