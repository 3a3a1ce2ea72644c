use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};

use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus, UserId};
use super::repository::{ApplicationRepository, RepositoryError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS author_applications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    name TEXT,
    bio TEXT,
    portfolio_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_author_applications_user_id ON author_applications (user_id);
CREATE INDEX IF NOT EXISTS idx_author_applications_status ON author_applications (status);
";

const COLUMNS: &str = "id, user_id, status, name, bio, portfolio_url, created_at, updated_at";

/// Durable store backed by SQLite.
pub struct SqliteApplicationRepository {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteApplicationRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        let pool = Pool::builder().max_size(8).build(manager)?;
        Self::with_pool(pool)
    }

    /// Single-connection in-memory database; a larger pool would see separate databases.
    pub fn in_memory() -> Result<Self, RepositoryError> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self, RepositoryError> {
        let repository = Self { pool };
        repository.connection()?.execute_batch(SCHEMA)?;
        Ok(repository)
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, RepositoryError> {
        Ok(self.pool.get()?)
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ApplicationRecord> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let status: String = row.get(2)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;

        Ok(ApplicationRecord {
            id: Some(id.parse::<ApplicationId>().map_err(|err| conversion_error(0, err))?),
            user_id: user_id
                .parse::<UserId>()
                .map_err(|err| conversion_error(1, err))?,
            status: status
                .parse::<ApplicationStatus>()
                .map_err(|err| conversion_error(2, err))?,
            name: row.get(3)?,
            bio: row.get(4)?,
            portfolio_url: row.get(5)?,
            created_at: parse_timestamp(6, &created_at)?,
            updated_at: parse_timestamp(7, &updated_at)?,
        })
    }

    fn query_many(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| conversion_error(column, err))
}

impl ApplicationRepository for SqliteApplicationRepository {
    fn save(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let id = *record.id.get_or_insert_with(ApplicationId::new);
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO author_applications (id, user_id, status, name, bio, portfolio_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                name = excluded.name,
                bio = excluded.bio,
                portfolio_url = excluded.portfolio_url,
                updated_at = excluded.updated_at",
            params![
                id.to_string(),
                record.user_id.to_string(),
                record.status.label(),
                record.name,
                record.bio,
                record.portfolio_url,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    fn find_by_id(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let conn = self.connection()?;
        let record = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM author_applications WHERE id = ?1"),
                params![id.to_string()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let conn = self.connection()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM author_applications WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![user_id.to_string()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.query_many(
            &format!(
                "SELECT {COLUMNS} FROM author_applications WHERE status = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ),
            params![status.label()],
        )
    }

    fn find_all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.query_many(
            &format!("SELECT {COLUMNS} FROM author_applications ORDER BY created_at ASC, rowid ASC"),
            params![],
        )
    }
}
