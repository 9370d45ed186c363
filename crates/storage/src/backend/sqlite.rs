//! SQLite backend

use super::StorageBackend;
use crate::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        payload BLOB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities (kind)",
    "CREATE TABLE IF NOT EXISTS vector_members (
        vector_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        member_id INTEGER NOT NULL,
        PRIMARY KEY (vector_id, kind, member_id)
    )",
];

/// Backend storing records in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (and optionally create) the database at `url`, then create the
    /// schema if it is missing
    pub async fn connect(
        url: &str,
        max_connections: u32,
        create_if_missing: bool,
    ) -> Result<Self, StorageError> {
        info!("Opening SQLite storage at {}", url);

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database.
    ///
    /// The pool is pinned to one connection that is never recycled, since
    /// every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Use an existing pool
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("SQLite schema ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, kind: &str, payload: Vec<u8>) -> Result<i64, StorageError> {
        let id = sqlx::query("INSERT INTO entities (kind, payload) VALUES (?, ?)")
            .bind(kind)
            .bind(payload)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        debug!("Inserted {} record with ID {}", kind, id);
        Ok(id)
    }

    async fn fetch(&self, kind: &str, id: i64) -> Result<Vec<u8>, StorageError> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT payload FROM entities WHERE kind = ? AND id = ?")
            .bind(kind)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(kind, id))
    }

    async fn fetch_all(&self, kind: &str) -> Result<Vec<(i64, Vec<u8>)>, StorageError> {
        let rows = sqlx::query_as::<_, (i64, Vec<u8>)>(
            "SELECT id, payload FROM entities WHERE kind = ? ORDER BY id",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update(&self, kind: &str, id: i64, payload: Vec<u8>) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE entities SET payload = ? WHERE kind = ? AND id = ?")
            .bind(payload)
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(kind, id));
        }
        Ok(())
    }

    async fn delete(&self, kind: &str, id: i64) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM entities WHERE kind = ? AND id = ?")
            .bind(kind)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(kind, id));
        }

        sqlx::query("DELETE FROM vector_members WHERE kind = ? AND member_id = ?")
            .bind(kind)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_all(&self, kind: &str) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM entities WHERE kind = ?")
            .bind(kind)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM vector_members WHERE kind = ?")
            .bind(kind)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, kind: &str) -> Result<u64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entities WHERE kind = ?")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn link(&self, vector_id: i64, kind: &str, member_id: i64) -> Result<(), StorageError> {
        let exists =
            sqlx::query_scalar::<_, i64>("SELECT id FROM entities WHERE kind = ? AND id = ?")
                .bind(kind)
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(StorageError::not_found(kind, member_id));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO vector_members (vector_id, kind, member_id) VALUES (?, ?, ?)",
        )
        .bind(vector_id)
        .bind(kind)
        .bind(member_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unlink(
        &self,
        vector_id: i64,
        kind: &str,
        member_id: i64,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "DELETE FROM vector_members WHERE vector_id = ? AND kind = ? AND member_id = ?",
        )
        .bind(vector_id)
        .bind(kind)
        .bind(member_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(kind, member_id));
        }
        Ok(())
    }

    async fn members(&self, vector_id: i64, kind: &str) -> Result<Vec<i64>, StorageError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT member_id FROM vector_members
             WHERE vector_id = ? AND kind = ? ORDER BY member_id",
        )
        .bind(vector_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
