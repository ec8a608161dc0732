//! Whiteboard row storage: Postgres in production, memory for tests and
//! database-less runs.
//!
//! DESIGN
//! ======
//! The store deals in raw rows with `content` as JSON text. Normalizing and
//! parsing content is the whiteboard service's job, not the store's.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::HashMap;

use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// One row of the `whiteboards` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWhiteboard {
    pub id: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("whiteboard already exists: {0}")]
    AlreadyExists(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait::async_trait]
pub trait WhiteboardStore: Send + Sync {
    /// # Errors
    ///
    /// Returns a database error if the lookup fails.
    async fn find(&self, id: &str) -> Result<Option<StoredWhiteboard>, StoreError>;

    /// Insert a new row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert(&self, id: &str, content: &str) -> Result<StoredWhiteboard, StoreError>;

    /// Insert, or replace the content of an existing row and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns a database error if the write fails.
    async fn upsert(&self, id: &str, content: &str) -> Result<StoredWhiteboard, StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

type WhiteboardRow = (String, String, OffsetDateTime, OffsetDateTime);

fn from_row((id, content, created_at, updated_at): WhiteboardRow) -> StoredWhiteboard {
    StoredWhiteboard { id, content, created_at, updated_at }
}

pub struct PgWhiteboardStore {
    pool: PgPool,
}

impl PgWhiteboardStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WhiteboardStore for PgWhiteboardStore {
    async fn find(&self, id: &str) -> Result<Option<StoredWhiteboard>, StoreError> {
        let row = sqlx::query_as::<_, WhiteboardRow>(
            "SELECT id, content, created_at, updated_at FROM whiteboards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn insert(&self, id: &str, content: &str) -> Result<StoredWhiteboard, StoreError> {
        let result = sqlx::query_as::<_, WhiteboardRow>(
            "INSERT INTO whiteboards (id, content) VALUES ($1, $2) \
             RETURNING id, content, created_at, updated_at",
        )
        .bind(id)
        .bind(content)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(from_row(row)),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::AlreadyExists(id.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(&self, id: &str, content: &str) -> Result<StoredWhiteboard, StoreError> {
        let row = sqlx::query_as::<_, WhiteboardRow>(
            "INSERT INTO whiteboards (id, content) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET content = EXCLUDED.content, updated_at = now() \
             RETURNING id, content, created_at, updated_at",
        )
        .bind(id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(from_row(row))
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryWhiteboardStore {
    rows: RwLock<HashMap<String, StoredWhiteboard>>,
}

impl MemoryWhiteboardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl WhiteboardStore for MemoryWhiteboardStore {
    async fn find(&self, id: &str) -> Result<Option<StoredWhiteboard>, StoreError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn insert(&self, id: &str, content: &str) -> Result<StoredWhiteboard, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_owned()));
        }
        let now = OffsetDateTime::now_utc();
        let row = StoredWhiteboard { id: id.to_owned(), content: content.to_owned(), created_at: now, updated_at: now };
        rows.insert(id.to_owned(), row.clone());
        Ok(row)
    }

    async fn upsert(&self, id: &str, content: &str) -> Result<StoredWhiteboard, StoreError> {
        let mut rows = self.rows.write().await;
        let now = OffsetDateTime::now_utc();
        let row = rows.entry(id.to_owned()).or_insert_with(|| StoredWhiteboard {
            id: id.to_owned(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        });
        content.clone_into(&mut row.content);
        row.updated_at = now;
        Ok(row.clone())
    }
}
