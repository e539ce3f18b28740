use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::memory::{LocalityLabels, MemoryChanges, MemoryRecord, NewMemory};

/// Durable storage for memory records.
///
/// Every method is a single statement; nothing here spans a transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Most recently created first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<MemoryRecord>, sqlx::Error>;

    async fn get(&self, id: i64) -> Result<Option<MemoryRecord>, sqlx::Error>;

    async fn insert(&self, memory: &NewMemory) -> Result<MemoryRecord, sqlx::Error>;

    /// Writes every column in `changes`. `None` if the id is unknown.
    async fn update(
        &self,
        id: i64,
        changes: &MemoryChanges,
    ) -> Result<Option<MemoryRecord>, sqlx::Error>;

    /// Oldest first, records missing a neighborhood or a borough.
    async fn missing_locality(&self, limit: i64) -> Result<Vec<MemoryRecord>, sqlx::Error>;

    /// Fills neighborhood/borough only where currently NULL.
    /// Returns whether a row was changed.
    async fn merge_locality(&self, id: i64, labels: &LocalityLabels) -> Result<bool, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_recent(&self, limit: i64) -> Result<Vec<MemoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, MemoryRecord>(
            "SELECT * FROM memories ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<MemoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, MemoryRecord>("SELECT * FROM memories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn insert(&self, memory: &NewMemory) -> Result<MemoryRecord, sqlx::Error> {
        sqlx::query_as::<_, MemoryRecord>(
            r#"
            INSERT INTO memories
                (image_url, display_image_url, latitude, longitude, taken_at,
                 dish_name, restaurant_name, place_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&memory.image_url)
        .bind(&memory.display_image_url)
        .bind(memory.latitude)
        .bind(memory.longitude)
        .bind(memory.taken_at)
        .bind(memory.dish_name.as_deref())
        .bind(memory.restaurant_name.as_deref())
        .bind(memory.place_url.as_deref())
        .fetch_one(&self.pool)
        .await
    }

    async fn update(
        &self,
        id: i64,
        changes: &MemoryChanges,
    ) -> Result<Option<MemoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, MemoryRecord>(
            r#"
            UPDATE memories
            SET dish_name = $2,
                restaurant_name = $3,
                place_url = $4,
                friend_tags = $5,
                note = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.dish_name.as_deref())
        .bind(changes.restaurant_name.as_deref())
        .bind(changes.place_url.as_deref())
        .bind(changes.friend_tags.as_deref())
        .bind(changes.note.as_deref())
        .fetch_optional(&self.pool)
        .await
    }

    async fn missing_locality(&self, limit: i64) -> Result<Vec<MemoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, MemoryRecord>(
            r#"
            SELECT * FROM memories
            WHERE neighborhood IS NULL OR borough IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn merge_locality(&self, id: i64, labels: &LocalityLabels) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE memories
            SET neighborhood = COALESCE(neighborhood, $2),
                borough = COALESCE(borough, $3)
            WHERE id = $1
              AND ((neighborhood IS NULL AND $2::text IS NOT NULL)
                OR (borough IS NULL AND $3::text IS NOT NULL))
            "#,
        )
        .bind(id)
        .bind(labels.neighborhood.as_deref())
        .bind(labels.borough.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
