//! PostgreSQL session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use teloxide::types::ChatId;
use tracing::info;

use crate::conversation::Frame;
use crate::errors::StoreError;
use crate::session::{Session, SessionStore};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<(), StoreError> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chat_sessions (
            chat_id BIGINT PRIMARY KEY,
            is_active BOOLEAN NOT NULL DEFAULT FALSE,
            path TEXT NOT NULL,
            last_update_id BIGINT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS chat_sessions_active_idx ON chat_sessions (is_active) WHERE is_active",
    )
    .execute(pool)
    .await?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Sessions persisted in the `chat_sessions` table
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        init_database_schema(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn lookup(&self, chat_id: ChatId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            "SELECT is_active, path, last_update_id, updated_at FROM chat_sessions WHERE chat_id = $1",
        )
        .bind(chat_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let path: String = row.try_get("path")?;
        let path: Vec<Frame> = serde_json::from_str(&path)?;
        let last_update_id: Option<i64> = row.try_get("last_update_id")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(Session {
            chat_id,
            is_active: row.try_get("is_active")?,
            path,
            last_update_id: last_update_id.and_then(|id| u32::try_from(id).ok()),
            updated_at,
        }))
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        let path = serde_json::to_string(&session.path)?;

        sqlx::query(
            "INSERT INTO chat_sessions (chat_id, is_active, path, last_update_id, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (chat_id) DO UPDATE SET
                is_active = EXCLUDED.is_active,
                path = EXCLUDED.path,
                last_update_id = EXCLUDED.last_update_id,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(session.chat_id.0)
        .bind(session.is_active)
        .bind(path)
        .bind(session.last_update_id.map(i64::from))
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn active_chats(&self) -> Result<Vec<ChatId>, StoreError> {
        let rows = sqlx::query("SELECT chat_id FROM chat_sessions WHERE is_active ORDER BY chat_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Ok(ChatId(row.try_get::<i64, _>("chat_id")?)))
            .collect()
    }
}
