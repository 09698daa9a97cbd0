//! Server-side login sessions. The browser holds a random token; only its
//! SHA-256 digest is stored, so a leaked database cannot be replayed.

use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    expires_at: NaiveDateTime,
    created_at: NaiveDateTime,
    last_used_at: NaiveDateTime,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Self {
            user_id: Uuid::parse_str(&row.user_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            id: row.id,
            expires_at: row.expires_at.and_utc(),
            created_at: row.created_at.and_utc(),
            last_used_at: row.last_used_at.and_utc(),
        })
    }
}

pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<Session> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, expires_at, created_at, last_used_at
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(hash_token(token))
        .bind(expires_at.naive_utc())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// The live session for `token`, with `last_used_at` bumped. Expired
    /// sessions are treated as absent.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Session>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions SET last_used_at = ?
            WHERE token_hash = ? AND expires_at > ?
            RETURNING id, user_id, expires_at, created_at, last_used_at
            "#
        )
        .bind(now)
        .bind(hash_token(token))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(Session::try_from)
        .transpose()
    }

    pub async fn delete_by_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
