use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::password,
    domain::{CreateUserRequest, User},
    error::{AppError, Result},
    repository::UserRepository,
};

const USER_COLUMNS: &str = "id, username, email, is_staff, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: Option<String>,
    is_staff: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            username: row.username,
            email: row.email,
            is_staff: row.is_staff,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        })
    }
}

#[derive(FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: String) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let now = Utc::now().naive_utc();
        let password_hash = password::hash(&request.password).await?;
        let email = request.email.filter(|e| !e.trim().is_empty());

        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, is_staff, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&request.username)
            .bind(email)
            .bind(password_hash)
            .bind(request.is_staff)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::Conflict("A user with that username already exists.".to_string())
                }
                other => AppError::Database(other.to_string()),
            })?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.find_one("id", id.to_string()).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_one("username", username.to_string()).await
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?");
        let Some(row) = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some((row.user.try_into()?, row.password_hash)))
    }

    async fn set_staff(&self, id: Uuid, is_staff: bool) -> Result<User> {
        let sql = format!("UPDATE users SET is_staff = ?, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(is_staff)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?
            .try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // Sessions and refund requests go with the user (ON DELETE CASCADE).
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
