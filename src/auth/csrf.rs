//! Synchronizer-token CSRF protection bound to the login session.
//!
//! Each session holds at most one token. Pages that render a form call
//! [`CsrfService::issue`]; state-changing requests must echo it back in a
//! `csrf_token` form field or an `X-CSRF-Token` header. The plain token
//! also lives in a script-readable `csrftoken` cookie so pages and API
//! clients can reuse it until it stops verifying.

use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;

use super::session::hash_token;
use crate::error::Result;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_COOKIE: &str = "csrftoken";

pub struct CsrfService {
    pool: SqlitePool,
}

impl CsrfService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a fresh token for the session, replacing any previous one.
    pub async fn issue(&self, session_id: &str) -> Result<String> {
        let token = super::generate_token();

        sqlx::query(
            r#"
            INSERT INTO csrf_tokens (session_id, token_hash, created_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(session_id) DO UPDATE SET
                token_hash = excluded.token_hash,
                created_at = CURRENT_TIMESTAMP
            "#
        )
        .bind(session_id)
        .bind(hash_token(&token))
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn verify(&self, session_id: &str, token: &str) -> Result<bool> {
        if token.is_empty() {
            return Ok(false);
        }

        let stored = sqlx::query_scalar::<_, String>(
            "SELECT token_hash FROM csrf_tokens WHERE session_id = ?"
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored.is_some_and(|hash| hash == hash_token(token)))
    }

    pub fn cookie(token: &str, secure: bool) -> Cookie<'static> {
        Cookie::build((CSRF_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(secure)
            .build()
    }

    pub fn removal_cookie() -> Cookie<'static> {
        Cookie::build((CSRF_COOKIE, ""))
            .path("/")
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }

    pub async fn revoke(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM csrf_tokens WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Pulls the `csrf_token` field out of an urlencoded form body.
pub fn token_from_form(body: &[u8]) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_token_among_form_fields() {
        let body = b"order_number=100&csrf_token=abc123&city=Berlin";
        assert_eq!(token_from_form(body).as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(token_from_form(b"order_number=100"), None);
    }
}
