use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use rand::RngCore;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

pub mod csrf;
pub mod jwt;
pub mod password;
pub mod session;

use session::{Session, SessionStore};
pub use csrf::CsrfService;
pub use jwt::{JwtService, TokenPair, TokenType};

pub const SESSION_COOKIE: &str = "session";

/// Browser logins: issues opaque session tokens and the cookies carrying them.
pub struct AuthService {
    sessions: SessionStore,
    lifetime: Duration,
}

impl AuthService {
    pub fn new(pool: SqlitePool, session_duration_hours: i64) -> Self {
        Self {
            sessions: SessionStore::new(pool),
            lifetime: Duration::hours(session_duration_hours),
        }
    }

    /// Starts a session and returns it with the plain token for the cookie.
    pub async fn create_session(&self, user_id: Uuid) -> Result<(Session, String)> {
        let token = generate_token();
        let session = self.sessions
            .create(user_id, &token, Utc::now() + self.lifetime)
            .await?;
        Ok((session, token))
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        self.sessions.find_by_token(token).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        self.sessions.delete_by_token(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.sessions.cleanup_expired().await
    }

    pub fn create_session_cookie(&self, token: &str, secure: bool) -> Cookie<'static> {
        session_cookie(token.to_string(), self.lifetime.num_seconds())
            .secure(secure)
            .build()
    }

    pub fn create_logout_cookie() -> Cookie<'static> {
        session_cookie(String::new(), 0).build()
    }
}

fn session_cookie(value: String, max_age_secs: i64) -> cookie::CookieBuilder<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age_secs))
}

/// 32 random bytes, hex encoded.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn logout_cookie_expires_immediately() {
        let cookie = AuthService::create_logout_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
