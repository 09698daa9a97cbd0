//! Bearer tokens for programmatic API clients.
//!
//! Tokens are HS256-signed with the configured secret. An access token
//! authenticates API calls; a refresh token can only be exchanged for a
//! new access token at `/api/token/refresh`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

const ISSUER: &str = "refund-desk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub typ: TokenType,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign(user_id, TokenType::Access)?,
            refresh: self.sign(user_id, TokenType::Refresh)?,
        })
    }

    pub fn sign(&self, user_id: Uuid, typ: TokenType) -> Result<String> {
        let now = Utc::now();
        let ttl = match typ {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            typ,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validates signature, issuer, expiry and token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        })?;

        if data.claims.typ != expected {
            tracing::debug!(
                "Token type mismatch: expected {:?}, got {:?}",
                expected,
                data.claims.typ
            );
            return Err(AppError::Unauthorized);
        }

        Ok(data.claims)
    }
}
