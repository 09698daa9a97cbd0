//! IBAN validation gated by a time-boxed result cache.
//!
//! The upstream service is rate limited and billed per call, so a
//! successful answer (valid or not) is remembered for the configured TTL
//! and served from memory on the next lookup of the same IBAN. Failures
//! are never cached. Concurrent misses for the same IBAN may each reach
//! the upstream service.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use thiserror::Error;

use crate::config::IbanConfig;
use crate::error::AppError;

pub mod client;

pub use client::{ApiNinjasClient, IbanClient};

pub const INVALID_IBAN_MESSAGE: &str = "The IBAN entered is invalid.";
pub const LOOKUP_FAILED_MESSAGE: &str = "IBAN validation failed. Please try again later.";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IbanError {
    #[error("IBAN not provided")]
    Missing,

    #[error("{0}")]
    Format(String),

    #[error("validation service returned {status}")]
    Upstream { status: u16, body: String },

    #[error("validation service unreachable: {0}")]
    Transport(String),
}

impl From<IbanError> for AppError {
    fn from(err: IbanError) -> Self {
        match err {
            IbanError::Missing => AppError::BadRequest("IBAN not provided".to_string()),
            IbanError::Format(msg) => AppError::BadRequest(msg),
            IbanError::Upstream { status, body } => AppError::Upstream { status, body },
            IbanError::Transport(msg) => AppError::External(msg),
        }
    }
}

/// Strips whitespace and uppercases, so `de89 3704…` and `DE893704…` share a cache entry.
pub fn normalize(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Structural check on a normalized IBAN: country code, check digits,
/// then 11 to 30 alphanumerics. The checksum is left to the upstream service.
pub fn check_format(iban: &str) -> Result<(), IbanError> {
    if iban.is_empty() {
        return Err(IbanError::Missing);
    }
    if !(15..=34).contains(&iban.len()) {
        return Err(IbanError::Format(
            "IBAN must be between 15 and 34 characters long.".to_string(),
        ));
    }

    let bytes = iban.as_bytes();
    let country_ok = bytes[..2].iter().all(u8::is_ascii_uppercase);
    let check_ok = bytes[2..4].iter().all(u8::is_ascii_digit);
    let bban_ok = bytes[4..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());

    if country_ok && check_ok && bban_ok {
        Ok(())
    } else {
        Err(IbanError::Format(
            "IBAN must start with a country code and two check digits followed by letters and digits."
                .to_string(),
        ))
    }
}

fn cache_key(iban: &str) -> String {
    format!("iban_validation_{}", iban)
}

pub struct IbanVerifier {
    client: Arc<dyn IbanClient>,
    cache: Cache<String, bool>,
}

impl IbanVerifier {
    pub fn new(client: Arc<dyn IbanClient>, config: &IbanConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self { client, cache }
    }

    /// Validity of an IBAN, from cache when a recent answer exists.
    pub async fn is_valid(&self, raw: &str) -> Result<bool, IbanError> {
        let iban = normalize(raw);
        check_format(&iban)?;

        let key = cache_key(&iban);
        if let Some(valid) = self.cache.get(&key) {
            tracing::debug!("IBAN validation cache hit");
            return Ok(valid);
        }

        let valid = self.client.lookup(&iban).await.map_err(|e| {
            tracing::warn!("IBAN lookup via {} failed: {}", self.client.name(), e);
            e
        })?;
        self.cache.insert(key, valid);
        tracing::debug!("IBAN validated via {} (valid: {})", self.client.name(), valid);

        Ok(valid)
    }
}
