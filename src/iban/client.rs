use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::IbanError;
use crate::config::IbanConfig;

/// The remote IBAN validation service.
#[async_trait]
pub trait IbanClient: Send + Sync {
    fn name(&self) -> &str;

    /// One upstream lookup. A 200 answer yields its `valid` flag; any
    /// other status is returned as [`IbanError::Upstream`].
    async fn lookup(&self, iban: &str) -> Result<bool, IbanError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    valid: bool,
}

/// api-ninjas.com IBAN endpoint: `GET <api_url>?iban=…` with an `X-Api-Key` header.
pub struct ApiNinjasClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ApiNinjasClient {
    pub fn new(config: &IbanConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl IbanClient for ApiNinjasClient {
    fn name(&self) -> &str {
        "api-ninjas"
    }

    async fn lookup(&self, iban: &str) -> Result<bool, IbanError> {
        let response = self
            .http
            .get(&self.api_url)
            .header("X-Api-Key", &self.api_key)
            .query(&[("iban", iban)])
            .send()
            .await
            .map_err(|e| IbanError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(IbanError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| IbanError::Transport(format!("Malformed validation response: {}", e)))?;

        Ok(parsed.valid)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Scripted stand-in for the remote service that counts its calls.
    #[derive(Default)]
    pub struct FakeIbanClient {
        answers: Mutex<HashMap<String, Result<bool, IbanError>>>,
        default_valid: bool,
        calls: AtomicUsize,
    }

    impl FakeIbanClient {
        /// Every IBAN without a scripted answer comes back as `default_valid`.
        pub fn new(default_valid: bool) -> Self {
            Self {
                default_valid,
                ..Default::default()
            }
        }

        pub fn answer(self, iban: &str, valid: bool) -> Self {
            self.script(iban, Ok(valid))
        }

        pub fn fail(self, iban: &str, status: u16, body: &str) -> Self {
            self.script(iban, Err(IbanError::Upstream { status, body: body.to_string() }))
        }

        fn script(self, iban: &str, answer: Result<bool, IbanError>) -> Self {
            if let Ok(mut answers) = self.answers.lock() {
                answers.insert(iban.to_string(), answer);
            }
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IbanClient for FakeIbanClient {
        fn name(&self) -> &str {
            "fake"
        }

        async fn lookup(&self, iban: &str) -> Result<bool, IbanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answers = self
                .answers
                .lock()
                .map_err(|_| IbanError::Transport("fake client poisoned".to_string()))?;
            answers.get(iban).cloned().unwrap_or(Ok(self.default_valid))
        }
    }
}
