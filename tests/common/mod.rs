#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

use refund_desk::{
    api::state::AppState,
    app,
    config::Settings,
    domain::{CreateUserRequest, RefundInput, User},
    iban::client::testing::FakeIbanClient,
    notifications::testing::RecordingMailer,
    repository::{SqliteUserRepository, UserRepository},
    service::ServiceContext,
};

pub const VALID_IBAN: &str = "DE89370400440532013000";
pub const INVALID_IBAN: &str = "DE00123456789012345678";
pub const PASSWORD: &str = "correct-horse-battery";

pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    // One connection that never recycles, so the in-memory database survives.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub state: AppState,
    pub iban: Arc<FakeIbanClient>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    /// A fake IBAN service that accepts `VALID_IBAN` and rejects everything else.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_iban(FakeIbanClient::new(false).answer(VALID_IBAN, true)).await
    }

    pub async fn with_iban(iban: FakeIbanClient) -> anyhow::Result<Self> {
        let pool = test_pool().await?;
        let settings = Settings::default();
        let iban = Arc::new(iban);
        let mailer = Arc::new(RecordingMailer::new());

        let ctx = Arc::new(ServiceContext::new(
            pool.clone(),
            &settings,
            iban.clone(),
            mailer.clone(),
        ));
        let state = AppState::new(ctx, Arc::new(settings));

        Ok(Self { pool, state, iban, mailer })
    }

    pub fn ctx(&self) -> &ServiceContext {
        &self.state.service_context
    }

    pub fn router(&self) -> NormalizePath<Router> {
        app(self.state.clone())
    }

    pub async fn user(&self, username: &str, is_staff: bool) -> anyhow::Result<User> {
        let repo = SqliteUserRepository::new(self.pool.clone());
        Ok(repo
            .create(CreateUserRequest {
                username: username.to_string(),
                email: Some(format!("{}@example.com", username)),
                password: PASSWORD.to_string(),
                is_staff,
            })
            .await?)
    }

    /// A session cookie header value plus the session's CSRF token.
    pub async fn login(&self, user: &User) -> anyhow::Result<(String, String)> {
        let (session, token) = self.ctx().auth_service.create_session(user.id).await?;
        let csrf = self.ctx().csrf_service.issue(&session.id).await?;
        Ok((format!("session={}; csrftoken={}", token, csrf), csrf))
    }

    pub async fn bearer(&self, user: &User) -> anyhow::Result<String> {
        Ok(format!("Bearer {}", self.ctx().jwt_service.issue_pair(user.id)?.access))
    }

    pub async fn send(&self, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, body))
    }
}

impl TestApp {
    /// Status, headers and body text, for HTML pages and redirects.
    pub async fn send_raw(&self, request: Request<Body>) -> anyhow::Result<(StatusCode, HeaderMap, String)> {
        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, String::from_utf8_lossy(&bytes).into_owned()))
    }
}

pub fn form_request(uri: &str, cookies: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder
        .body(Body::from(serde_urlencoded::to_string(fields).unwrap()))
        .unwrap()
}

pub fn page_request(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

/// Every field of a valid refund form, as posted by the browser.
pub fn refund_form_fields(order_number: &str) -> Vec<(&'static str, String)> {
    let input = refund_input(order_number);
    vec![
        ("order_number", input.order_number),
        ("order_date", input.order_date.format("%Y-%m-%d").to_string()),
        ("first_name", input.first_name),
        ("last_name", input.last_name),
        ("phone_number", input.phone_number),
        ("email", input.email),
        ("country", input.country),
        ("address", input.address),
        ("postal_code", input.postal_code),
        ("city", input.city),
        ("products", input.products),
        ("reason", input.reason),
        ("bank_name", input.bank_name),
        ("account_type", input.account_type),
        ("iban", input.iban),
    ]
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn refund_input(order_number: &str) -> RefundInput {
    RefundInput {
        order_number: order_number.to_string(),
        order_date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone_number: "+49123456789".to_string(),
        email: "test@example.com".to_string(),
        country: "Germany".to_string(),
        address: "Main street 1".to_string(),
        postal_code: "10115".to_string(),
        city: "Berlin".to_string(),
        products: "Running shoes".to_string(),
        reason: "Wrong size".to_string(),
        bank_name: "Test Bank".to_string(),
        account_type: "Checking".to_string(),
        iban: VALID_IBAN.to_string(),
    }
}

pub fn refund_json(order_number: &str) -> Value {
    serde_json::to_value(refund_input(order_number)).unwrap()
}
