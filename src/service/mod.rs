pub mod refund_service;
pub mod user_service;

use std::sync::Arc;
use chrono::Duration;
use serde::Serialize;
use sqlx::SqlitePool;
use crate::auth::{AuthService, CsrfService, JwtService};
use crate::config::Settings;
use crate::iban::{IbanClient, IbanVerifier};
use crate::notifications::{DynMailer, StatusNotifier};
use crate::repository::*;

pub use refund_service::RefundService;
pub use user_service::{SignupForm, UserService};

/// One page of results plus what a pager needs to render.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Clamps a user-supplied 1-based page number so the row offset fits in
/// an `i64`, and returns it with that offset.
pub fn page_offset(page: i64, per_page: i64) -> (i64, i64) {
    let per_page = per_page.max(1);
    let page = page.clamp(1, i64::MAX / per_page);
    (page, (page - 1) * per_page)
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        ((self.total + self.per_page - 1) / self.per_page).max(1)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn previous_page(&self) -> i64 {
        (self.page - 1).max(1)
    }

    pub fn next_page(&self) -> i64 {
        self.page + 1
    }
}

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub refund_repo: Arc<dyn RefundRepository>,
    pub auth_service: Arc<AuthService>,
    pub csrf_service: Arc<CsrfService>,
    pub jwt_service: Arc<JwtService>,
    pub iban_verifier: Arc<IbanVerifier>,
    pub refund_service: Arc<RefundService>,
    pub user_service: Arc<UserService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
        iban_client: Arc<dyn IbanClient>,
        mailer: DynMailer,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let refund_repo: Arc<dyn RefundRepository> =
            Arc::new(SqliteRefundRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            settings.auth.session_duration_hours,
        ));
        let csrf_service = Arc::new(CsrfService::new(db_pool.clone()));
        let jwt_service = Arc::new(JwtService::new(
            &settings.auth.jwt_secret,
            Duration::minutes(settings.auth.access_token_minutes),
            Duration::hours(settings.auth.refresh_token_hours),
        ));

        let iban_verifier = Arc::new(IbanVerifier::new(iban_client, &settings.iban));
        let notifier = Arc::new(StatusNotifier::new(mailer, settings.email.from_address.clone()));

        let refund_service = Arc::new(RefundService::new(
            refund_repo.clone(),
            iban_verifier.clone(),
            notifier,
        ));
        let user_service = Arc::new(UserService::new(user_repo.clone()));

        Self {
            user_repo,
            refund_repo,
            auth_service,
            csrf_service,
            jwt_service,
            iban_verifier,
            refund_service,
            user_service,
            db_pool,
        }
    }
}
