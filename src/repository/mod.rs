use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod refund_repository;
pub mod user_repository;

pub use refund_repository::SqliteRefundRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    /// The user together with their stored password hash.
    async fn find_credentials(&self, username: &str) -> Result<Option<(User, String)>>;
    async fn set_staff(&self, id: Uuid, is_staff: bool) -> Result<User>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn create(&self, refund: NewRefundRequest) -> Result<RefundRequest>;
    async fn find_by_id(&self, id: i64) -> Result<Option<RefundRequest>>;
    /// Newest first. `owner = None` lists every user's requests.
    async fn list(&self, owner: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<RefundRequest>>;
    async fn count(&self, owner: Option<Uuid>) -> Result<i64>;
    async fn search(&self, filter: &RefundFilter, limit: i64, offset: i64) -> Result<Vec<RefundWithOwner>>;
    async fn count_matching(&self, filter: &RefundFilter) -> Result<i64>;
    /// Writes the editable fields, the verification flag and the status,
    /// but only while the stored status still equals `expected_status`.
    /// Returns `None` when the row is gone or its status moved on.
    async fn update_if_status(
        &self,
        id: i64,
        input: &RefundInput,
        iban_verified: bool,
        status: RefundStatus,
        expected_status: RefundStatus,
    ) -> Result<Option<RefundRequest>>;
    async fn delete(&self, id: i64) -> Result<bool>;
}
