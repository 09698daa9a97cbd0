use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        NewRefundRequest, RefundFilter, RefundInput, RefundRequest, RefundStatus,
        RefundWithOwner,
    },
    error::{AppError, Result},
    repository::RefundRepository,
};

const REFUND_COLUMNS: &str = r#"
    r.id, r.user_id, r.order_number, r.order_date, r.first_name, r.last_name,
    r.phone_number, r.email, r.country, r.address, r.postal_code, r.city,
    r.products, r.reason, r.bank_name, r.account_type, r.iban, r.iban_verified,
    r.status, r.created_at, r.updated_at
"#;

// Database row struct that matches SQLite schema
#[derive(FromRow)]
struct RefundRow {
    id: i64,
    user_id: String,
    order_number: String,
    order_date: NaiveDate,
    first_name: String,
    last_name: String,
    phone_number: String,
    email: String,
    country: String,
    address: String,
    postal_code: String,
    city: String,
    products: String,
    reason: String,
    bank_name: String,
    account_type: String,
    iban: String,
    iban_verified: i32,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct RefundOwnerRow {
    #[sqlx(flatten)]
    refund: RefundRow,
    username: String,
}

pub struct SqliteRefundRepository {
    pool: SqlitePool,
}

impl SqliteRefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_refund(row: RefundRow) -> Result<RefundRequest> {
        Ok(RefundRequest {
            id: row.id,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            order_number: row.order_number,
            order_date: row.order_date,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            email: row.email,
            country: row.country,
            address: row.address,
            postal_code: row.postal_code,
            city: row.city,
            products: row.products,
            reason: row.reason,
            bank_name: row.bank_name,
            account_type: row.account_type,
            iban: row.iban,
            iban_verified: row.iban_verified != 0,
            status: row.status.parse().map_err(AppError::Database)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a RefundFilter) {
        builder.push(" WHERE 1 = 1");

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (r.order_number LIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.username LIKE ")
                .push_bind(pattern.clone())
                .push(" OR r.email LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = filter.status {
            builder.push(" AND r.status = ").push_bind(status.as_str());
        }
        if let Some(country) = filter.country.as_deref().filter(|c| !c.is_empty()) {
            builder.push(" AND r.country = ").push_bind(country);
        }
        if let Some(from) = filter.created_from.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            builder.push(" AND r.created_at >= ").push_bind(from);
        }
        if let Some(until) = filter
            .created_to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            builder.push(" AND r.created_at < ").push_bind(until);
        }
    }
}

#[async_trait]
impl RefundRepository for SqliteRefundRepository {
    async fn create(&self, refund: NewRefundRequest) -> Result<RefundRequest> {
        let now_naive = Utc::now().naive_utc();
        let input = &refund.input;

        let result = sqlx::query(
            r#"
            INSERT INTO refund_requests (
                user_id, order_number, order_date, first_name, last_name,
                phone_number, email, country, address, postal_code, city,
                products, reason, bank_name, account_type, iban, iban_verified,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(refund.user_id.to_string())
        .bind(&input.order_number)
        .bind(input.order_date)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone_number)
        .bind(&input.email)
        .bind(&input.country)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.products)
        .bind(&input.reason)
        .bind(&input.bank_name)
        .bind(&input.account_type)
        .bind(&input.iban)
        .bind(if refund.iban_verified { 1i32 } else { 0i32 })
        .bind(RefundStatus::Pending.as_str())
        .bind(now_naive)
        .bind(now_naive)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created refund request".to_string())
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RefundRequest>> {
        let sql = format!("SELECT {} FROM refund_requests r WHERE r.id = ?", REFUND_COLUMNS);
        let row = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_refund).transpose()
    }

    async fn list(&self, owner: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<RefundRequest>> {
        let rows = match owner {
            Some(owner) => {
                let sql = format!(
                    "SELECT {} FROM refund_requests r WHERE r.user_id = ? \
                     ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?",
                    REFUND_COLUMNS
                );
                sqlx::query_as::<_, RefundRow>(&sql)
                    .bind(owner.to_string())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM refund_requests r \
                     ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?",
                    REFUND_COLUMNS
                );
                sqlx::query_as::<_, RefundRow>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(Self::row_to_refund)
            .collect()
    }

    async fn count(&self, owner: Option<Uuid>) -> Result<i64> {
        let count = match owner {
            Some(owner) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM refund_requests WHERE user_id = ?")
                    .bind(owner.to_string())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM refund_requests")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count)
    }

    async fn search(&self, filter: &RefundFilter, limit: i64, offset: i64) -> Result<Vec<RefundWithOwner>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {}, u.username FROM refund_requests r JOIN users u ON u.id = r.user_id",
            REFUND_COLUMNS
        ));
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<RefundOwnerRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(RefundWithOwner {
                    refund: Self::row_to_refund(row.refund)?,
                    username: row.username,
                })
            })
            .collect()
    }

    async fn count_matching(&self, filter: &RefundFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM refund_requests r JOIN users u ON u.id = r.user_id",
        );
        Self::push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn update_if_status(
        &self,
        id: i64,
        input: &RefundInput,
        iban_verified: bool,
        status: RefundStatus,
        expected_status: RefundStatus,
    ) -> Result<Option<RefundRequest>> {
        let result = sqlx::query(
            r#"
            UPDATE refund_requests
            SET order_number = ?,
                order_date = ?,
                first_name = ?,
                last_name = ?,
                phone_number = ?,
                email = ?,
                country = ?,
                address = ?,
                postal_code = ?,
                city = ?,
                products = ?,
                reason = ?,
                bank_name = ?,
                account_type = ?,
                iban = ?,
                iban_verified = ?,
                status = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(&input.order_number)
        .bind(input.order_date)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone_number)
        .bind(&input.email)
        .bind(&input.country)
        .bind(&input.address)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.products)
        .bind(&input.reason)
        .bind(&input.bank_name)
        .bind(&input.account_type)
        .bind(&input.iban)
        .bind(if iban_verified { 1i32 } else { 0i32 })
        .bind(status.as_str())
        .bind(Utc::now().naive_utc())
        .bind(id)
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refund_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
