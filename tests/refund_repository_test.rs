mod common;

use chrono::Utc;

use common::*;
use refund_desk::{
    domain::{CreateUserRequest, NewRefundRequest, RefundFilter, RefundStatus},
    repository::{RefundRepository, SqliteRefundRepository, SqliteUserRepository, UserRepository},
};

#[tokio::test]
async fn test_refund_crud() -> anyhow::Result<()> {
    let pool = test_pool().await?;

    let users = SqliteUserRepository::new(pool.clone());
    let repo = SqliteRefundRepository::new(pool.clone());
    let owner = users
        .create(CreateUserRequest {
            username: "owner".to_string(),
            email: None,
            password: PASSWORD.to_string(),
            is_staff: false,
        })
        .await?;

    // Create
    let created = repo
        .create(NewRefundRequest {
            user_id: owner.id,
            input: refund_input("100"),
            iban_verified: true,
        })
        .await?;
    assert_eq!(created.status, RefundStatus::Pending);
    assert!(created.iban_verified);

    // Read
    let found = repo.find_by_id(created.id).await?.expect("refund exists");
    assert_eq!(found, created);
    assert_eq!(repo.count(Some(owner.id)).await?, 1);
    assert_eq!(repo.count(None).await?, 1);

    // Update guarded by the previous status
    let mut input = created.to_input();
    input.city = "Munich".to_string();
    let updated = repo
        .update_if_status(created.id, &input, true, RefundStatus::Rejected, RefundStatus::Pending)
        .await?
        .expect("guard matches");
    assert_eq!(updated.city, "Munich");
    assert_eq!(updated.status, RefundStatus::Rejected);
    assert!(updated.updated_at >= created.updated_at);

    // Delete
    assert!(repo.delete(created.id).await?);
    assert!(!repo.delete(created.id).await?);
    assert!(repo.find_by_id(created.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn deleting_a_user_deletes_their_refunds() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let bob = app.user("bob", false).await?;
    let repo = SqliteRefundRepository::new(app.pool.clone());

    for (user, order) in [(&alice, "A-1"), (&alice, "A-2"), (&bob, "B-1")] {
        repo.create(NewRefundRequest {
            user_id: user.id,
            input: refund_input(order),
            iban_verified: true,
        })
        .await?;
    }

    SqliteUserRepository::new(app.pool.clone()).delete(alice.id).await?;

    assert_eq!(repo.count(Some(alice.id)).await?, 0);
    assert_eq!(repo.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn search_filters_combine() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let bob = app.user("bob", false).await?;
    let repo = SqliteRefundRepository::new(app.pool.clone());

    let mut french = refund_input("FR-77");
    french.country = "France".to_string();
    french.email = "bob@shop.example".to_string();
    repo.create(NewRefundRequest { user_id: alice.id, input: refund_input("DE-1"), iban_verified: true }).await?;
    let bobs = repo.create(NewRefundRequest { user_id: bob.id, input: french, iban_verified: true }).await?;
    repo.update_if_status(bobs.id, &bobs.to_input(), true, RefundStatus::Approved, RefundStatus::Pending)
        .await?;

    let by_username = RefundFilter { search: Some("bob".to_string()), ..Default::default() };
    let rows = repo.search(&by_username, 25, 0).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username, "bob");

    let by_order = RefundFilter { search: Some("DE-".to_string()), ..Default::default() };
    assert_eq!(repo.count_matching(&by_order).await?, 1);

    let by_email = RefundFilter { search: Some("shop.example".to_string()), ..Default::default() };
    assert_eq!(repo.count_matching(&by_email).await?, 1);

    let approved_in_france = RefundFilter {
        status: Some(RefundStatus::Approved),
        country: Some("France".to_string()),
        ..Default::default()
    };
    assert_eq!(repo.count_matching(&approved_in_france).await?, 1);

    let today = Utc::now().date_naive();
    let created_today = RefundFilter {
        created_from: Some(today),
        created_to: Some(today),
        ..Default::default()
    };
    assert_eq!(repo.count_matching(&created_today).await?, 2);

    let before_today = RefundFilter {
        created_to: today.pred_opt(),
        ..Default::default()
    };
    assert_eq!(repo.count_matching(&before_today).await?, 0);
    Ok(())
}
