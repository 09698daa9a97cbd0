mod common;

use axum::http::{header, StatusCode};

use common::*;
use refund_desk::{
    domain::RefundStatus,
    repository::{RefundRepository, SqliteRefundRepository, UserRepository},
};

fn location(headers: &axum::http::HeaderMap) -> &str {
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// The refund form plus overrides, ready for `form_request`.
fn refund_post<'a>(owned: &'a [(&'static str, String)], extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut fields: Vec<(&str, &str)> = owned
        .iter()
        .filter(|(key, _)| !extra.iter().any(|(k, _)| k == key))
        .map(|(key, value)| (*key, value.as_str()))
        .collect();
    fields.extend_from_slice(extra);
    fields
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, headers, _) = app.send_raw(page_request("/refunds", None)).await?;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/accounts/login?next=%2Frefunds");
    Ok(())
}

#[tokio::test]
async fn login_sets_session_and_follows_next() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.user("alice", false).await?;

    let (status, _, body) = app
        .send_raw(form_request("/accounts/login", None, &[("username", "alice"), ("password", "nope")]))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Please enter a correct username and password."));

    let (status, headers, _) = app
        .send_raw(form_request(
            "/accounts/login",
            None,
            &[("username", "alice"), ("password", PASSWORD), ("next", "/refunds/create")],
        ))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/refunds/create");

    let cookies: Vec<&str> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("session=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("csrftoken=")));

    let (status, headers, _) = app
        .send_raw(form_request(
            "/accounts/login",
            None,
            &[("username", "alice"), ("password", PASSWORD), ("next", "https://evil.example")],
        ))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/refunds");
    Ok(())
}

#[tokio::test]
async fn signup_registers_and_reports_field_errors() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.user("taken", false).await?;

    let (status, _, body) = app
        .send_raw(form_request(
            "/accounts/signup",
            None,
            &[("username", "taken"), ("email", ""), ("password1", PASSWORD), ("password2", PASSWORD)],
        ))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("A user with that username already exists."));

    let (status, _, body) = app
        .send_raw(form_request(
            "/accounts/signup",
            None,
            &[("username", "newbie"), ("email", "newbie-at-example"), ("password1", PASSWORD), ("password2", PASSWORD)],
        ))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Enter a valid email address."));
    assert!(app.ctx().user_repo.find_by_username("newbie").await?.is_none());

    let (status, headers, _) = app
        .send_raw(form_request(
            "/accounts/signup",
            None,
            &[("username", "newbie"), ("email", ""), ("password1", PASSWORD), ("password2", PASSWORD)],
        ))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/refunds");

    let user = app.ctx().user_repo.find_by_username("newbie").await?.expect("registered");
    assert!(!user.is_staff);
    assert!(user.email.is_none());
    Ok(())
}

#[tokio::test]
async fn refund_form_requires_csrf_and_validates() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let (cookies, csrf) = app.login(&alice).await?;
    let owned = refund_form_fields("100");

    let (status, _, _) = app
        .send_raw(form_request("/refunds/create", Some(&cookies), &refund_post(&owned, &[])))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send_raw(form_request(
            "/refunds/create",
            Some(&cookies),
            &refund_post(&owned, &[("csrf_token", csrf.as_str()), ("iban", INVALID_IBAN)]),
        ))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("The IBAN entered is invalid."));
    assert!(body.contains("value=\"100\""), "input is preserved");

    let (status, headers, _) = app
        .send_raw(form_request(
            "/refunds/create",
            Some(&cookies),
            &refund_post(&owned, &[("csrf_token", csrf.as_str())]),
        ))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/refunds");

    let (status, _, body) = app.send_raw(page_request("/refunds", Some(&cookies))).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Pending"));
    assert!(app.mailer.outbox().is_empty());
    Ok(())
}

#[tokio::test]
async fn detail_page_hides_other_users_requests() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let mallory = app.user("mallory", false).await?;
    let refund = app.ctx().refund_service.submit(&alice, refund_input("100")).await?;
    let uri = format!("/refunds/{}", refund.id);

    let (cookies, _) = app.login(&mallory).await?;
    let (status, _, _) = app.send_raw(page_request(&uri, Some(&cookies))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (cookies, _) = app.login(&alice).await?;
    let (status, _, body) = app.send_raw(page_request(&uri, Some(&cookies))).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Running shoes"));
    Ok(())
}

#[tokio::test]
async fn admin_console_is_staff_only() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let staff = app.user("staff", true).await?;
    app.ctx().refund_service.submit(&alice, refund_input("ORD-42")).await?;

    let (cookies, _) = app.login(&alice).await?;
    let (status, _, _) = app.send_raw(page_request("/admin/refunds", Some(&cookies))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (cookies, _) = app.login(&staff).await?;
    let (status, _, body) = app
        .send_raw(page_request("/admin/refunds?q=alice&status=pending", Some(&cookies)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ORD-42"));

    let (status, _, body) = app
        .send_raw(page_request("/admin/refunds?status=approved", Some(&cookies)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("ORD-42"));
    Ok(())
}

#[tokio::test]
async fn admin_approval_emails_the_owner_once() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let staff = app.user("staff", true).await?;
    let refund = app.ctx().refund_service.submit(&alice, refund_input("100")).await?;
    let (cookies, csrf) = app.login(&staff).await?;
    let owned = refund_form_fields("100");
    let uri = format!("/admin/refunds/{}", refund.id);

    let (status, headers, _) = app
        .send_raw(form_request(
            &uri,
            Some(&cookies),
            &refund_post(&owned, &[("csrf_token", csrf.as_str()), ("status", "approved")]),
        ))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/admin/refunds");

    let stored = app.ctx().refund_service.get_for(&staff, refund.id).await?;
    assert_eq!(stored.status, RefundStatus::Approved);
    assert_eq!(app.mailer.outbox().len(), 1);

    // Resubmitting the same status is not a transition.
    app.send_raw(form_request(
        &uri,
        Some(&cookies),
        &refund_post(&owned, &[("csrf_token", csrf.as_str()), ("status", "approved")]),
    ))
    .await?;
    assert_eq!(app.mailer.outbox().len(), 1);
    Ok(())
}

#[tokio::test]
async fn admin_export_and_delete() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let staff = app.user("staff", true).await?;
    let refund = app.ctx().refund_service.submit(&alice, refund_input("100")).await?;
    let (cookies, csrf) = app.login(&staff).await?;

    let (status, headers, body) = app
        .send_raw(page_request("/admin/refunds/export?status=pending", Some(&cookies)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(location(&headers).is_empty());
    let exported: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(exported[0]["order_number"], "100");
    assert_eq!(exported[0]["username"], "alice");

    let uri = format!("/admin/refunds/{}/delete", refund.id);
    let (status, headers, _) = app
        .send_raw(form_request(&uri, Some(&cookies), &[("csrf_token", csrf.as_str())]))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/admin/refunds");

    let repo = SqliteRefundRepository::new(app.pool.clone());
    assert!(repo.find_by_id(refund.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn logout_ends_the_session() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let (cookies, csrf) = app.login(&alice).await?;

    let (status, headers, _) = app
        .send_raw(form_request("/accounts/logout", Some(&cookies), &[("csrf_token", csrf.as_str())]))
        .await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/accounts/login");

    let (status, _, _) = app.send_raw(page_request("/refunds", Some(&cookies))).await?;
    assert_eq!(status, StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn out_of_range_page_numbers_render_an_empty_page() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let staff = app.user("staff", true).await?;
    app.ctx().refund_service.submit(&alice, refund_input("ORD-7")).await?;

    let (cookies, _) = app.login(&alice).await?;
    let (status, _, body) = app
        .send_raw(page_request("/refunds?page=9223372036854775807", Some(&cookies)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("ORD-7"));

    let (cookies, _) = app.login(&staff).await?;
    let (status, _, body) = app
        .send_raw(page_request("/admin/refunds?page=9223372036854775807", Some(&cookies)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("ORD-7"));

    let (status, _, body) = app
        .send_raw(page_request("/admin/refunds?page=-3", Some(&cookies)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ORD-7"));
    Ok(())
}

#[tokio::test]
async fn admin_edit_without_status_re_renders_with_field_error() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let alice = app.user("alice", false).await?;
    let staff = app.user("staff", true).await?;
    let refund = app.ctx().refund_service.submit(&alice, refund_input("100")).await?;
    let (cookies, csrf) = app.login(&staff).await?;
    let owned = refund_form_fields("100");

    let (status, _, body) = app
        .send_raw(form_request(
            &format!("/admin/refunds/{}", refund.id),
            Some(&cookies),
            &refund_post(&owned, &[("csrf_token", csrf.as_str()), ("city", "Hamburg")]),
        ))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("This field is required."));
    assert!(body.contains("value=\"Hamburg\""), "input is preserved");

    let stored = app.ctx().refund_service.get_for(&staff, refund.id).await?;
    assert_eq!(stored.status, RefundStatus::Pending);
    assert_ne!(stored.city, "Hamburg");
    assert!(app.mailer.outbox().is_empty());
    Ok(())
}
