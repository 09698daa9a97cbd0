pub mod accounts;
pub mod admin;
pub mod forms;
pub mod refunds;
pub mod templates;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    response::Redirect,
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::{
        middleware::auth::{require_auth_redirect, require_csrf, require_staff, CurrentUser},
        state::AppState,
    },
    auth::{csrf::CSRF_COOKIE, CsrfService},
    error::Result,
};

pub fn create_web_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/accounts/logout", post(accounts::logout))
        .route("/refunds", get(refunds::list_page))
        .route("/refunds/create", get(refunds::create_page).post(refunds::create))
        .route("/refunds/:id", get(refunds::detail_page))
        .nest("/admin", admin_routes())
        .route_layer(from_fn_with_state(state.clone(), require_csrf))
        .route_layer(from_fn_with_state(state, require_auth_redirect));

    Router::new()
        .route("/", get(|| async { Redirect::to("/refunds") }))
        .route("/accounts/login", get(accounts::login_page).post(accounts::login))
        .route("/accounts/signup", get(accounts::signup_page).post(accounts::signup))
        .merge(protected)
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/admin/refunds") }))
        .route("/refunds", get(admin::list_page))
        .route("/refunds/export", get(admin::export))
        .route("/refunds/:id", get(admin::detail_page).post(admin::update))
        .route("/refunds/:id/delete", post(admin::delete))
        .route_layer(from_fn(require_staff))
}

/// The form token for the caller's session. The token in the `csrftoken`
/// cookie is reused while it verifies; otherwise a new one is issued and
/// the cookie is replaced. Bearer-authenticated callers get an empty token.
pub(crate) async fn form_token(
    state: &AppState,
    jar: CookieJar,
    current: &CurrentUser,
) -> Result<(CookieJar, String)> {
    let Some(session_id) = current.session_id() else {
        return Ok((jar, String::new()));
    };
    let csrf = &state.service_context.csrf_service;

    if let Some(cookie) = jar.get(CSRF_COOKIE) {
        let token = cookie.value().to_string();
        if csrf.verify(session_id, &token).await? {
            return Ok((jar, token));
        }
    }

    let token = csrf.issue(session_id).await?;
    let jar = jar.add(CsrfService::cookie(&token, state.secure_cookies()));
    Ok((jar, token))
}
