use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    auth::{AuthService, CsrfService, SESSION_COOKIE},
    domain::User,
    error::{AppError, FieldErrors, Result},
    service::SignupForm,
    web::templates::{HtmlTemplate, PageContext},
};

const DEFAULT_REDIRECT: &str = "/refunds";

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub page: PageContext,
    pub username: String,
    pub email: String,
    pub errors: FieldErrors,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        DEFAULT_REDIRECT
    }
}

/// Opens a session for `user`, setting the session and CSRF cookies.
async fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar> {
    let ctx = &state.service_context;
    let secure = state.secure_cookies();

    let (session, token) = ctx.auth_service.create_session(user.id).await?;
    let csrf_token = ctx.csrf_service.issue(&session.id).await?;

    tracing::info!("User {} logged in", user.username);
    Ok(jar
        .add(ctx.auth_service.create_session_cookie(&token, secure))
        .add(CsrfService::cookie(&csrf_token, secure)))
}

// GET /accounts/login
pub async fn login_page(Query(query): Query<NextQuery>) -> impl IntoResponse {
    HtmlTemplate(LoginTemplate {
        page: PageContext::anonymous(),
        username: String::new(),
        next: query.next.unwrap_or_default(),
        error: None,
    })
}

// POST /accounts/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let user = state.service_context.user_service
        .authenticate(&form.username, &form.password)
        .await?;

    let Some(user) = user else {
        tracing::warn!("Failed login attempt for {}", form.username);
        return Ok(HtmlTemplate(LoginTemplate {
            page: PageContext::anonymous(),
            username: form.username,
            next: form.next,
            error: Some("Please enter a correct username and password.".to_string()),
        }).into_response());
    };

    let jar = start_session(&state, jar, &user).await?;
    Ok((jar, Redirect::to(safe_next(&form.next))).into_response())
}

// GET /accounts/signup
pub async fn signup_page() -> impl IntoResponse {
    HtmlTemplate(SignupTemplate {
        page: PageContext::anonymous(),
        username: String::new(),
        email: String::new(),
        errors: FieldErrors::new(),
    })
}

// POST /accounts/signup
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let username = form.username.clone();
    let email = form.email.clone().unwrap_or_default();

    match state.service_context.user_service.register(form).await {
        Ok(user) => {
            let jar = start_session(&state, jar, &user).await?;
            Ok((jar, Redirect::to(DEFAULT_REDIRECT)).into_response())
        }
        Err(AppError::Form(errors)) => Ok(HtmlTemplate(SignupTemplate {
            page: PageContext::anonymous(),
            username,
            email,
            errors,
        }).into_response()),
        Err(e) => Err(e),
    }
}

// POST /accounts/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let ctx = &state.service_context;

    if let Some(session_id) = current.session_id() {
        ctx.csrf_service.revoke(session_id).await?;
    }
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        ctx.auth_service.invalidate_session(cookie.value()).await?;
    }
    tracing::info!("User {} logged out", current.user.username);

    let jar = jar
        .add(AuthService::create_logout_cookie())
        .add(CsrfService::removal_cookie());
    Ok((jar, Redirect::to("/accounts/login")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next("/refunds/3"), "/refunds/3");
        assert_eq!(safe_next("https://evil.example"), DEFAULT_REDIRECT);
        assert_eq!(safe_next("//evil.example"), DEFAULT_REDIRECT);
        assert_eq!(safe_next(""), DEFAULT_REDIRECT);
    }
}
