use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::{
        csrf::{token_from_form, CSRF_HEADER},
        TokenType, SESSION_COOKIE,
    },
    domain::User,
    error::{AppError, Result},
};

/// Form bodies larger than this are rejected before CSRF parsing.
const MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub enum AuthMethod {
    Session { session_id: String },
    Bearer,
}

#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub method: AuthMethod,
}

impl CurrentUser {
    pub fn session_id(&self) -> Option<&str> {
        match &self.method {
            AuthMethod::Session { session_id } => Some(session_id),
            AuthMethod::Bearer => None,
        }
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Identifies the caller from a bearer token or, failing that, the
/// session cookie. A bearer token that does not verify is an error rather
/// than a fallback to the cookie.
async fn resolve_user(state: &AppState, jar: &CookieJar, bearer: Option<String>) -> Result<Option<CurrentUser>> {
    let ctx = &state.service_context;

    if let Some(token) = bearer {
        let claims = ctx.jwt_service.verify(&token, TokenType::Access)?;
        let user = ctx.user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        return Ok(Some(CurrentUser { user, method: AuthMethod::Bearer }));
    }

    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(session) = ctx.auth_service.validate_session(cookie.value()).await? else {
        return Ok(None);
    };
    let Some(user) = ctx.user_repo.find_by_id(session.user_id).await? else {
        return Ok(None);
    };

    Ok(Some(CurrentUser {
        user,
        method: AuthMethod::Session { session_id: session.id },
    }))
}

fn is_unsafe(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// REST API guard: 401 without credentials. Session-authenticated unsafe
/// calls must also carry the session's CSRF token in `X-CSRF-Token`.
pub async fn require_api_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let current = resolve_user(&state, &jar, bearer_token(&request))
        .await?
        .ok_or(AppError::Unauthorized)?;

    if let (Some(session_id), true) = (current.session_id(), is_unsafe(request.method())) {
        let token = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !state.service_context.csrf_service.verify(session_id, &token).await? {
            tracing::warn!("CSRF check failed for API call by {}", current.user.username);
            return Err(AppError::Forbidden);
        }
    }

    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// Web page guard: anonymous visitors are sent to the login page.
pub async fn require_auth_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = bearer_token(&request);
    match resolve_user(&state, &jar, bearer).await {
        Ok(Some(current)) => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Ok(None) => {
            let next_path = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/refunds".to_string());
            let target = format!("/accounts/login?next={}", urlencode(&next_path));
            Redirect::to(&target).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Must run after `require_auth_redirect`.
pub async fn require_staff(request: Request, next: Next) -> Result<Response> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !current.user.is_staff {
        tracing::warn!("Non-staff user {} tried to reach the admin console", current.user.username);
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Checks the `csrf_token` form field (or `X-CSRF-Token` header) on
/// state-changing web requests. Must run after `require_auth_redirect`.
pub async fn require_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if !is_unsafe(request.method()) {
        return Ok(next.run(request).await);
    }

    let session_id = request
        .extensions()
        .get::<CurrentUser>()
        .and_then(|c| c.session_id().map(str::to_string));
    let Some(session_id) = session_id else {
        // Bearer-authenticated requests carry no ambient credentials.
        return Ok(next.run(request).await);
    };

    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable form body: {}", e)))?;

    let token = header_token
        .or_else(|| token_from_form(&bytes))
        .unwrap_or_default();

    if !state.service_context.csrf_service.verify(&session_id, &token).await? {
        tracing::warn!("CSRF token mismatch on {}", parts.uri.path());
        return Err(AppError::Forbidden);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

fn urlencode(value: &str) -> String {
    serde_urlencoded::to_string([("v", value)])
        .map(|s| s.trim_start_matches("v=").to_string())
        .unwrap_or_default()
}
