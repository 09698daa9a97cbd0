use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::RefundRequest,
    error::{AppError, FieldErrors, Result},
    service::Page,
    web::{
        form_token,
        forms::RefundForm,
        templates::{HtmlTemplate, PageContext},
    },
};

#[derive(Template)]
#[template(path = "refunds/list.html")]
pub struct RefundListTemplate {
    pub page: PageContext,
    pub refunds: Page<RefundRequest>,
}

#[derive(Template)]
#[template(path = "refunds/create.html")]
pub struct RefundCreateTemplate {
    pub page: PageContext,
    pub form: RefundForm,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "refunds/detail.html")]
pub struct RefundDetailTemplate {
    pub page: PageContext,
    pub refund: RefundRequest,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

// GET /refunds
pub async fn list_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    let refunds = state.service_context.refund_service
        .list_own(&current.user, query.page.unwrap_or(1))
        .await?;
    let (jar, csrf_token) = form_token(&state, jar, &current).await?;

    Ok((jar, HtmlTemplate(RefundListTemplate {
        page: PageContext::for_user(&current.user, csrf_token),
        refunds,
    })).into_response())
}

// GET /refunds/create
pub async fn create_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<Response> {
    let (jar, csrf_token) = form_token(&state, jar, &current).await?;

    Ok((jar, HtmlTemplate(RefundCreateTemplate {
        page: PageContext::for_user(&current.user, csrf_token),
        form: RefundForm::default(),
        errors: FieldErrors::new(),
    })).into_response())
}

// POST /refunds/create
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<RefundForm>,
) -> Result<Response> {
    let outcome = match form.to_input() {
        Ok(input) => state.service_context.refund_service
            .submit(&current.user, input)
            .await,
        Err(errors) => Err(AppError::Form(errors)),
    };

    match outcome {
        Ok(_) => Ok(Redirect::to("/refunds").into_response()),
        Err(AppError::Form(errors)) => {
            let (jar, csrf_token) = form_token(&state, jar, &current).await?;
            Ok((jar, HtmlTemplate(RefundCreateTemplate {
                page: PageContext::for_user(&current.user, csrf_token),
                form,
                errors,
            })).into_response())
        }
        Err(e) => Err(e),
    }
}

// GET /refunds/:id
pub async fn detail_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response> {
    let refund = state.service_context.refund_service
        .get_for(&current.user, id)
        .await?;
    let (jar, csrf_token) = form_token(&state, jar, &current).await?;

    Ok((jar, HtmlTemplate(RefundDetailTemplate {
        page: PageContext::for_user(&current.user, csrf_token),
        refund,
    })).into_response())
}
