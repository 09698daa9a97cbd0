use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use axum_extra::extract::CookieJar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{RefundChanges, RefundFilter, RefundRequest, RefundStatus, RefundWithOwner},
    error::{AppError, FieldErrors, Result},
    service::Page,
    web::{
        form_token,
        forms::RefundForm,
        templates::{HtmlTemplate, PageContext, SelectOption},
    },
};

const ADMIN_PAGE_SIZE: i64 = 25;

#[derive(Template)]
#[template(path = "admin/refunds.html")]
pub struct AdminRefundsTemplate {
    pub page: PageContext,
    pub refunds: Page<RefundWithOwner>,
    pub query: AdminRefundsQuery,
    pub status_options: Vec<SelectOption>,
    /// Current filters as a query string, for pager and export links.
    pub filter_query: String,
}

#[derive(Template)]
#[template(path = "admin/refund_detail.html")]
pub struct AdminRefundDetailTemplate {
    pub page: PageContext,
    pub refund: RefundRequest,
    pub form: RefundForm,
    pub status_options: Vec<SelectOption>,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AdminRefundsQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub created_from: String,
    #[serde(default)]
    pub created_to: String,
    #[serde(default, skip_serializing)]
    pub page: Option<i64>,
}

impl AdminRefundsQuery {
    /// Blank or unparseable values mean "no filter".
    pub fn to_filter(&self) -> RefundFilter {
        fn non_empty(value: &str) -> Option<String> {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        fn date(value: &str) -> Option<NaiveDate> {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
        }

        RefundFilter {
            search: non_empty(&self.q),
            status: self.status.parse().ok(),
            country: non_empty(&self.country),
            created_from: date(&self.created_from),
            created_to: date(&self.created_to),
        }
    }

    fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminRefundForm {
    #[serde(flatten)]
    pub refund: RefundForm,
    #[serde(default)]
    pub status: String,
}

fn status_options(selected: &str) -> Vec<SelectOption> {
    RefundStatus::ALL
        .iter()
        .map(|status| SelectOption {
            value: status.as_str().to_string(),
            label: status.label().to_string(),
            selected: status.as_str() == selected,
        })
        .collect()
}

// GET /admin/refunds
pub async fn list_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Query(query): Query<AdminRefundsQuery>,
) -> Result<Response> {
    let refunds = state.service_context.refund_service
        .search(&current.user, &query.to_filter(), query.page.unwrap_or(1), ADMIN_PAGE_SIZE)
        .await?;
    let (jar, csrf_token) = form_token(&state, jar, &current).await?;

    let mut status_options = status_options(&query.status);
    status_options.insert(0, SelectOption {
        value: String::new(),
        label: "All statuses".to_string(),
        selected: query.status.is_empty(),
    });

    Ok((jar, HtmlTemplate(AdminRefundsTemplate {
        page: PageContext::for_user(&current.user, csrf_token),
        refunds,
        filter_query: query.to_query_string(),
        query,
        status_options,
    })).into_response())
}

// GET /admin/refunds/export
pub async fn export(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<AdminRefundsQuery>,
) -> Result<impl IntoResponse> {
    let refunds = state.service_context.refund_service
        .export(&current.user, &query.to_filter())
        .await?;

    Ok((
        [(header::CONTENT_DISPOSITION, "attachment; filename=\"refund_requests.json\"")],
        Json(refunds),
    ))
}

// GET /admin/refunds/:id
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

    Ok((jar, HtmlTemplate(AdminRefundDetailTemplate {
        page: PageContext::for_user(&current.user, csrf_token),
        form: RefundForm::from_refund(&refund),
        status_options: status_options(refund.status.as_str()),
        refund,
        errors: FieldErrors::new(),
        error: None,
    })).into_response())
}

// POST /admin/refunds/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<AdminRefundForm>,
) -> Result<Response> {
    let service = &state.service_context.refund_service;

    let status = match form.status.trim() {
        "" => Err("This field is required.".to_string()),
        value => value.parse::<RefundStatus>(),
    };
    let outcome = match (form.refund.to_input(), status) {
        (Ok(input), Ok(status)) => service
            .update(&current.user, id, RefundChanges::replace_with(input, Some(status)))
            .await,
        (input, status) => {
            let mut errors = input.err().unwrap_or_default();
            if let Err(msg) = status {
                errors.add("status", msg);
            }
            Err(AppError::Form(errors))
        }
    };

    let (errors, error) = match outcome {
        Ok(refund) => {
            tracing::info!("Staff {} updated refund #{}", current.user.username, refund.id);
            return Ok(Redirect::to("/admin/refunds").into_response());
        }
        Err(AppError::Form(errors)) => (errors, None),
        Err(AppError::Conflict(msg)) => (FieldErrors::new(), Some(msg)),
        Err(e) => return Err(e),
    };

    let refund = service.get_for(&current.user, id).await?;
    let (jar, csrf_token) = form_token(&state, jar, &current).await?;

    Ok((jar, HtmlTemplate(AdminRefundDetailTemplate {
        page: PageContext::for_user(&current.user, csrf_token),
        status_options: status_options(&form.status),
        form: form.refund,
        refund,
        errors,
        error,
    })).into_response())
}

// POST /admin/refunds/:id/delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Redirect> {
    state.service_context.refund_service
        .delete(&current.user, id)
        .await?;

    Ok(Redirect::to("/admin/refunds"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_means_no_filter() {
        let filter = AdminRefundsQuery::default().to_filter();
        assert!(filter.search.is_none());
        assert!(filter.status.is_none());
        assert!(filter.created_from.is_none());
    }

    #[test]
    fn query_values_become_filters() {
        let query = AdminRefundsQuery {
            q: " 100 ".to_string(),
            status: "approved".to_string(),
            country: "Germany".to_string(),
            created_from: "2025-01-01".to_string(),
            created_to: "not a date".to_string(),
            page: Some(2),
        };

        let filter = query.to_filter();
        assert_eq!(filter.search.as_deref(), Some("100"));
        assert_eq!(filter.status, Some(RefundStatus::Approved));
        assert_eq!(filter.created_from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(filter.created_to.is_none());
        assert!(!query.to_query_string().contains("page"));
    }
}
