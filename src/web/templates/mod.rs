use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::domain::User;

/// Data the base layout needs on every page.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub username: Option<String>,
    pub is_staff: bool,
    pub csrf_token: String,
}

impl PageContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: &User, csrf_token: String) -> Self {
        Self {
            username: Some(user.username.clone()),
            is_staff: user.is_staff,
            csrf_token,
        }
    }
}

/// One option of a `<select>`.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

// Make askama templates work with axum
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!("Failed to render template: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to render template: {}", err),
                ).into_response()
            }
        }
    }
}
