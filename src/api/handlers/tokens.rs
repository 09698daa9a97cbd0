use axum::{extract::{rejection::JsonRejection, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::state::AppState,
    auth::{TokenPair, TokenType},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

pub async fn obtain(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenPair>> {
    let Json(req) = payload?;
    let ctx = &state.service_context;

    let user = ctx.user_service
        .authenticate(&req.username, &req.password)
        .await?
        .ok_or(AppError::Unauthorized)?;

    tracing::info!("Issued API tokens for {}", user.username);
    Ok(Json(ctx.jwt_service.issue_pair(user.id)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AccessToken>> {
    let Json(req) = payload?;
    let ctx = &state.service_context;

    let claims = ctx.jwt_service.verify(&req.refresh, TokenType::Refresh)?;
    // Tokens outlive deleted accounts otherwise.
    let user = ctx.user_repo
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(AccessToken {
        access: ctx.jwt_service.sign(user.id, TokenType::Access)?,
    }))
}
