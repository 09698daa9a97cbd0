use axum::{extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::state::AppState,
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct IbanQuery {
    #[serde(default)]
    pub iban: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IbanValidity {
    pub valid: bool,
}

/// Probe used by the refund form to check an IBAN before submission.
/// Shares the verifier cache with form submissions.
pub async fn validate(
    State(state): State<AppState>,
    Query(query): Query<IbanQuery>,
) -> Result<Json<IbanValidity>> {
    let iban = query
        .iban
        .filter(|iban| !iban.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("IBAN not provided".to_string()))?;

    let valid = state.service_context.iban_verifier.is_valid(&iban).await?;
    Ok(Json(IbanValidity { valid }))
}
