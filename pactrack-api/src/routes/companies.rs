/// Company registry lookup through DaData
///
/// Returns 503 when no DaData token is configured.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use pactrack_shared::dadata::{CompanyInfo, DadataClient, DadataError, MIN_QUERY_LEN};
use serde::Deserialize;

const DEFAULT_SUGGESTIONS: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub count: Option<u32>,
}

fn client(state: &AppState) -> ApiResult<&DadataClient> {
    state
        .dadata
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Company lookup is not configured".to_string()))
}

/// `GET /v1/companies/:inn`
pub async fn find_company(
    State(state): State<AppState>,
    Path(inn): Path<String>,
) -> ApiResult<Json<CompanyInfo>> {
    let dadata = client(&state)?;
    if inn.trim().chars().count() < MIN_QUERY_LEN {
        return Err(DadataError::QueryTooShort.into());
    }

    let company = dadata
        .find_company(&inn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No company with INN {}", inn.trim())))?;

    Ok(Json(company))
}

/// `GET /v1/companies?query&count`
pub async fn search_companies(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<CompanyInfo>>> {
    let dadata = client(&state)?;
    let companies = dadata
        .suggest_companies(&query.query, query.count.unwrap_or(DEFAULT_SUGGESTIONS))
        .await?;

    Ok(Json(companies))
}
