/// Contract endpoints
///
/// Every response carries `status` and `daysLeft` computed at read time.
/// Lawyers only ever see and touch contracts assigned to them; deletion is
/// admin-only.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use pactrack_shared::{
    auth::{
        authorization::{
            require_admin, require_contract_access, require_update_allowed,
            resolve_new_contract_lawyer, scope_filter,
        },
        middleware::AuthContext,
    },
    models::{
        contract::{parse_end_date, Contract, ContractFilter, ContractUpdate, NewContract, DEFAULT_LIMIT},
        stats::ContractStats,
    },
    status::ContractStatus,
    storage::StorageError,
};
use serde::Deserialize;
use std::borrow::Cow;
use tracing::info;
use validator::{Validate, ValidationError};

fn validate_inn(inn: &str) -> Result<(), ValidationError> {
    let digits_only = inn.chars().all(|c| c.is_ascii_digit());
    if digits_only && (10..=12).contains(&inn.len()) {
        return Ok(());
    }

    let mut err = ValidationError::new("inn");
    err.message = Some(Cow::from("INN must be 10-12 digits"));
    Err(err)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<ContractStatus>,
    pub lawyer_id: Option<i64>,
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl From<ListQuery> for ContractFilter {
    fn from(query: ListQuery) -> Self {
        ContractFilter {
            status: query.status,
            lawyer_id: query.lawyer_id,
            search: query.search,
            skip: query.skip.unwrap_or(0),
            limit: query.limit.unwrap_or(DEFAULT_LIMIT),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub lawyer_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractRequest {
    #[validate(length(min = 2, max = 100, message = "Company name must be 2-100 characters"))]
    pub company_name: String,

    #[validate(custom(function = "validate_inn"))]
    pub inn: String,

    #[validate(length(min = 2, max = 100, message = "Director must be 2-100 characters"))]
    pub director: String,

    #[validate(length(min = 5, message = "Address must be at least 5 characters"))]
    pub address: String,

    /// `YYYY-MM-DD`, `dd.MM.yyyy` or RFC 3339
    #[serde(default)]
    pub end_date: String,

    #[serde(default)]
    pub comments: String,

    #[serde(default, rename = "hasND")]
    pub has_nd: bool,

    /// Defaults to the caller
    pub lawyer_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContractRequest {
    #[validate(length(min = 2, max = 100, message = "Company name must be 2-100 characters"))]
    pub company_name: Option<String>,

    #[validate(custom(function = "validate_inn"))]
    pub inn: Option<String>,

    #[validate(length(min = 2, max = 100, message = "Director must be 2-100 characters"))]
    pub director: Option<String>,

    #[validate(length(min = 5, message = "Address must be at least 5 characters"))]
    pub address: Option<String>,

    pub end_date: Option<String>,
    pub comments: Option<String>,

    #[serde(rename = "hasND")]
    pub has_nd: Option<bool>,

    pub lawyer_id: Option<i64>,
}

impl UpdateContractRequest {
    fn into_update(self) -> Result<ContractUpdate, StorageError> {
        let end_date = self.end_date.as_deref().map(parse_end_date).transpose()?;

        Ok(ContractUpdate {
            company_name: self.company_name,
            inn: self.inn,
            director: self.director,
            address: self.address,
            end_date,
            comments: self.comments,
            has_nd: self.has_nd,
            lawyer_id: self.lawyer_id,
        })
    }
}

async fn load_contract(state: &AppState, id: i64) -> ApiResult<Contract> {
    let contract = state
        .storage
        .get_contract(id)
        .await?
        .ok_or(StorageError::ContractNotFound(id))?;
    Ok(contract)
}

/// `GET /v1/contracts?status&lawyerId&search&skip&limit`
pub async fn list_contracts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Contract>>> {
    let mut filter = ContractFilter::from(query);
    scope_filter(&auth, &mut filter)?;

    let contracts = state.storage.get_contracts().await?;
    Ok(Json(filter.apply(contracts)))
}

/// `GET /v1/contracts/stats?lawyerId`
///
/// Admins asking without a lawyer filter also get a per-lawyer breakdown.
pub async fn contract_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ContractStats>> {
    let mut filter = ContractFilter {
        lawyer_id: query.lawyer_id,
        ..Default::default()
    };
    scope_filter(&auth, &mut filter)?;

    let contracts: Vec<Contract> = state
        .storage
        .get_contracts()
        .await?
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect();

    let stats = if auth.is_admin() && filter.lawyer_id.is_none() {
        let users = state.storage.get_all_users().await?;
        ContractStats::compute_with_breakdown(&contracts, &users)
    } else {
        ContractStats::compute(&contracts)
    };

    Ok(Json(stats))
}

pub async fn get_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Contract>> {
    let contract = load_contract(&state, id).await?;
    require_contract_access(&auth, &contract)?;

    Ok(Json(contract))
}

/// # Errors
///
/// - `400 Bad Request`: bad end date or unknown lawyer
/// - `403 Forbidden`: a lawyer assigning someone else
/// - `409 Conflict`: inn already present
/// - `422 Unprocessable Entity`: validation failed
pub async fn create_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateContractRequest>,
) -> ApiResult<(StatusCode, Json<Contract>)> {
    req.validate()?;

    let lawyer_id = resolve_new_contract_lawyer(&auth, req.lawyer_id)?;
    let end_date = parse_end_date(&req.end_date)?;

    let contract = state
        .storage
        .create_contract(
            NewContract {
                company_name: req.company_name,
                inn: req.inn,
                director: req.director,
                address: req.address,
                end_date,
                comments: req.comments,
                has_nd: req.has_nd,
                lawyer_id,
            },
            auth.user_id,
        )
        .await?;

    info!(contract_id = contract.id, lawyer_id, by = auth.user_id, "Contract created");
    Ok((StatusCode::CREATED, Json(contract)))
}

pub async fn update_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateContractRequest>,
) -> ApiResult<Json<Contract>> {
    req.validate()?;

    let existing = load_contract(&state, id).await?;
    let update = req.into_update()?;
    require_update_allowed(&auth, &existing, &update)?;

    let contract = state
        .storage
        .update_contract(id, update, auth.user_id)
        .await?;

    info!(contract_id = id, by = auth.user_id, "Contract updated");
    Ok(Json(contract))
}

pub async fn delete_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !state.storage.delete_contract(id).await? {
        return Err(ApiError::from(StorageError::ContractNotFound(id)));
    }

    info!(contract_id = id, by = auth.user_id, "Contract deleted");
    Ok(StatusCode::NO_CONTENT)
}
