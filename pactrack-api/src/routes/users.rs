/// User management endpoints
///
/// Listing and creating users is reserved to admins. A lawyer may read
/// their own record and statistics and change their own password.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::create_account,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use pactrack_shared::{
    auth::{
        authorization::{require_admin, require_self_or_admin},
        middleware::AuthContext,
        password,
    },
    models::{
        stats::StatusCounts,
        user::{Role, UserView},
    },
    storage::StorageError,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    /// Required unless the caller is an admin
    pub current_password: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsResponse {
    pub user_id: i64,
    pub username: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserView>>> {
    require_admin(&auth)?;

    let users = state.storage.get_all_users().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    require_admin(&auth)?;
    req.validate()?;

    let user = create_account(&state, &req.username, &req.password, req.role).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserView>> {
    require_self_or_admin(&auth, id)?;

    let user = state
        .storage
        .get_user(id)
        .await?
        .ok_or(StorageError::UserNotFound(id))?;

    Ok(Json(UserView::from(user)))
}

/// Status counts for the contracts assigned to one user
pub async fn user_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserStatsResponse>> {
    require_self_or_admin(&auth, id)?;

    let user = state
        .storage
        .get_user(id)
        .await?
        .ok_or(StorageError::UserNotFound(id))?;

    let contracts = state.storage.get_contracts().await?;
    let counts = StatusCounts::tally(contracts.iter().filter(|c| c.lawyer_id == id));

    Ok(Json(UserStatsResponse {
        user_id: user.id,
        username: user.username,
        counts,
    }))
}

/// Changes a password
///
/// Lawyers must prove the current password; admins may reset any account
/// without it.
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<Json<UserView>> {
    require_self_or_admin(&auth, id)?;
    req.validate()?;

    let user = state
        .storage
        .get_user(id)
        .await?
        .ok_or(StorageError::UserNotFound(id))?;

    if !auth.is_admin() {
        let current = req
            .current_password
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("currentPassword is required".to_string()))?;

        if !password::verify_password(current, &user.password_hash)? {
            return Err(ApiError::Forbidden("Current password is incorrect".to_string()));
        }
    }

    let password_hash = password::hash_password(&req.new_password)?;
    let updated = state
        .storage
        .update_user_password(id, &password_hash)
        .await?;

    info!(user_id = id, by = auth.user_id, "Password changed");
    Ok(Json(UserView::from(updated)))
}
