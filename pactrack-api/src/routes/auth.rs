/// Authentication endpoints
///
/// - `POST /v1/auth/register`: self-service signup, always as a lawyer
/// - `POST /v1/auth/login`: exchange credentials for tokens
/// - `POST /v1/auth/refresh`: exchange a refresh token for a new access token
/// - `GET  /v1/auth/me`: the authenticated user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use pactrack_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{NewUser, Role, User, UserView},
    storage::StorageError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Tokens plus the user they were issued for
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserView,

    /// 24h
    pub access_token: String,

    /// 30d
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

pub(crate) fn issue_tokens(user: &User, secret: &str) -> ApiResult<AuthResponse> {
    let access_token = jwt::create_token(&jwt::Claims::new(user.id, jwt::TokenType::Access), secret)?;
    let refresh_token =
        jwt::create_token(&jwt::Claims::new(user.id, jwt::TokenType::Refresh), secret)?;

    Ok(AuthResponse {
        user: UserView::from(user),
        access_token,
        refresh_token,
    })
}

/// Shared by registration and admin user creation
pub(crate) async fn create_account(
    state: &AppState,
    username: &str,
    plain_password: &str,
    role: Role,
) -> ApiResult<User> {
    password::validate_password(plain_password)
        .map_err(|e| ApiError::ValidationError(vec![ValidationErrorDetail::new("password", e)]))?;

    let username = username.trim();
    let password_hash = password::hash_password(plain_password)?;
    let user = state
        .storage
        .create_user(NewUser {
            username: username.to_string(),
            password_hash,
            role,
        })
        .await?;

    info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
    Ok(user)
}

/// Creates a lawyer account and logs it in
///
/// # Errors
///
/// - `409 Conflict`: username taken
/// - `422 Unprocessable Entity`: validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let user = create_account(&state, &req.username, &req.password, Role::Lawyer).await?;
    let response = issue_tokens(&user, state.jwt_secret())?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Verifies credentials and returns tokens
///
/// Unknown usernames and wrong passwords produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let user = state
        .storage
        .get_user_by_username(req.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        debug!(user_id = user.id, "Rejected login with wrong password");
        return Err(invalid());
    }

    info!(user_id = user.id, "User logged in");
    Ok(Json(issue_tokens(&user, state.jwt_secret())?))
}

/// Issues a new access token for a still-existing user
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;
    let user_id = claims.user_id()?;

    if state.storage.get_user(user_id).await?.is_none() {
        return Err(ApiError::Unauthorized("User not found".to_string()));
    }

    let access_token =
        jwt::create_token(&jwt::Claims::new(user_id, jwt::TokenType::Access), state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserView>> {
    let user = state
        .storage
        .get_user(auth.user_id)
        .await?
        .ok_or(StorageError::UserNotFound(auth.user_id))?;

    Ok(Json(UserView::from(user)))
}
