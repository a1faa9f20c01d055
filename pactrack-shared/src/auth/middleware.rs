/// Authentication middleware for Axum
///
/// Validates `Authorization: Bearer <jwt>` and inserts an [`AuthContext`]
/// into the request extensions. The user is re-read from storage on every
/// request, so a deleted account or changed role applies immediately.
///
/// # Example
///
/// ```no_run
/// use axum::{routing::get, Extension, Router};
/// use pactrack_shared::auth::middleware::{create_jwt_middleware, AuthContext};
/// use pactrack_shared::storage::{MemStorage, Storage};
/// use std::sync::Arc;
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     auth.username
/// }
///
/// let storage: Arc<dyn Storage> = Arc::new(MemStorage::new());
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(axum::middleware::from_fn(create_jwt_middleware(
///         "a-secret-of-at-least-thirty-two-bytes".to_string(),
///         storage,
///     )));
/// ```

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error};

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{Role, User};
use crate::storage::Storage;

/// Authenticated caller, available to handlers via `Extension<AuthContext>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Authentication failures
#[derive(Debug)]
pub enum AuthError {
    /// No Authorization header
    MissingCredentials,

    /// Header present but not a bearer token
    InvalidFormat(String),

    /// Bad signature, expired, or wrong token type
    InvalidToken(String),

    /// Token valid but the user no longer exists
    UnknownUser,

    /// Storage lookup failed
    StorageError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing credentials".to_string(),
            ),
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg)
            }
            AuthError::UnknownUser => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "User not found".to_string(),
            ),
            AuthError::StorageError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}

/// Validates the bearer token and resolves the user
pub async fn jwt_auth_middleware(
    secret: Arc<str>,
    storage: Arc<dyn Storage>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_access_token(token, &secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    let user_id = claims
        .user_id()
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let user = storage
        .get_user(user_id)
        .await
        .map_err(|e| {
            error!(user_id, error = %e, "Failed to load user for token");
            AuthError::StorageError(e.to_string())
        })?
        .ok_or_else(|| {
            debug!(user_id, "Token refers to unknown user");
            AuthError::UnknownUser
        })?;

    req.extensions_mut().insert(AuthContext::from_user(&user));

    Ok(next.run(req).await)
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Builds a closure usable with `axum::middleware::from_fn`
///
/// Takes an owned secret: the closure must be `'static` to sit in a router
/// layer.
pub fn create_jwt_middleware(
    secret: String,
    storage: Arc<dyn Storage>,
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    let secret: Arc<str> = Arc::from(secret);
    move |req, next| {
        let secret = secret.clone();
        let storage = storage.clone();
        Box::pin(jwt_auth_middleware(secret, storage, req, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_from_user() {
        let user = User {
            id: 9,
            username: "egorova".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            created_at: None,
        };

        let context = AuthContext::from_user(&user);
        assert_eq!(context.user_id, 9);
        assert_eq!(context.username, "egorova");
        assert!(context.is_admin());
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("test".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::UnknownUser.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::StorageError("test".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
