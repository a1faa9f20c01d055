/// Application state, storage wiring and router builder
///
/// # Example
///
/// ```no_run
/// use pactrack_api::{app, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let storage = app::connect_storage(&config.storage).await?;
/// let state = app::AppState::new(storage, config)?;
/// let router = app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{AdminConfig, Config, StorageConfig},
    middleware::security::SecurityHeadersLayer,
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use pactrack_shared::{
    auth::{middleware::create_jwt_middleware, password},
    dadata::DadataClient,
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    models::user::{NewUser, Role},
    sheets::{ServiceAccountKey, SheetsClient},
    storage::{MemStorage, PgStorage, SheetsStorage, Storage},
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub config: Arc<Config>,

    /// Present only when `DADATA_TOKEN` is configured
    pub dadata: Option<DadataClient>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> anyhow::Result<Self> {
        let dadata = match &config.dadata {
            Some(dadata) => Some(DadataClient::new(&dadata.token, dadata.secret.as_deref())?),
            None => None,
        };

        Ok(Self {
            storage,
            config: Arc::new(config),
            dadata,
        })
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Opens the configured storage backend
///
/// PostgreSQL migrations run here; the spreadsheet backend creates its
/// sheets if they are missing.
pub async fn connect_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemStorage::new())
        }
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            let mut db_config = DatabaseConfig::new(url.clone());
            db_config.max_connections = *max_connections;

            let pool = create_pool(db_config).await?;
            run_migrations(&pool).await?;
            Arc::new(PgStorage::new(pool))
        }
        StorageConfig::Sheets {
            credentials_path,
            spreadsheet_id,
        } => {
            let key = ServiceAccountKey::from_file(credentials_path).await?;
            let client = SheetsClient::new(key, spreadsheet_id.clone())?;
            Arc::new(SheetsStorage::connect(client).await?)
        }
    };

    info!(backend = storage.backend_name(), "Storage ready");
    Ok(storage)
}

/// Creates the configured administrator if no user has that name
///
/// Returns true when a user was created.
pub async fn bootstrap_admin(storage: &dyn Storage, admin: &AdminConfig) -> anyhow::Result<bool> {
    let Some(admin_password) = admin.password.as_deref() else {
        return Ok(false);
    };

    if storage.get_user_by_username(&admin.username).await?.is_some() {
        return Ok(false);
    }

    password::validate_password(admin_password).map_err(anyhow::Error::msg)?;
    let password_hash = password::hash_password(admin_password)?;

    let user = storage
        .create_user(NewUser {
            username: admin.username.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await?;

    info!(user_id = user.id, username = %user.username, "Bootstrap administrator created");
    Ok(true)
}

/// Builds the complete router
///
/// ```text
/// /health                          public
/// /v1/auth/{register,login,refresh} public
/// /v1/auth/me                      bearer token
/// /v1/users[/:id[/stats|/password]] bearer token
/// /v1/contracts[/stats|/:id]       bearer token
/// /v1/companies[/:inn]             bearer token
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/users/:id", get(routes::users::get_user))
        .route("/users/:id/stats", get(routes::users::user_stats))
        .route("/users/:id/password", put(routes::users::reset_password))
        .route(
            "/contracts",
            get(routes::contracts::list_contracts).post(routes::contracts::create_contract),
        )
        .route("/contracts/stats", get(routes::contracts::contract_stats))
        .route(
            "/contracts/:id",
            get(routes::contracts::get_contract)
                .put(routes::contracts::update_contract)
                .delete(routes::contracts::delete_contract),
        )
        .route("/companies", get(routes::companies::search_companies))
        .route("/companies/:inn", get(routes::companies::find_company))
        .layer(axum::middleware::from_fn(create_jwt_middleware(
            state.jwt_secret().to_string(),
            state.storage.clone(),
        )));

    let v1_routes = Router::new().merge(public_routes).merge(protected_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
