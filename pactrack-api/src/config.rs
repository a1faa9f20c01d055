/// Configuration management for the API server
///
/// Loaded from environment variables; a `.env` file is honoured in
/// development via `dotenvy`.
///
/// # Environment Variables
///
/// | variable | default | |
/// |---|---|---|
/// | `API_HOST` / `API_PORT` | `0.0.0.0` / `8080` | bind address |
/// | `CORS_ORIGINS` | `*` | comma-separated |
/// | `PRODUCTION` | `false` | enables HSTS |
/// | `STORAGE_BACKEND` | `postgres` | `postgres`, `memory` or `sheets` |
/// | `DATABASE_URL` | | required for `postgres` |
/// | `DATABASE_MAX_CONNECTIONS` | `10` | |
/// | `GOOGLE_CREDENTIALS_PATH` / `GOOGLE_SPREADSHEET_ID` | | required for `sheets` |
/// | `JWT_SECRET` | | required, at least 32 characters |
/// | `ADMIN_USERNAME` / `ADMIN_PASSWORD` | `admin` / unset | bootstrap admin |
/// | `DADATA_TOKEN` / `DADATA_SECRET` | unset | company lookup |

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub admin: AdminConfig,

    /// Company lookup; disabled when no token is configured
    pub dadata: Option<DadataConfig>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Production mode adds HSTS
    pub production: bool,
}

/// Selected storage backend and its settings
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Memory,
    Postgres {
        url: String,
        max_connections: u32,
    },
    Sheets {
        credentials_path: String,
        spreadsheet_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
}

/// Administrator created at startup when missing
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,

    /// No bootstrap when unset
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DadataConfig {
    pub token: String,
    pub secret: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let production = var("PRODUCTION")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let backend = var("STORAGE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let storage = match backend.to_ascii_lowercase().as_str() {
            "memory" => StorageConfig::Memory,
            "postgres" => StorageConfig::Postgres {
                url: require("DATABASE_URL")?,
                max_connections: var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse::<u32>()?,
            },
            "sheets" => StorageConfig::Sheets {
                credentials_path: require("GOOGLE_CREDENTIALS_PATH")?,
                spreadsheet_id: require("GOOGLE_SPREADSHEET_ID")?,
            },
            other => anyhow::bail!(
                "Unknown STORAGE_BACKEND '{}' (expected postgres, memory or sheets)",
                other
            ),
        };

        let jwt_secret = require("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let admin = AdminConfig {
            username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password: var("ADMIN_PASSWORD"),
        };

        let dadata = var("DADATA_TOKEN").map(|token| DadataConfig {
            token,
            secret: var("DADATA_SECRET"),
        });

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            storage,
            jwt: JwtConfig { secret: jwt_secret },
            admin,
            dadata,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
