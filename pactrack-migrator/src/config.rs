/// Migrator configuration from the environment
///
/// | variable | |
/// |---|---|
/// | `DATABASE_URL` | required, target database |
/// | `GOOGLE_CREDENTIALS_PATH` | required, service account key |
/// | `GOOGLE_SPREADSHEET_ID` | required, legacy workbook |
/// | `MIGRATION_DEFAULT_PASSWORD` | password for migrated users, `password123` |

use crate::migrate::DEFAULT_PASSWORD;

#[derive(Debug, Clone, PartialEq)]
pub struct MigratorConfig {
    pub database_url: String,
    pub credentials_path: String,
    pub spreadsheet_id: String,
    pub default_password: String,
}

impl MigratorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            credentials_path: require("GOOGLE_CREDENTIALS_PATH")?,
            spreadsheet_id: require("GOOGLE_SPREADSHEET_ID")?,
            default_password: var("MIGRATION_DEFAULT_PASSWORD")
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        })
    }
}
