//! # Pactrack Legacy Migrator
//!
//! Copies users and contracts from the legacy spreadsheet into PostgreSQL.
//! Safe to re-run: existing usernames and INNs are skipped.
//!
//! ```bash
//! cargo run -p pactrack-migrator
//! ```

use pactrack_migrator::{config::MigratorConfig, migrate};
use pactrack_shared::{
    db::{
        migrations::{ensure_database_exists, get_migration_status, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    sheets::{ServiceAccountKey, SheetsClient},
    storage::PgStorage,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pactrack_migrator=info,pactrack_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Pactrack migrator v{} starting", env!("CARGO_PKG_VERSION"));

    let config = MigratorConfig::from_env()?;

    ensure_database_exists(&config.database_url).await?;
    let pool = create_pool(DatabaseConfig::new(config.database_url.clone())).await?;
    run_migrations(&pool).await?;

    let status = get_migration_status(&pool).await?;
    tracing::info!(
        applied = status.applied_migrations,
        latest = ?status.latest_version,
        up_to_date = status.is_up_to_date,
        "Schema ready"
    );
    let storage = PgStorage::new(pool.clone());

    let key = ServiceAccountKey::from_file(&config.credentials_path).await?;
    let source = SheetsClient::new(key, config.spreadsheet_id.clone())?;

    let report = migrate::run(&source, &storage, &config.default_password).await?;

    println!("Users:     {}", report.users);
    println!("Contracts: {}", report.contracts);

    close_pool(pool).await;
    Ok(())
}
