/// Legacy spreadsheet to storage migration
///
/// Idempotent: users are keyed by username and contracts by inn, and
/// anything already present is skipped, so the tool can be re-run after a
/// partial failure. Per-row failures are logged and counted; they never
/// abort the run.

use crate::legacy::{self, LegacyContract, LegacyUser};
use crate::source::LegacySource;
use pactrack_shared::auth::password::{self, PasswordError};
use pactrack_shared::models::contract::NewContract;
use pactrack_shared::models::user::NewUser;
use pactrack_shared::sheets::SheetsError;
use pactrack_shared::storage::{Storage, StorageError};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{error, info, warn};

pub const DEFAULT_PASSWORD: &str = "password123";

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Failed to read legacy sheet: {0}")]
    Source(#[from] SheetsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to hash default password: {0}")]
    Password(#[from] PasswordError),
}

/// Outcome counts for one entity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, skipped {}, failed {}",
            self.created, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FullReport {
    pub users: MigrationReport,
    pub contracts: MigrationReport,
}

/// Legacy user id to id in the target store
pub type UserIdMap = HashMap<i64, i64>;

/// Creates missing users with `default_password`
///
/// Users that already exist are skipped but still mapped, so contracts can
/// be resolved on a re-run.
pub async fn migrate_users(
    storage: &dyn Storage,
    users: &[LegacyUser],
    default_password: &str,
) -> Result<(MigrationReport, UserIdMap), MigrationError> {
    let mut report = MigrationReport::default();
    let mut ids = UserIdMap::new();
    let password_hash = password::hash_password(default_password)?;

    for user in users {
        match storage.get_user_by_username(&user.username).await {
            Ok(Some(existing)) => {
                info!(username = %user.username, "User already exists, skipping");
                if let Some(legacy_id) = user.legacy_id {
                    ids.insert(legacy_id, existing.id);
                }
                report.skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!(username = %user.username, error = %e, "User lookup failed");
                report.failed += 1;
                continue;
            }
        }

        let created = storage
            .create_user(NewUser {
                username: user.username.clone(),
                password_hash: password_hash.clone(),
                role: user.role,
            })
            .await;

        match created {
            Ok(created) => {
                info!(username = %created.username, user_id = created.id, role = %created.role, "User migrated");
                if let Some(legacy_id) = user.legacy_id {
                    ids.insert(legacy_id, created.id);
                }
                report.created += 1;
            }
            Err(e) => {
                error!(username = %user.username, error = %e, "Failed to create user");
                report.failed += 1;
            }
        }
    }

    Ok((report, ids))
}

enum ContractOutcome {
    Created,
    Skipped,
}

async fn migrate_contract(
    storage: &dyn Storage,
    contract: &LegacyContract,
    user_ids: &UserIdMap,
) -> Result<ContractOutcome, StorageError> {
    if contract.inn.is_empty() {
        warn!(legacy_id = ?contract.legacy_id, "Contract without INN, skipping");
        return Ok(ContractOutcome::Skipped);
    }

    if storage.get_contract_by_inn(&contract.inn).await?.is_some() {
        info!(inn = %contract.inn, "Contract already exists, skipping");
        return Ok(ContractOutcome::Skipped);
    }

    let Some(legacy_lawyer) = contract.lawyer_id else {
        warn!(inn = %contract.inn, "Contract without lawyer id, skipping");
        return Ok(ContractOutcome::Skipped);
    };

    let lawyer_id = match user_ids.get(&legacy_lawyer) {
        Some(id) => Some(*id),
        None => storage.get_user(legacy_lawyer).await?.map(|u| u.id),
    };
    let Some(lawyer_id) = lawyer_id else {
        warn!(inn = %contract.inn, legacy_lawyer, "Lawyer not found, skipping contract");
        return Ok(ContractOutcome::Skipped);
    };

    let Some(end_date) = contract.parsed_end_date() else {
        warn!(inn = %contract.inn, end_date = %contract.end_date, "Invalid end date, skipping contract");
        return Ok(ContractOutcome::Skipped);
    };

    let created = storage
        .create_contract(
            NewContract {
                company_name: contract.company_name.clone(),
                inn: contract.inn.clone(),
                director: contract.director.clone(),
                address: contract.address.clone(),
                end_date,
                comments: contract.comments.clone(),
                has_nd: contract.has_nd,
                lawyer_id,
            },
            lawyer_id,
        )
        .await?;

    info!(inn = %created.inn, contract_id = created.id, lawyer_id, "Contract migrated");
    Ok(ContractOutcome::Created)
}

/// Creates missing contracts, attributing each to its lawyer
pub async fn migrate_contracts(
    storage: &dyn Storage,
    contracts: &[LegacyContract],
    user_ids: &UserIdMap,
) -> MigrationReport {
    let mut report = MigrationReport::default();

    for contract in contracts {
        match migrate_contract(storage, contract, user_ids).await {
            Ok(ContractOutcome::Created) => report.created += 1,
            Ok(ContractOutcome::Skipped) => report.skipped += 1,
            Err(e) => {
                error!(inn = %contract.inn, error = %e, "Failed to migrate contract");
                report.failed += 1;
            }
        }
    }

    report
}

/// Reads both legacy sheets and migrates users, then contracts
pub async fn run(
    source: &dyn LegacySource,
    storage: &dyn Storage,
    default_password: &str,
) -> Result<FullReport, MigrationError> {
    let user_rows = source.fetch_rows(legacy::USERS_RANGE).await?;
    let users = legacy::parse_users(&user_rows);
    info!(rows = user_rows.len(), users = users.len(), "Fetched legacy users");
    if users.is_empty() {
        warn!("No legacy users to migrate");
    }

    let (user_report, user_ids) = migrate_users(storage, &users, default_password).await?;
    info!(%user_report, "User migration finished");

    let contract_rows = source.fetch_rows(legacy::CONTRACTS_RANGE).await?;
    let contracts = legacy::parse_contracts(&contract_rows);
    info!(rows = contract_rows.len(), contracts = contracts.len(), "Fetched legacy contracts");
    if contracts.is_empty() {
        warn!("No legacy contracts to migrate");
    }

    let contract_report = migrate_contracts(storage, &contracts, &user_ids).await;
    info!(%contract_report, "Contract migration finished");

    Ok(FullReport {
        users: user_report,
        contracts: contract_report,
    })
}
