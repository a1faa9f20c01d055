/// PostgreSQL storage backend
///
/// Contract history lives in a JSONB column. Updates append to it in SQL
/// (`history || $n`) so previously stored entries are never rewritten, and
/// each update runs in a transaction that locks the row it diffs against.
///
/// Uniqueness of usernames and inns is enforced by the schema; constraint
/// violations are mapped to the matching [`StorageError`] variants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error};

use super::{Storage, StorageError};
use crate::models::contract::{Contract, ContractRecord, ContractUpdate, NewContract};
use crate::models::history::{apply_update, ContractHistoryEntry};
use crate::models::user::{NewUser, User};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

const CONTRACT_COLUMNS: &str = "id, company_name, inn, director, address, end_date, \
     comments, has_nd, lawyer_id, history, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ContractRow {
    id: i64,
    company_name: String,
    inn: String,
    director: String,
    address: String,
    end_date: DateTime<Utc>,
    comments: String,
    has_nd: bool,
    lawyer_id: i64,
    history: Json<Vec<ContractHistoryEntry>>,
    created_at: DateTime<Utc>,
}

impl From<ContractRow> for ContractRecord {
    fn from(row: ContractRow) -> Self {
        Self {
            id: row.id,
            company_name: row.company_name,
            inn: row.inn,
            director: row.director,
            address: row.address,
            end_date: row.end_date,
            comments: row.comments,
            has_nd: row.has_nd,
            lawyer_id: row.lawyer_id,
            history: row.history.0,
            created_at: row.created_at,
        }
    }
}

fn to_contract(row: ContractRow, now: DateTime<Utc>) -> Contract {
    Contract::from_record(row.into(), now)
}

/// Maps unique and foreign-key violations on contract writes
fn contract_write_error(err: sqlx::Error, inn: &str, lawyer_id: i64) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StorageError::DuplicateInn(inn.to_string());
        }
        if db.is_foreign_key_violation() {
            return StorageError::LawyerNotFound(lawyer_id);
        }
    }
    StorageError::Database(err)
}

/// [`Storage`] over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn require_user(&self, id: i64) -> Result<User, StorageError> {
        self.get_user(id)
            .await?
            .ok_or(StorageError::UserNotFound(id))
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .inspect_err(|e| error!(error = %e, "Database health check failed"))?;
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(user_id = id, error = %e, "Failed to load user"))?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(username, error = %e, "Failed to load user"))?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => {
                debug!(user_id = created.id, "User created");
                Ok(created)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::DuplicateUsername(user.username))
            }
            Err(e) => {
                error!(username = %user.username, error = %e, "Failed to create user");
                Err(e.into())
            }
        }
    }

    async fn get_all_users(&self) -> Result<Vec<User>, StorageError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to list users"))?;

        Ok(users)
    }

    async fn update_user_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(user_id = id, error = %e, "Failed to update password"))?
        .ok_or(StorageError::UserNotFound(id))
    }

    async fn get_contracts(&self) -> Result<Vec<Contract>, StorageError> {
        let rows = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {} FROM contracts ORDER BY id",
            CONTRACT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to list contracts"))?;

        let now = Utc::now();
        Ok(rows.into_iter().map(|row| to_contract(row, now)).collect())
    }

    async fn get_contract(&self, id: i64) -> Result<Option<Contract>, StorageError> {
        let row = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {} FROM contracts WHERE id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(contract_id = id, error = %e, "Failed to load contract"))?;

        Ok(row.map(|row| to_contract(row, Utc::now())))
    }

    async fn get_contract_by_inn(&self, inn: &str) -> Result<Option<Contract>, StorageError> {
        let row = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {} FROM contracts WHERE inn = $1",
            CONTRACT_COLUMNS
        ))
        .bind(inn)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(inn, error = %e, "Failed to load contract"))?;

        Ok(row.map(|row| to_contract(row, Utc::now())))
    }

    async fn create_contract(
        &self,
        contract: NewContract,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError> {
        let actor = self.require_user(acting_user_id).await?;
        let now = Utc::now();
        let history = vec![ContractHistoryEntry::created(&actor, now)];

        let row = sqlx::query_as::<_, ContractRow>(&format!(
            r#"
            INSERT INTO contracts (company_name, inn, director, address, end_date,
                                   comments, has_nd, lawyer_id, history, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        ))
        .bind(&contract.company_name)
        .bind(&contract.inn)
        .bind(&contract.director)
        .bind(&contract.address)
        .bind(contract.end_date)
        .bind(&contract.comments)
        .bind(contract.has_nd)
        .bind(contract.lawyer_id)
        .bind(Json(&history))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| contract_write_error(e, &contract.inn, contract.lawyer_id))
        .inspect_err(|e| error!(inn = %contract.inn, error = %e, "Failed to create contract"))?;

        debug!(contract_id = row.id, user_id = actor.id, "Contract created");
        Ok(to_contract(row, now))
    }

    async fn update_contract(
        &self,
        id: i64,
        update: ContractUpdate,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError> {
        let mut tx = self.pool.begin().await?;

        let mut record: ContractRecord = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {} FROM contracts WHERE id = $1 FOR UPDATE",
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .inspect_err(|e| error!(contract_id = id, error = %e, "Failed to load contract"))?
        .ok_or(StorageError::ContractNotFound(id))?
        .into();

        let actor = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(acting_user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::UserNotFound(acting_user_id))?;

        let now = Utc::now();
        let changes = apply_update(&mut record, &update);
        let changed = changes.len();
        let entry = vec![ContractHistoryEntry::updated(&actor, changes, now)];

        let row = sqlx::query_as::<_, ContractRow>(&format!(
            r#"
            UPDATE contracts
            SET company_name = $2, inn = $3, director = $4, address = $5,
                end_date = $6, comments = $7, has_nd = $8, lawyer_id = $9,
                history = history || $10
            WHERE id = $1
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .bind(&record.company_name)
        .bind(&record.inn)
        .bind(&record.director)
        .bind(&record.address)
        .bind(record.end_date)
        .bind(&record.comments)
        .bind(record.has_nd)
        .bind(record.lawyer_id)
        .bind(Json(&entry))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| contract_write_error(e, &record.inn, record.lawyer_id))
        .inspect_err(|e| error!(contract_id = id, error = %e, "Failed to update contract"))?;

        tx.commit().await?;

        debug!(contract_id = id, changed, "Contract updated");
        Ok(to_contract(row, now))
    }

    async fn delete_contract(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM contracts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| error!(contract_id = id, error = %e, "Failed to delete contract"))?;

        Ok(result.rows_affected() > 0)
    }
}
