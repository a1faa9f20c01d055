/// Storage abstraction for users and contracts
///
/// [`Storage`] is the single seam between the HTTP layer (and the migrator)
/// and persistence. Three implementations satisfy the same contract:
///
/// - [`memory::MemStorage`]: process-local, used for tests and demos
/// - [`postgres::PgStorage`]: PostgreSQL via sqlx
/// - [`sheets::SheetsStorage`]: a Google spreadsheet
///
/// The backend is chosen once at process start and injected as
/// `Arc<dyn Storage>`.
///
/// # Guarantees shared by every backend
///
/// - every contract returned carries a status recomputed at read time
/// - `create_contract` rejects a duplicate inn, requires an existing acting
///   user and lawyer, and stamps one `created` history entry
/// - `update_contract` appends exactly one `updated` entry holding only the
///   fields whose value changed
/// - `create_user` rejects a duplicate username

use async_trait::async_trait;
use thiserror::Error;

use crate::models::contract::{Contract, ContractUpdate, NewContract};
use crate::models::user::{NewUser, User};
use crate::sheets::SheetsError;

pub mod memory;
pub mod postgres;
pub mod sheets;

pub use memory::MemStorage;
pub use postgres::PgStorage;
pub use sheets::SheetsStorage;

/// Errors surfaced by any storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Contract not found: {0}")]
    ContractNotFound(i64),

    /// The lawyer a contract is assigned to does not exist
    #[error("Lawyer not found: {0}")]
    LawyerNotFound(i64),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Contract with INN {0} already exists")]
    DuplicateInn(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Contract history too large: {size} characters")]
    HistoryTooLarge { size: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Spreadsheet error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Repository over users and contracts
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend identifier used in logs and the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Verifies the backend is reachable
    async fn health_check(&self) -> Result<(), StorageError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Fails with `DuplicateUsername` when the name is taken
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    /// All users, ordered by id
    async fn get_all_users(&self) -> Result<Vec<User>, StorageError>;

    /// Replaces the stored password hash
    async fn update_user_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<User, StorageError>;

    /// All contracts, ordered by id, with status derived
    async fn get_contracts(&self) -> Result<Vec<Contract>, StorageError>;

    async fn get_contract(&self, id: i64) -> Result<Option<Contract>, StorageError>;

    async fn get_contract_by_inn(&self, inn: &str) -> Result<Option<Contract>, StorageError>;

    /// Stores a new contract with a `created` history entry for the actor
    async fn create_contract(
        &self,
        contract: NewContract,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError>;

    /// Applies a partial update and appends one `updated` history entry
    async fn update_contract(
        &self,
        id: i64,
        update: ContractUpdate,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError>;

    /// Returns false when no such contract existed
    async fn delete_contract(&self, id: i64) -> Result<bool, StorageError>;
}
