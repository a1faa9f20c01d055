/// In-memory storage backend
///
/// Holds everything in process memory behind a single `tokio::sync::RwLock`.
/// Nothing survives a restart. Ids are assigned sequentially from 1.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Storage, StorageError};
use crate::models::contract::{Contract, ContractRecord, ContractUpdate, NewContract};
use crate::models::history::{apply_update, ContractHistoryEntry};
use crate::models::user::{NewUser, User};

#[derive(Debug, Default)]
struct MemState {
    users: BTreeMap<i64, User>,
    contracts: BTreeMap<i64, ContractRecord>,
    next_user_id: i64,
    next_contract_id: i64,
}

impl MemState {
    fn inn_taken(&self, inn: &str, except_id: Option<i64>) -> bool {
        self.contracts
            .values()
            .any(|c| c.inn == inn && Some(c.id) != except_id)
    }
}

/// Process-local [`Storage`] implementation
#[derive(Debug, Default)]
pub struct MemStorage {
    state: RwLock<MemState>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.username == user.username) {
            warn!(username = %user.username, "Duplicate username");
            return Err(StorageError::DuplicateUsername(user.username));
        }

        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Some(Utc::now()),
        };
        state.users.insert(user.id, user.clone());

        debug!(user_id = user.id, "User created");
        Ok(user)
    }

    async fn get_all_users(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn update_user_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<User, StorageError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or(StorageError::UserNotFound(id))?;
        user.password_hash = password_hash.to_string();
        Ok(user.clone())
    }

    async fn get_contracts(&self) -> Result<Vec<Contract>, StorageError> {
        let now = Utc::now();
        let state = self.state.read().await;
        Ok(state
            .contracts
            .values()
            .cloned()
            .map(|record| Contract::from_record(record, now))
            .collect())
    }

    async fn get_contract(&self, id: i64) -> Result<Option<Contract>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .contracts
            .get(&id)
            .cloned()
            .map(|record| Contract::from_record(record, Utc::now())))
    }

    async fn get_contract_by_inn(&self, inn: &str) -> Result<Option<Contract>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .contracts
            .values()
            .find(|c| c.inn == inn)
            .cloned()
            .map(|record| Contract::from_record(record, Utc::now())))
    }

    async fn create_contract(
        &self,
        contract: NewContract,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError> {
        let mut state = self.state.write().await;

        let actor = state
            .users
            .get(&acting_user_id)
            .cloned()
            .ok_or(StorageError::UserNotFound(acting_user_id))?;

        if !state.users.contains_key(&contract.lawyer_id) {
            return Err(StorageError::LawyerNotFound(contract.lawyer_id));
        }

        if state.inn_taken(&contract.inn, None) {
            warn!(inn = %contract.inn, "Duplicate INN");
            return Err(StorageError::DuplicateInn(contract.inn));
        }

        let now = Utc::now();
        state.next_contract_id += 1;
        let record = ContractRecord {
            id: state.next_contract_id,
            company_name: contract.company_name,
            inn: contract.inn,
            director: contract.director,
            address: contract.address,
            end_date: contract.end_date,
            comments: contract.comments,
            has_nd: contract.has_nd,
            lawyer_id: contract.lawyer_id,
            history: vec![ContractHistoryEntry::created(&actor, now)],
            created_at: now,
        };
        state.contracts.insert(record.id, record.clone());

        debug!(contract_id = record.id, user_id = actor.id, "Contract created");
        Ok(Contract::from_record(record, now))
    }

    async fn update_contract(
        &self,
        id: i64,
        update: ContractUpdate,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError> {
        let mut state = self.state.write().await;

        let mut record = state
            .contracts
            .get(&id)
            .cloned()
            .ok_or(StorageError::ContractNotFound(id))?;

        let actor = state
            .users
            .get(&acting_user_id)
            .cloned()
            .ok_or(StorageError::UserNotFound(acting_user_id))?;

        if let Some(inn) = &update.inn {
            if state.inn_taken(inn, Some(id)) {
                return Err(StorageError::DuplicateInn(inn.clone()));
            }
        }

        if let Some(lawyer_id) = update.lawyer_id {
            if !state.users.contains_key(&lawyer_id) {
                return Err(StorageError::LawyerNotFound(lawyer_id));
            }
        }

        let now = Utc::now();
        let changes = apply_update(&mut record, &update);
        debug!(contract_id = id, changed = changes.len(), "Contract updated");
        record
            .history
            .push(ContractHistoryEntry::updated(&actor, changes, now));

        state.contracts.insert(id, record.clone());
        Ok(Contract::from_record(record, now))
    }

    async fn delete_contract(&self, id: i64) -> Result<bool, StorageError> {
        let removed = self.state.write().await.contracts.remove(&id).is_some();
        if removed {
            debug!(contract_id = id, "Contract deleted");
        }
        Ok(removed)
    }
}
