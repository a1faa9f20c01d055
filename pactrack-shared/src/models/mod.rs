/// Domain models for Pactrack
///
/// # Models
///
/// - `user`: user accounts and roles
/// - `contract`: stored contract records and the caller-facing view
/// - `history`: append-only audit log and the update diff
/// - `stats`: status counts
///
/// Persistence for all of these lives behind [`crate::storage::Storage`].
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use pactrack_shared::models::contract::{Contract, ContractRecord};
/// use pactrack_shared::status::ContractStatus;
///
/// let now = Utc::now();
/// let record = ContractRecord {
///     id: 1,
///     company_name: "Romashka LLC".to_string(),
///     inn: "7701234567".to_string(),
///     director: "Petrov P.P.".to_string(),
///     address: "Moscow".to_string(),
///     end_date: now - Duration::days(1),
///     comments: String::new(),
///     has_nd: false,
///     lawyer_id: 1,
///     history: Vec::new(),
///     created_at: now,
/// };
///
/// let contract = Contract::from_record(record, now);
/// assert_eq!(contract.status, ContractStatus::Expired);
/// ```

pub mod contract;
pub mod history;
pub mod stats;
pub mod user;
