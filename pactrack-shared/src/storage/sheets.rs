/// Google spreadsheet storage backend
///
/// # Layout
///
/// Two sheets, each with a header row:
///
/// | sheet | columns |
/// |---|---|
/// | `users` | username, password, role |
/// | `contracts` | companyName, inn, director, address, endDate, comments, hasND, lawyerId, status, history |
///
/// A record's id is its 1-based position among the data rows (sheet row
/// minus one). Deleting a contract clears its row instead of removing it, so
/// the ids of later rows never shift; cleared rows are skipped on read.
///
/// End dates are written as `dd.MM.yyyy`, so they are kept at midnight UTC of
/// their day; the values returned by writes match what a later read sees.
/// The status column is informational
/// and ignored on read. History is stored as JSON in a single cell; when it
/// grows past [`MAX_HISTORY_CHARS`] only the newest [`HISTORY_KEEP`] entries
/// are kept.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tracing::{error, info, warn};

use super::{Storage, StorageError};
use crate::models::contract::{
    parse_end_date, Contract, ContractRecord, ContractUpdate, NewContract,
};
use crate::models::history::{apply_update, ContractHistoryEntry};
use crate::models::user::{NewUser, Role, User};
use crate::sheets::SheetsTransport;
use crate::status::calculate_status;

pub const USERS_SHEET: &str = "users";
pub const CONTRACTS_SHEET: &str = "contracts";

const USER_HEADERS: [&str; 3] = ["username", "password", "role"];
const CONTRACT_HEADERS: [&str; 10] = [
    "companyName",
    "inn",
    "director",
    "address",
    "endDate",
    "comments",
    "hasND",
    "lawyerId",
    "status",
    "history",
];

/// Upper bound on the serialized history cell
pub const MAX_HISTORY_CHARS: usize = 40_000;

/// Entries kept when history is truncated
pub const HISTORY_KEEP: usize = 10;

const SHEET_DATE_FORMAT: &str = "%d.%m.%Y";

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Decodes a users-sheet row; blank rows yield `None`
pub fn user_from_row(id: i64, row: &[String]) -> Option<User> {
    let username = cell(row, 0);
    if username.is_empty() {
        return None;
    }

    let role = cell(row, 2).parse::<Role>().unwrap_or_else(|_| {
        warn!(user_id = id, role = cell(row, 2), "Unknown role, treating as lawyer");
        Role::Lawyer
    });

    Some(User {
        id,
        username: username.to_string(),
        password_hash: cell(row, 1).to_string(),
        role,
        created_at: None,
    })
}

pub fn user_to_row(user: &User) -> Vec<String> {
    vec![
        user.username.clone(),
        user.password_hash.clone(),
        user.role.as_str().to_string(),
    ]
}

/// Decodes a contracts-sheet row
///
/// Blank rows and rows without an end date yield `None`. An end date that
/// cannot be parsed falls back to `now`, and an unreadable history cell reads
/// as empty; both are logged.
pub fn contract_from_row(id: i64, row: &[String], now: DateTime<Utc>) -> Option<ContractRecord> {
    if is_blank(row) {
        return None;
    }

    let raw_end_date = cell(row, 4);
    if raw_end_date.is_empty() {
        warn!(contract_id = id, "Contract row has no end date, skipping");
        return None;
    }

    let end_date = parse_end_date(raw_end_date).unwrap_or_else(|_| {
        warn!(contract_id = id, end_date = raw_end_date, "Unparseable end date, using current time");
        now
    });

    let lawyer_id = cell(row, 7).parse::<i64>().unwrap_or_else(|_| {
        warn!(contract_id = id, lawyer_id = cell(row, 7), "Invalid lawyer id");
        0
    });

    let raw_history = cell(row, 9);
    let history: Vec<ContractHistoryEntry> = if raw_history.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(raw_history).unwrap_or_else(|e| {
            warn!(contract_id = id, error = %e, "Unreadable history cell, treating as empty");
            Vec::new()
        })
    };

    let created_at = history.first().map(|e| e.timestamp).unwrap_or(now);

    Some(ContractRecord {
        id,
        company_name: cell(row, 0).to_string(),
        inn: cell(row, 1).to_string(),
        director: cell(row, 2).to_string(),
        address: cell(row, 3).to_string(),
        end_date,
        comments: cell(row, 5).to_string(),
        has_nd: parse_bool(cell(row, 6)),
        lawyer_id,
        history,
        created_at,
    })
}

/// Encodes a record as a contracts-sheet row
///
/// May truncate `record.history` to fit the cell limit.
pub fn contract_to_row(
    record: &mut ContractRecord,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StorageError> {
    let history = encode_history(record.id, &mut record.history)?;
    let status = calculate_status(record.end_date, now).status;

    Ok(vec![
        record.company_name.clone(),
        record.inn.clone(),
        record.director.clone(),
        record.address.clone(),
        record.end_date.format(SHEET_DATE_FORMAT).to_string(),
        record.comments.clone(),
        record.has_nd.to_string(),
        record.lawyer_id.to_string(),
        status.as_str().to_string(),
        history,
    ])
}

/// Serializes history for a single cell, dropping old entries if needed
pub fn encode_history(
    contract_id: i64,
    history: &mut Vec<ContractHistoryEntry>,
) -> Result<String, StorageError> {
    let encoded = serde_json::to_string(history)?;
    let size = encoded.chars().count();
    if size <= MAX_HISTORY_CHARS {
        return Ok(encoded);
    }

    warn!(
        contract_id,
        size,
        kept = HISTORY_KEEP,
        "History exceeds cell limit, keeping newest entries"
    );
    let excess = history.len().saturating_sub(HISTORY_KEEP);
    history.drain(..excess);

    let encoded = serde_json::to_string(history)?;
    let size = encoded.chars().count();
    if size > MAX_HISTORY_CHARS {
        return Err(StorageError::HistoryTooLarge { size });
    }
    Ok(encoded)
}

/// Midnight UTC of the day an end date is stored under
pub fn sheet_day(end_date: DateTime<Utc>) -> DateTime<Utc> {
    end_date.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn row_range(sheet: &str, id: i64, last_column: char) -> String {
    let row = id + 1;
    format!("{}!A{}:{}{}", sheet, row, last_column, row)
}

/// [`Storage`] over a Google spreadsheet
#[derive(Debug)]
pub struct SheetsStorage {
    client: Box<dyn SheetsTransport>,
}

impl SheetsStorage {
    /// Wraps a client, creating missing sheets with their header rows
    pub async fn connect(client: impl SheetsTransport + 'static) -> Result<Self, StorageError> {
        let storage = Self {
            client: Box::new(client),
        };
        storage.ensure_sheets().await?;
        Ok(storage)
    }

    async fn ensure_sheets(&self) -> Result<(), StorageError> {
        let titles = self.client.sheet_titles().await?;

        for (sheet, headers, last_column) in [
            (USERS_SHEET, &USER_HEADERS[..], 'C'),
            (CONTRACTS_SHEET, &CONTRACT_HEADERS[..], 'J'),
        ] {
            if titles.iter().any(|t| t == sheet) {
                continue;
            }

            self.client.add_sheet(sheet).await?;
            self.client
                .update_values(
                    &format!("{}!A1:{}1", sheet, last_column),
                    vec![headers.iter().map(|h| h.to_string()).collect()],
                )
                .await?;
            info!(sheet, "Created sheet with headers");
        }

        Ok(())
    }

    async fn load_users(&self) -> Result<Vec<User>, StorageError> {
        let rows = self
            .client
            .get_values(&format!("{}!A2:C", USERS_SHEET))
            .await
            .inspect_err(|e| error!(error = %e, "Failed to read users sheet"))?;

        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| user_from_row(i as i64 + 1, row))
            .collect())
    }

    async fn load_contracts(&self, now: DateTime<Utc>) -> Result<Vec<ContractRecord>, StorageError> {
        let rows = self
            .client
            .get_values(&format!("{}!A2:J", CONTRACTS_SHEET))
            .await
            .inspect_err(|e| error!(error = %e, "Failed to read contracts sheet"))?;

        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| contract_from_row(i as i64 + 1, row, now))
            .collect())
    }

    async fn find_contract(&self, id: i64, now: DateTime<Utc>) -> Result<Option<ContractRecord>, StorageError> {
        Ok(self.load_contracts(now).await?.into_iter().find(|c| c.id == id))
    }
}

#[async_trait]
impl Storage for SheetsStorage {
    fn backend_name(&self) -> &'static str {
        "sheets"
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.client
            .sheet_titles()
            .await
            .inspect_err(|e| error!(error = %e, "Spreadsheet health check failed"))?;
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(self.load_users().await?.into_iter().find(|u| u.id == id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .load_users()
            .await?
            .into_iter()
            .find(|u| u.username == username))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Err(StorageError::DuplicateUsername(user.username));
        }

        let mut created = User {
            id: 0,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: None,
        };

        let row = self
            .client
            .append_values(&format!("{}!A:C", USERS_SHEET), vec![user_to_row(&created)])
            .await
            .inspect_err(|e| error!(username = %created.username, error = %e, "Failed to append user"))?;
        created.id = i64::from(row) - 1;

        info!(user_id = created.id, "User created");
        Ok(created)
    }

    async fn get_all_users(&self) -> Result<Vec<User>, StorageError> {
        self.load_users().await
    }

    async fn update_user_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<User, StorageError> {
        let mut user = self
            .get_user(id)
            .await?
            .ok_or(StorageError::UserNotFound(id))?;
        user.password_hash = password_hash.to_string();

        self.client
            .update_values(&row_range(USERS_SHEET, id, 'C'), vec![user_to_row(&user)])
            .await
            .inspect_err(|e| error!(user_id = id, error = %e, "Failed to update password"))?;

        Ok(user)
    }

    async fn get_contracts(&self) -> Result<Vec<Contract>, StorageError> {
        let now = Utc::now();
        Ok(self
            .load_contracts(now)
            .await?
            .into_iter()
            .map(|record| Contract::from_record(record, now))
            .collect())
    }

    async fn get_contract(&self, id: i64) -> Result<Option<Contract>, StorageError> {
        let now = Utc::now();
        Ok(self
            .find_contract(id, now)
            .await?
            .map(|record| Contract::from_record(record, now)))
    }

    async fn get_contract_by_inn(&self, inn: &str) -> Result<Option<Contract>, StorageError> {
        let now = Utc::now();
        Ok(self
            .load_contracts(now)
            .await?
            .into_iter()
            .find(|c| c.inn == inn)
            .map(|record| Contract::from_record(record, now)))
    }

    async fn create_contract(
        &self,
        contract: NewContract,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError> {
        let users = self.load_users().await?;
        let actor = users
            .iter()
            .find(|u| u.id == acting_user_id)
            .ok_or(StorageError::UserNotFound(acting_user_id))?;
        if !users.iter().any(|u| u.id == contract.lawyer_id) {
            return Err(StorageError::LawyerNotFound(contract.lawyer_id));
        }

        let now = Utc::now();
        if self
            .load_contracts(now)
            .await?
            .iter()
            .any(|c| c.inn == contract.inn)
        {
            return Err(StorageError::DuplicateInn(contract.inn));
        }

        let mut record = ContractRecord {
            id: 0,
            company_name: contract.company_name,
            inn: contract.inn,
            director: contract.director,
            address: contract.address,
            end_date: sheet_day(contract.end_date),
            comments: contract.comments,
            has_nd: contract.has_nd,
            lawyer_id: contract.lawyer_id,
            history: vec![ContractHistoryEntry::created(actor, now)],
            created_at: now,
        };

        let row = contract_to_row(&mut record, now)?;
        let sheet_row = self
            .client
            .append_values(&format!("{}!A:J", CONTRACTS_SHEET), vec![row])
            .await
            .inspect_err(|e| error!(inn = %record.inn, error = %e, "Failed to append contract"))?;
        record.id = i64::from(sheet_row) - 1;

        info!(contract_id = record.id, user_id = acting_user_id, "Contract created");
        Ok(Contract::from_record(record, now))
    }

    async fn update_contract(
        &self,
        id: i64,
        mut update: ContractUpdate,
        acting_user_id: i64,
    ) -> Result<Contract, StorageError> {
        let now = Utc::now();
        let contracts = self.load_contracts(now).await?;
        let mut record = contracts
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StorageError::ContractNotFound(id))?;

        let users = self.load_users().await?;
        let actor = users
            .iter()
            .find(|u| u.id == acting_user_id)
            .ok_or(StorageError::UserNotFound(acting_user_id))?;

        if let Some(inn) = &update.inn {
            if contracts.iter().any(|c| &c.inn == inn && c.id != id) {
                return Err(StorageError::DuplicateInn(inn.clone()));
            }
        }
        if let Some(lawyer_id) = update.lawyer_id {
            if !users.iter().any(|u| u.id == lawyer_id) {
                return Err(StorageError::LawyerNotFound(lawyer_id));
            }
        }

        update.end_date = update.end_date.map(sheet_day);

        let changes = apply_update(&mut record, &update);
        record
            .history
            .push(ContractHistoryEntry::updated(actor, changes, now));

        let row = contract_to_row(&mut record, now)?;
        self.client
            .update_values(&row_range(CONTRACTS_SHEET, id, 'J'), vec![row])
            .await
            .inspect_err(|e| error!(contract_id = id, error = %e, "Failed to write contract"))?;

        info!(contract_id = id, user_id = acting_user_id, "Contract updated");
        Ok(Contract::from_record(record, now))
    }

    async fn delete_contract(&self, id: i64) -> Result<bool, StorageError> {
        if self.find_contract(id, Utc::now()).await?.is_none() {
            return Ok(false);
        }

        self.client
            .clear_values(&row_range(CONTRACTS_SHEET, id, 'J'))
            .await
            .inspect_err(|e| error!(contract_id = id, error = %e, "Failed to clear contract row"))?;

        info!(contract_id = id, "Contract deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::history::{ChangeSet, FieldChange, HistoryAction};
    use chrono::{Duration, TimeZone};
    use serde_json::Value as JsonValue;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn actor() -> User {
        User {
            id: 2,
            username: "morozova".to_string(),
            password_hash: String::new(),
            role: Role::Lawyer,
            created_at: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_user_row_decoding() {
        let user = user_from_row(3, &row(&["popov", "$argon2id$x", "admin"])).unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.role, Role::Admin);

        let user = user_from_row(4, &row(&["kozlov", "$argon2id$y", "intern"])).unwrap();
        assert_eq!(user.role, Role::Lawyer);

        assert!(user_from_row(5, &row(&["", "", ""])).is_none());
        assert!(user_from_row(6, &[]).is_none());
    }

    #[test]
    fn test_contract_row_decoding() {
        let now = fixed_now();
        let record = contract_from_row(
            7,
            &row(&[
                "Yug LLC",
                "2310000001",
                "Fedorov F.F.",
                "Krasnodar, Krasnaya 3",
                "31.12.2025",
                "",
                "TRUE",
                "2",
                "expired",
                "",
            ]),
            now,
        )
        .unwrap();

        assert_eq!(record.id, 7);
        assert_eq!(record.end_date, Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap());
        assert!(record.has_nd);
        assert_eq!(record.lawyer_id, 2);
        assert!(record.history.is_empty());

        // The stored status cell is ignored
        let contract = Contract::from_record(record, now);
        assert_eq!(contract.status, crate::status::ContractStatus::Active);
    }

    #[test]
    fn test_contract_rows_without_end_date_are_skipped() {
        let now = fixed_now();
        let cells = row(&["Yug LLC", "2310000001", "Fedorov F.F.", "Krasnodar", ""]);
        assert!(contract_from_row(1, &cells, now).is_none());
        assert!(contract_from_row(2, &row(&["", "", ""]), now).is_none());
    }

    #[test]
    fn test_unparseable_date_and_history_fall_back() {
        let now = fixed_now();
        let record = contract_from_row(
            1,
            &row(&[
                "Yug LLC",
                "2310000001",
                "Fedorov F.F.",
                "Krasnodar",
                "someday",
                "",
                "false",
                "2",
                "",
                "{not json",
            ]),
            now,
        )
        .unwrap();
        assert_eq!(record.end_date, now);
        assert!(record.history.is_empty());
        assert!(!record.has_nd);
    }

    #[test]
    fn test_contract_row_layout() {
        let now = fixed_now();
        let mut record = ContractRecord {
            id: 1,
            company_name: "Yug LLC".to_string(),
            inn: "2310000001".to_string(),
            director: "Fedorov F.F.".to_string(),
            address: "Krasnodar".to_string(),
            end_date: now + Duration::days(10),
            comments: "call back".to_string(),
            has_nd: true,
            lawyer_id: 2,
            history: vec![ContractHistoryEntry::created(&actor(), now)],
            created_at: now,
        };

        let cells = contract_to_row(&mut record, now).unwrap();
        assert_eq!(cells.len(), CONTRACT_HEADERS.len());
        assert_eq!(cells[4], "11.06.2025");
        assert_eq!(cells[6], "true");
        assert_eq!(cells[8], "expiring_soon");

        let decoded = contract_from_row(1, &cells, now).unwrap();
        assert_eq!(decoded.history, record.history);
        assert_eq!(decoded.created_at, now);
    }

    #[test]
    fn test_sheet_day_matches_stored_cell() {
        let end = Utc.with_ymd_and_hms(2025, 6, 11, 18, 30, 0).unwrap();
        let day = sheet_day(end);
        assert_eq!(day, Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap());
        assert_eq!(parse_end_date(&day.format(SHEET_DATE_FORMAT).to_string()).unwrap(), day);
        assert_eq!(sheet_day(day), day);
    }

    #[test]
    fn test_history_truncated_to_newest_entries() {
        let now = fixed_now();
        let mut history: Vec<ContractHistoryEntry> = (0..40)
            .map(|i| {
                let mut changes = ChangeSet::new();
                changes.insert(
                    "comments".to_string(),
                    FieldChange {
                        old: JsonValue::from("x".repeat(600)),
                        new: JsonValue::from("y".repeat(600)),
                    },
                );
                ContractHistoryEntry::updated(&actor(), changes, now + Duration::minutes(i))
            })
            .collect();

        let encoded = encode_history(1, &mut history).unwrap();
        assert_eq!(history.len(), HISTORY_KEEP);
        assert_eq!(history[0].timestamp, now + Duration::minutes(30));
        assert!(encoded.chars().count() <= MAX_HISTORY_CHARS);
        assert!(history.iter().all(|e| e.action == HistoryAction::Updated));
    }

    #[test]
    fn test_history_still_too_large_is_an_error() {
        let now = fixed_now();
        let mut history: Vec<ContractHistoryEntry> = (0..10)
            .map(|_| {
                let mut changes = ChangeSet::new();
                changes.insert(
                    "comments".to_string(),
                    FieldChange {
                        old: JsonValue::from(""),
                        new: JsonValue::from("z".repeat(5_000)),
                    },
                );
                ContractHistoryEntry::updated(&actor(), changes, now)
            })
            .collect();

        let err = encode_history(1, &mut history).unwrap_err();
        assert!(matches!(err, StorageError::HistoryTooLarge { size } if size > MAX_HISTORY_CHARS));
    }

    #[test]
    fn test_small_history_untouched() {
        let mut history = vec![ContractHistoryEntry::created(&actor(), fixed_now())];
        encode_history(1, &mut history).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_row_range() {
        assert_eq!(row_range(CONTRACTS_SHEET, 1, 'J'), "contracts!A2:J2");
        assert_eq!(row_range(USERS_SHEET, 9, 'C'), "users!A10:C10");
    }
}
