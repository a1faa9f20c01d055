/// Contract model
///
/// Two shapes exist for a contract:
///
/// - [`ContractRecord`]: what a storage backend persists. It has no status
///   field, because status is never stored as a source of truth.
/// - [`Contract`]: what callers receive. Built from a record with
///   [`Contract::from_record`], which derives `status` and `days_left` from the
///   end date and the supplied "now".
///
/// # Schema
///
/// ```sql
/// CREATE TABLE contracts (
///     id BIGSERIAL PRIMARY KEY,
///     company_name VARCHAR(100) NOT NULL,
///     inn VARCHAR(12) NOT NULL UNIQUE,
///     director VARCHAR(100) NOT NULL,
///     address TEXT NOT NULL,
///     end_date TIMESTAMPTZ NOT NULL,
///     comments TEXT NOT NULL DEFAULT '',
///     has_nd BOOLEAN NOT NULL DEFAULT FALSE,
///     lawyer_id BIGINT NOT NULL REFERENCES users(id),
///     history JSONB NOT NULL DEFAULT '[]',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::history::ContractHistoryEntry;
use crate::status::{calculate_status, ContractStatus};
use crate::storage::StorageError;

/// Default page size for contract listings
pub const DEFAULT_LIMIT: usize = 100;

/// Largest page size a caller may request
pub const MAX_LIMIT: usize = 1000;

/// Persisted contract, without derived fields
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRecord {
    pub id: i64,
    pub company_name: String,

    /// Taxpayer id, unique across all contracts
    pub inn: String,

    pub director: String,
    pub address: String,
    pub end_date: DateTime<Utc>,
    pub comments: String,

    /// Whether a non-disclosure agreement is attached
    pub has_nd: bool,

    /// Owning lawyer
    pub lawyer_id: i64,

    /// Append-only, chronological
    pub history: Vec<ContractHistoryEntry>,

    pub created_at: DateTime<Utc>,
}

/// Contract as returned to callers, with status derived at read time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: i64,
    pub company_name: String,
    pub inn: String,
    pub director: String,
    pub address: String,
    pub end_date: DateTime<Utc>,
    pub comments: String,
    #[serde(rename = "hasND")]
    pub has_nd: bool,
    pub lawyer_id: i64,
    pub status: ContractStatus,
    pub days_left: i64,
    pub history: Vec<ContractHistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl Contract {
    /// Builds the caller-facing contract, recomputing status against `now`
    pub fn from_record(record: ContractRecord, now: DateTime<Utc>) -> Self {
        let info = calculate_status(record.end_date, now);

        Self {
            id: record.id,
            company_name: record.company_name,
            inn: record.inn,
            director: record.director,
            address: record.address,
            end_date: record.end_date,
            comments: record.comments,
            has_nd: record.has_nd,
            lawyer_id: record.lawyer_id,
            status: info.status,
            days_left: info.days_left,
            history: record.history,
            created_at: record.created_at,
        }
    }
}

/// Input for creating a contract
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub company_name: String,
    pub inn: String,
    pub director: String,
    pub address: String,
    pub end_date: DateTime<Utc>,
    pub comments: String,
    pub has_nd: bool,
    pub lawyer_id: i64,
}

/// Partial update: only `Some` fields are applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractUpdate {
    pub company_name: Option<String>,
    pub inn: Option<String>,
    pub director: Option<String>,
    pub address: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub has_nd: Option<bool>,
    pub lawyer_id: Option<i64>,
}

impl ContractUpdate {
    /// True when no field is supplied
    pub fn is_empty(&self) -> bool {
        *self == ContractUpdate::default()
    }
}

/// Parses an end date supplied by a client or a spreadsheet cell
///
/// Accepted forms: `YYYY-MM-DD`, `dd.MM.yyyy` (both taken as midnight UTC)
/// and full RFC 3339 timestamps.
pub fn parse_end_date(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StorageError::InvalidDate("end date is required".to_string()));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
    }

    Err(StorageError::InvalidDate(raw.to_string()))
}

/// Listing filter, applied after status has been derived
#[derive(Debug, Clone, PartialEq)]
pub struct ContractFilter {
    pub status: Option<ContractStatus>,
    pub lawyer_id: Option<i64>,

    /// Case-insensitive match against company name, inn, director and address
    pub search: Option<String>,

    pub skip: usize,
    pub limit: usize,
}

impl Default for ContractFilter {
    fn default() -> Self {
        Self {
            status: None,
            lawyer_id: None,
            search: None,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ContractFilter {
    /// Returns true if the contract passes the status, lawyer and search filters
    pub fn matches(&self, contract: &Contract) -> bool {
        if let Some(status) = self.status {
            if contract.status != status {
                return false;
            }
        }

        if let Some(lawyer_id) = self.lawyer_id {
            if contract.lawyer_id != lawyer_id {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                [
                    &contract.company_name,
                    &contract.inn,
                    &contract.director,
                    &contract.address,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }

    /// Filters, then pages, preserving input order
    pub fn apply(&self, contracts: Vec<Contract>) -> Vec<Contract> {
        let limit = self.limit.min(MAX_LIMIT);

        contracts
            .into_iter()
            .filter(|c| self.matches(c))
            .skip(self.skip)
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(id: i64, inn: &str, end_date: DateTime<Utc>, lawyer_id: i64) -> ContractRecord {
        ContractRecord {
            id,
            company_name: format!("Company {}", id),
            inn: inn.to_string(),
            director: "Ivanov I.I.".to_string(),
            address: "Kazan, Baumana 5".to_string(),
            end_date,
            comments: String::new(),
            has_nd: false,
            lawyer_id,
            history: Vec::new(),
            created_at: end_date - Duration::days(365),
        }
    }

    #[test]
    fn test_from_record_derives_status() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let contract = Contract::from_record(record(1, "7701234567", now + Duration::days(5), 2), now);
        assert_eq!(contract.status, ContractStatus::ExpiringSoon);
        assert_eq!(contract.days_left, 5);
    }

    #[test]
    fn test_contract_wire_format() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let contract = Contract::from_record(record(1, "7701234567", now + Duration::days(45), 2), now);
        let json = serde_json::to_value(&contract).unwrap();

        assert_eq!(json["companyName"], "Company 1");
        assert_eq!(json["hasND"], false);
        assert_eq!(json["lawyerId"], 2);
        assert_eq!(json["status"], "active");
        assert_eq!(json["daysLeft"], 45);
        assert!(json.get("has_nd").is_none());
    }

    #[test]
    fn test_parse_end_date_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(parse_end_date("2025-12-31").unwrap(), expected);
        assert_eq!(parse_end_date("31.12.2025").unwrap(), expected);
        assert_eq!(parse_end_date(" 2025-12-31T00:00:00Z ").unwrap(), expected);
        assert_eq!(
            parse_end_date("2025-12-31T03:00:00+03:00").unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_end_date_rejects_garbage() {
        assert!(matches!(parse_end_date(""), Err(StorageError::InvalidDate(_))));
        assert!(matches!(parse_end_date("tomorrow"), Err(StorageError::InvalidDate(_))));
        assert!(matches!(parse_end_date("2025-02-30"), Err(StorageError::InvalidDate(_))));
    }

    #[test]
    fn test_filter_by_status_lawyer_and_search() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut contracts: Vec<Contract> = vec![
            record(1, "7701000001", now - Duration::days(3), 1),
            record(2, "7701000002", now + Duration::days(10), 1),
            record(3, "7701000003", now + Duration::days(100), 2),
        ]
        .into_iter()
        .map(|r| Contract::from_record(r, now))
        .collect();
        contracts[2].director = "Sokolova A.V.".to_string();

        let expired = ContractFilter {
            status: Some(ContractStatus::Expired),
            ..Default::default()
        };
        let ids: Vec<i64> = expired.apply(contracts.clone()).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);

        let by_lawyer = ContractFilter {
            lawyer_id: Some(1),
            ..Default::default()
        };
        assert_eq!(by_lawyer.apply(contracts.clone()).len(), 2);

        let search = ContractFilter {
            search: Some("SOKOL".to_string()),
            ..Default::default()
        };
        let ids: Vec<i64> = search.apply(contracts.clone()).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3]);

        let by_inn = ContractFilter {
            search: Some("000002".to_string()),
            ..Default::default()
        };
        assert_eq!(by_inn.apply(contracts).len(), 1);
    }

    #[test]
    fn test_filter_paging_caps_limit() {
        let now = Utc::now();
        let contracts: Vec<Contract> = (1..=1500)
            .map(|i| Contract::from_record(record(i, &format!("{:010}", i), now, 1), now))
            .collect();

        let page = ContractFilter {
            skip: 10,
            limit: 5,
            ..Default::default()
        }
        .apply(contracts.clone());
        assert_eq!(page.first().map(|c| c.id), Some(11));
        assert_eq!(page.len(), 5);

        let capped = ContractFilter {
            limit: 5000,
            ..Default::default()
        }
        .apply(contracts);
        assert_eq!(capped.len(), MAX_LIMIT);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ContractUpdate::default().is_empty());
        assert!(!ContractUpdate {
            has_nd: Some(false),
            ..Default::default()
        }
        .is_empty());
    }
}
