/// Row parsing for the legacy spreadsheet
///
/// The legacy workbook has two sheets:
///
/// ```text
/// Users!A2:D100       id | username | role | createdAt
/// Contracts!A2:K100   id | companyName | inn | director | address | endDate |
///                     lawyerId | status | comments | hasND | createdAt
/// ```
///
/// Rows with too few columns are dropped. Trailing empty cells are omitted
/// by the Sheets API, so optional columns may be missing entirely.

use chrono::{DateTime, Utc};
use pactrack_shared::models::contract::parse_end_date;
use pactrack_shared::models::user::Role;
use serde::Serialize;
use tracing::debug;

pub const USERS_RANGE: &str = "Users!A2:D100";
pub const CONTRACTS_RANGE: &str = "Contracts!A2:K100";

/// id, username, role
pub const MIN_USER_COLUMNS: usize = 3;

/// Through lawyerId
pub const MIN_CONTRACT_COLUMNS: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyUser {
    /// Id in the legacy sheet; contracts refer to users by it
    pub legacy_id: Option<i64>,
    pub username: String,

    /// Unknown roles read as lawyer
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyContract {
    pub legacy_id: Option<i64>,
    pub company_name: String,
    pub inn: String,
    pub director: String,
    pub address: String,

    /// Kept raw; validated during migration so bad dates are reported per row
    pub end_date: String,

    pub lawyer_id: Option<i64>,
    pub comments: String,
    pub has_nd: bool,
}

impl LegacyContract {
    pub fn parsed_end_date(&self) -> Option<DateTime<Utc>> {
        parse_end_date(&self.end_date).ok()
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

fn parse_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

pub fn parse_users(rows: &[Vec<String>]) -> Vec<LegacyUser> {
    rows.iter()
        .filter(|row| row.len() >= MIN_USER_COLUMNS)
        .filter_map(|row| {
            let username = cell(row, 1);
            if username.is_empty() {
                debug!(?row, "Skipping legacy user row without username");
                return None;
            }

            Some(LegacyUser {
                legacy_id: parse_id(cell(row, 0)),
                username: username.to_string(),
                role: cell(row, 2).parse().unwrap_or_default(),
            })
        })
        .collect()
}

pub fn parse_contracts(rows: &[Vec<String>]) -> Vec<LegacyContract> {
    rows.iter()
        .filter(|row| row.len() >= MIN_CONTRACT_COLUMNS)
        .map(|row| LegacyContract {
            legacy_id: parse_id(cell(row, 0)),
            company_name: cell(row, 1).to_string(),
            inn: cell(row, 2).to_string(),
            director: cell(row, 3).to_string(),
            address: cell(row, 4).to_string(),
            end_date: cell(row, 5).to_string(),
            lawyer_id: parse_id(cell(row, 6)),
            // column 7 (status) is recomputed, not migrated
            comments: cell(row, 8).to_string(),
            has_nd: parse_flag(cell(row, 9)),
        })
        .collect()
}
