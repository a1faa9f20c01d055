/// Contract expiry status calculation
///
/// A contract's status is never stored as a source of truth. Every read path
/// derives it from the contract's end date and the current time with
/// [`calculate_status`].
///
/// # Rules
///
/// - **expired**: `now` is after the end date
/// - **expiring_soon**: the end date falls within the next 30 days
///   (an end date exactly 30 days out still counts)
/// - **active**: anything further out
///
/// `days_left` is the signed number of whole days from `now` to the end date,
/// truncated toward zero, so a contract that ended 36 hours ago reports `-1`.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use pactrack_shared::status::{calculate_status, ContractStatus};
///
/// let now = Utc::now();
/// let info = calculate_status(now + Duration::days(5), now);
/// assert_eq!(info.status, ContractStatus::ExpiringSoon);
/// assert_eq!(info.days_left, 5);
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Window before the end date in which a contract is flagged as expiring
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Derived lifecycle status of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// More than 30 days remain
    Active,

    /// 30 days or fewer remain
    ExpiringSoon,

    /// End date has passed
    Expired,
}

impl ContractStatus {
    /// Wire representation, also used in the spreadsheet status column
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::ExpiringSoon => "expiring_soon",
            ContractStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ContractStatus::Active),
            "expiring_soon" => Ok(ContractStatus::ExpiringSoon),
            "expired" => Ok(ContractStatus::Expired),
            other => Err(format!("unknown contract status: {}", other)),
        }
    }
}

/// Result of a status calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    /// Derived status
    pub status: ContractStatus,

    /// Signed whole days from now until the end date
    pub days_left: i64,
}

/// Derives status and remaining days for an end date relative to `now`
///
/// Pure and deterministic: the same inputs always produce the same output.
pub fn calculate_status(end_date: DateTime<Utc>, now: DateTime<Utc>) -> StatusInfo {
    let days_left = (end_date - now).num_days();
    let warning_horizon = now + Duration::days(EXPIRY_WARNING_DAYS);

    let status = if now > end_date {
        ContractStatus::Expired
    } else if warning_horizon >= end_date {
        ContractStatus::ExpiringSoon
    } else {
        ContractStatus::Active
    };

    StatusInfo { status, days_left }
}
