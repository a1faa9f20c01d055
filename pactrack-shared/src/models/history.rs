/// Contract audit history
///
/// Every contract carries an append-only log of [`ContractHistoryEntry`]
/// values. Entries are added in chronological order and never modified
/// afterwards:
///
/// - creating a contract appends one `created` entry with no changes
/// - every update appends exactly one `updated` entry whose `changes` map
///   lists each supplied field whose value actually differed, even if that
///   map ends up empty
///
/// # Wire format
///
/// ```json
/// {
///   "userId": 3,
///   "username": "ivanova",
///   "action": "updated",
///   "changes": { "director": { "old": "Petrov P.P.", "new": "Sidorov S.S." } },
///   "timestamp": "2025-03-14T09:30:00Z"
/// }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::contract::{ContractRecord, ContractUpdate};
use super::user::User;

/// Kind of mutation recorded by a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    /// Contract was created
    #[serde(alias = "create")]
    Created,

    /// Contract fields were updated
    #[serde(alias = "update")]
    Updated,
}

/// Old and new value of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: JsonValue,
    pub new: JsonValue,
}

/// Field name (wire spelling) to change
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// One audit record: who changed what, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractHistoryEntry {
    /// Acting user id
    pub user_id: i64,

    /// Acting user's name at the time of the change
    pub username: String,

    /// Mutation kind
    pub action: HistoryAction,

    /// Changed fields (empty for `created`)
    #[serde(default)]
    pub changes: ChangeSet,

    /// When the mutation happened
    pub timestamp: DateTime<Utc>,
}

impl ContractHistoryEntry {
    /// Entry stamped when a contract is first stored
    pub fn created(actor: &User, at: DateTime<Utc>) -> Self {
        Self {
            user_id: actor.id,
            username: actor.username.clone(),
            action: HistoryAction::Created,
            changes: ChangeSet::new(),
            timestamp: at,
        }
    }

    /// Entry stamped for an update, carrying the computed diff
    pub fn updated(actor: &User, changes: ChangeSet, at: DateTime<Utc>) -> Self {
        Self {
            user_id: actor.id,
            username: actor.username.clone(),
            action: HistoryAction::Updated,
            changes,
            timestamp: at,
        }
    }
}

/// Applies `update` to `record` and returns the fields that actually changed
///
/// A field is recorded only when it was supplied in the update and its new
/// value is strictly different from the stored one. The record's history is
/// left untouched; callers append the resulting entry themselves so each
/// backend can do so atomically.
pub fn apply_update(record: &mut ContractRecord, update: &ContractUpdate) -> ChangeSet {
    let mut changes = ChangeSet::new();

    track(&mut changes, "companyName", &mut record.company_name, &update.company_name);
    track(&mut changes, "inn", &mut record.inn, &update.inn);
    track(&mut changes, "director", &mut record.director, &update.director);
    track(&mut changes, "address", &mut record.address, &update.address);
    track(&mut changes, "endDate", &mut record.end_date, &update.end_date);
    track(&mut changes, "comments", &mut record.comments, &update.comments);
    track(&mut changes, "hasND", &mut record.has_nd, &update.has_nd);
    track(&mut changes, "lawyerId", &mut record.lawyer_id, &update.lawyer_id);

    changes
}

fn track<T>(changes: &mut ChangeSet, field: &str, current: &mut T, incoming: &Option<T>)
where
    T: PartialEq + Clone + Serialize,
{
    let Some(new_value) = incoming else {
        return;
    };

    if current == new_value {
        return;
    }

    changes.insert(
        field.to_string(),
        FieldChange {
            old: to_json(current),
            new: to_json(new_value),
        },
    );
    *current = new_value.clone();
}

fn to_json<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}
