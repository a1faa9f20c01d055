/// Contract statistics
///
/// Counts are always computed from contracts whose status has already been
/// derived, so they agree with what a listing returns at the same moment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::contract::Contract;
use super::user::User;
use crate::status::ContractStatus;

/// Per-status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub active: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

impl StatusCounts {
    /// Counts contracts by status
    pub fn tally<'a, I>(contracts: I) -> Self
    where
        I: IntoIterator<Item = &'a Contract>,
    {
        let mut counts = StatusCounts::default();
        for contract in contracts {
            counts.add(contract.status);
        }
        counts
    }

    fn add(&mut self, status: ContractStatus) {
        self.total += 1;
        match status {
            ContractStatus::Active => self.active += 1,
            ContractStatus::ExpiringSoon => self.expiring_soon += 1,
            ContractStatus::Expired => self.expired += 1,
        }
    }
}

/// Statistics response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractStats {
    #[serde(flatten)]
    pub counts: StatusCounts,

    /// Username to counts, every known user included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_lawyer: Option<BTreeMap<String, StatusCounts>>,
}

impl ContractStats {
    /// Totals only
    pub fn compute(contracts: &[Contract]) -> Self {
        Self {
            counts: StatusCounts::tally(contracts),
            per_lawyer: None,
        }
    }

    /// Totals plus a breakdown per user
    ///
    /// Users without contracts appear with zero counts; contracts owned by an
    /// id not in `users` only contribute to the totals.
    pub fn compute_with_breakdown(contracts: &[Contract], users: &[User]) -> Self {
        let per_lawyer = users
            .iter()
            .map(|user| {
                let counts =
                    StatusCounts::tally(contracts.iter().filter(|c| c.lawyer_id == user.id));
                (user.username.clone(), counts)
            })
            .collect();

        Self {
            counts: StatusCounts::tally(contracts),
            per_lawyer: Some(per_lawyer),
        }
    }
}
