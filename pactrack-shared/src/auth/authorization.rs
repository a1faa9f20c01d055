/// Role-based authorization rules
///
/// Admins may do everything. Lawyers are confined to their own account and
/// the contracts assigned to them:
///
/// - they cannot list or create users
/// - they can view only themselves and reset only their own password
/// - they see, count and edit only contracts whose `lawyer_id` is their own
/// - they cannot assign a contract to someone else, reassign one, or delete one
///
/// These checks are pure; handlers load the resource first and then ask.

use super::middleware::AuthContext;
use crate::models::contract::{Contract, ContractFilter, ContractUpdate};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Administrator role required")]
    AdminRequired,

    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Only administrators can assign contracts to other lawyers")]
    CannotAssign,
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if !auth.is_admin() {
        return Err(AuthzError::AdminRequired);
    }
    Ok(())
}

/// The caller is the user in question, or an admin
pub fn require_self_or_admin(auth: &AuthContext, user_id: i64) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.user_id == user_id {
        return Ok(());
    }
    Err(AuthzError::NotAuthorized)
}

/// The caller owns the contract, or is an admin
pub fn require_contract_access(auth: &AuthContext, contract: &Contract) -> Result<(), AuthzError> {
    require_self_or_admin(auth, contract.lawyer_id)
}

/// Lawyer assigned to a new contract: lawyers may only assign themselves
///
/// Returns the effective lawyer id (the caller's own when none was given).
pub fn resolve_new_contract_lawyer(
    auth: &AuthContext,
    requested: Option<i64>,
) -> Result<i64, AuthzError> {
    match requested {
        None => Ok(auth.user_id),
        Some(id) if id == auth.user_id || auth.is_admin() => Ok(id),
        Some(_) => Err(AuthzError::CannotAssign),
    }
}

/// Lawyers may not move a contract to another lawyer
pub fn require_update_allowed(
    auth: &AuthContext,
    contract: &Contract,
    update: &ContractUpdate,
) -> Result<(), AuthzError> {
    require_contract_access(auth, contract)?;

    match update.lawyer_id {
        Some(id) if id != contract.lawyer_id && !auth.is_admin() => Err(AuthzError::CannotAssign),
        _ => Ok(()),
    }
}

/// Narrows a listing filter to what the caller may see
pub fn scope_filter(auth: &AuthContext, filter: &mut ContractFilter) -> Result<(), AuthzError> {
    if auth.is_admin() {
        return Ok(());
    }

    match filter.lawyer_id {
        Some(id) if id != auth.user_id => Err(AuthzError::NotAuthorized),
        _ => {
            filter.lawyer_id = Some(auth.user_id);
            Ok(())
        }
    }
}
