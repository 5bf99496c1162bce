pub mod handlers;
pub mod password;
pub mod session;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

/// Admin guard: trusts nothing but the login-time `is_admin` snapshot.
pub fn require_admin(user: &CurrentUser) -> AppResult<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Ownership guard for edit/delete operations: the resource's author and
/// the admin pass, everyone else gets a 403. Callers run this after loading
/// the resource and before any write.
pub fn require_owner_or_admin(user: &CurrentUser, owner_id: &str) -> AppResult<()> {
    if user.is_admin || user.id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
