//! Ownership checks.
//!
//! Repositories never filter by owner; handlers load the row, then call [`ensure_owner`]
//! before mutating it.

use crate::{
    api::models::profiles::CurrentUser,
    errors::Error,
    types::{Operation, Permission, Resource, UserId},
};

/// Whether the caller may act on a row owned by `owner_id`
pub fn is_owner_or_admin(user: &CurrentUser, owner_id: UserId) -> bool {
    user.is_admin || user.id == owner_id
}

/// Fail with 403 unless the caller owns the row (or is an admin)
pub fn ensure_owner(user: &CurrentUser, owner_id: UserId, resource: Resource, operation: Operation) -> Result<(), Error> {
    if is_owner_or_admin(user, owner_id) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Owner,
            action: operation,
            resource: resource.to_string(),
        })
    }
}
