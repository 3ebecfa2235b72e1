use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// The API layer enforces these requirements before running a command.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %principal.user_id,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use shopdesk_core::UserId;

    #[test]
    fn customer_can_only_cancel_own() {
        let principal = Principal::from_roles(UserId::new(), vec![Role::customer()]);
        assert!(authorize(&principal, &Permission::ORDERS_CANCEL_OWN).is_ok());
        assert_eq!(
            authorize(&principal, &Permission::ORDERS_STATUS_UPDATE),
            Err(AuthzError::Forbidden("orders.status.update".to_string()))
        );
    }

    #[test]
    fn wildcard_allows_everything() {
        let principal = Principal::from_roles(UserId::new(), vec![Role::admin()]);
        assert!(authorize(&principal, &Permission::ORDERS_DELETE).is_ok());
        assert!(authorize(&principal, &Permission::new("anything.else")).is_ok());
    }
}
