use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Store staff: every order operation.
    pub fn admin() -> Self {
        Self(Cow::Borrowed("admin"))
    }

    /// Storefront shopper: may cancel their own orders.
    pub fn customer() -> Self {
        Self(Cow::Borrowed("customer"))
    }

    /// Automated integrations (payment webhooks, fulfillment jobs).
    pub fn system() -> Self {
        Self(Cow::Borrowed("system"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role→permission policy.
///
/// Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut perms = Vec::new();
    for role in roles {
        match role.as_str() {
            "admin" => return vec![Permission::wildcard()],
            "system" => {
                perms.push(Permission::ORDERS_READ);
                perms.push(Permission::ORDERS_STATUS_UPDATE);
                perms.push(Permission::ORDERS_PAYMENT_UPDATE);
            }
            "customer" => perms.push(Permission::ORDERS_CANCEL_OWN),
            _ => {}
        }
    }
    perms.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    perms.dedup();
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_wildcard() {
        let perms = permissions_for_roles(&[Role::customer(), Role::admin()]);
        assert_eq!(perms, vec![Permission::wildcard()]);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(permissions_for_roles(&[Role::new("viewer")]).is_empty());
    }

    #[test]
    fn system_cannot_delete_or_annotate() {
        let perms = permissions_for_roles(&[Role::system()]);
        assert!(perms.contains(&Permission::ORDERS_STATUS_UPDATE));
        assert!(!perms.contains(&Permission::ORDERS_DELETE));
        assert!(!perms.contains(&Permission::ORDERS_ADMIN_NOTES));
    }
}
