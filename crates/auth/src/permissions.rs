use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.status.update"). The wildcard
/// `"*"` means "allow all".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ORDERS_READ: Permission = Permission(Cow::Borrowed("orders.read"));
    pub const ORDERS_STATUS_UPDATE: Permission = Permission(Cow::Borrowed("orders.status.update"));
    pub const ORDERS_PAYMENT_UPDATE: Permission = Permission(Cow::Borrowed("orders.payment.update"));
    pub const ORDERS_ADMIN_NOTES: Permission = Permission(Cow::Borrowed("orders.admin_notes.update"));
    pub const ORDERS_DELETE: Permission = Permission(Cow::Borrowed("orders.delete"));
    pub const ORDERS_CANCEL_OWN: Permission = Permission(Cow::Borrowed("orders.cancel.own"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn wildcard() -> Self {
        Self(Cow::Borrowed("*"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
