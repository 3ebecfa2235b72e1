//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before the engine
//! runs), while keeping the order domain and infra auth-agnostic.

use shopdesk_auth::{AuthzError, CommandAuthorization, authorize};
use shopdesk_orders::CancellationActor;

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = principal.principal();
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Who a cancellation performed by this principal is attributed to.
pub fn cancellation_actor(principal: &PrincipalContext) -> CancellationActor {
    let principal = principal.principal();

    if principal.has_role("admin") {
        CancellationActor::Admin
    } else if principal.has_role("system") {
        CancellationActor::System
    } else {
        CancellationActor::User
    }
}
