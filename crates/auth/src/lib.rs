//! `shopdesk-auth`: authentication and authorization boundary for the order API.
//!
//! No HTTP or storage dependencies; the API feeds it verified claims.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, permissions_for_roles};
