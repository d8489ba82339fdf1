//! `strongbox-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and from backup state: it
//! answers "who is calling" (JWT claims) and "may they administer backups"
//! (admin policy).

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod principal;
pub mod roles;

pub use authorize::{AdminPolicy, AuthzError, RoleAdminPolicy, authorize_admin};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{AuthError, Hs256JwtValidator, JwtValidator};
pub use principal::{Principal, PrincipalId};
pub use roles::Role;
