//! Admin authorization.
//!
//! Backups are an administrator-only surface: both scheduling and lookup
//! require the caller to be an admin.

use std::collections::HashSet;

use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: '{0}' is not an administrator")]
    NotAdmin(String),
}

/// Decides whether a principal may administer backups.
pub trait AdminPolicy: Send + Sync {
    fn is_authorized_admin(&self, principal: &Principal) -> bool;
}

/// Admin if the principal holds any of the configured roles.
#[derive(Debug, Clone)]
pub struct RoleAdminPolicy {
    admin_roles: HashSet<Role>,
}

impl RoleAdminPolicy {
    pub fn new(admin_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            admin_roles: admin_roles.into_iter().collect(),
        }
    }
}

impl Default for RoleAdminPolicy {
    fn default() -> Self {
        Self::new([Role::ADMIN])
    }
}

impl AdminPolicy for RoleAdminPolicy {
    fn is_authorized_admin(&self, principal: &Principal) -> bool {
        principal.roles.iter().any(|r| self.admin_roles.contains(r))
    }
}

/// Policy check as a `Result`, for `?`-style call sites.
pub fn authorize_admin(policy: &dyn AdminPolicy, principal: &Principal) -> Result<(), AuthzError> {
    if policy.is_authorized_admin(principal) {
        Ok(())
    } else {
        tracing::debug!(principal_id = %principal.id, "admin check denied");
        Err(AuthzError::NotAdmin(principal.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrincipalId;

    fn principal(roles: &[&'static str]) -> Principal {
        Principal::new(
            PrincipalId::new(),
            "bob",
            roles.iter().map(|r| Role::new(*r)).collect(),
        )
    }

    #[test]
    fn default_policy_accepts_admin_role_only() {
        let policy = RoleAdminPolicy::default();

        assert!(policy.is_authorized_admin(&principal(&["viewer", "admin"])));
        assert!(!policy.is_authorized_admin(&principal(&["viewer"])));
        assert!(!policy.is_authorized_admin(&principal(&[])));
    }

    #[test]
    fn configured_roles_replace_the_default() {
        let policy = RoleAdminPolicy::new(Role::parse_list("ops,sre"));

        assert!(policy.is_authorized_admin(&principal(&["sre"])));
        assert!(!policy.is_authorized_admin(&principal(&["admin"])));
    }

    #[test]
    fn authorize_admin_reports_the_denied_name() {
        let policy = RoleAdminPolicy::default();

        assert_eq!(
            authorize_admin(&policy, &principal(&["viewer"])),
            Err(AuthzError::NotAdmin("bob".to_string()))
        );
        assert_eq!(authorize_admin(&policy, &principal(&["admin"])), Ok(()));
    }
}
