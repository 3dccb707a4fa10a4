use super::{AdminCapability, AuthError};
use crate::domains::auth::models::Principal;
use tracing::debug;

/// Entry point for authorization checks
///
/// Usage:
/// ```rust,ignore
/// Actor::new(&principal)
///     .can(AdminCapability::AcceptAgents)
///     .check()?;
/// ```
pub struct Actor<'a> {
    principal: Option<&'a Principal>,
}

impl<'a> Actor<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// An actor that may or may not be logged in.
    pub fn maybe(principal: Option<&'a Principal>) -> Self {
        Self { principal }
    }

    /// Specify what capability the actor needs
    pub fn can(self, capability: AdminCapability) -> CapabilityBuilder<'a> {
        CapabilityBuilder {
            principal: self.principal,
            capability,
        }
    }
}

/// Builder after specifying capability
pub struct CapabilityBuilder<'a> {
    principal: Option<&'a Principal>,
    capability: AdminCapability,
}

impl<'a> CapabilityBuilder<'a> {
    /// Perform the authorization check, returning the principal on success.
    pub fn check(self) -> Result<&'a Principal, AuthError> {
        let principal = self
            .principal
            .ok_or_else(|| AuthError::unauthorized("login required"))?;

        if self.capability.is_granted_to(principal) {
            Ok(principal)
        } else {
            debug!(
                principal = %principal.id.short(),
                role = %principal.role(),
                capability = ?self.capability,
                "Capability check denied"
            );
            Err(AuthError::unauthorized(format!(
                "{} requires permission to {}",
                principal.role(),
                self.capability.describe()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PrincipalId;
    use crate::domains::auth::models::{AdminPermissions, Principal, Profile, Role, RoleGrant};

    fn principal(grant: RoleGrant) -> Principal {
        let profile = Profile::builder()
            .first_name("Test")
            .last_name("User")
            .username("tester")
            .phone_number("+233200000001".to_string())
            .build();
        let mut principal = Principal::new_neutral(profile, true, chrono::Utc::now());
        principal.grant = grant;
        principal
    }

    fn admin(merchants: bool, agents: bool) -> Principal {
        principal(RoleGrant::Admin {
            admin_permissions: AdminPermissions {
                can_accept_merchants: merchants,
                can_accept_agents: agents,
                created_by: PrincipalId::new(),
            },
        })
    }

    #[test]
    fn test_super_admin_has_everything() {
        let root = principal(RoleGrant::SuperAdmin);
        assert!(Actor::new(&root).can(AdminCapability::FullAdmin).check().is_ok());
        assert!(Actor::new(&root)
            .can(AdminCapability::AcceptMerchants)
            .check()
            .is_ok());
    }

    #[test]
    fn test_admin_acceptance_follows_flags() {
        let admin = admin(true, false);
        assert!(Actor::new(&admin)
            .can(AdminCapability::AcceptMerchants)
            .check()
            .is_ok());
        assert!(matches!(
            Actor::new(&admin).can(AdminCapability::AcceptAgents).check(),
            Err(AuthError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_admin_is_not_full_admin() {
        let admin = admin(true, true);
        assert!(Actor::new(&admin)
            .can(AdminCapability::FullAdmin)
            .check()
            .is_err());
    }

    #[test]
    fn test_non_admin_rejected() {
        let merchant = principal(RoleGrant::Merchant);
        assert_eq!(merchant.role(), Role::Merchant);
        assert!(matches!(
            Actor::new(&merchant).can(AdminCapability::ReviewRequests).check(),
            Err(AuthError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_anonymous_rejected() {
        assert!(matches!(
            Actor::maybe(None).can(AdminCapability::ManageUsers).check(),
            Err(AuthError::Unauthorized(_))
        ));
    }
}
