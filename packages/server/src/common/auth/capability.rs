use crate::domains::auth::models::{Principal, RoleGrant};

/// Write-side capabilities in the back office.
///
/// SuperAdmins hold every capability. Admins hold the management capabilities
/// plus whichever acceptance flags their `AdminPermissions` grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCapability {
    /// Approve or reject merchant service requests
    AcceptMerchants,

    /// Approve or reject agent service requests
    AcceptAgents,

    /// Provision users and read the registry
    ManageUsers,

    /// Read the service request queue
    ReviewRequests,

    /// Everything, including other admins
    FullAdmin,
}

impl AdminCapability {
    pub fn is_granted_to(&self, principal: &Principal) -> bool {
        match &principal.grant {
            RoleGrant::SuperAdmin => true,
            RoleGrant::Admin { admin_permissions } => match self {
                AdminCapability::AcceptMerchants => admin_permissions.can_accept_merchants,
                AdminCapability::AcceptAgents => admin_permissions.can_accept_agents,
                AdminCapability::ManageUsers | AdminCapability::ReviewRequests => true,
                AdminCapability::FullAdmin => false,
            },
            RoleGrant::Neutral | RoleGrant::Merchant | RoleGrant::Agent => false,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AdminCapability::AcceptMerchants => "accept merchants",
            AdminCapability::AcceptAgents => "accept agents",
            AdminCapability::ManageUsers => "manage users",
            AdminCapability::ReviewRequests => "review service requests",
            AdminCapability::FullAdmin => "full admin access",
        }
    }
}
