use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::common::{AuthError, PrincipalId};

/// Role of a principal. Exactly one per principal.
///
/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Neutral,
    Merchant,
    Agent,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Neutral,
        Role::Merchant,
        Role::Agent,
        Role::Admin,
        Role::SuperAdmin,
    ];

    /// Admin and superAdmin sessions expire; every other role's session does not.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Privilege rank; higher outranks lower.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Neutral => 0,
            Role::Merchant | Role::Agent => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Neutral => "neutral",
            Role::Merchant => "merchant",
            Role::Agent => "agent",
            Role::Admin => "admin",
            Role::SuperAdmin => "superAdmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "neutral" => Ok(Role::Neutral),
            "merchant" => Ok(Role::Merchant),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::SuperAdmin),
            other => Err(AuthError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

/// Fine-grained flags carried only by admin principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPermissions {
    pub can_accept_merchants: bool,
    pub can_accept_agents: bool,
    pub created_by: PrincipalId,
}

/// Flags requested when promoting a principal to admin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub can_accept_merchants: bool,
    pub can_accept_agents: bool,
}

/// Partial update of an admin's flags; `None` leaves a flag unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionUpdate {
    #[serde(default)]
    pub can_accept_merchants: Option<bool>,
    #[serde(default)]
    pub can_accept_agents: Option<bool>,
}

impl AdminPermissions {
    pub fn granted(grant: PermissionGrant, created_by: PrincipalId) -> Self {
        Self {
            can_accept_merchants: grant.can_accept_merchants,
            can_accept_agents: grant.can_accept_agents,
            created_by,
        }
    }

    pub fn merge(&mut self, update: PermissionUpdate) {
        if let Some(value) = update.can_accept_merchants {
            self.can_accept_merchants = value;
        }
        if let Some(value) = update.can_accept_agents {
            self.can_accept_agents = value;
        }
    }
}

/// Role together with the data only that role may carry.
///
/// Admin permissions exist if and only if the role is admin, because no other
/// variant has a place to put them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum RoleGrant {
    Neutral,
    Merchant,
    Agent,
    Admin {
        #[serde(rename = "adminPermissions")]
        admin_permissions: AdminPermissions,
    },
    SuperAdmin,
}

impl RoleGrant {
    pub fn role(&self) -> Role {
        match self {
            RoleGrant::Neutral => Role::Neutral,
            RoleGrant::Merchant => Role::Merchant,
            RoleGrant::Agent => Role::Agent,
            RoleGrant::Admin { .. } => Role::Admin,
            RoleGrant::SuperAdmin => Role::SuperAdmin,
        }
    }

    /// Grant for a role that carries no extra data.
    ///
    /// Admin needs permissions and a creator; callers that can mint admins go
    /// through [`RoleGrant::Admin`] directly.
    pub fn plain(role: Role) -> Option<Self> {
        match role {
            Role::Neutral => Some(RoleGrant::Neutral),
            Role::Merchant => Some(RoleGrant::Merchant),
            Role::Agent => Some(RoleGrant::Agent),
            Role::SuperAdmin => Some(RoleGrant::SuperAdmin),
            Role::Admin => None,
        }
    }
}

/// Signup / provisioning input.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(setter(into)))]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub phone_number: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub email: Option<String>,
}

impl Profile {
    /// Neutral principals log in by phone, so they must have one.
    pub fn validate_for_neutral(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() {
            return Err(AuthError::Validation("username is required".to_string()));
        }
        match self.phone_number.as_deref().map(str::trim) {
            Some(phone) if !phone.is_empty() => Ok(()),
            _ => Err(AuthError::Validation(
                "phone number is required".to_string(),
            )),
        }
    }
}

/// A principal (user) record, as held in the registry and as the current
/// principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub grant: RoleGrant,
    pub accepted_terms: bool,
    #[serde(default)]
    pub created_users: Vec<PrincipalId>,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn new_neutral(profile: Profile, accepted_terms: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: PrincipalId::new(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            username: profile.username,
            phone_number: profile.phone_number.map(|p| p.trim().to_string()),
            email: None,
            grant: RoleGrant::Neutral,
            accepted_terms,
            created_users: Vec::new(),
            created_at: now,
        }
    }

    pub fn role(&self) -> Role {
        self.grant.role()
    }

    pub fn is_elevated(&self) -> bool {
        self.role().is_elevated()
    }

    pub fn admin_permissions(&self) -> Option<&AdminPermissions> {
        match &self.grant {
            RoleGrant::Admin { admin_permissions } => Some(admin_permissions),
            _ => None,
        }
    }

    pub fn admin_permissions_mut(&mut self) -> Option<&mut AdminPermissions> {
        match &mut self.grant {
            RoleGrant::Admin { admin_permissions } => Some(admin_permissions),
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_created(&self, id: &PrincipalId) -> bool {
        self.created_users.contains(id)
    }

    /// Record a provisioned principal. Self-references and duplicates are
    /// ignored so the created-by chain can never loop back on itself.
    pub fn record_created(&mut self, id: PrincipalId) -> bool {
        if id == self.id || self.has_created(&id) {
            return false;
        }
        self.created_users.push(id);
        true
    }

    pub fn forget_created(&mut self, id: &PrincipalId) {
        self.created_users.retain(|created| created != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::builder()
            .first_name("Ama")
            .last_name("Mensah")
            .username("ama")
            .phone_number("+233201234567".to_string())
            .build()
    }

    #[test]
    fn test_role_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"superAdmin\""
        );
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("Merchant".parse::<Role>().unwrap(), Role::Merchant);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_only_admin_and_super_admin_are_elevated() {
        let elevated: Vec<Role> = Role::ALL.into_iter().filter(Role::is_elevated).collect();
        assert_eq!(elevated, vec![Role::Admin, Role::SuperAdmin]);
    }

    #[test]
    fn test_admin_json_shape() {
        let creator = PrincipalId::new();
        let mut principal = Principal::new_neutral(profile(), true, Utc::now());
        principal.grant = RoleGrant::Admin {
            admin_permissions: AdminPermissions {
                can_accept_merchants: true,
                can_accept_agents: false,
                created_by: creator,
            },
        };

        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["adminPermissions"]["canAcceptMerchants"], true);
        assert_eq!(json["adminPermissions"]["createdBy"], creator.to_string());
        assert_eq!(json["phoneNumber"], "+233201234567");
    }

    #[test]
    fn test_neutral_json_has_no_permissions() {
        let principal = Principal::new_neutral(profile(), false, Utc::now());
        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["role"], "neutral");
        assert!(json.get("adminPermissions").is_none());
        assert!(json.get("email").is_none());
    }

    #[test]
    fn test_persisted_record_reloads_equal() {
        let mut principal = Principal::new_neutral(profile(), true, Utc::now());
        principal.grant = RoleGrant::Admin {
            admin_permissions: AdminPermissions {
                can_accept_merchants: false,
                can_accept_agents: true,
                created_by: PrincipalId::new(),
            },
        };
        principal.record_created(PrincipalId::new());

        let json = serde_json::to_string(&principal).unwrap();
        let reloaded: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, principal);
    }

    #[test]
    fn test_record_created_rejects_self_and_duplicates() {
        let mut principal = Principal::new_neutral(profile(), true, Utc::now());
        let own = principal.id;
        let other = PrincipalId::new();

        assert!(!principal.record_created(own));
        assert!(principal.record_created(other));
        assert!(!principal.record_created(other));
        assert_eq!(principal.created_users, vec![other]);
    }

    #[test]
    fn test_merge_only_touches_given_flags() {
        let mut permissions = AdminPermissions {
            can_accept_merchants: true,
            can_accept_agents: false,
            created_by: PrincipalId::new(),
        };
        permissions.merge(PermissionUpdate {
            can_accept_merchants: None,
            can_accept_agents: Some(true),
        });
        assert!(permissions.can_accept_merchants);
        assert!(permissions.can_accept_agents);
    }

    #[test]
    fn test_neutral_profile_requires_phone() {
        let mut missing = profile();
        missing.phone_number = None;
        assert!(matches!(
            missing.validate_for_neutral(),
            Err(AuthError::Validation(_))
        ));
        assert!(profile().validate_for_neutral().is_ok());
    }
}
