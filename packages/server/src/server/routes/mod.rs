//! Logical route surface of the back office.
//!
//! Paths match the dashboard URLs. Each route has a [`RouteGuard`] that the
//! authorization gate (`server::middleware::route_guard`) evaluates.

use std::fmt;

use crate::common::AdminCapability;
use crate::domains::auth::models::Role;

macro_rules! sections {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $slug:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn slug(&self) -> &'static str {
                match self {
                    $($name::$variant => $slug),+
                }
            }

            pub fn from_slug(slug: &str) -> Option<Self> {
                match slug {
                    $($slug => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

sections!(
    /// `/requests/<status>`
    RequestStatus {
        Pending => "pending",
        Completed => "completed",
        Rejected => "rejected",
    }
);

sections!(
    /// `/merchant/<section>`
    MerchantSection {
        Transactions => "transactions",
        Reports => "reports",
        Business => "business",
        Settings => "settings",
    }
);

sections!(
    /// `/agent/<section>`
    AgentSection {
        Transfer => "transfer",
        Airtime => "airtime",
        Transactions => "transactions",
        Settings => "settings",
    }
);

sections!(
    /// `/admin-dashboard/<section>`
    AdminSection {
        Approvals => "approvals",
        Users => "users",
        Merchants => "merchants",
        Agents => "agents",
        Transactions => "transactions",
        Reports => "reports",
        Settings => "settings",
    }
);

sections!(
    /// `/superadmin-dashboard/<section>`
    SuperAdminSection {
        Users => "users",
        Admins => "admins",
        Logs => "logs",
        Approvals => "approvals",
        Notifications => "notifications",
        Security => "security",
        Settings => "settings",
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    AdminLogin,
    SuperAdminLogin,
    Terms,
    NeutralDashboard,
    ServiceRequest,
    Requests(RequestStatus),
    MerchantDashboard,
    Merchant(MerchantSection),
    AgentDashboard,
    Agent(AgentSection),
    AdminDashboard,
    Admin(AdminSection),
    SuperAdminDashboard,
    SuperAdmin(SuperAdminSection),
}

/// Requirements for entering a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    /// Public routes skip every other check.
    pub requires_principal: bool,
    /// Empty means any logged-in principal.
    pub required_roles: &'static [Role],
    /// Checked only when the principal is an admin.
    pub required_permissions: &'static [AdminCapability],
    pub require_accepted_terms: bool,
}

const CUSTOMER_ROLES: &[Role] = &[Role::Neutral, Role::Admin, Role::Merchant, Role::Agent];

impl RouteGuard {
    pub const PUBLIC: RouteGuard = RouteGuard {
        requires_principal: false,
        required_roles: &[],
        required_permissions: &[],
        require_accepted_terms: false,
    };

    pub const fn roles(required_roles: &'static [Role]) -> Self {
        RouteGuard {
            requires_principal: true,
            required_roles,
            required_permissions: &[],
            require_accepted_terms: true,
        }
    }

    pub const fn with_permissions(
        mut self,
        required_permissions: &'static [AdminCapability],
    ) -> Self {
        self.required_permissions = required_permissions;
        self
    }

    pub const fn without_terms(mut self) -> Self {
        self.require_accepted_terms = false;
        self
    }
}

impl Route {
    /// Dashboard root for a role.
    pub fn home_for(role: Role) -> Route {
        match role {
            Role::Neutral => Route::NeutralDashboard,
            Role::Merchant => Route::MerchantDashboard,
            Role::Agent => Route::AgentDashboard,
            Role::Admin => Route::AdminDashboard,
            Role::SuperAdmin => Route::SuperAdminDashboard,
        }
    }

    /// Login page for the most privileged of `roles`.
    pub fn login_for(roles: &[Role]) -> Route {
        match roles.iter().max_by_key(|role| role.rank()) {
            Some(Role::SuperAdmin) => Route::SuperAdminLogin,
            Some(Role::Admin) => Route::AdminLogin,
            _ => Route::Login,
        }
    }

    pub fn guard(&self) -> RouteGuard {
        match self {
            Route::Home | Route::Login | Route::AdminLogin | Route::SuperAdminLogin => {
                RouteGuard::PUBLIC
            }
            Route::Terms => RouteGuard::roles(&[]).without_terms(),
            Route::NeutralDashboard | Route::ServiceRequest | Route::Requests(_) => {
                RouteGuard::roles(CUSTOMER_ROLES)
            }
            Route::MerchantDashboard | Route::Merchant(_) => RouteGuard::roles(&[Role::Merchant]),
            Route::AgentDashboard | Route::Agent(_) => RouteGuard::roles(&[Role::Agent]),
            Route::AdminDashboard => RouteGuard::roles(&[Role::Admin]),
            Route::Admin(AdminSection::Merchants) => RouteGuard::roles(&[Role::Admin])
                .with_permissions(&[AdminCapability::AcceptMerchants]),
            Route::Admin(AdminSection::Agents) => RouteGuard::roles(&[Role::Admin])
                .with_permissions(&[AdminCapability::AcceptAgents]),
            Route::Admin(_) => RouteGuard::roles(&[Role::Admin]),
            Route::SuperAdminDashboard | Route::SuperAdmin(_) => {
                RouteGuard::roles(&[Role::SuperAdmin])
            }
        }
    }

    /// Views inside the admin or superAdmin subtrees. Entering one counts as
    /// session activity.
    pub fn is_elevated_area(&self) -> bool {
        matches!(
            self,
            Route::AdminDashboard
                | Route::Admin(_)
                | Route::SuperAdminDashboard
                | Route::SuperAdmin(_)
        )
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::AdminLogin => "/admin-login".to_string(),
            Route::SuperAdminLogin => "/superadmin-login".to_string(),
            Route::Terms => "/terms".to_string(),
            Route::NeutralDashboard => "/neutral-dashboard".to_string(),
            Route::ServiceRequest => "/service-request".to_string(),
            Route::Requests(status) => format!("/requests/{}", status.slug()),
            Route::MerchantDashboard => "/merchant-dashboard".to_string(),
            Route::Merchant(section) => format!("/merchant/{}", section.slug()),
            Route::AgentDashboard => "/agent-dashboard".to_string(),
            Route::Agent(section) => format!("/agent/{}", section.slug()),
            Route::AdminDashboard => "/admin-dashboard".to_string(),
            Route::Admin(section) => format!("/admin-dashboard/{}", section.slug()),
            Route::SuperAdminDashboard => "/superadmin-dashboard".to_string(),
            Route::SuperAdmin(section) => format!("/superadmin-dashboard/{}", section.slug()),
        }
    }

    pub fn parse(path: &str) -> Option<Route> {
        let trimmed = path.trim().trim_end_matches('/');
        let mut parts = trimmed.trim_start_matches('/').splitn(2, '/');
        let head = parts.next().unwrap_or_default();
        let rest = parts.next();

        match (head, rest) {
            ("", None) | ("index", None) => Some(Route::Home),
            ("login", None) => Some(Route::Login),
            ("admin-login", None) => Some(Route::AdminLogin),
            ("superadmin-login", None) => Some(Route::SuperAdminLogin),
            ("terms", None) => Some(Route::Terms),
            ("neutral-dashboard", None) => Some(Route::NeutralDashboard),
            ("neutral-dashboard", Some("service-request")) | ("service-request", None) => {
                Some(Route::ServiceRequest)
            }
            ("requests", Some(status)) => RequestStatus::from_slug(status).map(Route::Requests),
            ("merchant-dashboard", None) => Some(Route::MerchantDashboard),
            ("merchant", Some(section)) => {
                MerchantSection::from_slug(section).map(Route::Merchant)
            }
            ("agent-dashboard", None) => Some(Route::AgentDashboard),
            ("agent", Some(section)) => AgentSection::from_slug(section).map(Route::Agent),
            ("admin-dashboard", None) => Some(Route::AdminDashboard),
            ("admin-dashboard", Some(section)) => {
                AdminSection::from_slug(section).map(Route::Admin)
            }
            ("superadmin-dashboard", None) => Some(Route::SuperAdminDashboard),
            ("superadmin-dashboard", Some(section)) => {
                SuperAdminSection::from_slug(section).map(Route::SuperAdmin)
            }
            _ => None,
        }
    }

    /// Every route, for exhaustive checks.
    pub fn all() -> Vec<Route> {
        let mut routes = vec![
            Route::Home,
            Route::Login,
            Route::AdminLogin,
            Route::SuperAdminLogin,
            Route::Terms,
            Route::NeutralDashboard,
            Route::ServiceRequest,
            Route::MerchantDashboard,
            Route::AgentDashboard,
            Route::AdminDashboard,
            Route::SuperAdminDashboard,
        ];
        routes.extend(RequestStatus::ALL.iter().copied().map(Route::Requests));
        routes.extend(MerchantSection::ALL.iter().copied().map(Route::Merchant));
        routes.extend(AgentSection::ALL.iter().copied().map(Route::Agent));
        routes.extend(AdminSection::ALL.iter().copied().map(Route::Admin));
        routes.extend(SuperAdminSection::ALL.iter().copied().map(Route::SuperAdmin));
        routes
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_path_parses_back() {
        for route in Route::all() {
            assert_eq!(Route::parse(&route.path()), Some(route), "{}", route);
        }
    }

    #[test]
    fn test_parse_tolerates_trailing_slash_and_aliases() {
        assert_eq!(
            Route::parse("/admin-dashboard/merchants/"),
            Some(Route::Admin(AdminSection::Merchants))
        );
        assert_eq!(
            Route::parse("/neutral-dashboard/service-request"),
            Some(Route::ServiceRequest)
        );
        assert_eq!(Route::parse("/index"), Some(Route::Home));
        assert_eq!(Route::parse("/admin-dashboard/nope"), None);
        assert_eq!(Route::parse("/dev/admin"), None);
    }

    #[test]
    fn test_login_for_picks_most_privileged() {
        assert_eq!(
            Route::login_for(&[Role::Admin, Role::SuperAdmin]),
            Route::SuperAdminLogin
        );
        assert_eq!(Route::login_for(&[Role::Admin]), Route::AdminLogin);
        assert_eq!(Route::login_for(CUSTOMER_ROLES), Route::AdminLogin);
        assert_eq!(Route::login_for(&[Role::Merchant]), Route::Login);
        assert_eq!(Route::login_for(&[]), Route::Login);
    }

    #[test]
    fn test_admin_sections_with_permissions() {
        assert_eq!(
            Route::Admin(AdminSection::Agents).guard().required_permissions,
            &[AdminCapability::AcceptAgents]
        );
        assert!(Route::Admin(AdminSection::Users)
            .guard()
            .required_permissions
            .is_empty());
    }
}
