//! Authorization gate.
//!
//! Decides whether a principal may enter a view and where to send them
//! otherwise. Pure: the same inputs always give the same answer, nothing is
//! read from or written to the store.

use tracing::debug;

use crate::domains::auth::models::{Principal, Role};
use crate::server::routes::{Route, RouteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectTo(Route),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// Gate a route by its own guard.
pub fn authorize(principal: Option<&Principal>, session_valid: bool, route: Route) -> Access {
    let access = authorize_with(principal, session_valid, &route.guard());
    if let Access::RedirectTo(target) = access {
        debug!(route = %route, redirect = %target, "Route access redirected");
    }
    access
}

/// Gate against an explicit guard.
///
/// An invalid session counts as no principal at all.
pub fn authorize_with(
    principal: Option<&Principal>,
    session_valid: bool,
    guard: &RouteGuard,
) -> Access {
    if !guard.requires_principal {
        return Access::Allow;
    }

    let Some(principal) = principal.filter(|_| session_valid) else {
        return Access::RedirectTo(Route::login_for(guard.required_roles));
    };

    if guard.require_accepted_terms && !principal.accepted_terms {
        return Access::RedirectTo(Route::Terms);
    }

    if guard.required_roles.is_empty() {
        return Access::Allow;
    }

    let role = principal.role();
    if !guard.required_roles.contains(&role) {
        return Access::RedirectTo(Route::home_for(role));
    }

    if role == Role::Admin
        && !guard
            .required_permissions
            .iter()
            .all(|capability| capability.is_granted_to(principal))
    {
        return Access::RedirectTo(Route::AdminDashboard);
    }

    Access::Allow
}
