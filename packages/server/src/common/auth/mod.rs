/// Authorization module for the back office
///
/// Provides a fluent API for write-side permission checks:
///
/// ```rust,ignore
/// use backoffice_core::common::auth::{Actor, AdminCapability};
///
/// Actor::new(&principal)
///     .can(AdminCapability::AcceptMerchants)
///     .check()?;
/// ```
///
/// Route-level checks (which view a principal may enter) live in
/// `server::middleware::route_guard`; this module answers "may this principal
/// perform that action".

mod builder;
mod capability;
mod errors;

pub use builder::{Actor, CapabilityBuilder};
pub use capability::AdminCapability;
pub use errors::{AuthError, ErrorCategory};
