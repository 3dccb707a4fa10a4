// Auth domain - principals, credential checks, identity store, session expiry

pub mod identity;
pub mod models;
pub mod session;
pub mod verifiers;

pub use identity::IdentityStore;
pub use models::{
    AdminPermissions, PermissionGrant, PermissionUpdate, Principal, Profile, Role, RoleGrant,
};
pub use session::{ActivityKind, SessionManager, SessionState, SessionWatch};
pub use verifiers::{CredentialSet, MockCredentialVerifier, StaticCredential};
