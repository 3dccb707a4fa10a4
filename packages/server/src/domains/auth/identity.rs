//! Identity store.
//!
//! Single source of truth for who is logged in and for the registry of every
//! provisioned principal. All writes to the current principal and the
//! registry go through here, under one async write lock, using versioned
//! saves against the version that was read.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::models::{
    redacted, AdminPermissions, PermissionGrant, PermissionUpdate, Principal, Profile, Role,
    RoleGrant,
};
use super::session::{ActivityKind, SessionManager, SessionState, SessionWatch};
use crate::common::{Actor, AdminCapability, AuthError, PrincipalId};
use crate::config::AuthSettings;
use crate::domains::audit::{AuditAction, AuditLogSink, AuditSubject, NewAuditEvent};
use crate::domains::notifications::Notice;
use crate::kernel::store::{load, save, StateKey};
use crate::kernel::{
    BaseClock, BaseCredentialVerifier, BaseNotifier, BaseStateStore, PhoneLookup,
    VerifiedIdentity,
};
use crate::server::{authorize, Access, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogoutReason {
    Requested,
    SessionExpired,
    Replaced,
}

impl LogoutReason {
    fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::Requested => "requested",
            LogoutReason::SessionExpired => "session_expired",
            LogoutReason::Replaced => "replaced",
        }
    }
}

/// Who may manage a given target principal.
fn may_manage(caller: &Principal, target_id: &PrincipalId) -> bool {
    AdminCapability::FullAdmin.is_granted_to(caller)
        || (AdminCapability::ManageUsers.is_granted_to(caller) && caller.has_created(target_id))
}

pub struct IdentityStore {
    me: Weak<IdentityStore>,
    store: Arc<dyn BaseStateStore>,
    verifier: Arc<dyn BaseCredentialVerifier>,
    notifier: Arc<dyn BaseNotifier>,
    clock: Arc<dyn BaseClock>,
    audit: Arc<AuditLogSink>,
    session: SessionManager,
    settings: AuthSettings,
    write_lock: Mutex<()>,
    watch: Mutex<Option<SessionWatch>>,
}

impl IdentityStore {
    pub fn new(
        store: Arc<dyn BaseStateStore>,
        verifier: Arc<dyn BaseCredentialVerifier>,
        notifier: Arc<dyn BaseNotifier>,
        clock: Arc<dyn BaseClock>,
        audit: Arc<AuditLogSink>,
        settings: AuthSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            session: SessionManager::new(store.clone(), clock.clone(), settings.session_timeout),
            store,
            verifier,
            notifier,
            clock,
            audit,
            settings,
            write_lock: Mutex::new(()),
            watch: Mutex::new(None),
        })
    }

    // =========================================================================
    // Credential checks (delegated)
    // =========================================================================

    pub async fn verify_phone_exists(&self, phone_number: &str) -> PhoneLookup {
        self.verifier.verify_phone_exists(phone_number).await
    }

    pub async fn request_otp(&self, phone_number: &str) -> bool {
        self.verifier.request_otp(phone_number).await
    }

    pub async fn verify_otp(&self, phone_number: &str, code: &str) -> bool {
        self.verifier.verify_otp(phone_number, code).await
    }

    // =========================================================================
    // Login / signup / logout
    // =========================================================================

    /// Phone + OTP login for non-elevated principals.
    ///
    /// A malformed code fails with `InvalidOtp` and changes nothing. An unknown
    /// number gets a fresh demo principal.
    pub async fn login(&self, phone_number: &str, otp: &str) -> Result<Principal, AuthError> {
        let phone_number = phone_number.trim();
        if !self.verifier.verify_otp(phone_number, otp).await {
            return Err(AuthError::InvalidOtp);
        }
        self.simulate_latency().await;

        let principal = {
            let _guard = self.write_lock.lock().await;
            let (mut registry, version) = self.load_registry().await?;

            let principal = match registry.iter().find(|p| p.has_phone(phone_number)) {
                Some(existing) if existing.is_elevated() => {
                    return Err(AuthError::unauthorized(
                        "elevated accounts sign in with their credentials",
                    ));
                }
                Some(existing) => existing.clone(),
                None => {
                    let profile = Profile::builder()
                        .first_name("Demo")
                        .last_name("User")
                        .username("demouser")
                        .phone_number(phone_number.to_string())
                        .build();
                    let created = Principal::new_neutral(profile, true, self.clock.now());
                    registry.push(created.clone());
                    self.save_registry(&registry, version).await?;
                    debug!(principal = %created.id.short(), "Created principal on first login");
                    created
                }
            };

            self.retire_previous(&principal).await?;
            self.session.clear().await?;
            self.replace_current(&principal).await?;
            principal
        };

        // A previous elevated session must not outlive the switch.
        self.stop_watch().await;

        info!(
            principal = %principal.id.short(),
            phone = %redacted(phone_number),
            role = %principal.role(),
            "Login successful"
        );
        self.notifier
            .notify(Notice::success(
                "Login successful",
                "You have been logged in successfully",
            ))
            .await;
        Ok(principal)
    }

    pub async fn admin_login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        self.elevated_login(Role::Admin, identifier, password).await
    }

    pub async fn super_admin_login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        self.elevated_login(Role::SuperAdmin, identifier, password)
            .await
    }

    async fn elevated_login(
        &self,
        role: Role,
        identifier: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let identifier = identifier.trim();
        let verified = match role {
            Role::SuperAdmin => self.verifier.verify_super_admin(identifier, password).await,
            _ => self.verifier.verify_admin(identifier, password).await,
        };

        let identity = match verified {
            Ok(identity) => identity,
            Err(e) => {
                warn!(identifier = %redacted(identifier), %role, error = %e, "Login failed");
                self.audit
                    .append(
                        NewAuditEvent::new(
                            AuditSubject::anonymous(identifier, role),
                            AuditAction::LoginFailed,
                        )
                        .with_details(json!({ "reason": "invalid_credentials" })),
                    )
                    .await?;
                self.notifier
                    .notify(Notice::error(
                        "Login Failed",
                        AuthError::InvalidCredentials.user_message(),
                    ))
                    .await;
                return Err(AuthError::InvalidCredentials);
            }
        };
        self.simulate_latency().await;

        let principal = {
            let _guard = self.write_lock.lock().await;
            let (mut registry, version) = self.load_registry().await?;

            let principal = match registry
                .iter()
                .find(|p| p.role() == identity.role && p.is_known_as(&identity.email))
            {
                Some(existing) => existing.clone(),
                None => {
                    let created = self.materialize(&identity);
                    registry.push(created.clone());
                    self.save_registry(&registry, version).await?;
                    created
                }
            };

            // Audited before commit: a failed append leaves nobody logged in.
            self.retire_previous(&principal).await?;
            self.audit
                .append(
                    NewAuditEvent::new(&principal, AuditAction::Login)
                        .with_details(json!({ "method": "password" })),
                )
                .await?;
            self.replace_current(&principal).await?;
            self.session.refresh().await?;
            principal
        };
        self.start_watch().await;

        info!(principal = %principal.id.short(), %role, "Elevated login successful");

        let title = match role {
            Role::SuperAdmin => "Super Admin Login Successful",
            _ => "Admin Login Successful",
        };
        self.notifier
            .notify(Notice::success(
                title,
                format!("Welcome back, {}", principal.display_name()),
            ))
            .await;
        Ok(principal)
    }

    /// Principal for a first-time elevated login.
    ///
    /// Admins provisioned from fixed credentials accept both kinds of
    /// requests and count as their own creator.
    fn materialize(&self, identity: &VerifiedIdentity) -> Principal {
        let id = PrincipalId::new();
        let grant = match identity.role {
            Role::Admin => RoleGrant::Admin {
                admin_permissions: AdminPermissions {
                    can_accept_merchants: true,
                    can_accept_agents: true,
                    created_by: id,
                },
            },
            _ => RoleGrant::SuperAdmin,
        };
        Principal {
            id,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            username: identity.username.clone(),
            phone_number: None,
            email: Some(identity.email.clone()),
            grant,
            accepted_terms: true,
            created_users: Vec::new(),
            created_at: self.clock.now(),
        }
    }

    /// New neutral principal that still has to accept the terms.
    pub async fn signup(&self, profile: Profile) -> Result<Principal, AuthError> {
        profile.validate_for_neutral()?;
        self.simulate_latency().await;

        let principal = {
            let _guard = self.write_lock.lock().await;
            let (mut registry, version) = self.load_registry().await?;
            if let Some(phone) = profile.phone_number.as_deref() {
                if registry.iter().any(|p| p.has_phone(phone)) {
                    return Err(AuthError::Validation(
                        "an account with this phone number already exists".to_string(),
                    ));
                }
            }

            let principal = Principal::new_neutral(profile, false, self.clock.now());
            registry.push(principal.clone());
            self.save_registry(&registry, version).await?;
            self.retire_previous(&principal).await?;
            self.session.clear().await?;
            self.replace_current(&principal).await?;
            principal
        };
        self.stop_watch().await;

        info!(principal = %principal.id.short(), "Account created");
        self.notifier
            .notify(Notice::success(
                "Account created",
                "Your account has been successfully created",
            ))
            .await;
        Ok(principal)
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.end_session(LogoutReason::Requested).await
    }

    async fn end_session(&self, reason: LogoutReason) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        let current = self.load_current().await?;

        // Forced logouts recheck under the lock so only one caller performs it.
        if reason == LogoutReason::SessionExpired {
            let lapsed = match &current {
                Some(principal) if principal.is_elevated() => {
                    !self.session.state().await?.is_active()
                }
                _ => false,
            };
            if !lapsed {
                return Ok(());
            }
        }

        if let Some(principal) = &current {
            self.audit
                .append(
                    NewAuditEvent::new(principal, AuditAction::Logout)
                        .with_details(json!({ "reason": reason.as_str() })),
                )
                .await?;
        }

        // Removing the principal drops the session expiry with it.
        self.store.remove(StateKey::CurrentPrincipal).await?;

        if let Some(principal) = &current {
            match reason {
                LogoutReason::Requested => {
                    info!(principal = %principal.id.short(), "Logged out");
                    self.notifier
                        .notify(Notice::info(
                            "Logged out",
                            "You have been logged out successfully",
                        ))
                        .await;
                }
                LogoutReason::SessionExpired => {
                    warn!(principal = %principal.id.short(), "Session expired, forced logout");
                    self.notifier
                        .notify(Notice::warning(
                            "Session expired",
                            AuthError::SessionExpired.user_message(),
                        ))
                        .await;
                }
                LogoutReason::Replaced => {}
            }
        }

        // Last: when called from the watch itself this aborts the calling task.
        self.stop_watch().await;
        Ok(())
    }

    // =========================================================================
    // Self-service
    // =========================================================================

    /// Mark the terms as accepted. No-op without a current principal.
    pub async fn accept_terms(&self) -> Result<Option<Principal>, AuthError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut principal) = self.load_current().await? else {
            return Ok(None);
        };
        if principal.accepted_terms {
            return Ok(Some(principal));
        }

        principal.accepted_terms = true;
        self.store_principal(&principal).await?;
        self.audit
            .append(NewAuditEvent::new(&principal, AuditAction::TermsAccepted))
            .await?;
        info!(principal = %principal.id.short(), "Terms accepted");
        Ok(Some(principal))
    }

    /// Demo-only role switch on the current principal.
    ///
    /// There is no authorization check: any logged-in principal can move
    /// itself between neutral, merchant, agent and admin. SuperAdmin can
    /// neither be entered nor left this way. Every switch is audited as
    /// `role_changed` with `demo: true`.
    pub async fn update_user_role(&self, role: Role) -> Result<Option<Principal>, AuthError> {
        if role == Role::SuperAdmin {
            return Err(AuthError::unauthorized(
                "superAdmin cannot be assumed through a role switch",
            ));
        }

        let principal = {
            let _guard = self.write_lock.lock().await;
            let Some(mut principal) = self.load_current().await? else {
                return Ok(None);
            };
            let previous = principal.role();
            if previous == Role::SuperAdmin {
                return Err(AuthError::unauthorized(
                    "superAdmin cannot switch roles",
                ));
            }
            if previous == role {
                return Ok(Some(principal));
            }

            warn!(
                principal = %principal.id.short(),
                from = %previous,
                to = %role,
                "Demo role switch without authorization check"
            );
            principal.grant = match RoleGrant::plain(role) {
                Some(grant) => grant,
                None => RoleGrant::Admin {
                    admin_permissions: AdminPermissions {
                        can_accept_merchants: false,
                        can_accept_agents: false,
                        created_by: principal.id,
                    },
                },
            };
            self.store_principal(&principal).await?;

            if role.is_elevated() {
                self.session.refresh().await?;
            } else {
                self.session.clear().await?;
            }

            self.audit
                .append(
                    NewAuditEvent::new(&principal, AuditAction::RoleChanged).with_details(json!({
                        "from": previous,
                        "to": role,
                        "demo": true,
                    })),
                )
                .await?;
            principal
        };

        if role.is_elevated() {
            self.start_watch().await;
        } else {
            self.stop_watch().await;
        }

        let label = role.to_string();
        let mut chars = label.chars();
        let label = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => label,
        };
        self.notifier
            .notify(Notice::info(
                "Role Updated",
                format!("Your role has been updated to {}", label),
            ))
            .await;
        Ok(Some(principal))
    }

    // =========================================================================
    // Registry management (admin / superAdmin)
    // =========================================================================

    /// Provision a neutral principal owned by the caller.
    pub async fn create_user(&self, profile: Profile) -> Result<Principal, AuthError> {
        profile.validate_for_neutral()?;
        self.simulate_latency().await;
        self.require_live_session().await?;

        let _guard = self.write_lock.lock().await;
        let caller = self.require_current().await?;
        if Actor::new(&caller)
            .can(AdminCapability::ManageUsers)
            .check()
            .is_err()
        {
            return self.deny(&caller, "Only admins can create users").await;
        }

        let (mut registry, version) = self.load_registry().await?;
        if let Some(phone) = profile.phone_number.as_deref() {
            if registry.iter().any(|p| p.has_phone(phone)) {
                return Err(AuthError::Validation(
                    "an account with this phone number already exists".to_string(),
                ));
            }
        }

        let created = Principal::new_neutral(profile, false, self.clock.now());
        let owner = registry
            .iter_mut()
            .find(|p| p.id == caller.id)
            .ok_or(AuthError::NotFound(caller.id))?;
        owner.record_created(created.id);
        let owner = owner.clone();
        registry.push(created.clone());

        self.save_registry(&registry, version).await?;
        self.sync_current(&owner).await?;

        self.audit
            .append(
                NewAuditEvent::new(&owner, AuditAction::UserCreated).with_details(json!({
                    "createdUserId": created.id,
                    "createdUsername": created.username,
                })),
            )
            .await?;
        info!(
            caller = %owner.id.short(),
            created = %created.id.short(),
            "User created"
        );
        self.notifier
            .notify(Notice::success(
                "User Created",
                format!("{} has been created", created.display_name()),
            ))
            .await;
        Ok(created)
    }

    /// Promote a principal to admin.
    ///
    /// Allowed for a superAdmin, or for an admin who created the target.
    /// Anything else returns `Ok(false)` without touching the registry.
    pub async fn promote_to_admin(
        &self,
        user_id: PrincipalId,
        permissions: PermissionGrant,
    ) -> Result<bool, AuthError> {
        self.simulate_latency().await;
        self.require_live_session().await?;

        let _guard = self.write_lock.lock().await;
        let caller = self.require_current().await?;
        let (mut registry, version) = self.load_registry().await?;
        let caller = Self::fresh(&registry, caller);

        let target_is_super_admin = registry
            .iter()
            .any(|p| p.id == user_id && p.role() == Role::SuperAdmin);
        if target_is_super_admin || !may_manage(&caller, &user_id) {
            return self
                .refuse(&caller, "You cannot promote this user to admin")
                .await;
        }

        let target = registry
            .iter_mut()
            .find(|p| p.id == user_id)
            .ok_or(AuthError::NotFound(user_id))?;
        if target.role() == Role::Admin {
            return Err(AuthError::Validation(
                "user is already an admin; update their permissions instead".to_string(),
            ));
        }

        target.grant = RoleGrant::Admin {
            admin_permissions: AdminPermissions::granted(permissions, caller.id),
        };
        let target = target.clone();

        self.save_registry(&registry, version).await?;
        self.sync_current(&target).await?;

        self.audit
            .append(
                NewAuditEvent::new(&caller, AuditAction::UserPromotedToAdmin).with_details(
                    json!({
                        "targetUserId": target.id,
                        "targetUsername": target.username,
                        "permissions": permissions,
                    }),
                ),
            )
            .await?;
        info!(
            caller = %caller.id.short(),
            target = %target.id.short(),
            "User promoted to admin"
        );
        self.notifier
            .notify(Notice::success(
                "User Promoted",
                format!("{} is now an admin", target.display_name()),
            ))
            .await;
        Ok(true)
    }

    /// Merge permission flags into an admin. Same rule as promotion.
    pub async fn update_admin_permissions(
        &self,
        admin_id: PrincipalId,
        update: PermissionUpdate,
    ) -> Result<bool, AuthError> {
        self.simulate_latency().await;
        self.require_live_session().await?;

        let _guard = self.write_lock.lock().await;
        let caller = self.require_current().await?;
        let (mut registry, version) = self.load_registry().await?;
        let caller = Self::fresh(&registry, caller);

        if !may_manage(&caller, &admin_id) {
            return self
                .refuse(&caller, "You cannot change this admin's permissions")
                .await;
        }

        let target = registry
            .iter_mut()
            .find(|p| p.id == admin_id)
            .ok_or(AuthError::NotFound(admin_id))?;
        let Some(permissions) = target.admin_permissions_mut() else {
            return Err(AuthError::Validation(format!(
                "{} is not an admin",
                target.username
            )));
        };
        permissions.merge(update);
        let result = permissions.clone();
        let target = target.clone();

        self.save_registry(&registry, version).await?;
        self.sync_current(&target).await?;

        self.audit
            .append(
                NewAuditEvent::new(&caller, AuditAction::AdminPermissionsUpdated).with_details(
                    json!({
                        "targetUserId": target.id,
                        "targetUsername": target.username,
                        "changes": update,
                        "permissions": result,
                    }),
                ),
            )
            .await?;
        info!(
            caller = %caller.id.short(),
            target = %target.id.short(),
            "Admin permissions updated"
        );
        self.notifier
            .notify(Notice::success(
                "Permissions Updated",
                format!("Permissions for {} have been updated", target.display_name()),
            ))
            .await;
        Ok(true)
    }

    /// Remove a principal from the registry.
    ///
    /// SuperAdmins are never deletable. Admins may delete only principals they
    /// created.
    pub async fn delete_user(&self, user_id: PrincipalId) -> Result<bool, AuthError> {
        self.simulate_latency().await;
        self.require_live_session().await?;

        let _guard = self.write_lock.lock().await;
        let caller = self.require_current().await?;
        let (mut registry, version) = self.load_registry().await?;
        let caller = Self::fresh(&registry, caller);

        let target_is_super_admin = registry
            .iter()
            .any(|p| p.id == user_id && p.role() == Role::SuperAdmin);
        if target_is_super_admin || !may_manage(&caller, &user_id) {
            return self.refuse(&caller, "You cannot delete this user").await;
        }

        let position = registry
            .iter()
            .position(|p| p.id == user_id)
            .ok_or(AuthError::NotFound(user_id))?;
        let removed = registry.remove(position);
        for principal in registry.iter_mut() {
            principal.forget_created(&user_id);
        }
        let caller = Self::fresh(&registry, caller);

        self.save_registry(&registry, version).await?;
        self.sync_current(&caller).await?;

        self.audit
            .append(
                NewAuditEvent::new(&caller, AuditAction::UserDeleted).with_details(json!({
                    "targetUserId": removed.id,
                    "targetUsername": removed.username,
                    "targetRole": removed.role(),
                })),
            )
            .await?;
        info!(
            caller = %caller.id.short(),
            target = %removed.id.short(),
            "User deleted"
        );
        self.notifier
            .notify(Notice::success(
                "User Deleted",
                format!("{} has been deleted", removed.display_name()),
            ))
            .await;
        Ok(true)
    }

    /// Registry projection visible to the caller.
    ///
    /// SuperAdmins see everyone. Admins see the principals they created plus
    /// every non-elevated principal. `created_only` narrows both to the
    /// caller's own `createdUsers`.
    pub async fn get_users(&self, created_only: bool) -> Result<Vec<Principal>, AuthError> {
        self.require_live_session().await?;
        let caller = self.require_current().await?;
        let (registry, _) = self.load_registry().await?;
        let caller = Self::fresh(&registry, caller);

        let visible: Vec<Principal> = match caller.role() {
            Role::SuperAdmin | Role::Admin if created_only => registry
                .into_iter()
                .filter(|p| caller.has_created(&p.id))
                .collect(),
            Role::SuperAdmin => registry,
            Role::Admin => registry
                .into_iter()
                .filter(|p| caller.has_created(&p.id) || !p.is_elevated())
                .collect(),
            _ => {
                return Err(AuthError::unauthorized(
                    "only admins can list users",
                ))
            }
        };
        Ok(visible)
    }

    /// Role change after an approved service request. The caller has already
    /// been authorized by the approvals queue.
    pub async fn grant_service_role(
        &self,
        requester_id: PrincipalId,
        role: Role,
    ) -> Result<Principal, AuthError> {
        if !matches!(role, Role::Merchant | Role::Agent) {
            return Err(AuthError::Validation(format!(
                "service requests cannot grant {}",
                role
            )));
        }

        let _guard = self.write_lock.lock().await;
        let (mut registry, version) = self.load_registry().await?;
        let target = registry
            .iter_mut()
            .find(|p| p.id == requester_id)
            .ok_or(AuthError::NotFound(requester_id))?;
        if target.is_elevated() {
            return Err(AuthError::Validation(format!(
                "{} already holds an elevated role",
                target.username
            )));
        }
        if let Some(grant) = RoleGrant::plain(role) {
            target.grant = grant;
        }
        let target = target.clone();

        self.save_registry(&registry, version).await?;
        self.sync_current(&target).await?;
        info!(principal = %target.id.short(), %role, "Service role granted");
        Ok(target)
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub async fn current(&self) -> Result<Option<Principal>, AuthError> {
        self.load_current().await
    }

    pub async fn session_state(&self) -> Result<SessionState, AuthError> {
        Ok(self.session.state().await?)
    }

    /// Non-elevated principals have an always-valid session.
    pub async fn session_valid(&self) -> Result<bool, AuthError> {
        match self.load_current().await? {
            None => Ok(false),
            Some(principal) if !principal.is_elevated() => Ok(true),
            Some(_) => Ok(self.session.state().await?.is_active()),
        }
    }

    /// Slide the expiry forward. Only for a live elevated session.
    pub async fn refresh_session(&self) -> Result<Option<DateTime<Utc>>, AuthError> {
        let refreshed = {
            let _guard = self.write_lock.lock().await;
            match self.load_current().await? {
                Some(principal) if principal.is_elevated() => {
                    if self.session.state().await?.is_active() {
                        Some(self.session.refresh().await?)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };
        if refreshed.is_some() {
            self.start_watch().await;
        }
        Ok(refreshed)
    }

    /// Activity refreshes the session only while the watch is running.
    pub async fn record_activity(&self, kind: ActivityKind) -> Result<bool, AuthError> {
        if !self.watch_running().await {
            return Ok(false);
        }
        match self.enforce_session().await? {
            SessionState::Active { .. } => {}
            _ => return Ok(false),
        }
        let refreshed = self.refresh_session().await?.is_some();
        debug!(?kind, refreshed, "Activity recorded");
        Ok(refreshed)
    }

    /// Gate a navigation. Expired sessions are logged out first, and entering
    /// an elevated view counts as activity.
    pub async fn enter_route(&self, route: Route) -> Result<Access, AuthError> {
        self.enforce_session().await?;
        let principal = self.load_current().await?;
        let valid = self.session_valid().await?;

        let access = authorize(principal.as_ref(), valid, route);
        if access.is_allowed()
            && route.is_elevated_area()
            && principal.as_ref().is_some_and(Principal::is_elevated)
        {
            self.refresh_session().await?;
        }
        Ok(access)
    }

    /// Check expiry now. Forces logout when an elevated session has lapsed.
    ///
    /// Safe to call repeatedly.
    pub async fn enforce_session(&self) -> Result<SessionState, AuthError> {
        let principal = self.load_current().await?;
        let state = self.session.state().await?;

        match (principal, state) {
            (Some(principal), SessionState::Expired { .. } | SessionState::NoSession)
                if principal.is_elevated() =>
            {
                self.end_session(LogoutReason::SessionExpired).await?;
                Ok(match state {
                    SessionState::NoSession => SessionState::Expired {
                        expired_at: self.clock.now(),
                    },
                    expired => expired,
                })
            }
            (Some(principal), state) if principal.is_elevated() => Ok(state),
            _ => {
                self.stop_watch().await;
                Ok(SessionState::NoSession)
            }
        }
    }

    /// Resume persisted state on startup: logs out a lapsed elevated session
    /// and restarts the watch for a live one.
    pub async fn restore(&self) -> Result<SessionState, AuthError> {
        let state = self.enforce_session().await?;
        if state.is_active() {
            self.start_watch().await;
        }
        Ok(state)
    }

    /// Gate for privileged operations. A lapsed elevated session is logged
    /// out here and the operation refused.
    pub async fn require_live_session(&self) -> Result<(), AuthError> {
        match self.enforce_session().await? {
            SessionState::Expired { .. } => Err(AuthError::unauthorized(
                "session expired, please log in again",
            )),
            _ => Ok(()),
        }
    }

    pub async fn watch_running(&self) -> bool {
        self.watch
            .lock()
            .await
            .as_ref()
            .is_some_and(SessionWatch::is_running)
    }

    async fn start_watch(&self) {
        let mut watch = self.watch.lock().await;
        if watch.as_ref().is_some_and(SessionWatch::is_running) {
            return;
        }
        *watch = Some(SessionWatch::spawn(
            self.me.clone(),
            self.settings.poll_interval,
        ));
    }

    async fn stop_watch(&self) {
        let stopped = self.watch.lock().await.take();
        if stopped.is_some() {
            debug!("Session watch stopped");
        }
    }

    // =========================================================================
    // Persistence helpers
    // =========================================================================

    async fn simulate_latency(&self) {
        if !self.settings.latency.is_zero() {
            tokio::time::sleep(self.settings.latency).await;
        }
    }

    async fn load_current(&self) -> Result<Option<Principal>, AuthError> {
        let (principal, _) =
            load::<Principal>(self.store.as_ref(), StateKey::CurrentPrincipal).await?;
        Ok(principal)
    }

    async fn require_current(&self) -> Result<Principal, AuthError> {
        self.load_current()
            .await?
            .ok_or_else(|| AuthError::unauthorized("login required"))
    }

    async fn load_registry(&self) -> Result<(Vec<Principal>, u64), AuthError> {
        let (registry, version) =
            load::<Vec<Principal>>(self.store.as_ref(), StateKey::Registry).await?;
        Ok((registry.unwrap_or_default(), version))
    }

    async fn save_registry(&self, registry: &[Principal], version: u64) -> Result<(), AuthError> {
        save(self.store.as_ref(), StateKey::Registry, &registry, version).await?;
        Ok(())
    }

    async fn replace_current(&self, principal: &Principal) -> Result<(), AuthError> {
        let version = self.store.get(StateKey::CurrentPrincipal).await?.version;
        save(
            self.store.as_ref(),
            StateKey::CurrentPrincipal,
            principal,
            version,
        )
        .await?;
        Ok(())
    }

    /// Audit the end of an elevated session that `next` is about to replace.
    /// Caller holds the write lock.
    async fn retire_previous(&self, next: &Principal) -> Result<(), AuthError> {
        let Some(previous) = self.load_current().await? else {
            return Ok(());
        };
        if previous.id == next.id || !previous.is_elevated() {
            return Ok(());
        }
        self.audit
            .append(
                NewAuditEvent::new(&previous, AuditAction::Logout)
                    .with_details(json!({ "reason": LogoutReason::Replaced.as_str() })),
            )
            .await?;
        info!(
            principal = %previous.id.short(),
            replaced_by = %next.id.short(),
            "Elevated session replaced"
        );
        Ok(())
    }

    /// Rewrite the current principal if it is `updated`.
    async fn sync_current(&self, updated: &Principal) -> Result<(), AuthError> {
        match self.load_current().await? {
            Some(current) if current.id == updated.id && current != *updated => {
                self.replace_current(updated).await
            }
            _ => Ok(()),
        }
    }

    /// Write a changed current principal to the registry first, then as current.
    async fn store_principal(&self, principal: &Principal) -> Result<(), AuthError> {
        let (mut registry, version) = self.load_registry().await?;
        match registry.iter_mut().find(|p| p.id == principal.id) {
            Some(slot) => *slot = principal.clone(),
            None => registry.push(principal.clone()),
        }
        self.save_registry(&registry, version).await?;
        self.replace_current(principal).await
    }

    /// The registry copy of the caller, which has the latest `createdUsers`.
    fn fresh(registry: &[Principal], caller: Principal) -> Principal {
        registry
            .iter()
            .find(|p| p.id == caller.id)
            .cloned()
            .unwrap_or(caller)
    }

    async fn refuse(&self, caller: &Principal, message: &str) -> Result<bool, AuthError> {
        info!(
            caller = %caller.id.short(),
            role = %caller.role(),
            "Permission denied: {}",
            message
        );
        self.notifier
            .notify(Notice::permission_denied(message))
            .await;
        Ok(false)
    }

    async fn deny<T>(&self, caller: &Principal, message: &str) -> Result<T, AuthError> {
        self.refuse(caller, message).await?;
        Err(AuthError::unauthorized(message))
    }
}
