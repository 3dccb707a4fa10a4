// BackofficeKernel - the assembled auth core
//
// Wires the domain services over one set of BackofficeDeps. The notification
// center doubles as the notifier every service reports through.

use std::sync::Arc;

use super::deps::BackofficeDeps;
use crate::config::AuthSettings;
use crate::domains::approvals::ApprovalQueue;
use crate::domains::audit::AuditLogSink;
use crate::domains::auth::{IdentityStore, MockCredentialVerifier};
use crate::domains::notifications::NotificationCenter;

pub struct BackofficeKernel {
    pub identity: Arc<IdentityStore>,
    pub audit: Arc<AuditLogSink>,
    pub approvals: Arc<ApprovalQueue>,
    pub notifications: Arc<NotificationCenter>,
    pub settings: AuthSettings,
}

impl BackofficeKernel {
    pub fn new(deps: BackofficeDeps) -> Self {
        let notifications = Arc::new(NotificationCenter::new(
            deps.store.clone(),
            deps.clock.clone(),
        ));
        let audit = Arc::new(AuditLogSink::new(
            deps.store.clone(),
            deps.clock.clone(),
            deps.retention.clone(),
        ));
        let verifier = Arc::new(MockCredentialVerifier::new(
            deps.otp_sender.clone(),
            notifications.clone(),
            deps.credentials.clone(),
            deps.settings.latency,
        ));
        let identity = IdentityStore::new(
            deps.store.clone(),
            verifier,
            notifications.clone(),
            deps.clock.clone(),
            audit.clone(),
            deps.settings,
        );
        let approvals = Arc::new(ApprovalQueue::new(
            deps.store,
            deps.clock,
            identity.clone(),
            audit.clone(),
            notifications.clone(),
        ));

        Self {
            identity,
            audit,
            approvals,
            notifications,
            settings: deps.settings,
        }
    }
}
