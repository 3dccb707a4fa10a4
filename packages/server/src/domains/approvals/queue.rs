//! Service request queue.
//!
//! Neutral principals apply to become merchants or agents; admins holding the
//! matching acceptance flag (or any superAdmin) approve or reject. Approval
//! changes the requester's role through the identity store.

use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use super::models::{RequestDecision, ServiceApplication, ServiceRequest};
use crate::common::{Actor, AdminCapability, AuthError, ServiceRequestId};
use crate::domains::audit::{AuditAction, AuditLogSink, NewAuditEvent};
use crate::domains::auth::models::{Principal, Role};
use crate::domains::auth::IdentityStore;
use crate::domains::notifications::Notice;
use crate::kernel::store::{load, save, StateKey, StoreError};
use crate::kernel::{BaseClock, BaseNotifier, BaseStateStore};

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Service request not found: {0}")]
    NotFound(ServiceRequestId),

    #[error("Service request {id} was already {decision}")]
    AlreadyDecided {
        id: ServiceRequestId,
        decision: &'static str,
    },

    #[error("A service request is already pending review")]
    AlreadyPending,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Which requests to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionFilter {
    All,
    Pending,
    Approved,
    Rejected,
}

impl DecisionFilter {
    fn matches(&self, decision: &RequestDecision) -> bool {
        match self {
            DecisionFilter::All => true,
            DecisionFilter::Pending => matches!(decision, RequestDecision::Pending),
            DecisionFilter::Approved => matches!(decision, RequestDecision::Approved { .. }),
            DecisionFilter::Rejected => matches!(decision, RequestDecision::Rejected { .. }),
        }
    }
}

pub struct ApprovalQueue {
    store: Arc<dyn BaseStateStore>,
    clock: Arc<dyn BaseClock>,
    identity: Arc<IdentityStore>,
    audit: Arc<AuditLogSink>,
    notifier: Arc<dyn BaseNotifier>,
    lock: Mutex<()>,
}

impl ApprovalQueue {
    pub fn new(
        store: Arc<dyn BaseStateStore>,
        clock: Arc<dyn BaseClock>,
        identity: Arc<IdentityStore>,
        audit: Arc<AuditLogSink>,
        notifier: Arc<dyn BaseNotifier>,
    ) -> Self {
        Self {
            store,
            clock,
            identity,
            audit,
            notifier,
            lock: Mutex::new(()),
        }
    }

    /// Submit an application for the current (neutral) principal.
    pub async fn submit(
        &self,
        application: ServiceApplication,
    ) -> Result<ServiceRequest, ApprovalError> {
        let requester = self.require_current().await?;
        if requester.role() != Role::Neutral {
            return Err(AuthError::unauthorized(format!(
                "a {} cannot apply for a service role",
                requester.role()
            ))
            .into());
        }
        if application.business_name.trim().is_empty() {
            return Err(ApprovalError::Validation(
                "business name is required".to_string(),
            ));
        }
        if application.business_type.trim().is_empty() {
            return Err(ApprovalError::Validation(
                "business type is required".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let (mut requests, version) = self.load_requests().await?;
        if requests
            .iter()
            .any(|r| r.requester_id == requester.id && r.decision.is_pending())
        {
            return Err(ApprovalError::AlreadyPending);
        }

        let request = ServiceRequest {
            id: ServiceRequestId::new(),
            requester_id: requester.id,
            requester_name: requester.display_name(),
            kind: application.kind,
            business_name: application.business_name.trim().to_string(),
            business_type: application.business_type.trim().to_string(),
            description: application.description,
            business_address: application.business_address,
            document_links: application.document_links,
            submitted_at: self.clock.now(),
            decision: RequestDecision::Pending,
        };
        requests.push(request.clone());
        save(self.store.as_ref(), StateKey::ServiceRequests, &requests, version).await?;

        info!(
            request = %request.id.short(),
            requester = %requester.id.short(),
            kind = %request.kind,
            "Service request submitted"
        );
        self.notifier
            .notify(Notice::success(
                "Request Submitted",
                "Your service request has been submitted for review.",
            ))
            .await;
        Ok(request)
    }

    /// Requests visible to reviewers, oldest first.
    pub async fn list(&self, filter: DecisionFilter) -> Result<Vec<ServiceRequest>, ApprovalError> {
        let caller = self.require_current().await?;
        Actor::new(&caller)
            .can(AdminCapability::ReviewRequests)
            .check()?;

        let (requests, _) = self.load_requests().await?;
        Ok(requests
            .into_iter()
            .filter(|r| filter.matches(&r.decision))
            .collect())
    }

    /// The current principal's own requests.
    pub async fn mine(&self) -> Result<Vec<ServiceRequest>, ApprovalError> {
        let caller = self.require_current().await?;
        let (requests, _) = self.load_requests().await?;
        Ok(requests
            .into_iter()
            .filter(|r| r.requester_id == caller.id)
            .collect())
    }

    pub async fn approve(&self, id: ServiceRequestId) -> Result<ServiceRequest, ApprovalError> {
        let caller = self.require_current().await?;

        let _guard = self.lock.lock().await;
        let (mut requests, version) = self.load_requests().await?;
        let request = Self::pending_mut(&mut requests, id)?;
        self.authorize_decision(&caller, request).await?;

        self.identity
            .grant_service_role(request.requester_id, request.kind.role())
            .await?;
        request.decision = RequestDecision::Approved {
            decided_by: caller.id,
            decided_at: self.clock.now(),
        };
        let request = request.clone();
        save(self.store.as_ref(), StateKey::ServiceRequests, &requests, version).await?;

        self.audit
            .append(
                NewAuditEvent::new(&caller, AuditAction::ServiceRequestApproved).with_details(
                    json!({
                        "requestId": request.id,
                        "requesterId": request.requester_id,
                        "serviceType": request.kind,
                    }),
                ),
            )
            .await?;
        info!(request = %request.id.short(), caller = %caller.id.short(), "Service request approved");
        self.notifier
            .notify(Notice::success(
                "Request Approved",
                format!(
                    "{}'s service request has been approved.",
                    request.requester_name
                ),
            ))
            .await;
        Ok(request)
    }

    pub async fn reject(
        &self,
        id: ServiceRequestId,
        reason: &str,
    ) -> Result<ServiceRequest, ApprovalError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApprovalError::Validation(
                "Please provide a reason for rejection.".to_string(),
            ));
        }
        let caller = self.require_current().await?;

        let _guard = self.lock.lock().await;
        let (mut requests, version) = self.load_requests().await?;
        let request = Self::pending_mut(&mut requests, id)?;
        self.authorize_decision(&caller, request).await?;

        request.decision = RequestDecision::Rejected {
            decided_by: caller.id,
            decided_at: self.clock.now(),
            rejection_reason: reason.to_string(),
        };
        let request = request.clone();
        save(self.store.as_ref(), StateKey::ServiceRequests, &requests, version).await?;

        self.audit
            .append(
                NewAuditEvent::new(&caller, AuditAction::ServiceRequestRejected).with_details(
                    json!({
                        "requestId": request.id,
                        "requesterId": request.requester_id,
                        "serviceType": request.kind,
                        "reason": reason,
                    }),
                ),
            )
            .await?;
        info!(request = %request.id.short(), caller = %caller.id.short(), "Service request rejected");
        self.notifier
            .notify(Notice::info(
                "Request Rejected",
                format!(
                    "{}'s service request has been rejected.",
                    request.requester_name
                ),
            ))
            .await;
        Ok(request)
    }

    async fn authorize_decision(
        &self,
        caller: &Principal,
        request: &ServiceRequest,
    ) -> Result<(), ApprovalError> {
        if let Err(e) = Actor::new(caller).can(request.kind.capability()).check() {
            self.notifier
                .notify(Notice::permission_denied(format!(
                    "You cannot decide {} requests",
                    request.kind
                )))
                .await;
            return Err(e.into());
        }
        Ok(())
    }

    fn pending_mut(
        requests: &mut [ServiceRequest],
        id: ServiceRequestId,
    ) -> Result<&mut ServiceRequest, ApprovalError> {
        let request = requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ApprovalError::NotFound(id))?;
        if !request.decision.is_pending() {
            return Err(ApprovalError::AlreadyDecided {
                id,
                decision: request.decision.label(),
            });
        }
        Ok(request)
    }

    /// The caller, after any lapsed elevated session has been logged out.
    async fn require_current(&self) -> Result<Principal, ApprovalError> {
        self.identity.require_live_session().await?;
        Ok(self
            .identity
            .current()
            .await?
            .ok_or_else(|| AuthError::unauthorized("login required"))?)
    }

    async fn load_requests(&self) -> Result<(Vec<ServiceRequest>, u64), ApprovalError> {
        let (requests, version) =
            load::<Vec<ServiceRequest>>(self.store.as_ref(), StateKey::ServiceRequests).await?;
        Ok((requests.unwrap_or_default(), version))
    }
}
