//! Integration tests for the service request queue.

mod common;

use backoffice_core::common::AuthError;
use backoffice_core::domains::approvals::{
    ApprovalError, DecisionFilter, RequestDecision, ServiceApplication, ServiceKind,
};
use backoffice_core::domains::audit::{AuditAction, AuditQuery};
use backoffice_core::domains::auth::{PermissionUpdate, Role};
use common::{submit_test_request, TestHarness};
use test_context::test_context;

fn application(kind: ServiceKind) -> ServiceApplication {
    ServiceApplication::builder()
        .kind(kind)
        .business_name("Osu Provisions")
        .business_type("Retail")
        .build()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_submit_records_pending_request(ctx: &TestHarness) {
    let (user, request) =
        submit_test_request(ctx, "kwesi", "+233240001111", ServiceKind::Merchant).await;

    assert_eq!(request.requester_id, user.id);
    assert_eq!(request.requester_name, "Test kwesi");
    assert_eq!(request.business_name, "kwesi Trading");
    assert_eq!(request.decision, RequestDecision::Pending);
    assert_eq!(ctx.kernel.approvals.mine().await.unwrap(), vec![request]);
    assert_eq!(
        ctx.notice_titles().await.last().map(String::as_str),
        Some("Request Submitted")
    );

    let again = ctx
        .kernel
        .approvals
        .submit(application(ServiceKind::Agent))
        .await;
    assert!(matches!(again, Err(ApprovalError::AlreadyPending)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_submit_validates_business_fields(ctx: &TestHarness) {
    ctx.login_phone("+233201234567").await;

    let blank = ServiceApplication::builder()
        .kind(ServiceKind::Merchant)
        .business_name("   ")
        .business_type("Retail")
        .build();
    let result = ctx.kernel.approvals.submit(blank).await;
    assert!(matches!(result, Err(ApprovalError::Validation(_))));
    assert!(ctx.kernel.approvals.mine().await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_only_neutral_principals_may_apply(ctx: &TestHarness) {
    let anonymous = ctx
        .kernel
        .approvals
        .submit(application(ServiceKind::Merchant))
        .await;
    assert!(matches!(
        anonymous,
        Err(ApprovalError::Auth(AuthError::Unauthorized(_)))
    ));

    ctx.login_admin().await;
    let admin = ctx
        .kernel
        .approvals
        .submit(application(ServiceKind::Merchant))
        .await;
    assert!(matches!(
        admin,
        Err(ApprovalError::Auth(AuthError::Unauthorized(_)))
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_admin_approval_grants_role(ctx: &TestHarness) {
    let (user, request) =
        submit_test_request(ctx, "afua", "+233240002222", ServiceKind::Merchant).await;
    ctx.identity().logout().await.unwrap();

    let admin = ctx.login_admin().await;
    let approved = ctx.kernel.approvals.approve(request.id).await.unwrap();
    assert!(matches!(
        approved.decision,
        RequestDecision::Approved { decided_by, .. } if decided_by == admin.id
    ));

    let users = ctx.identity().get_users(false).await.unwrap();
    let requester = users.iter().find(|p| p.id == user.id).unwrap();
    assert_eq!(requester.role(), Role::Merchant);

    let events = ctx
        .kernel
        .audit
        .query(&AuditQuery {
            action: Some(AuditAction::ServiceRequestApproved),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user_id, Some(admin.id));
    assert_eq!(events[0].details["serviceType"], "merchant");
    assert_eq!(
        ctx.notice_titles().await.last().map(String::as_str),
        Some("Request Approved")
    );

    let repeat = ctx.kernel.approvals.approve(request.id).await;
    assert!(matches!(
        repeat,
        Err(ApprovalError::AlreadyDecided {
            decision: "approved",
            ..
        })
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_approval_needs_matching_acceptance_flag(ctx: &TestHarness) {
    let admin = ctx.login_admin().await;
    ctx.identity().logout().await.unwrap();
    ctx.login_super_admin().await;
    ctx.identity()
        .update_admin_permissions(
            admin.id,
            PermissionUpdate {
                can_accept_merchants: None,
                can_accept_agents: Some(false),
            },
        )
        .await
        .unwrap();
    ctx.identity().logout().await.unwrap();

    let (user, request) =
        submit_test_request(ctx, "yaa", "+233240003333", ServiceKind::Agent).await;
    ctx.identity().logout().await.unwrap();

    ctx.login_admin().await;
    let denied = ctx.kernel.approvals.approve(request.id).await;
    assert!(matches!(
        denied,
        Err(ApprovalError::Auth(AuthError::Unauthorized(_)))
    ));
    assert_eq!(
        ctx.notice_titles().await.last().map(String::as_str),
        Some("Permission Denied")
    );
    let pending = ctx
        .kernel
        .approvals
        .list(DecisionFilter::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    ctx.identity().logout().await.unwrap();

    // A superAdmin holds every flag
    ctx.login_super_admin().await;
    ctx.kernel.approvals.approve(request.id).await.unwrap();
    let users = ctx.identity().get_users(false).await.unwrap();
    assert_eq!(
        users.iter().find(|p| p.id == user.id).map(|p| p.role()),
        Some(Role::Agent)
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_rejection_requires_reason(ctx: &TestHarness) {
    let (user, request) =
        submit_test_request(ctx, "kobby", "+233240004444", ServiceKind::Agent).await;
    ctx.identity().logout().await.unwrap();
    ctx.login_admin().await;

    let blank = ctx.kernel.approvals.reject(request.id, "  ").await;
    assert!(matches!(blank, Err(ApprovalError::Validation(_))));

    let rejected = ctx
        .kernel
        .approvals
        .reject(request.id, "Incomplete documentation")
        .await
        .unwrap();
    assert!(matches!(
        &rejected.decision,
        RequestDecision::Rejected { rejection_reason, .. } if rejection_reason == "Incomplete documentation"
    ));

    let users = ctx.identity().get_users(false).await.unwrap();
    assert_eq!(
        users.iter().find(|p| p.id == user.id).map(|p| p.role()),
        Some(Role::Neutral)
    );
    let events = ctx
        .kernel
        .audit
        .query(&AuditQuery {
            action: Some(AuditAction::ServiceRequestRejected),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events[0].details["reason"], "Incomplete documentation");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_rejected_requester_may_apply_again(ctx: &TestHarness) {
    let (_, request) =
        submit_test_request(ctx, "esinam", "+233240005555", ServiceKind::Merchant).await;
    ctx.identity().logout().await.unwrap();
    ctx.login_admin().await;
    ctx.kernel
        .approvals
        .reject(request.id, "Business not registered")
        .await
        .unwrap();
    ctx.identity().logout().await.unwrap();

    ctx.login_phone("+233240005555").await;
    ctx.kernel
        .approvals
        .submit(application(ServiceKind::Merchant))
        .await
        .unwrap();
    let mine = ctx.kernel.approvals.mine().await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].decision.label(), "rejected");
    assert!(mine[1].decision.is_pending());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_listing_requires_reviewer(ctx: &TestHarness) {
    submit_test_request(ctx, "fiifi", "+233240006666", ServiceKind::Merchant).await;

    let as_requester = ctx.kernel.approvals.list(DecisionFilter::All).await;
    assert!(matches!(
        as_requester,
        Err(ApprovalError::Auth(AuthError::Unauthorized(_)))
    ));
    ctx.identity().logout().await.unwrap();

    ctx.login_admin().await;
    assert_eq!(
        ctx.kernel
            .approvals
            .list(DecisionFilter::All)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(ctx
        .kernel
        .approvals
        .list(DecisionFilter::Approved)
        .await
        .unwrap()
        .is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_unknown_request_is_not_found(ctx: &TestHarness) {
    use backoffice_core::common::ServiceRequestId;

    ctx.login_admin().await;
    let missing = ServiceRequestId::new();
    let result = ctx.kernel.approvals.approve(missing).await;
    assert!(matches!(result, Err(ApprovalError::NotFound(id)) if id == missing));
}
