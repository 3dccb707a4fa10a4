//! Integration tests for the audit log as the identity store writes it.

mod common;

use backoffice_core::domains::audit::{AuditAction, AuditQuery, KeepLatest};
use backoffice_core::kernel::{BaseClock, TestDependencies};
use common::{TestHarness, ADMIN_EMAIL, SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD};
use test_context::test_context;

#[tokio::test]
async fn test_retention_keeps_sequence_monotonic() {
    let ctx = TestHarness::with_deps(TestDependencies::new().retention(KeepLatest(3)));

    for _ in 0..4 {
        ctx.login_admin().await;
        ctx.identity().logout().await.unwrap();
    }

    let events = ctx.kernel.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.len(), 3);
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![5, 6, 7]);
    assert_eq!(events[2].action, AuditAction::Logout);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_query_filters_combine(ctx: &TestHarness) {
    let admin = ctx.login_admin().await;
    ctx.identity().logout().await.unwrap();
    ctx.identity().admin_login(ADMIN_EMAIL, "wrong").await.unwrap_err();

    ctx.clock.advance(chrono::Duration::hours(1));
    let later = ctx.clock.now();
    let super_admin = ctx.login_super_admin().await;

    let by_admin = ctx
        .kernel
        .audit
        .query(&AuditQuery {
            user_id: Some(admin.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        by_admin.iter().map(|e| e.action).collect::<Vec<_>>(),
        vec![AuditAction::Login, AuditAction::Logout]
    );

    let since = ctx
        .kernel
        .audit
        .query(&AuditQuery {
            since: Some(later),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(since.len(), 1);
    assert_eq!(since[0].user_id, Some(super_admin.id));

    let logins = ctx
        .kernel
        .audit
        .query(&AuditQuery {
            action: Some(AuditAction::Login),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].user_id, Some(super_admin.id));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_recent_is_newest_first(ctx: &TestHarness) {
    ctx.login_admin().await;
    ctx.identity().logout().await.unwrap();
    ctx.login_super_admin().await;

    let recent = ctx.kernel.audit.recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].action, AuditAction::Login);
    assert_eq!(recent[1].action, AuditAction::Logout);
    assert!(recent[0].sequence > recent[1].sequence);
    assert_eq!(ctx.kernel.audit.len().await.unwrap(), 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_log_survives_restart(ctx: &TestHarness) {
    ctx.login_admin().await;
    ctx.identity().logout().await.unwrap();

    let reloaded = ctx.restart();
    let events = reloaded.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.len(), 2);

    reloaded
        .identity
        .super_admin_login(SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD)
        .await
        .unwrap();
    let events = reloaded.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.last().map(|e| e.sequence), Some(2));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_events_are_stamped_with_clock(ctx: &TestHarness) {
    ctx.clock.advance(chrono::Duration::minutes(5));
    let expected = ctx.clock.now();
    ctx.login_admin().await;

    let events = ctx.kernel.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events[0].timestamp, expected);
    assert!(!ctx.kernel.audit.is_empty().await.unwrap());
}
