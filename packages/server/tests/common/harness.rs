//! Test harness over the in-memory store.
//!
//! Each test gets a fresh kernel with zero simulated latency, a mock clock and
//! a recording OTP sender. `restart()` builds a second kernel over the same
//! store and clock, which is how tests simulate a reload.

#![allow(dead_code)]

use backoffice_core::domains::audit::{AuditAction, AuditQuery};
use backoffice_core::domains::auth::{IdentityStore, Principal};
use backoffice_core::kernel::test_dependencies::{MockClock, MockOtpSender};
use backoffice_core::kernel::{BackofficeKernel, MemoryStateStore, TestDependencies};
use std::sync::Arc;
use test_context::AsyncTestContext;

pub const ADMIN_EMAIL: &str = "admin@afripay.com";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const SUPER_ADMIN_EMAIL: &str = "superadmin@afripay.com";
pub const SUPER_ADMIN_PASSWORD: &str = "superadmin123";

/// Test harness that owns one assembled kernel plus handles on its mocks.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let admin = ctx.login_admin().await;
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub kernel: Arc<BackofficeKernel>,
    pub store: Arc<MemoryStateStore>,
    pub clock: Arc<MockClock>,
    pub otp_sender: Arc<MockOtpSender>,
    deps: TestDependencies,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }

    async fn teardown(self) {
        // Watch tasks are aborted when the kernel drops
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_deps(TestDependencies::new())
    }

    pub fn with_deps(deps: TestDependencies) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            store: deps.store.clone(),
            clock: deps.clock.clone(),
            otp_sender: deps.otp_sender.clone(),
            kernel: deps.clone().into_kernel(),
            deps,
        }
    }

    /// A second kernel over the same store and clock.
    pub fn restart(&self) -> Arc<BackofficeKernel> {
        self.deps.clone().into_kernel()
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.kernel.identity
    }

    pub async fn login_admin(&self) -> Principal {
        self.identity()
            .admin_login(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("admin login")
    }

    pub async fn login_super_admin(&self) -> Principal {
        self.identity()
            .super_admin_login(SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD)
            .await
            .expect("superAdmin login")
    }

    pub async fn login_phone(&self, phone: &str) -> Principal {
        self.identity()
            .login(phone, "1234")
            .await
            .expect("phone login")
    }

    pub async fn current(&self) -> Option<Principal> {
        self.identity().current().await.expect("read current principal")
    }

    /// Notification titles, oldest first.
    pub async fn notice_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .kernel
            .notifications
            .list()
            .await
            .expect("list notifications")
            .into_iter()
            .map(|n| n.title)
            .collect();
        titles.reverse();
        titles
    }

    /// Audit actions, oldest first.
    pub async fn audit_actions(&self) -> Vec<AuditAction> {
        self.kernel
            .audit
            .query(&AuditQuery::default())
            .await
            .expect("query audit log")
            .into_iter()
            .map(|e| e.action)
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
