// TestDependencies - mock implementations for testing
//
// Provides mock infrastructure that can be injected into BackofficeKernel for
// tests: a settable clock, a recording OTP sender and a recording notifier.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{
    BackofficeDeps, BackofficeKernel, BaseClock, BaseNotifier, BaseOtpSender, MemoryStateStore,
    RetentionPolicy,
};
use crate::config::AuthSettings;
use crate::domains::audit::Unbounded;
use crate::domains::auth::CredentialSet;
use crate::domains::notifications::Notice;

/// 2026-01-01T09:00:00Z
const MOCK_EPOCH_SECS: i64 = 1_767_258_000;

// =============================================================================
// Mock Clock
// =============================================================================

/// Clock that only moves when told to.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at(DateTime::from_timestamp(MOCK_EPOCH_SECS, 0).unwrap_or_default())
    }
}

impl BaseClock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Mock OTP Sender
// =============================================================================

#[derive(Default)]
pub struct MockOtpSender {
    sent: Mutex<Vec<String>>,
    fail_next: AtomicBool,
}

impl MockOtpSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail once.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl BaseOtpSender for MockOtpSender {
    async fn send_otp(&self, recipient: &str) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("mock delivery failure");
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(recipient.to_string());
        Ok(())
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.title).collect()
    }
}

#[async_trait]
impl BaseNotifier for RecordingNotifier {
    async fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).push(notice);
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<MemoryStateStore>,
    pub clock: Arc<MockClock>,
    pub otp_sender: Arc<MockOtpSender>,
    pub credentials: CredentialSet,
    pub retention: Arc<dyn RetentionPolicy>,
    pub settings: AuthSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStateStore::new()),
            clock: Arc::new(MockClock::default()),
            otp_sender: Arc::new(MockOtpSender::new()),
            credentials: CredentialSet::new()
                .with_admin("admin@afripay.com", "adminuser", "admin123")
                .with_super_admin("superadmin@afripay.com", "superadmin", "superadmin123"),
            retention: Arc::new(Unbounded),
            settings: AuthSettings::instant(),
        }
    }

    /// Set the audit retention policy
    pub fn retention(mut self, retention: impl RetentionPolicy + 'static) -> Self {
        self.retention = Arc::new(retention);
        self
    }

    /// Override the auth timing
    pub fn settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing store (e.g. to simulate a restart)
    pub fn store(mut self, store: Arc<MemoryStateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn into_deps(self) -> BackofficeDeps {
        BackofficeDeps::new(
            self.store,
            self.otp_sender,
            self.credentials,
            self.clock,
            self.retention,
            self.settings,
        )
    }

    /// Convert into a BackofficeKernel for testing
    pub fn into_kernel(self) -> Arc<BackofficeKernel> {
        Arc::new(BackofficeKernel::new(self.into_deps()))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
