// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Identity, session and audit rules live in domains/ and only talk to the
// outside world through these seams.
//
// Naming convention: Base* for trait names (e.g., BaseStateStore, BaseNotifier)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::AuthError;
use crate::domains::audit::AuditEvent;
use crate::domains::auth::models::Role;
use crate::domains::notifications::Notice;
use crate::kernel::store::{StateKey, StoreError, Versioned};

// =============================================================================
// Durable State Store (Infrastructure - key/value persistence)
// =============================================================================

/// Versioned key/value persistence for the principal, session, registry and
/// audit records.
///
/// Every key carries a version that only ever grows (removal leaves a
/// tombstone), so writers can compare-and-set instead of racing.
#[async_trait]
pub trait BaseStateStore: Send + Sync {
    /// Read a key. Never-written keys come back as version 0 with no value.
    async fn get(&self, key: StateKey) -> Result<Versioned, StoreError>;

    /// Write a key and return its new version.
    ///
    /// With `expected_version = Some(v)` the write only happens if the key is
    /// still at version `v`; otherwise `StoreError::VersionConflict`.
    async fn put(
        &self,
        key: StateKey,
        value: serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Remove a key together with every key paired to it (see `StateKey::paired`).
    async fn remove(&self, key: StateKey) -> Result<(), StoreError>;
}

// =============================================================================
// Credential Verification (Infrastructure - strategy for identity checks)
// =============================================================================

/// Result of a phone number lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneLookup {
    pub exists: bool,
}

/// Identity confirmed by a password check, before a principal is materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub role: Role,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

#[async_trait]
pub trait BaseCredentialVerifier: Send + Sync {
    /// Whether a phone number already belongs to an account.
    async fn verify_phone_exists(&self, phone_number: &str) -> PhoneLookup;

    /// Trigger out-of-band OTP delivery. Repeated calls resend.
    async fn request_otp(&self, phone_number: &str) -> bool;

    /// Check a one-time code for a phone number.
    async fn verify_otp(&self, phone_number: &str, code: &str) -> bool;

    /// Check admin credentials. Fails with `AuthError::InvalidCredentials`.
    async fn verify_admin(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AuthError>;

    /// Check superAdmin credentials against a set disjoint from the admin set.
    async fn verify_super_admin(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AuthError>;
}

// =============================================================================
// OTP Delivery Trait (Infrastructure - SMS/email)
// =============================================================================

#[async_trait]
pub trait BaseOtpSender: Send + Sync {
    /// Deliver a fresh one-time code to the recipient.
    async fn send_otp(&self, recipient: &str) -> Result<()>;
}

// =============================================================================
// Notification Surface (Infrastructure - toasts and the notification center)
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    async fn notify(&self, notice: Notice);
}

// =============================================================================
// Clock (Infrastructure - session expiry and timestamps)
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// =============================================================================
// Audit Retention (Infrastructure - bounds on the audit log)
// =============================================================================

/// Decides which audit events survive an append.
///
/// Implementations may only drop events from the front (oldest first); the
/// sink never reorders what remains.
pub trait RetentionPolicy: Send + Sync {
    fn apply(&self, events: &mut Vec<AuditEvent>);
}
