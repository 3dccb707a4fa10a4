//! Credential verifiers.
//!
//! [`MockCredentialVerifier`] is the shipped [`BaseCredentialVerifier`]: OTP
//! codes are checked by shape only and admin/superAdmin passwords against a
//! fixed [`CredentialSet`]. Delivery of OTPs goes through the injected
//! [`BaseOtpSender`].

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::common::AuthError;
use crate::domains::auth::models::{is_matching_identifier, redacted, Role};
use crate::domains::notifications::Notice;
use crate::kernel::{
    BaseCredentialVerifier, BaseNotifier, BaseOtpSender, PhoneLookup, VerifiedIdentity,
};

lazy_static! {
    static ref OTP_PATTERN: Regex = Regex::new(r"^[0-9]{4}$").unwrap();
}

/// Numbers with this suffix are treated as already registered.
const EXISTING_PHONE_SUFFIX: &str = "9999";

pub fn is_well_formed_otp(code: &str) -> bool {
    OTP_PATTERN.is_match(code)
}

fn digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One fixed account. Only the password digest is kept in memory.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    pub role: Role,
    pub identifier: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    password_digest: String,
}

impl StaticCredential {
    pub fn new(
        role: Role,
        identifier: impl Into<String>,
        password: &str,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            role,
            identifier: identifier.into(),
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_digest: digest(password),
        }
    }

    fn matches(&self, identifier: &str, password: &str) -> bool {
        let known = is_matching_identifier(identifier, &self.identifier)
            || is_matching_identifier(identifier, &self.username);
        known && digest(password) == self.password_digest
    }

    fn shares_login_name(&self, other: &StaticCredential) -> bool {
        [&other.identifier, &other.username].into_iter().any(|name| {
            is_matching_identifier(name, &self.identifier)
                || is_matching_identifier(name, &self.username)
        })
    }

    fn identity(&self) -> VerifiedIdentity {
        VerifiedIdentity {
            role: self.role,
            email: self.identifier.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
        }
    }
}

/// The admin and superAdmin accounts.
///
/// The two lists are disjoint: an admin credential never authenticates on the
/// superAdmin path and vice versa.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    admins: Vec<StaticCredential>,
    super_admins: Vec<StaticCredential>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(
        mut self,
        identifier: impl Into<String>,
        username: impl Into<String>,
        password: &str,
    ) -> Self {
        self.admins.push(StaticCredential::new(
            Role::Admin,
            identifier,
            password,
            "Admin",
            "User",
            username,
        ));
        self
    }

    pub fn with_super_admin(
        mut self,
        identifier: impl Into<String>,
        username: impl Into<String>,
        password: &str,
    ) -> Self {
        self.super_admins.push(StaticCredential::new(
            Role::SuperAdmin,
            identifier,
            password,
            "Super",
            "Admin",
            username,
        ));
        self
    }

    /// Add a fully described credential. Elevated roles only, and each login
    /// name may belong to one account per role.
    pub fn with_credential(mut self, credential: StaticCredential) -> Result<Self, AuthError> {
        let list = match credential.role {
            Role::Admin => &mut self.admins,
            Role::SuperAdmin => &mut self.super_admins,
            other => {
                return Err(AuthError::Validation(format!(
                    "{} accounts log in by OTP, not password",
                    other
                )))
            }
        };
        if list.iter().any(|existing| existing.shares_login_name(&credential)) {
            return Err(AuthError::Validation(format!(
                "login name {} is already taken",
                credential.username
            )));
        }
        list.push(credential);
        Ok(self)
    }

    fn check(
        list: &[StaticCredential],
        identifier: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        list.iter()
            .find(|credential| credential.matches(identifier, password))
            .map(StaticCredential::identity)
            .ok_or(AuthError::InvalidCredentials)
    }
}

pub struct MockCredentialVerifier {
    sender: Arc<dyn BaseOtpSender>,
    notifier: Arc<dyn BaseNotifier>,
    credentials: CredentialSet,
    latency: Duration,
}

impl MockCredentialVerifier {
    pub fn new(
        sender: Arc<dyn BaseOtpSender>,
        notifier: Arc<dyn BaseNotifier>,
        credentials: CredentialSet,
        latency: Duration,
    ) -> Self {
        Self {
            sender,
            notifier,
            credentials,
            latency,
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl BaseCredentialVerifier for MockCredentialVerifier {
    async fn verify_phone_exists(&self, phone_number: &str) -> PhoneLookup {
        self.simulate_latency().await;
        let exists = phone_number.trim().ends_with(EXISTING_PHONE_SUFFIX);
        debug!(phone = %redacted(phone_number), exists, "Phone lookup");
        PhoneLookup { exists }
    }

    async fn request_otp(&self, phone_number: &str) -> bool {
        self.simulate_latency().await;

        if let Err(e) = self.sender.send_otp(phone_number.trim()).await {
            warn!(phone = %redacted(phone_number), error = %e, "Failed to send OTP");
            self.notifier
                .notify(Notice::error(
                    "OTP Not Sent",
                    "We could not send a verification code. Please try again.",
                ))
                .await;
            return false;
        }

        info!(phone = %redacted(phone_number), "OTP sent");
        self.notifier
            .notify(Notice::success(
                "OTP Sent",
                format!("A verification code has been sent to {}", phone_number.trim()),
            ))
            .await;
        true
    }

    async fn verify_otp(&self, phone_number: &str, code: &str) -> bool {
        self.simulate_latency().await;

        let valid = is_well_formed_otp(code);
        if !valid {
            debug!(phone = %redacted(phone_number), "Rejected malformed OTP");
            self.notifier
                .notify(Notice::error(
                    "Invalid OTP",
                    AuthError::InvalidOtp.user_message(),
                ))
                .await;
        }
        valid
    }

    async fn verify_admin(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        self.simulate_latency().await;
        CredentialSet::check(&self.credentials.admins, identifier, password)
    }

    async fn verify_super_admin(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        self.simulate_latency().await;
        CredentialSet::check(&self.credentials.super_admins, identifier, password)
    }
}
