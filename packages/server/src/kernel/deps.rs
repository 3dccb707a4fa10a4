//! Back-office dependencies (using traits for testability)
//!
//! Central container for the infrastructure the auth core talks to. All
//! external services sit behind the traits in `kernel::traits`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use twilio::{TwilioOptions, TwilioService};

use crate::config::{AuthSettings, Config};
use crate::domains::audit::{KeepLatest, Unbounded};
use crate::domains::auth::models::redacted;
use crate::domains::auth::CredentialSet;
use crate::kernel::store::FileStateStore;
use crate::kernel::{BaseClock, BaseOtpSender, BaseStateStore, RetentionPolicy};

// =============================================================================
// TwilioService Adapter (implements BaseOtpSender trait)
// =============================================================================

/// Wrapper around TwilioService that implements BaseOtpSender
pub struct TwilioAdapter(pub Arc<TwilioService>);

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseOtpSender for TwilioAdapter {
    async fn send_otp(&self, recipient: &str) -> Result<()> {
        self.0
            .send_otp(recipient)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

/// Default sender when Twilio is not configured: the code is "sent" by logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOtpSender;

#[async_trait]
impl BaseOtpSender for LoggingOtpSender {
    async fn send_otp(&self, recipient: &str) -> Result<()> {
        info!(recipient = %redacted(recipient), "OTP delivery simulated");
        Ok(())
    }
}

// =============================================================================
// Clock
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// BackofficeDeps
// =============================================================================

#[derive(Clone)]
pub struct BackofficeDeps {
    pub store: Arc<dyn BaseStateStore>,
    pub otp_sender: Arc<dyn BaseOtpSender>,
    pub credentials: CredentialSet,
    pub clock: Arc<dyn BaseClock>,
    pub retention: Arc<dyn RetentionPolicy>,
    pub settings: AuthSettings,
}

impl BackofficeDeps {
    pub fn new(
        store: Arc<dyn BaseStateStore>,
        otp_sender: Arc<dyn BaseOtpSender>,
        credentials: CredentialSet,
        clock: Arc<dyn BaseClock>,
        retention: Arc<dyn RetentionPolicy>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            otp_sender,
            credentials,
            clock,
            retention,
            settings,
        }
    }

    /// Production wiring: file store, Twilio when configured, system clock.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = FileStateStore::open(&config.state_path).await?;

        let otp_sender: Arc<dyn BaseOtpSender> = match &config.twilio {
            Some(twilio) => {
                info!("OTP delivery via Twilio Verify");
                Arc::new(TwilioAdapter::new(Arc::new(TwilioService::new(
                    TwilioOptions {
                        account_sid: twilio.account_sid.clone(),
                        auth_token: twilio.auth_token.clone(),
                        service_id: twilio.verify_service_sid.clone(),
                    },
                ))))
            }
            None => Arc::new(LoggingOtpSender),
        };

        let retention: Arc<dyn RetentionPolicy> = match config.audit_retention {
            Some(n) => Arc::new(KeepLatest(n)),
            None => Arc::new(Unbounded),
        };

        let credentials = CredentialSet::new()
            .with_admin(
                config.admin_identifier.clone(),
                config.admin_username.clone(),
                &config.admin_password,
            )
            .with_super_admin(
                config.super_admin_identifier.clone(),
                config.super_admin_username.clone(),
                &config.super_admin_password,
            );

        Ok(Self::new(
            Arc::new(store),
            otp_sender,
            credentials,
            Arc::new(SystemClock),
            retention,
            config.auth,
        ))
    }
}
