use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub state_path: PathBuf,
    pub auth: AuthSettings,
    pub admin_identifier: String,
    pub admin_username: String,
    pub admin_password: String,
    pub super_admin_identifier: String,
    pub super_admin_username: String,
    pub super_admin_password: String,
    /// Keep only the newest N audit events; `None` keeps everything.
    pub audit_retention: Option<usize>,
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub verify_service_sid: String,
}

/// Timing knobs handed to the auth core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    /// Window an elevated session stays valid after its last refresh.
    pub session_timeout: Duration,
    /// How often the session watch checks for expiry.
    pub poll_interval: Duration,
    /// Delay applied by mock verifiers and identity mutations.
    pub latency: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(60),
            latency: Duration::from_millis(1000),
        }
    }
}

impl AuthSettings {
    /// Default windows with no simulated latency.
    pub fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = AuthSettings::default();
        let auth = AuthSettings {
            session_timeout: Duration::from_secs(
                parse_var::<u64>("SESSION_TIMEOUT_MINUTES")?
                    .map(|minutes| minutes * 60)
                    .unwrap_or(defaults.session_timeout.as_secs()),
            ),
            poll_interval: parse_var::<u64>("SESSION_POLL_SECONDS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            latency: parse_var::<u64>("SIMULATED_LATENCY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.latency),
        };
        if auth.poll_interval.is_zero() {
            anyhow::bail!("SESSION_POLL_SECONDS must be greater than zero");
        }

        let twilio = match (
            env::var("TWILIO_ACCOUNT_SID"),
            env::var("TWILIO_AUTH_TOKEN"),
            env::var("TWILIO_VERIFY_SERVICE_SID"),
        ) {
            (Ok(account_sid), Ok(auth_token), Ok(verify_service_sid)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                verify_service_sid,
            }),
            _ => None,
        };

        Ok(Self {
            state_path: env::var("BACKOFFICE_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".backoffice/state.json")),
            auth,
            admin_identifier: env::var("ADMIN_IDENTIFIER")
                .unwrap_or_else(|_| "admin@afripay.com".to_string()),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "adminuser".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
            super_admin_identifier: env::var("SUPERADMIN_IDENTIFIER")
                .unwrap_or_else(|_| "superadmin@afripay.com".to_string()),
            super_admin_username: env::var("SUPERADMIN_USERNAME")
                .unwrap_or_else(|_| "superadmin".to_string()),
            super_admin_password: env::var("SUPERADMIN_PASSWORD")
                .unwrap_or_else(|_| "superadmin123".to_string()),
            audit_retention: parse_var::<usize>("AUDIT_RETENTION")?,
            twilio,
        })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid number", name)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AuthSettings::default();
        assert_eq!(settings.session_timeout, Duration::from_secs(1800));
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.latency, Duration::from_millis(1000));
    }

    #[test]
    fn test_instant_keeps_windows() {
        let settings = AuthSettings::instant();
        assert!(settings.latency.is_zero());
        assert_eq!(settings.session_timeout, AuthSettings::default().session_timeout);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("BACKOFFICE_TEST_PARSE_VAR", "thirty");
        assert!(parse_var::<u64>("BACKOFFICE_TEST_PARSE_VAR").is_err());
        env::set_var("BACKOFFICE_TEST_PARSE_VAR", " 42 ");
        assert_eq!(parse_var::<u64>("BACKOFFICE_TEST_PARSE_VAR").unwrap(), Some(42));
        env::remove_var("BACKOFFICE_TEST_PARSE_VAR");
        assert_eq!(parse_var::<u64>("BACKOFFICE_TEST_PARSE_VAR").unwrap(), None);
    }
}
