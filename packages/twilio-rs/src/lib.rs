//! Minimal Twilio Verify client: start a verification and check a code.

use std::collections::HashMap;

pub mod models;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{OTPResponse, OTPVerifyResponse};

const DEFAULT_BASE_URL: &str = "https://verify.twilio.com/v2";

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("request to Twilio failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Twilio returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("verification was not approved (status: {0})")]
    NotApproved(String),
}

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub service_id: String,
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    base_url: String,
    client: Client,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self::with_base_url(options, DEFAULT_BASE_URL)
    }

    /// Point the client at a different Verify endpoint (local fakes, regional hosts).
    pub fn with_base_url(options: TwilioOptions, base_url: impl Into<String>) -> Self {
        Self {
            options,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "{base}/Services/{serv_id}/{resource}",
            base = self.base_url,
            serv_id = self.options.service_id,
        )
    }

    fn form_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers
    }

    /// Start a verification. Channel is picked from the recipient shape.
    pub async fn send_otp(&self, recipient: &str) -> Result<OTPResponse, TwilioError> {
        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("To", recipient);
        form_body.insert("Channel", channel_for(recipient));

        let response = self
            .client
            .post(self.url("Verifications"))
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .headers(Self::form_headers())
            .form(&form_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Twilio rejected verification request");
            return Err(TwilioError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data = response.json::<OTPResponse>().await?;
        debug!(sid = %data.sid, status = %data.status, "Twilio verification started");
        Ok(data)
    }

    pub async fn verify_otp(&self, recipient: &str, code: &str) -> Result<(), TwilioError> {
        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("To", recipient);
        form_body.insert("Code", code);

        let response = self
            .client
            .post(self.url("VerificationCheck"))
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .headers(Self::form_headers())
            .form(&form_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwilioError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result = response.json::<OTPVerifyResponse>().await?;
        if result.is_approved() {
            Ok(())
        } else {
            Err(TwilioError::NotApproved(result.status))
        }
    }
}

fn channel_for(recipient: &str) -> &'static str {
    if recipient.contains('@') {
        "email"
    } else {
        "sms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TwilioOptions {
        TwilioOptions {
            account_sid: "AC_test".to_string(),
            auth_token: "secret".to_string(),
            service_id: "VA_test".to_string(),
        }
    }

    #[test]
    fn test_channel_for_recipient() {
        assert_eq!(channel_for("+15551234567"), "sms");
        assert_eq!(channel_for("ops@afripay.com"), "email");
    }

    #[test]
    fn test_urls_use_service_id() {
        let service = TwilioService::new(options());
        assert_eq!(
            service.url("Verifications"),
            "https://verify.twilio.com/v2/Services/VA_test/Verifications"
        );
    }

    #[test]
    fn test_custom_base_url_trims_trailing_slash() {
        let service = TwilioService::with_base_url(options(), "http://localhost:8089/v2/");
        assert_eq!(
            service.url("VerificationCheck"),
            "http://localhost:8089/v2/Services/VA_test/VerificationCheck"
        );
    }
}
