use serde::{Deserialize, Serialize};

/// Response body of `POST /Services/{sid}/Verifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OTPResponse {
    pub sid: String,
    pub status: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Response body of `POST /Services/{sid}/VerificationCheck`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OTPVerifyResponse {
    pub status: String,
    #[serde(default)]
    pub valid: Option<bool>,
}

impl OTPVerifyResponse {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_response_approved() {
        let parsed: OTPVerifyResponse =
            serde_json::from_str(r#"{"status":"approved","valid":true}"#).unwrap();
        assert!(parsed.is_approved());

        let pending: OTPVerifyResponse = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert!(!pending.is_approved());
    }
}
