use sha2::{Digest, Sha256};

use super::Principal;

// =============================================================================
// Utility Functions
// =============================================================================

/// Hash an identifier (phone number or email) using SHA256.
///
/// Raw phone numbers never reach the logs; the first few hex digits of this
/// hash are logged instead (see [`redacted`]).
pub fn hash_phone_number(phone_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone_number.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Log-safe form of an identifier: emails pass through, phone numbers
/// become a short hash prefix.
pub fn redacted(identifier: &str) -> String {
    if identifier.contains('@') {
        identifier.trim().to_ascii_lowercase()
    } else {
        format!("phone#{}", &hash_phone_number(identifier)[..12])
    }
}

/// Whether two identifiers name the same account.
///
/// - For emails: case-insensitive matching
/// - For phone numbers and usernames: exact match after trimming
pub fn is_matching_identifier(candidate: &str, known: &str) -> bool {
    let candidate = candidate.trim();
    let known = known.trim();
    if candidate.contains('@') && known.contains('@') {
        known.eq_ignore_ascii_case(candidate)
    } else {
        known == candidate
    }
}

impl Principal {
    /// Whether this principal logs in with the given phone number.
    pub fn has_phone(&self, phone_number: &str) -> bool {
        self.phone_number
            .as_deref()
            .is_some_and(|own| is_matching_identifier(phone_number, own))
    }

    /// Whether this principal is known under the given email or username.
    pub fn is_known_as(&self, identifier: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|email| is_matching_identifier(identifier, email))
            || is_matching_identifier(identifier, &self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_hash_consistency() {
        let hash1 = hash_phone_number("+233201234567");
        let hash2 = hash_phone_number(" +233201234567 ");
        assert_eq!(hash1, hash2, "Same phone should produce same hash");
    }

    #[test]
    fn test_phone_hash_uniqueness() {
        assert_ne!(
            hash_phone_number("+233201234567"),
            hash_phone_number("+233201239999")
        );
    }

    #[test]
    fn test_phone_hash_format() {
        let hash = hash_phone_number("+233201234567");
        assert_eq!(hash.len(), 64, "SHA256 hash should be 64 hex characters");
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_redacted_hides_phone_numbers() {
        let redacted = redacted("+233201234567");
        assert!(redacted.starts_with("phone#"));
        assert!(!redacted.contains("1234567"));
        assert_eq!(super::redacted("Admin@AfriPay.com"), "admin@afripay.com");
    }

    #[test]
    fn test_email_match_is_case_insensitive() {
        assert!(is_matching_identifier("ADMIN@afripay.com", "admin@afripay.com"));
        assert!(!is_matching_identifier("user@afripay.com", "admin@afripay.com"));
    }

    #[test]
    fn test_phone_match_is_exact() {
        assert!(is_matching_identifier("+233201234567", "+233201234567"));
        assert!(!is_matching_identifier("233201234567", "+233201234567"));
    }
}
