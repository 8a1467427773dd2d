//! Session token claims.
//!
//! The `user_id` field is redacted in Debug output to keep it out of logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime of a minted session token (365 days).
pub const SESSION_TOKEN_LIFETIME_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Claims carried by the `jwt` session cookie.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Anonymous user identifier, redacted in Debug output.
    pub user_id: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Optional not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl UserClaims {
    /// Claims for a token issued at `now` with the standard session lifetime.
    pub fn issued_at(user_id: impl Into<String>, now: i64) -> Self {
        Self {
            user_id: user_id.into(),
            iat: now,
            exp: now.saturating_add(SESSION_TOKEN_LIFETIME_SECONDS),
            nbf: None,
        }
    }
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("user_id", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_debug_redacts_user_id() {
        let claims = UserClaims::issued_at("secret-user-id", 1_700_000_000);

        let debug_str = format!("{claims:?}");

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain actual user_id value"
        );
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_issued_at_sets_one_year_expiry() {
        let claims = UserClaims::issued_at("u1", 1_700_000_000);
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp - claims.iat, 31_536_000);
        assert!(claims.nbf.is_none());
    }

    #[test]
    fn test_serialization_omits_absent_nbf() {
        let claims = UserClaims::issued_at("u1", 10);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["user_id"], "u1");
        assert!(json.get("nbf").is_none());
    }

    #[test]
    fn test_deserialization_without_nbf() {
        let claims: UserClaims =
            serde_json::from_str(r#"{"user_id":"u2","iat":1,"exp":2}"#).unwrap();
        assert_eq!(claims.user_id, "u2");
        assert_eq!(claims.nbf, None);
    }
}
