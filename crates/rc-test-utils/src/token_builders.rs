//! Builder patterns for test session tokens
//!
//! Provides a fluent API for signing `jwt` cookie values, including the
//! malformed variants the identity resolver must reject.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

/// Signing secret used by the test server harness.
pub const TEST_JWT_SECRET: &str = "rc-test-secret-0123456789-abcdefghijklmnop";

/// Builder for signed test session tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    user_id: Option<String>,
    iat: i64,
    exp: Option<i64>,
    nbf: Option<i64>,
    algorithm: Algorithm,
    secret: String,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults (valid for one hour)
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            user_id: Some("test-user".to_string()),
            iat: now.timestamp(),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            nbf: None,
            algorithm: Algorithm::HS256,
            secret: TEST_JWT_SECRET.to_string(),
        }
    }

    /// Set the user id claim
    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Omit the user id claim
    pub fn without_user(mut self) -> Self {
        self.user_id = None;
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Omit the exp claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Sign with a different HMAC algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sign with a different secret
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> serde_json::Value {
        let mut claims = json!({ "iat": self.iat });
        if let Some(user_id) = &self.user_id {
            claims["user_id"] = json!(user_id);
        }
        if let Some(exp) = self.exp {
            claims["exp"] = json!(exp);
        }
        if let Some(nbf) = self.nbf {
            claims["nbf"] = json!(nbf);
        }
        claims
    }

    /// Sign the token
    pub fn build(self) -> String {
        encode(
            &Header::new(self.algorithm),
            &self.claims(),
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("HMAC signing should not fail")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
