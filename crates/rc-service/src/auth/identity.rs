//! Identity resolution from the `jwt` session cookie.
//!
//! # Security
//!
//! - Tokens are size-checked before parsing
//! - Only HS256 is accepted; any other header algorithm is `AlgoInvalid`
//! - `exp` is required, `nbf` is checked when present, `iat` is checked
//!   against the configured clock skew
//! - A token without a non-empty `user_id` is rejected

use crate::auth::claims::UserClaims;
use crate::errors::{AuthError, RcError};
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::jwt::{check_token_size, validate_iat};
use common::secret::{ExposeSecret, SecretString};
use common::types::new_base62_id;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "jwt";

/// A verified caller identity, bound to one connection for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// Verifies and mints session tokens.
pub struct IdentityResolver {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock_skew: Duration,
}

impl IdentityResolver {
    /// Create a resolver from the HS256 signing secret.
    pub fn new(secret: &SecretString, clock_skew: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            clock_skew,
        }
    }

    /// Resolve the identity carried by the request's `jwt` cookie.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoTokenFound` when the cookie is absent, otherwise
    /// the failure reported by [`IdentityResolver::verify`].
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let jar = CookieJar::from_headers(headers);
        let cookie = jar.get(SESSION_COOKIE_NAME).ok_or_else(|| {
            tracing::debug!(target: "rc.auth", "No session cookie on request");
            AuthError::NoTokenFound
        })?;

        self.verify(cookie.value())
    }

    /// Verify a session token and return its identity.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::NoTokenFound);
        }

        check_token_size(token).map_err(|_| AuthError::Unauthorized)?;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(target: "rc.auth", error = %e, "Token verification failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    ErrorKind::ImmatureSignature => AuthError::NbfInvalid,
                    ErrorKind::InvalidAlgorithm => AuthError::AlgoInvalid,
                    _ => AuthError::Unauthorized,
                }
            })?;

        let claims = token_data.claims;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "rc.auth", error = ?e, "Token iat validation failed");
            return Err(AuthError::IatInvalid);
        }

        if claims.user_id.is_empty() {
            tracing::debug!(target: "rc.auth", "Token has empty user_id");
            return Err(AuthError::Unauthorized);
        }

        Ok(Identity {
            user_id: claims.user_id,
        })
    }

    /// Mint a session token for a new anonymous user.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if signing fails.
    pub fn mint(&self) -> Result<(Identity, String), RcError> {
        let identity = Identity {
            user_id: new_base62_id(),
        };
        let token = self.mint_for(&identity.user_id)?;
        Ok((identity, token))
    }

    /// Mint a session token for an existing user id.
    pub fn mint_for(&self, user_id: &str) -> Result<String, RcError> {
        let claims = UserClaims::issued_at(user_id, chrono::Utc::now().timestamp());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "rc.auth", error = %e, "Failed to sign session token");
            RcError::Internal(format!("Token signing failed: {e}"))
        })
    }

    /// Build the `jwt` cookie for a minted token.
    pub fn session_cookie(token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .permanent()
            .build()
    }
}
