//! Session identity for Room Controller.
//!
//! Browsers carry a signed session token in the `jwt` cookie. The
//! [`IdentityResolver`] verifies it and yields an [`Identity`]; first-time
//! visitors of the call page are given a freshly minted one.

pub mod claims;
pub mod identity;

pub use claims::UserClaims;
pub use identity::{Identity, IdentityResolver, SESSION_COOKIE_NAME};
