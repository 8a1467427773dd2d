//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the token signing secret and
//! any other credential the services hold. `SecretString` redacts itself in
//! `Debug`, so a config struct that derives or hand-writes `Debug` cannot
//! leak the value through `{:?}` or tracing fields. Secrets are zeroized on
//! drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let signing_secret = SecretString::from("0123456789abcdef0123456789abcdef");
//! assert!(format!("{signing_secret:?}").contains("REDACTED"));
//! assert_eq!(signing_secret.expose_secret().len(), 32);
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
