//! Common utilities shared across room controller components.

#![warn(clippy::pedantic)]

/// Module for identifier helpers
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limit, clock skew, iat validation)
pub mod jwt;
