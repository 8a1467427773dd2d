//! Middleware for Room Controller.
//!
//! # Components
//!
//! - `identity` - Session identity gate for the signaling socket

pub mod identity;

pub use identity::require_identity;
