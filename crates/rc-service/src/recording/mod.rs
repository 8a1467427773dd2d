//! Recording control.
//!
//! [`RecordingBackend`] is the seam the dispatcher depends on; the
//! [`RecordingClient`] implementation talks to the external recording
//! service over HTTP. Neither touches room state: the dispatcher updates
//! the registry after a successful call.

pub mod client;

pub use client::{RecordingBackend, RecordingClient};
