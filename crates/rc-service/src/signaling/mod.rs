//! Signaling: wire types and the per-connection dispatcher.

pub mod dispatcher;
pub mod messages;

pub use dispatcher::{ConnectionContext, Dispatcher};
pub use messages::{InboundMessage, ServerEvent, SignalingRequest};
