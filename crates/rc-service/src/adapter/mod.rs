//! Pub/sub capability consumed by the signaling dispatcher.
//!
//! An adapter tracks which clients are joined to which room, delivers
//! frames to one client or a whole room, and stores one metadata string
//! (the nickname) per client. [`MemoryAdapter`] is the process-local
//! implementation used by the server.

pub mod memory;

pub use memory::{MemoryAdapter, CLIENT_MAILBOX_CAPACITY};

use crate::errors::RcError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Handle for one joined client.
///
/// `messages` yields every frame delivered to the client. `token`
/// identifies this particular subscription; calls scoped by token are
/// refused once a newer subscription has taken over the client id.
#[derive(Debug)]
pub struct Subscription {
    pub messages: mpsc::Receiver<String>,
    pub token: u64,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Join a client to a room, replacing any previous subscription for
    /// the same client id.
    async fn subscribe(&self, room_id: &str, client_id: &str) -> Subscription;

    /// Leave a room. No-op if `token` is not the current subscription.
    async fn unsubscribe(&self, room_id: &str, client_id: &str, token: u64);

    /// Deliver a frame to every client in the room.
    async fn broadcast(&self, room_id: &str, message: String) -> Result<(), RcError>;

    /// Deliver a frame to one client in the room.
    async fn emit(&self, room_id: &str, client_id: &str, message: String) -> Result<(), RcError>;

    /// Replace the metadata of the subscription `token`, returning the
    /// previous value. Fails with `Delivery` if the client is gone or
    /// `token` has been superseded.
    async fn set_metadata(
        &self,
        room_id: &str,
        client_id: &str,
        token: u64,
        metadata: &str,
    ) -> Result<String, RcError>;

    /// Clients currently joined to the room with their metadata.
    async fn clients(&self, room_id: &str) -> HashMap<String, String>;
}
