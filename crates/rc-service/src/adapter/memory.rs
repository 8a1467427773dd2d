//! Process-local adapter.
//!
//! State is `room -> client -> {sender, metadata}` behind one `RwLock`.
//! Each client has a bounded mailbox; delivery never waits on a slow
//! reader, a full mailbox is reported as a delivery failure instead.

use super::{Adapter, Subscription};
use crate::errors::RcError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Frames buffered per client before delivery starts failing.
pub const CLIENT_MAILBOX_CAPACITY: usize = 256;

#[derive(Debug)]
struct ClientSlot {
    sender: mpsc::Sender<String>,
    token: u64,
    metadata: String,
}

#[derive(Debug)]
pub struct MemoryAdapter {
    rooms: RwLock<HashMap<String, HashMap<String, ClientSlot>>>,
    next_token: AtomicU64,
    mailbox_capacity: usize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::with_capacity(CLIENT_MAILBOX_CAPACITY)
    }

    /// Adapter with a custom per-client mailbox size (at least 1).
    pub fn with_capacity(mailbox_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// Number of rooms with at least one subscriber.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(slot: &ClientSlot, client_id: &str, message: String) -> Result<(), RcError> {
    slot.sender.try_send(message).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => {
            RcError::Delivery(format!("Mailbox full for client {client_id}"))
        }
        mpsc::error::TrySendError::Closed(_) => {
            RcError::Delivery(format!("Client {client_id} is disconnected"))
        }
    })
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn subscribe(&self, room_id: &str, client_id: &str) -> Subscription {
        let (sender, messages) = mpsc::channel(self.mailbox_capacity);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let mut rooms = self.rooms.write().await;
        let previous = rooms.entry(room_id.to_string()).or_default().insert(
            client_id.to_string(),
            ClientSlot {
                sender,
                token,
                metadata: String::new(),
            },
        );

        tracing::debug!(
            target: "rc.adapter",
            room_id = %room_id,
            client_id = %client_id,
            replaced = previous.is_some(),
            "Client subscribed"
        );

        Subscription { messages, token }
    }

    async fn unsubscribe(&self, room_id: &str, client_id: &str, token: u64) {
        let mut rooms = self.rooms.write().await;
        let Some(clients) = rooms.get_mut(room_id) else {
            return;
        };

        if clients.get(client_id).is_some_and(|slot| slot.token == token) {
            clients.remove(client_id);
            tracing::debug!(
                target: "rc.adapter",
                room_id = %room_id,
                client_id = %client_id,
                "Client unsubscribed"
            );
        }

        if clients.is_empty() {
            rooms.remove(room_id);
        }
    }

    async fn broadcast(&self, room_id: &str, message: String) -> Result<(), RcError> {
        let rooms = self.rooms.read().await;
        let Some(clients) = rooms.get(room_id) else {
            return Ok(());
        };

        let mut first_error = None;
        for (client_id, slot) in clients {
            if let Err(e) = deliver(slot, client_id, message.clone()) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn emit(&self, room_id: &str, client_id: &str, message: String) -> Result<(), RcError> {
        let rooms = self.rooms.read().await;
        let slot = rooms
            .get(room_id)
            .and_then(|clients| clients.get(client_id))
            .ok_or_else(|| RcError::Delivery(format!("Client {client_id} is not in room")))?;

        deliver(slot, client_id, message)
    }

    async fn set_metadata(
        &self,
        room_id: &str,
        client_id: &str,
        token: u64,
        metadata: &str,
    ) -> Result<String, RcError> {
        let mut rooms = self.rooms.write().await;
        let slot = rooms
            .get_mut(room_id)
            .and_then(|clients| clients.get_mut(client_id))
            .ok_or_else(|| RcError::Delivery(format!("Client {client_id} is not in room")))?;

        if slot.token != token {
            return Err(RcError::Delivery(format!(
                "Subscription for client {client_id} was superseded"
            )));
        }

        Ok(std::mem::replace(&mut slot.metadata, metadata.to_string()))
    }

    async fn clients(&self, room_id: &str) -> HashMap<String, String> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|clients| {
                clients
                    .iter()
                    .map(|(id, slot)| (id.clone(), slot.metadata.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
