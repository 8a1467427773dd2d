//! Shared room registry.
//!
//! The registry is the only state mutated by more than one connection. A
//! single `RwLock` guards the whole table so that `create` is an atomic
//! check-and-insert: for any unset room name exactly one concurrent caller
//! wins and every other caller observes the winner's creator id.
//!
//! Entries are created only by [`RoomRegistry::create`] and removed only
//! when a room's ready set becomes empty. `creator_id` never changes after
//! insertion.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEntry {
    pub creator_id: String,
    pub recording_active: bool,
}

/// Result of [`RoomRegistry::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The entry was inserted; carries the caller's id.
    Created(String),
    /// An entry already existed; carries its unchanged creator id.
    AlreadyExists(String),
}

impl CreateOutcome {
    pub fn creator_id(&self) -> &str {
        match self {
            CreateOutcome::Created(id) | CreateOutcome::AlreadyExists(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Concurrency-safe table of active rooms, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomEntry>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn exists(&self, room_id: &str) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    /// Insert a room unless one already exists under that name.
    pub async fn create(&self, room_id: &str, creator_id: &str) -> CreateOutcome {
        let mut rooms = self.rooms.write().await;

        if let Some(existing) = rooms.get(room_id) {
            tracing::debug!(
                target: "rc.rooms",
                room_id = %room_id,
                "Room already exists"
            );
            return CreateOutcome::AlreadyExists(existing.creator_id.clone());
        }

        rooms.insert(
            room_id.to_string(),
            RoomEntry {
                creator_id: creator_id.to_string(),
                recording_active: false,
            },
        );

        tracing::info!(
            target: "rc.rooms",
            room_id = %room_id,
            room_count = rooms.len(),
            "Room created"
        );

        CreateOutcome::Created(creator_id.to_string())
    }

    /// Creator of the room, or an empty string if the room is absent.
    pub async fn creator(&self, room_id: &str) -> String {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|entry| entry.creator_id.clone())
            .unwrap_or_default()
    }

    /// Recording flag of the room, `false` if the room is absent.
    pub async fn recording_status(&self, room_id: &str) -> bool {
        self.rooms
            .read()
            .await
            .get(room_id)
            .is_some_and(|entry| entry.recording_active)
    }

    /// Set the recording flag; no-op if the room is absent.
    pub async fn set_recording_status(&self, room_id: &str, active: bool) {
        if let Some(entry) = self.rooms.write().await.get_mut(room_id) {
            entry.recording_active = active;
        }
    }

    pub async fn remove(&self, room_id: &str) {
        if self.rooms.write().await.remove(room_id).is_some() {
            tracing::info!(target: "rc.rooms", room_id = %room_id, "Room removed");
        }
    }

    #[cfg(test)]
    async fn get(&self, room_id: &str) -> Option<RoomEntry> {
        self.rooms.read().await.get(room_id).cloned()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
