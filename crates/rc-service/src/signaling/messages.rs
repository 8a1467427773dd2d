//! Signaling wire format.
//!
//! Every frame in both directions is `{"type", "room", "payload"}`. Inbound
//! payloads are kept as raw JSON until [`SignalingRequest::decode`] turns them
//! into a typed request, so `signal` blobs can be forwarded byte-for-byte.

use crate::errors::RcError;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;

/// Inbound frame as received from a connection.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub room: String,

    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl InboundMessage {
    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Validation` if the frame is not a signaling envelope.
    pub fn parse(text: &str) -> Result<Self, RcError> {
        serde_json::from_str(text)
            .map_err(|e| RcError::Validation(format!("Malformed signaling frame: {e}")))
    }
}

/// A validated request, one variant per inbound message type.
#[derive(Debug)]
pub enum SignalingRequest {
    HangUp,
    Ready { nickname: String },
    Signal { target_id: String, signal: Box<RawValue> },
    CreateRoom { room: String },
    Record { record_status: bool },
    Ping,
}

#[derive(Deserialize)]
struct ReadyPayload {
    nickname: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalPayload {
    user_id: String,
    signal: Box<RawValue>,
}

#[derive(Deserialize)]
struct CreateRoomPayload {
    room: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordPayload {
    record_status: bool,
}

impl SignalingRequest {
    /// Decode and validate an inbound frame.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Validation` for unknown types, missing payloads,
    /// fields of the wrong type and empty required strings.
    pub fn decode(message: &InboundMessage) -> Result<Self, RcError> {
        match message.kind.as_str() {
            "hangUp" => Ok(SignalingRequest::HangUp),
            "ping" => Ok(SignalingRequest::Ping),
            "ready" => {
                let ReadyPayload { nickname } = payload(message)?;
                if nickname.is_empty() {
                    return Err(RcError::Validation("ready: nickname is empty".to_string()));
                }
                Ok(SignalingRequest::Ready { nickname })
            }
            "signal" => {
                let SignalPayload { user_id, signal } = payload(message)?;
                if user_id.is_empty() {
                    return Err(RcError::Validation("signal: userId is empty".to_string()));
                }
                Ok(SignalingRequest::Signal {
                    target_id: user_id,
                    signal,
                })
            }
            "createRoom" => {
                let CreateRoomPayload { room } = payload(message)?;
                if room.is_empty() {
                    return Err(RcError::Validation("createRoom: room is empty".to_string()));
                }
                Ok(SignalingRequest::CreateRoom { room })
            }
            "record" => {
                let RecordPayload { record_status } = payload(message)?;
                Ok(SignalingRequest::Record { record_status })
            }
            other => Err(RcError::Validation(format!(
                "Unknown message type: {other}"
            ))),
        }
    }

    /// Wire name of the request type.
    pub fn name(&self) -> &'static str {
        match self {
            SignalingRequest::HangUp => "hangUp",
            SignalingRequest::Ready { .. } => "ready",
            SignalingRequest::Signal { .. } => "signal",
            SignalingRequest::CreateRoom { .. } => "createRoom",
            SignalingRequest::Record { .. } => "record",
            SignalingRequest::Ping => "ping",
        }
    }
}

fn payload<T: for<'de> Deserialize<'de>>(message: &InboundMessage) -> Result<T, RcError> {
    let raw = message.payload.as_ref().ok_or_else(|| {
        RcError::Validation(format!("{}: missing payload", message.kind))
    })?;

    serde_json::from_str(raw.get())
        .map_err(|e| RcError::Validation(format!("{}: invalid payload: {e}", message.kind)))
}

/// `users`: ready-set snapshot for the room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersEvent {
    pub initiator: String,
    pub peer_ids: Vec<String>,
    pub nicknames: BTreeMap<String, String>,
    pub record_status: bool,
}

impl UsersEvent {
    /// Build the event from the ready clients; `peer_ids` is sorted.
    pub fn new(initiator: &str, ready: BTreeMap<String, String>, record_status: bool) -> Self {
        Self {
            initiator: initiator.to_string(),
            peer_ids: ready.keys().cloned().collect(),
            nicknames: ready,
            record_status,
        }
    }
}

/// `signal`: relayed negotiation data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub user_id: String,
    pub signal: Box<RawValue>,
}

/// `room_created`: outcome of `createRoom`; `successful` is `"1"` or `"0"`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedEvent {
    pub successful: &'static str,
    pub creator_id: String,
}

impl RoomCreatedEvent {
    pub fn new(successful: bool, creator_id: &str) -> Self {
        Self {
            successful: if successful { "1" } else { "0" },
            creator_id: creator_id.to_string(),
        }
    }
}

/// `record_callback`: outcome of `record`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCallbackEvent {
    pub successful: bool,
    pub record_status: bool,
}

/// `stream_url`: stream location for the recording requester.
#[derive(Debug, Clone, Serialize)]
pub struct StreamUrlEvent {
    pub url: String,
}

/// `hangUp`: a peer left the room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HangUpEvent {
    pub user_id: String,
}

/// `pong`: reply to `ping`.
#[derive(Debug, Clone, Serialize)]
pub struct PongEvent {
    pub message: &'static str,
}

/// Every event the server sends.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ServerEvent {
    Users(UsersEvent),
    Signal(SignalEvent),
    RoomCreated(RoomCreatedEvent),
    RecordCallback(RecordCallbackEvent),
    StreamUrl(StreamUrlEvent),
    HangUp(HangUpEvent),
    Pong(PongEvent),
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    room: &'a str,
    payload: &'a ServerEvent,
}

impl ServerEvent {
    pub fn pong() -> Self {
        ServerEvent::Pong(PongEvent { message: "pong" })
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Users(_) => "users",
            ServerEvent::Signal(_) => "signal",
            ServerEvent::RoomCreated(_) => "room_created",
            ServerEvent::RecordCallback(_) => "record_callback",
            ServerEvent::StreamUrl(_) => "stream_url",
            ServerEvent::HangUp(_) => "hangUp",
            ServerEvent::Pong(_) => "pong",
        }
    }

    /// Serialize the event into a wire frame for `room`.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if serialization fails.
    pub fn encode(&self, room: &str) -> Result<String, RcError> {
        serde_json::to_string(&OutboundEnvelope {
            kind: self.name(),
            room,
            payload: self,
        })
        .map_err(|e| RcError::Internal(format!("Failed to encode {} event: {e}", self.name())))
    }
}
