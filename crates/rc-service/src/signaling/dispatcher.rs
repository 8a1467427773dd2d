//! Per-connection signaling loop.
//!
//! A [`Dispatcher`] owns one connection's [`ConnectionContext`] and handles
//! that connection's frames strictly in arrival order: every registry
//! mutation and adapter call triggered by one frame completes before the
//! next frame is read. Failures never end the loop. Invalid frames are
//! logged and dropped, failed deliveries are logged, and rejected or failed
//! actions are reported to clients as negative-result events.

use crate::adapter::Adapter;
use crate::auth::Identity;
use crate::errors::RcError;
use crate::recording::RecordingBackend;
use crate::rooms::RoomRegistry;
use crate::signaling::messages::{
    HangUpEvent, InboundMessage, RecordCallbackEvent, RoomCreatedEvent, ServerEvent,
    SignalEvent, SignalingRequest, StreamUrlEvent, UsersEvent,
};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Identity and placement of one connection, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    pub client_id: String,
    pub room_id: String,
    pub identity: Identity,
}

pub struct Dispatcher {
    ctx: ConnectionContext,
    /// Adapter subscription token of this connection.
    subscription: u64,
    registry: RoomRegistry,
    recorder: Arc<dyn RecordingBackend>,
    adapter: Arc<dyn Adapter>,
}

impl Dispatcher {
    pub fn new(
        ctx: ConnectionContext,
        subscription: u64,
        registry: RoomRegistry,
        recorder: Arc<dyn RecordingBackend>,
        adapter: Arc<dyn Adapter>,
    ) -> Self {
        Self {
            ctx,
            subscription,
            registry,
            recorder,
            adapter,
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    /// Process frames until the stream ends, then clean up after the
    /// departed client.
    #[instrument(
        skip_all,
        name = "rc.signaling.connection",
        fields(room_id = %self.ctx.room_id, client_id = %self.ctx.client_id)
    )]
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        debug!(target: "rc.signaling", "Dispatcher started");

        while let Some(message) = inbound.recv().await {
            self.handle(message).await;
        }

        self.disconnect().await;
        debug!(target: "rc.signaling", "Dispatcher closed");
    }

    /// Handle one inbound frame to completion.
    pub async fn handle(&self, message: InboundMessage) {
        let request = match SignalingRequest::decode(&message) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    target: "rc.signaling",
                    room_id = %self.ctx.room_id,
                    client_id = %self.ctx.client_id,
                    error = %e,
                    "Dropping invalid message"
                );
                return;
            }
        };

        debug!(
            target: "rc.signaling",
            room_id = %self.ctx.room_id,
            client_id = %self.ctx.client_id,
            event = request.name(),
            "Handling message"
        );

        match request {
            SignalingRequest::HangUp => self.hang_up().await,
            SignalingRequest::Ready { nickname } => self.ready(&nickname).await,
            SignalingRequest::Signal { target_id, signal } => self.signal(&target_id, signal).await,
            SignalingRequest::CreateRoom { room } => self.create_room(&room).await,
            SignalingRequest::Record { record_status } => self.record(record_status).await,
            SignalingRequest::Ping => self.emit(&self.ctx.client_id, ServerEvent::pong()).await,
        }
    }

    async fn hang_up(&self) {
        if let Err(e) = self.leave_ready_set().await {
            self.log_delivery_failure("hangUp", &e);
        }
    }

    async fn ready(&self, nickname: &str) {
        if let Err(e) = self
            .adapter
            .set_metadata(
                &self.ctx.room_id,
                &self.ctx.client_id,
                self.subscription,
                nickname,
            )
            .await
        {
            self.log_delivery_failure("ready", &e);
            return;
        }

        let ready = self.ready_clients().await;
        let record_status = self.registry.recording_status(&self.ctx.room_id).await;
        let abandoned = ready.is_empty();

        self.broadcast(ServerEvent::Users(UsersEvent::new(
            &self.ctx.client_id,
            ready,
            record_status,
        )))
        .await;

        if abandoned {
            self.registry.remove(&self.ctx.room_id).await;
        }
    }

    async fn signal(&self, target_id: &str, signal: Box<RawValue>) {
        debug!(
            target: "rc.signaling",
            room_id = %self.ctx.room_id,
            from = %self.ctx.client_id,
            to = %target_id,
            "Relaying signal"
        );

        self.emit(
            target_id,
            ServerEvent::Signal(SignalEvent {
                user_id: self.ctx.client_id.clone(),
                signal,
            }),
        )
        .await;
    }

    async fn create_room(&self, room: &str) {
        let outcome = self.registry.create(room, &self.ctx.identity.user_id).await;

        if !outcome.is_created() {
            info!(
                target: "rc.signaling",
                room_id = %room,
                client_id = %self.ctx.client_id,
                creator_id = %outcome.creator_id(),
                "Room creation refused, room already exists"
            );
        }

        self.emit(
            &self.ctx.client_id,
            ServerEvent::RoomCreated(RoomCreatedEvent::new(
                outcome.is_created(),
                outcome.creator_id(),
            )),
        )
        .await;
    }

    async fn record(&self, requested: bool) {
        match self.change_recording(requested).await {
            Ok(stream_url) => {
                info!(
                    target: "rc.signaling",
                    room_id = %self.ctx.room_id,
                    recording = requested,
                    "Recording status changed"
                );

                self.broadcast(ServerEvent::RecordCallback(RecordCallbackEvent {
                    successful: true,
                    record_status: requested,
                }))
                .await;

                if let Some(url) = stream_url {
                    self.emit(
                        &self.ctx.client_id,
                        ServerEvent::StreamUrl(StreamUrlEvent { url }),
                    )
                    .await;
                }
            }
            Err(e) => {
                if matches!(e, RcError::PermissionDenied(_)) {
                    info!(
                        target: "rc.signaling",
                        room_id = %self.ctx.room_id,
                        client_id = %self.ctx.client_id,
                        reason = %e,
                        "Recording request refused"
                    );
                } else {
                    warn!(
                        target: "rc.signaling",
                        room_id = %self.ctx.room_id,
                        client_id = %self.ctx.client_id,
                        error = %e,
                        "Recording backend call failed"
                    );
                }
                self.record_failed().await;
            }
        }
    }

    /// Creator-only. The registry flag changes only after the backend
    /// accepted the request.
    async fn change_recording(&self, requested: bool) -> Result<Option<String>, RcError> {
        let room_id = &self.ctx.room_id;

        if self.registry.creator(room_id).await != self.ctx.identity.user_id {
            return Err(RcError::PermissionDenied(
                "Only the room creator can record".to_string(),
            ));
        }

        let stream_url = if requested {
            self.recorder.start(room_id).await?
        } else {
            self.recorder.stop(room_id).await?;
            None
        };

        self.registry.set_recording_status(room_id, requested).await;
        Ok(stream_url)
    }

    async fn record_failed(&self) {
        let current = self.registry.recording_status(&self.ctx.room_id).await;
        self.broadcast(ServerEvent::RecordCallback(RecordCallbackEvent {
            successful: false,
            record_status: current,
        }))
        .await;
    }

    /// Cleanup once the connection's stream has ended. Skipped when a
    /// newer connection has taken over this client id.
    async fn disconnect(&self) {
        if let Err(e) = self.leave_ready_set().await {
            debug!(
                target: "rc.signaling",
                room_id = %self.ctx.room_id,
                client_id = %self.ctx.client_id,
                error = %e,
                "Skipping disconnect cleanup"
            );
            return;
        }

        self.broadcast(ServerEvent::HangUp(HangUpEvent {
            user_id: self.ctx.client_id.clone(),
        }))
        .await;
    }

    /// Clear this client's nickname. If it was ready and nobody else is,
    /// the room is removed.
    async fn leave_ready_set(&self) -> Result<(), RcError> {
        let previous = self
            .adapter
            .set_metadata(&self.ctx.room_id, &self.ctx.client_id, self.subscription, "")
            .await?;

        if !previous.is_empty() && self.ready_clients().await.is_empty() {
            self.registry.remove(&self.ctx.room_id).await;
        }
        Ok(())
    }

    /// Clients in the room with a non-empty nickname.
    async fn ready_clients(&self) -> BTreeMap<String, String> {
        self.adapter
            .clients(&self.ctx.room_id)
            .await
            .into_iter()
            .filter(|(_, nickname)| !nickname.is_empty())
            .collect()
    }

    async fn broadcast(&self, event: ServerEvent) {
        let result = match event.encode(&self.ctx.room_id) {
            Ok(frame) => self.adapter.broadcast(&self.ctx.room_id, frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.log_delivery_failure(event.name(), &e);
        }
    }

    async fn emit(&self, target_id: &str, event: ServerEvent) {
        let result = match event.encode(&self.ctx.room_id) {
            Ok(frame) => self.adapter.emit(&self.ctx.room_id, target_id, frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.log_delivery_failure(event.name(), &e);
        }
    }

    fn log_delivery_failure(&self, event: &str, error: &RcError) {
        warn!(
            target: "rc.signaling",
            event = event,
            room_id = %self.ctx.room_id,
            client_id = %self.ctx.client_id,
            error = %error,
            "Error sending event"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NoRecorder;

    #[async_trait]
    impl RecordingBackend for NoRecorder {
        async fn start(&self, _room_id: &str) -> Result<Option<String>, RcError> {
            Err(RcError::Upstream("unavailable".to_string()))
        }

        async fn stop(&self, _room_id: &str) -> Result<(), RcError> {
            Err(RcError::Upstream("unavailable".to_string()))
        }
    }

    fn dispatcher(
        adapter: &Arc<MemoryAdapter>,
        registry: &RoomRegistry,
        client: &str,
        subscription: u64,
    ) -> Dispatcher {
        Dispatcher::new(
            ConnectionContext {
                client_id: client.to_string(),
                room_id: "r1".to_string(),
                identity: Identity {
                    user_id: format!("user-{client}"),
                },
            },
            subscription,
            registry.clone(),
            Arc::new(NoRecorder),
            Arc::clone(adapter) as Arc<dyn Adapter>,
        )
    }

    fn frame(text: &str) -> InboundMessage {
        InboundMessage::parse(text).unwrap()
    }

    #[tokio::test]
    async fn test_ping_replies_pong_to_sender() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry = RoomRegistry::new();
        let mut sub = adapter.subscribe("r1", "c1").await;

        dispatcher(&adapter, &registry, "c1", sub.token)
            .handle(frame(r#"{"type":"ping","room":"r1"}"#))
            .await;

        let reply: Value = serde_json::from_str(&sub.messages.recv().await.unwrap()).unwrap();
        assert_eq!(reply["type"], "pong");
        assert_eq!(reply["payload"]["message"], "pong");
    }

    #[tokio::test]
    async fn test_invalid_message_is_dropped() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry = RoomRegistry::new();
        let mut sub = adapter.subscribe("r1", "c1").await;

        let d = dispatcher(&adapter, &registry, "c1", sub.token);
        d.handle(frame(r#"{"type":"ready","room":"r1","payload":{"nickname":7}}"#))
            .await;
        d.handle(frame(r#"{"type":"bogus","room":"r1"}"#)).await;

        assert!(sub.messages.try_recv().is_err());
        assert_eq!(adapter.clients("r1").await.get("c1").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_run_broadcasts_hang_up_on_disconnect() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry = RoomRegistry::new();
        let leaving = adapter.subscribe("r1", "c1").await;
        let mut staying = adapter.subscribe("r1", "c2").await;

        let (tx, rx) = mpsc::channel(8);
        tx.send(frame(r#"{"type":"ready","room":"r1","payload":{"nickname":"a"}}"#))
            .await
            .unwrap();
        drop(tx);

        dispatcher(&adapter, &registry, "c1", leaving.token).run(rx).await;

        let users: Value = serde_json::from_str(&staying.messages.recv().await.unwrap()).unwrap();
        assert_eq!(users["type"], "users");

        let hang_up: Value =
            serde_json::from_str(&staying.messages.recv().await.unwrap()).unwrap();
        assert_eq!(hang_up["type"], "hangUp");
        assert_eq!(hang_up["payload"]["userId"], "c1");
        assert_eq!(adapter.clients("r1").await.get("c1").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_recorder_failure_reports_unsuccessful_callback() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry = RoomRegistry::new();
        let mut sub = adapter.subscribe("r1", "c1").await;
        registry.create("r1", "user-c1").await;

        dispatcher(&adapter, &registry, "c1", sub.token)
            .handle(frame(
                r#"{"type":"record","room":"r1","payload":{"recordStatus":true}}"#,
            ))
            .await;

        let callback: Value = serde_json::from_str(&sub.messages.recv().await.unwrap()).unwrap();
        assert_eq!(callback["type"], "record_callback");
        assert_eq!(callback["payload"]["successful"], false);
        assert_eq!(callback["payload"]["recordStatus"], false);
        assert!(!registry.recording_status("r1").await);
    }

    #[tokio::test]
    async fn test_hang_up_from_unready_client_keeps_room() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry = RoomRegistry::new();
        let _creator = adapter.subscribe("r1", "c1").await;
        let lurker = adapter.subscribe("r1", "c2").await;
        registry.create("r1", "user-c1").await;

        dispatcher(&adapter, &registry, "c2", lurker.token)
            .handle(frame(r#"{"type":"hangUp","room":"r1","payload":{}}"#))
            .await;

        assert_eq!(registry.creator("r1").await, "user-c1");
    }

    #[tokio::test]
    async fn test_superseded_connection_skips_disconnect_cleanup() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry = RoomRegistry::new();
        let stale = adapter.subscribe("r1", "c1").await;
        let mut current = adapter.subscribe("r1", "c1").await;

        let live = dispatcher(&adapter, &registry, "c1", current.token);
        live.handle(frame(r#"{"type":"ready","room":"r1","payload":{"nickname":"a"}}"#))
            .await;
        current.messages.recv().await.unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        dispatcher(&adapter, &registry, "c1", stale.token).run(rx).await;

        assert_eq!(adapter.clients("r1").await.get("c1").map(String::as_str), Some("a"));
        assert!(current.messages.try_recv().is_err());
    }
}
