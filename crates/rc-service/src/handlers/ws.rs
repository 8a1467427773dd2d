//! Signaling WebSocket.
//!
//! `GET /ws?room=<room>&userId=<client>` sits behind the identity
//! middleware, so an [`Identity`] is always present here. After upgrade the
//! socket is split: a send task drains the client's adapter mailbox into the
//! socket, the receive loop parses text frames and queues them for the
//! connection's dispatcher. When the client goes away the dispatcher is left
//! to finish its cleanup before the client is unsubscribed. The subscription
//! token scopes that cleanup, so a connection replaced by a reconnect with
//! the same client id leaves the new one alone.

use crate::adapter::Subscription;
use crate::auth::Identity;
use crate::errors::RcError;
use crate::network::NetworkHandler;
use crate::routes::AppState;
use crate::signaling::{ConnectionContext, InboundMessage};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use common::types::new_base62_id;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Inbound frames queued ahead of the dispatcher per connection.
const INBOUND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[instrument(skip_all, name = "rc.handlers.ws")]
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RcError> {
    let room_id = query
        .room
        .filter(|room| !room.is_empty())
        .ok_or_else(|| RcError::Validation("Missing room parameter".to_string()))?;

    let client_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(new_base62_id);

    let ctx = ConnectionContext {
        client_id,
        room_id,
        identity,
    };
    let network = Arc::clone(&state.network);

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, network, ctx)))
}

async fn serve_socket(socket: WebSocket, network: Arc<dyn NetworkHandler>, ctx: ConnectionContext) {
    let room_id = ctx.room_id.clone();
    let client_id = ctx.client_id.clone();

    info!(
        target: "rc.handlers",
        room_id = %room_id,
        client_id = %client_id,
        "WebSocket connected"
    );

    let adapter = network.adapter();
    let Subscription {
        mut messages,
        token,
    } = adapter.subscribe(&room_id, &client_id).await;

    let (mut sink, mut stream) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);

    let dispatcher = network.serve(ctx, token, inbound_rx);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = messages.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let recv_loop = {
        let room_id = room_id.clone();
        let client_id = client_id.clone();
        async move {
            while let Some(Ok(message)) = stream.next().await {
                match message {
                    Message::Text(text) => match InboundMessage::parse(&text) {
                        Ok(inbound) => {
                            if inbound_tx.send(inbound).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(
                            target: "rc.handlers",
                            room_id = %room_id,
                            client_id = %client_id,
                            error = %e,
                            "Dropping unparseable frame"
                        ),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    };

    tokio::select! {
        _ = &mut send_task => {}
        () = recv_loop => {}
    }

    // the inbound sender was dropped with the receive loop, so the
    // dispatcher runs its disconnect cleanup and exits
    if let Err(e) = dispatcher.await {
        warn!(target: "rc.handlers", error = %e, "Dispatcher task failed");
    }

    send_task.abort();
    adapter.unsubscribe(&room_id, &client_id, token).await;

    info!(
        target: "rc.handlers",
        room_id = %room_id,
        client_id = %client_id,
        "WebSocket disconnected"
    );
}
