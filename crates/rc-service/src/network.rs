//! Media topology.
//!
//! The topology is chosen once at startup. The selected
//! [`NetworkHandler`] is given each accepted connection and decides what
//! serves it. In mesh mode browsers exchange media directly and the
//! signaling [`Dispatcher`] relays their negotiation. The relay (SFU)
//! topology needs a media relay this service does not provide, so selecting
//! it fails at startup.

use crate::adapter::Adapter;
use crate::config::ConfigError;
use crate::recording::RecordingBackend;
use crate::rooms::RoomRegistry;
use crate::signaling::{ConnectionContext, Dispatcher, InboundMessage};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Mesh,
    Sfu,
}

impl NetworkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkMode::Mesh => "mesh",
            NetworkMode::Sfu => "sfu",
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mesh" => Ok(NetworkMode::Mesh),
            "sfu" => Ok(NetworkMode::Sfu),
            other => Err(format!(
                "RC_NETWORK_TYPE must be 'mesh' or 'sfu', got '{other}'"
            )),
        }
    }
}

/// Shared collaborators handed to the selected topology.
#[derive(Clone)]
pub struct NetworkDeps {
    pub registry: RoomRegistry,
    pub recorder: Arc<dyn RecordingBackend>,
    pub adapter: Arc<dyn Adapter>,
}

/// Serves accepted connections for one topology.
pub trait NetworkHandler: Send + Sync {
    fn mode(&self) -> NetworkMode;

    /// Start serving a connection holding adapter subscription
    /// `subscription`; the task ends when `inbound` closes.
    fn serve(
        &self,
        ctx: ConnectionContext,
        subscription: u64,
        inbound: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<()>;

    fn adapter(&self) -> Arc<dyn Adapter>;
}

/// Full-mesh topology: one dispatcher per connection.
pub struct MeshNetwork {
    deps: NetworkDeps,
}

impl MeshNetwork {
    pub fn new(deps: NetworkDeps) -> Self {
        Self { deps }
    }
}

impl NetworkHandler for MeshNetwork {
    fn mode(&self) -> NetworkMode {
        NetworkMode::Mesh
    }

    fn serve(
        &self,
        ctx: ConnectionContext,
        subscription: u64,
        inbound: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<()> {
        let dispatcher = Dispatcher::new(
            ctx,
            subscription,
            self.deps.registry.clone(),
            Arc::clone(&self.deps.recorder),
            Arc::clone(&self.deps.adapter),
        );
        tokio::spawn(dispatcher.run(inbound))
    }

    fn adapter(&self) -> Arc<dyn Adapter> {
        Arc::clone(&self.deps.adapter)
    }
}

/// Select the topology for the configured mode.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for `sfu`.
pub fn select_network(
    mode: NetworkMode,
    deps: NetworkDeps,
) -> Result<Arc<dyn NetworkHandler>, ConfigError> {
    match mode {
        NetworkMode::Mesh => {
            tracing::info!(target: "rc.network", network = %mode, "Using network type mesh");
            Ok(Arc::new(MeshNetwork::new(deps)))
        }
        NetworkMode::Sfu => Err(ConfigError::InvalidValue(
            "RC_NETWORK_TYPE=sfu requires an external media relay, which is not available"
                .to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::auth::Identity;
    use crate::errors::RcError;
    use async_trait::async_trait;

    struct IdleRecorder;

    #[async_trait]
    impl RecordingBackend for IdleRecorder {
        async fn start(&self, _room_id: &str) -> Result<Option<String>, RcError> {
            Ok(None)
        }

        async fn stop(&self, _room_id: &str) -> Result<(), RcError> {
            Ok(())
        }
    }

    fn deps() -> NetworkDeps {
        NetworkDeps {
            registry: RoomRegistry::new(),
            recorder: Arc::new(IdleRecorder),
            adapter: Arc::new(MemoryAdapter::new()),
        }
    }

    #[test]
    fn test_parse_network_mode() {
        assert_eq!("mesh".parse::<NetworkMode>(), Ok(NetworkMode::Mesh));
        assert_eq!(" SFU ".parse::<NetworkMode>(), Ok(NetworkMode::Sfu));
        assert!("p2p".parse::<NetworkMode>().is_err());
        assert_eq!(NetworkMode::Mesh.to_string(), "mesh");
        assert_eq!(serde_json::to_string(&NetworkMode::Sfu).unwrap(), "\"sfu\"");
    }

    #[test]
    fn test_select_sfu_is_rejected() {
        assert!(matches!(
            select_network(NetworkMode::Sfu, deps()),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn test_mesh_serves_connection_until_stream_closes() {
        let network = select_network(NetworkMode::Mesh, deps()).unwrap();
        assert_eq!(network.mode(), NetworkMode::Mesh);

        let adapter = network.adapter();
        let mut sub = adapter.subscribe("r1", "c1").await;

        let (tx, rx) = mpsc::channel(4);
        let handle = network.serve(
            ConnectionContext {
                client_id: "c1".to_string(),
                room_id: "r1".to_string(),
                identity: Identity {
                    user_id: "u1".to_string(),
                },
            },
            sub.token,
            rx,
        );

        tx.send(InboundMessage::parse(r#"{"type":"ping","room":"r1"}"#).unwrap())
            .await
            .unwrap();
        let pong = sub.messages.recv().await.unwrap();
        assert!(pong.contains("pong"));

        drop(tx);
        handle.await.unwrap();
    }
}
