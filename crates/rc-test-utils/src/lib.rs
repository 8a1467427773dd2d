//! # RC Test Utilities
//!
//! Shared test utilities for the Room Controller (RC) service.
//!
//! This crate provides:
//! - Session token builders (`TestTokenBuilder`)
//! - A scriptable recording backend (`MockRecordingBackend`)
//! - Server test harness (`TestRcServer` for E2E tests) and a WebSocket
//!   test client (`WsTestClient`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestRcServer::spawn().await?;
//!     let token = server.mint_token("alice")?;
//!     let mut client = server.connect_ws("room-1", "client-1", Some(&token)).await?;
//!
//!     client.send_json(&serde_json::json!({"type": "ping", "room": "room-1"})).await?;
//!     let pong = client.recv_event("pong").await?;
//!     assert_eq!(pong["payload"]["message"], "pong");
//!     Ok(())
//! }
//! ```

pub mod mock_recorder;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use mock_recorder::*;
pub use server_harness::*;
pub use token_builders::*;
