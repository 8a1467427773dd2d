//! Room Controller (RC) Service Library
//!
//! Control plane for browser video calls:
//!
//! - Signaling relay between peers of a room (WebSocket)
//! - Room ownership and creator-only recording control
//! - Anonymous session identities carried in a signed cookie
//! - Mesh or relay topology, chosen once at startup
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/identity.rs -> handlers/ws.rs
//!     -> network.rs -> signaling/dispatcher.rs -> rooms, recording, adapter
//! ```
//!
//! # Modules
//!
//! - `adapter` - Room pub/sub capability and in-memory implementation
//! - `auth` - Session token claims, verification and minting
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Identity gate for the signaling socket
//! - `network` - Topology selection
//! - `recording` - Recording backend client
//! - `rooms` - Shared room registry
//! - `routes` - Axum router setup
//! - `signaling` - Wire format and per-connection dispatcher

pub mod adapter;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod network;
pub mod recording;
pub mod rooms;
pub mod routes;
pub mod signaling;
