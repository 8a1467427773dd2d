//! HTTP request handlers for Room Controller.

pub mod call;
pub mod health;
pub mod recording;
pub mod ws;

pub use call::{get_call, new_call};
pub use health::{health_handler, liveness_handler, HealthState};
pub use recording::join_recording;
pub use ws::ws_handler;
