//! Room ownership and recording state.

pub mod registry;

pub use registry::{CreateOutcome, RoomEntry, RoomRegistry};
