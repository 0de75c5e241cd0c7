//! State management module - mirrored playback state
//!
//! Holds the snapshot of every button reported by the playback device. The
//! snapshot is replaced wholesale on each successful poll and read by the
//! feedback evaluator and the host surfaces.

mod store;
mod types;

pub use store::{Snapshot, SnapshotStore};
pub use types::{ButtonState, ButtonStatus, RemoteButton, StatusPayload};
