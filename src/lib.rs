//! vplay-gw - state sync gateway for a Video Playback device
//!
//! Polls the device's `/api/status`, mirrors its buttons into a snapshot,
//! and derives variables and boolean feedbacks for a control surface.

pub mod actions;
pub mod api;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod feedback;
pub mod gateway;
pub mod state;
pub mod surface;
pub mod sync;
pub mod timecode;
pub mod variables;

pub use gateway::Gateway;
