//! Device state synchronization: poll scheduling and reconciliation

mod poller;
mod reconciler;

pub use poller::{
    clamp_interval, PollOutcome, PollStats, Poller, DEFAULT_POLL_INTERVAL_MS,
    MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS, STATUS_PATH,
};
pub use reconciler::{project, resolve_active_clip, ProjectionSink, ReconcileReport, Reconciler};
