//! Poll scheduler - periodic `/api/status` fetch feeding the reconciler
//!
//! ## Guarantees
//! - **One timer**: `start()` always cancels the running task first, so
//!   reconfiguration is stop-then-start and two timers never coexist.
//! - **No overlap**: each task awaits its poll before the next tick, missed
//!   ticks are skipped, and `poll_now()` is refused while a poll is in flight.
//! - **Clean stop**: results are applied under a lock that also guards the
//!   generation counter. `stop()` bumps the generation under that lock, so
//!   once it returns no stale result can reach the reconciler.

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::reconciler::{ReconcileReport, Reconciler};
use crate::drivers::{HttpMethod, Transport};
use crate::state::StatusPayload;

/// Device endpoint polled each cycle
pub const STATUS_PATH: &str = "/api/status";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// Clamp a configured interval to the supported range; 0 means "use default"
pub fn clamp_interval(interval_ms: u64) -> u64 {
    if interval_ms == 0 {
        DEFAULT_POLL_INTERVAL_MS
    } else {
        interval_ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Payload applied to the snapshot and projections
    Applied(ReconcileReport),
    /// Response had no buttons list; nothing changed
    NoButtons,
    /// Fetch or decode failed; nothing changed
    Failed,
    /// Another poll was already in flight
    Skipped,
    /// Scheduler was stopped or restarted while the fetch was in flight
    Discarded,
}

/// Counters for status display
#[derive(Debug, Clone, Default)]
pub struct PollStats {
    pub applied: u64,
    pub failed: u64,
    pub skipped: u64,
    pub last_success: Option<DateTime<Local>>,
}

/// State shared between the scheduler handle and its timer task
struct PollShared {
    transport: Arc<dyn Transport>,
    reconciler: Reconciler,
    /// Bumped on every stop; results from older generations are dropped
    generation: AtomicU64,
    /// Serializes applying results against `stop()`
    apply_lock: Mutex<()>,
    /// Generation of the poll currently in flight, if any
    in_flight: Mutex<Option<u64>>,
    stats: RwLock<PollStats>,
}

/// Clears the in-flight marker when the poll finishes or is cancelled
struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<u64>>,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if *slot == Some(self.generation) {
            *slot = None;
        }
    }
}

impl PollShared {
    fn begin(&self, generation: u64) -> Option<InFlightGuard<'_>> {
        let mut slot = self.in_flight.lock();
        if *slot == Some(generation) {
            return None;
        }
        *slot = Some(generation);
        Some(InFlightGuard {
            slot: &self.in_flight,
            generation,
        })
    }

    async fn poll_once(&self, generation: u64) -> PollOutcome {
        let Some(_in_flight) = self.begin(generation) else {
            debug!("Poll already in flight, skipping");
            self.stats.write().skipped += 1;
            return PollOutcome::Skipped;
        };

        let fetched = self
            .transport
            .send_command(STATUS_PATH, HttpMethod::Get, None)
            .await;

        let payload = match fetched {
            Ok(value) => StatusPayload::from_value(value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let _apply = self.apply_lock.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding poll result from a stopped scheduler");
            return PollOutcome::Discarded;
        }

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Poll error: {}", e);
                self.stats.write().failed += 1;
                return PollOutcome::Failed;
            }
        };

        match self.reconciler.apply(&payload) {
            Some(report) => {
                let mut stats = self.stats.write();
                stats.applied += 1;
                stats.last_success = Some(Local::now());
                PollOutcome::Applied(report)
            }
            None => PollOutcome::NoButtons,
        }
    }
}

struct PollTask {
    handle: JoinHandle<()>,
    period: Duration,
}

/// Start/stop state machine around a recurring poll task
pub struct Poller {
    shared: Arc<PollShared>,
    task: Mutex<Option<PollTask>>,
}

impl Poller {
    pub fn new(transport: Arc<dyn Transport>, reconciler: Reconciler) -> Self {
        Self {
            shared: Arc::new(PollShared {
                transport,
                reconciler,
                generation: AtomicU64::new(0),
                apply_lock: Mutex::new(()),
                in_flight: Mutex::new(None),
                stats: RwLock::new(PollStats::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// (Re)start polling every `interval_ms` (clamped), polling immediately
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, interval_ms: u64) {
        let mut task = self.task.lock();
        self.cancel(&mut task);

        let generation = self.shared.generation.load(Ordering::SeqCst);
        let period = Duration::from_millis(clamp_interval(interval_ms));
        let shared = Arc::clone(&self.shared);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                shared.poll_once(generation).await;
            }
        });

        *task = Some(PollTask { handle, period });
        info!("🔄 Status polling started (every {}ms)", period.as_millis());
    }

    /// Stop polling; a no-op when already stopped
    pub fn stop(&self) {
        let mut task = self.task.lock();
        self.cancel(&mut task);
    }

    fn cancel(&self, task: &mut Option<PollTask>) {
        {
            let _apply = self.shared.apply_lock.lock();
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(running) = task.take() {
            running.handle.abort();
            info!("Status polling stopped");
        }
    }

    /// True while the timer task is armed and alive
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(false, |t| !t.handle.is_finished())
    }

    /// Interval of the running task, if any
    pub fn interval(&self) -> Option<Duration> {
        self.task.lock().as_ref().map(|t| t.period)
    }

    /// Poll once outside the timer cadence
    ///
    /// Skipped if a poll of the current generation is already in flight.
    pub async fn poll_now(&self) -> PollOutcome {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.shared.poll_once(generation).await
    }

    pub fn stats(&self) -> PollStats {
        self.shared.stats.read().clone()
    }

    /// Snapshot store fed by this poller
    pub fn store(&self) -> &crate::state::SnapshotStore {
        self.shared.reconciler.store()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(running) = self.task.get_mut().take() {
            running.handle.abort();
        }
    }
}
