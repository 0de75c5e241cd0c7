//! SnapshotStore - Last-known button status, replaced wholesale each poll
//!
//! The store holds an `Arc<Snapshot>` behind a lock. Writers build a complete
//! new snapshot and swap the pointer; readers clone the `Arc` and work on an
//! immutable view, so nobody ever sees a half-built snapshot.

use super::types::{ButtonStatus, RemoteButton};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable view of every button reported by the last successful poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    buttons: BTreeMap<u32, ButtonStatus>,
    current_page: Option<i64>,
}

impl Snapshot {
    /// Build a snapshot from a payload's button list
    ///
    /// Duplicate button numbers keep the last record.
    pub fn from_buttons(buttons: &[RemoteButton], current_page: Option<i64>) -> Self {
        Self {
            buttons: buttons
                .iter()
                .map(|b| (b.button_number, ButtonStatus::from(b)))
                .collect(),
            current_page,
        }
    }

    pub fn get(&self, button: u32) -> Option<&ButtonStatus> {
        self.buttons.get(&button)
    }

    /// Iterate over (button number, status) in ascending button order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ButtonStatus)> {
        self.buttons.iter().map(|(n, s)| (*n, s))
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// 0-based page index from the last payload, if reported
    pub fn current_page(&self) -> Option<i64> {
        self.current_page
    }
}

/// Shared handle to the current snapshot
#[derive(Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with one built from `buttons`
    ///
    /// Only the reconciler writes to the store.
    pub(crate) fn replace(&self, buttons: &[RemoteButton], current_page: Option<i64>) -> Arc<Snapshot> {
        let next = Arc::new(Snapshot::from_buttons(buttons, current_page));
        *self.current.write() = Arc::clone(&next);
        next
    }

    /// Current snapshot (cheap `Arc` clone)
    pub fn load(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Status of one button, if it was in the last payload
    pub fn get(&self, button: u32) -> Option<ButtonStatus> {
        self.load().get(button).cloned()
    }

    /// All (button number, status) pairs
    pub fn entries(&self) -> Vec<(u32, ButtonStatus)> {
        self.load().iter().map(|(n, s)| (n, s.clone())).collect()
    }
}
