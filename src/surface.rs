//! In-process host surface
//!
//! Receives the reconciler's projections, keeps the latest value of every
//! variable plus the registered feedback instances with their last result,
//! and pushes changes to subscribers (WebSocket clients, REPL).

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::feedback::{Feedback, FeedbackKind};
use crate::state::SnapshotStore;
use crate::sync::ProjectionSink;
use crate::variables::{VariableValue, VariableValues};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Change notification pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceUpdate {
    /// Variables whose value changed in the last publish
    Variables { values: VariableValues },
    /// A feedback whose result changed
    Feedback { id: String, value: bool },
}

/// A registered feedback instance and its last evaluated result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackState {
    pub feedback: Feedback,
    pub value: Option<bool>,
}

pub struct Surface {
    store: SnapshotStore,
    variables: DashMap<String, VariableValue>,
    feedbacks: RwLock<BTreeMap<String, FeedbackState>>,
    update_tx: broadcast::Sender<SurfaceUpdate>,
}

impl Surface {
    pub fn new(store: SnapshotStore) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            store,
            variables: DashMap::new(),
            feedbacks: RwLock::new(BTreeMap::new()),
            update_tx,
        }
    }

    /// Snapshot store feedbacks are evaluated against
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceUpdate> {
        self.update_tx.subscribe()
    }

    // ===== Variables =====

    pub fn variable(&self, id: &str) -> Option<VariableValue> {
        self.variables.get(id).map(|v| v.value().clone())
    }

    /// All published variables, optionally filtered by id prefix
    pub fn variables(&self, prefix: Option<&str>) -> VariableValues {
        self.variables
            .iter()
            .filter(|entry| prefix.map_or(true, |p| entry.key().starts_with(p)))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    // ===== Feedbacks =====

    /// Register (or replace) a feedback instance and evaluate it immediately
    pub fn register_feedback(&self, id: impl Into<String>, feedback: Feedback) -> bool {
        let id = id.into();
        let value = feedback.evaluate(&self.store.load());
        self.feedbacks.write().insert(
            id.clone(),
            FeedbackState {
                feedback,
                value: Some(value),
            },
        );
        debug!("Feedback registered: {} = {}", id, value);
        value
    }

    pub fn unregister_feedback(&self, id: &str) -> bool {
        self.feedbacks.write().remove(id).is_some()
    }

    /// Replace the whole registered set (config reload)
    pub fn replace_feedbacks(&self, feedbacks: &BTreeMap<String, Feedback>) {
        let snapshot = self.store.load();
        let next: BTreeMap<_, _> = feedbacks
            .iter()
            .map(|(id, feedback)| {
                let state = FeedbackState {
                    feedback: *feedback,
                    value: Some(feedback.evaluate(&snapshot)),
                };
                (id.clone(), state)
            })
            .collect();
        debug!("Registered {} feedback(s)", next.len());
        *self.feedbacks.write() = next;
    }

    pub fn feedback_states(&self) -> BTreeMap<String, FeedbackState> {
        self.feedbacks.read().clone()
    }

    /// Evaluate an ad-hoc feedback against the current snapshot
    pub fn evaluate(&self, feedback: &Feedback) -> bool {
        feedback.evaluate(&self.store.load())
    }
}

impl ProjectionSink for Surface {
    fn set_variable_values(&self, values: VariableValues) {
        let mut changed = VariableValues::new();
        for (id, value) in values {
            let unchanged = self
                .variables
                .get(&id)
                .map(|current| *current.value() == value)
                .unwrap_or(false);
            if !unchanged {
                self.variables.insert(id.clone(), value.clone());
                changed.insert(id, value);
            }
        }

        if changed.is_empty() {
            return;
        }
        trace!("{} variable(s) changed", changed.len());
        // No subscribers is fine
        let _ = self.update_tx.send(SurfaceUpdate::Variables { values: changed });
    }

    fn check_feedbacks(&self, kinds: &[FeedbackKind]) {
        let snapshot = self.store.load();
        let mut flipped = Vec::new();

        {
            let mut feedbacks = self.feedbacks.write();
            for (id, state) in feedbacks.iter_mut() {
                if !kinds.contains(&state.feedback.kind()) {
                    continue;
                }
                let value = state.feedback.evaluate(&snapshot);
                if state.value != Some(value) {
                    state.value = Some(value);
                    flipped.push((id.clone(), value));
                }
            }
        }

        for (id, value) in flipped {
            debug!("Feedback {} → {}", id, value);
            let _ = self.update_tx.send(SurfaceUpdate::Feedback { id, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::PlayerStatus;
    use crate::state::{ButtonState, RemoteButton};

    fn surface() -> Surface {
        Surface::new(SnapshotStore::new())
    }

    fn values(pairs: &[(&str, &str)]) -> VariableValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), VariableValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_set_variable_values_broadcasts_changes_only() {
        let surface = surface();
        let mut rx = surface.subscribe();

        surface.set_variable_values(values(&[("status", "playing"), ("clip_name", "Intro")]));
        surface.set_variable_values(values(&[("status", "paused"), ("clip_name", "Intro")]));
        surface.set_variable_values(values(&[("status", "paused")]));

        assert_eq!(
            rx.try_recv().unwrap(),
            SurfaceUpdate::Variables {
                values: values(&[("clip_name", "Intro"), ("status", "playing")])
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SurfaceUpdate::Variables {
                values: values(&[("status", "paused")])
            }
        );
        assert!(rx.try_recv().is_err());

        assert_eq!(surface.variable("status"), Some("paused".into()));
        assert_eq!(surface.variables(Some("clip")).len(), 1);
        assert_eq!(surface.variables(None).len(), 2);
    }

    #[test]
    fn test_check_feedbacks_reports_flips() {
        let surface = surface();
        surface.register_feedback("deck1", Feedback::ButtonPlaying { button: 1 });
        surface.register_feedback(
            "stopped",
            Feedback::PlayerStatus {
                status: PlayerStatus::Stopped,
            },
        );
        let mut rx = surface.subscribe();

        surface.store().replace(&[RemoteButton::new(1, ButtonState::Playing)], None);
        surface.check_feedbacks(FeedbackKind::all());

        let mut updates = vec![rx.try_recv().unwrap(), rx.try_recv().unwrap()];
        updates.sort_by_key(|u| format!("{:?}", u));
        assert_eq!(
            updates,
            vec![
                SurfaceUpdate::Feedback {
                    id: "deck1".into(),
                    value: true
                },
                SurfaceUpdate::Feedback {
                    id: "stopped".into(),
                    value: false
                },
            ]
        );

        // Same snapshot again: nothing flips
        surface.check_feedbacks(FeedbackKind::all());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_check_feedbacks_filters_by_kind() {
        let surface = surface();
        surface.register_feedback("deck1", Feedback::ButtonPlaying { button: 1 });
        surface.store().replace(&[RemoteButton::new(1, ButtonState::Playing)], None);

        surface.check_feedbacks(&[FeedbackKind::LoopStatus]);
        assert_eq!(surface.feedback_states()["deck1"].value, Some(false));

        surface.check_feedbacks(&[FeedbackKind::ButtonState]);
        assert_eq!(surface.feedback_states()["deck1"].value, Some(true));
    }

    #[test]
    fn test_replace_feedbacks() {
        let surface = surface();
        surface.register_feedback("old", Feedback::ButtonPaused { button: 3 });

        let mut next = BTreeMap::new();
        next.insert(
            "idle".to_string(),
            Feedback::PlayerStatus {
                status: PlayerStatus::Stopped,
            },
        );
        surface.replace_feedbacks(&next);

        let states = surface.feedback_states();
        assert_eq!(states.len(), 1);
        // Empty snapshot counts as stopped
        assert_eq!(states["idle"].value, Some(true));
        assert!(!surface.unregister_feedback("old"));
        assert!(surface.unregister_feedback("idle"));
    }
}
