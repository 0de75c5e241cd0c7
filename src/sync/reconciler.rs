//! Remote status → snapshot + variable projection
//!
//! One call to [`Reconciler::apply`] per successful poll: replace the
//! snapshot, resolve the active clip, publish every variable, then ask the
//! host to re-check all feedbacks.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::feedback::FeedbackKind;
use crate::state::{RemoteButton, SnapshotStore, StatusPayload};
use crate::timecode::{self, TimecodeComponents, ZERO_TIMECODE};
use crate::variables::{button_var, AssetVars, VariableValue, VariableValues};

/// Receiver of projection output (the host side)
pub trait ProjectionSink: Send + Sync {
    /// Publish a batch of variable values
    fn set_variable_values(&self, values: VariableValues);

    /// Re-evaluate every registered feedback of the given kinds
    fn check_feedbacks(&self, kinds: &[FeedbackKind]);
}

/// Summary of one applied payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub buttons: usize,
    pub active_clip: Option<u32>,
    pub current_page: Option<i64>,
}

/// Applies status payloads to the snapshot store and the projection sink
pub struct Reconciler {
    store: SnapshotStore,
    sink: Arc<dyn ProjectionSink>,
}

impl Reconciler {
    pub fn new(store: SnapshotStore, sink: Arc<dyn ProjectionSink>) -> Self {
        Self { store, sink }
    }

    /// Snapshot store this reconciler writes to
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Apply one payload
    ///
    /// Returns `None` without touching anything when the payload carries no
    /// buttons list.
    pub fn apply(&self, payload: &StatusPayload) -> Option<ReconcileReport> {
        let Some(buttons) = payload.buttons.as_deref() else {
            trace!("Status payload has no buttons list, ignoring");
            return None;
        };

        self.store.replace(buttons, payload.current_page);

        let active = resolve_active_clip(buttons);
        let values = project(buttons, payload.current_page);
        let published = values.len();
        self.sink.set_variable_values(values);
        self.sink.check_feedbacks(FeedbackKind::all());

        let report = ReconcileReport {
            buttons: buttons.len(),
            active_clip: active.map(|b| b.button_number),
            current_page: payload.current_page,
        };
        debug!(
            buttons = report.buttons,
            active_clip = ?report.active_clip,
            variables = published,
            "Status reconciled"
        );
        Some(report)
    }
}

/// First button, in payload order, that is playing or paused
pub fn resolve_active_clip(buttons: &[RemoteButton]) -> Option<&RemoteButton> {
    buttons.iter().find(|b| b.state().is_active())
}

/// Every variable derived from one payload's button list
pub fn project(buttons: &[RemoteButton], current_page: Option<i64>) -> VariableValues {
    let mut values = VariableValues::new();

    for button in buttons {
        insert_button_values(&mut values, button);
    }

    match resolve_active_clip(buttons) {
        Some(active) => insert_active_clip_values(&mut values, active),
        None => insert_cleared_global_values(&mut values),
    }

    if let Some(page) = current_page {
        // Device value is untrusted; never overflow on it
        values.insert("current_page".into(), VariableValue::Number(page.saturating_add(1)));
    }

    values
}

fn insert_button_values(values: &mut VariableValues, button: &RemoteButton) {
    let n = button.button_number;
    let state = button.state().as_str();
    let current = button.current_time();
    let remaining = button.remaining();
    let current_tc = timecode::format_timecode(current);
    let remaining_tc = timecode::format_timecode(remaining);

    let mut put = |field: &str, value: VariableValue| {
        values.insert(button_var(n, field), value);
    };
    put("state", state.into());
    put("label", button.label().into());
    put("time", timecode::format_short(current).into());
    put("remaining", timecode::format_short(remaining).into());
    put("timecode", current_tc.clone().into());
    put("remaining_timecode", remaining_tc.clone().into());
    insert_components(&mut put, "timecode", &timecode::components(current));
    insert_components(&mut put, "remaining", &timecode::components(remaining));

    let asset = AssetVars::for_button(n);
    values.insert(asset.name, button.label().into());
    values.insert(asset.timecode, current_tc.into());
    values.insert(asset.remaining, remaining_tc.into());
    values.insert(asset.state, state.into());
}

fn insert_active_clip_values(values: &mut VariableValues, active: &RemoteButton) {
    let current = active.current_time();
    let remaining = active.remaining();

    let mut put = |id: &str, value: VariableValue| {
        values.insert(id.to_string(), value);
    };
    put("clip_id", VariableValue::Number(i64::from(active.button_number)));
    put("clip_name", active.label().into());
    put("status", active.state().as_str().into());
    put("loop", if active.is_looping() { "on" } else { "off" }.into());
    put("timecode", timecode::format_timecode(current).into());
    put("remaining_timecode", timecode::format_timecode(remaining).into());
    insert_components(&mut put, "timecode", &timecode::components(current));
    insert_components(&mut put, "remaining", &timecode::components(remaining));

    // 0 means "no goto target" on the device side
    let next_id = match active.goto_button_number {
        Some(n) if n > 0 => VariableValue::Number(i64::from(n)),
        _ => VariableValue::empty(),
    };
    put("next_clip_id", next_id);
    put(
        "next_clip_name",
        active.goto_button_label.clone().unwrap_or_default().into(),
    );
}

fn insert_cleared_global_values(values: &mut VariableValues) {
    let zero = TimecodeComponents::zero();
    let mut put = |id: &str, value: VariableValue| {
        values.insert(id.to_string(), value);
    };
    put("clip_id", VariableValue::empty());
    put("clip_name", VariableValue::empty());
    put("status", "stopped".into());
    put("loop", "off".into());
    put("timecode", ZERO_TIMECODE.into());
    put("remaining_timecode", ZERO_TIMECODE.into());
    insert_components(&mut put, "timecode", &zero);
    insert_components(&mut put, "remaining", &zero);
    put("next_clip_id", VariableValue::empty());
    put("next_clip_name", VariableValue::empty());
}

/// `{prefix}_hh` .. `{prefix}_ff`
fn insert_components(
    put: &mut impl FnMut(&str, VariableValue),
    prefix: &str,
    tc: &TimecodeComponents,
) {
    put(&format!("{}_hh", prefix), tc.hh.clone().into());
    put(&format!("{}_mm", prefix), tc.mm.clone().into());
    put(&format!("{}_ss", prefix), tc.ss.clone().into());
    put(&format!("{}_ff", prefix), tc.ff.clone().into());
}
