//! Variable names, values and the definitions catalog
//!
//! Per-button variables exist in two namespaces that must agree for the same
//! button: 1-indexed `button_{n}_*` and 0-indexed `asset_*_{n-1}`. Global
//! variables describe the active clip.

use serde::Serialize;
use std::collections::BTreeMap;

/// Number of buttons the catalog declares variables for
pub const MAX_BUTTONS: u32 = 128;

/// A published variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Number(i64),
}

impl VariableValue {
    pub fn empty() -> Self {
        VariableValue::Text(String::new())
    }
}

impl std::fmt::Display for VariableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableValue::Text(s) => write!(f, "{}", s),
            VariableValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Text(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::Text(s)
    }
}

impl From<i64> for VariableValue {
    fn from(n: i64) -> Self {
        VariableValue::Number(n)
    }
}

/// Batch of variable id → value, as published after a poll
pub type VariableValues = BTreeMap<String, VariableValue>;

/// Per-button fields under the 1-indexed `button_{n}_` namespace
pub const BUTTON_FIELDS: &[(&str, &str)] = &[
    ("state", "State"),
    ("label", "Label"),
    ("time", "Current Time (MM:SS)"),
    ("remaining", "Remaining Time (MM:SS)"),
    ("timecode", "Timecode (HH:MM:SS:FF)"),
    ("timecode_hh", "Timecode Hours"),
    ("timecode_mm", "Timecode Minutes"),
    ("timecode_ss", "Timecode Seconds"),
    ("timecode_ff", "Timecode Frames"),
    ("remaining_timecode", "Remaining Timecode (HH:MM:SS:FF)"),
    ("remaining_hh", "Remaining Hours"),
    ("remaining_mm", "Remaining Minutes"),
    ("remaining_ss", "Remaining Seconds"),
    ("remaining_ff", "Remaining Frames"),
];

/// Global variables describing the active clip
pub const GLOBAL_FIELDS: &[(&str, &str)] = &[
    ("clip_id", "Current Clip ID (Button Number)"),
    ("clip_name", "Current Clip Name (File Name)"),
    ("status", "Player Status"),
    ("loop", "Loop Status"),
    ("timecode", "Current Timecode (HH:MM:SS:FF)"),
    ("timecode_hh", "Timecode Hours"),
    ("timecode_mm", "Timecode Minutes"),
    ("timecode_ss", "Timecode Seconds"),
    ("timecode_ff", "Timecode Frames"),
    ("remaining_timecode", "Remaining Timecode (HH:MM:SS:FF)"),
    ("remaining_hh", "Remaining Hours"),
    ("remaining_mm", "Remaining Minutes"),
    ("remaining_ss", "Remaining Seconds"),
    ("remaining_ff", "Remaining Frames"),
    ("current_page", "Current Page"),
    ("next_clip_id", "Next Clip ID (Button Number)"),
    ("next_clip_name", "Next Clip Name (File Name)"),
];

/// `button_{n}_{field}`
pub fn button_var(button: u32, field: &str) -> String {
    format!("button_{}_{}", button, field)
}

/// 0-indexed asset variables for a 1-based button number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetVars {
    pub name: String,
    pub timecode: String,
    pub remaining: String,
    pub state: String,
}

impl AssetVars {
    pub fn for_button(button: u32) -> Self {
        Self::for_index(i64::from(button) - 1)
    }

    pub fn for_index(index: i64) -> Self {
        Self {
            name: format!("asset_name_{}", index),
            timecode: format!("asset_{}_timecode", index),
            remaining: format!("asset_{}_remaining", index),
            state: format!("asset_{}_state", index),
        }
    }
}

/// Catalog entry: variable id and human-readable name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDefinition {
    pub id: String,
    pub name: String,
}

/// Every variable the gateway can publish
pub fn definitions() -> Vec<VariableDefinition> {
    let mut defs = Vec::new();

    for index in 0..i64::from(MAX_BUTTONS) {
        let asset = AssetVars::for_index(index);
        defs.push(def(asset.name, format!("Asset {} Filename", index)));
        defs.push(def(asset.timecode, format!("Asset {} Timecode (HH:MM:SS:FF)", index)));
        defs.push(def(asset.remaining, format!("Asset {} Remaining (HH:MM:SS:FF)", index)));
        defs.push(def(asset.state, format!("Asset {} State", index)));
    }

    for button in 1..=MAX_BUTTONS {
        for (field, label) in BUTTON_FIELDS {
            defs.push(def(
                button_var(button, field),
                format!("Button {} {}", button, label),
            ));
        }
    }

    for (id, name) in GLOBAL_FIELDS {
        defs.push(def(id.to_string(), name.to_string()));
    }

    defs
}

fn def(id: String, name: String) -> VariableDefinition {
    VariableDefinition { id, name }
}
