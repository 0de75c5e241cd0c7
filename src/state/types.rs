//! Playback state type definitions
//!
//! Wire types for the device's `/api/status` payload and the per-button
//! status kept in the snapshot.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Playback state of a single button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonState {
    #[default]
    Idle,
    Playing,
    Paused,
    Fading,
    Stopped,
}

impl ButtonState {
    /// Parse from the device's lowercase name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(ButtonState::Idle),
            "playing" => Some(ButtonState::Playing),
            "paused" => Some(ButtonState::Paused),
            "fading" => Some(ButtonState::Fading),
            "stopped" => Some(ButtonState::Stopped),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonState::Idle => "idle",
            ButtonState::Playing => "playing",
            ButtonState::Paused => "paused",
            ButtonState::Fading => "fading",
            ButtonState::Stopped => "stopped",
        }
    }

    /// Playing or paused: the states that make a button the active clip
    pub fn is_active(&self) -> bool {
        matches!(self, ButtonState::Playing | ButtonState::Paused)
    }
}

impl std::fmt::Display for ButtonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown or null state strings read as absent rather than failing the payload
fn lenient_state<'de, D>(deserializer: D) -> Result<Option<ButtonState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ButtonState::parse))
}

/// Decode each record on its own, dropping malformed ones
///
/// A record with a missing or negative `buttonNumber` or a mistyped field
/// is skipped; the rest of the payload still applies. A `buttons` value that
/// is not a list remains an error.
fn lenient_buttons<'de, D>(deserializer: D) -> Result<Option<Vec<RemoteButton>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|records| {
        records
            .into_iter()
            .filter_map(|record| match RemoteButton::deserialize(&record) {
                Ok(button) => Some(button),
                Err(e) => {
                    debug!("Skipping malformed button record {}: {}", record, e);
                    None
                },
            })
            .collect()
    }))
}

/// One button record as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteButton {
    /// 1-based button number
    pub button_number: u32,
    #[serde(default, deserialize_with = "lenient_state")]
    pub state: Option<ButtonState>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub current_time: Option<f64>,
    #[serde(default)]
    pub remaining: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub is_looping: Option<bool>,
    /// Button that plays after this one finishes
    #[serde(default)]
    pub goto_button_number: Option<u32>,
    #[serde(default)]
    pub goto_button_label: Option<String>,
}

impl RemoteButton {
    /// A bare record with only the button number and state set
    pub fn new(button_number: u32, state: ButtonState) -> Self {
        Self {
            button_number,
            state: Some(state),
            label: None,
            current_time: None,
            remaining: None,
            duration: None,
            is_looping: None,
            goto_button_number: None,
            goto_button_label: None,
        }
    }

    pub fn state(&self) -> ButtonState {
        self.state.unwrap_or_default()
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    pub fn current_time(&self) -> f64 {
        self.current_time.unwrap_or(0.0)
    }

    pub fn remaining(&self) -> f64 {
        self.remaining.unwrap_or(0.0)
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping.unwrap_or(false)
    }
}

/// Body of `GET /api/status`
///
/// `buttons` is optional so a response without it can be told apart from a
/// response that fails to parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default, deserialize_with = "lenient_buttons")]
    pub buttons: Option<Vec<RemoteButton>>,
    /// 0-based page index
    #[serde(default)]
    pub current_page: Option<i64>,
}

impl StatusPayload {
    /// Decode from a raw JSON body
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Last-known status of one button, as stored in the snapshot
///
/// Fields absent from the wire stay `None`; the accessors apply defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonStatus {
    pub state: Option<ButtonState>,
    pub label: Option<String>,
    pub current_time: Option<f64>,
    pub remaining: Option<f64>,
    pub is_looping: Option<bool>,
}

impl ButtonStatus {
    pub fn state(&self) -> ButtonState {
        self.state.unwrap_or_default()
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    pub fn current_time(&self) -> f64 {
        self.current_time.unwrap_or(0.0)
    }

    pub fn remaining(&self) -> f64 {
        self.remaining.unwrap_or(0.0)
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping.unwrap_or(false)
    }
}

impl From<&RemoteButton> for ButtonStatus {
    fn from(button: &RemoteButton) -> Self {
        Self {
            state: button.state,
            label: button.label.clone(),
            current_time: button.current_time,
            remaining: button.remaining,
            is_looping: button.is_looping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_decode_full() {
        let payload = StatusPayload::from_value(json!({
            "buttons": [{
                "buttonNumber": 3,
                "state": "playing",
                "label": "intro.mp4",
                "currentTime": 12.5,
                "remaining": 47.5,
                "duration": 60.0,
                "isLooping": true,
                "gotoButtonNumber": 4,
                "gotoButtonLabel": "main.mp4"
            }],
            "currentPage": 1
        }))
        .unwrap();

        let buttons = payload.buttons.unwrap();
        assert_eq!(buttons[0].button_number, 3);
        assert_eq!(buttons[0].state(), ButtonState::Playing);
        assert_eq!(buttons[0].goto_button_number, Some(4));
        assert!(buttons[0].is_looping());
        assert_eq!(payload.current_page, Some(1));
    }

    #[test]
    fn test_payload_without_buttons() {
        let payload = StatusPayload::from_value(json!({ "currentPage": 0 })).unwrap();
        assert!(payload.buttons.is_none());
    }

    #[test]
    fn test_missing_fields_default_on_read() {
        let payload =
            StatusPayload::from_value(json!({ "buttons": [{ "buttonNumber": 1 }] })).unwrap();
        let button = &payload.buttons.unwrap()[0];

        assert_eq!(button.state, None);
        assert_eq!(button.state(), ButtonState::Idle);
        assert_eq!(button.label(), "");
        assert_eq!(button.current_time(), 0.0);
        assert!(!button.is_looping());
    }

    #[test]
    fn test_unknown_state_reads_as_idle() {
        let payload = StatusPayload::from_value(json!({
            "buttons": [{ "buttonNumber": 1, "state": "buffering" }]
        }))
        .unwrap();
        assert_eq!(payload.buttons.unwrap()[0].state(), ButtonState::Idle);
    }

    #[test]
    fn test_null_fields_accepted() {
        let payload = StatusPayload::from_value(json!({
            "buttons": [{ "buttonNumber": 2, "state": null, "label": null, "currentTime": null }]
        }))
        .unwrap();
        let button = &payload.buttons.unwrap()[0];
        assert_eq!(button.state(), ButtonState::Idle);
        assert_eq!(button.current_time(), 0.0);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let payload = StatusPayload::from_value(json!({
            "buttons": [
                { "state": "playing" },
                { "buttonNumber": -1, "state": "playing" },
                { "buttonNumber": 2, "currentTime": "12.5" },
                { "buttonNumber": 3, "state": "paused", "label": "b-roll.mov" },
                "garbage"
            ],
            "currentPage": 0
        }))
        .unwrap();

        let buttons = payload.buttons.unwrap();
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].button_number, 3);
        assert_eq!(buttons[0].state(), ButtonState::Paused);
        assert_eq!(payload.current_page, Some(0));
    }

    #[test]
    fn test_buttons_not_a_list_is_an_error() {
        assert!(StatusPayload::from_value(json!({ "buttons": "nope" })).is_err());
    }

    #[test]
    fn test_is_active() {
        assert!(ButtonState::Playing.is_active());
        assert!(ButtonState::Paused.is_active());
        assert!(!ButtonState::Fading.is_active());
        assert!(!ButtonState::Stopped.is_active());
        assert!(!ButtonState::Idle.is_active());
    }
}
