//! Action catalog: operator commands mapped to device REST calls
//!
//! Each [`Action`] maps to exactly one transport call. Buttons are numbered
//! from 1 locally and addressed as `button-{n-1}` on the device.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::drivers::{HttpMethod, Transport, TransportError};

pub const MAX_BUTTON_NUMBER: u32 = 999;

/// Loop mode accepted by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    On,
    Off,
    #[default]
    Toggle,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::On => "on",
            LoopMode::Off => "off",
            LoopMode::Toggle => "toggle",
        }
    }
}

fn default_fade_seconds() -> f64 {
    3.0
}

fn default_volume_percent() -> f64 {
    100.0
}

/// An operator command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Play { button: u32 },
    Stop { button: u32 },
    Toggle { button: u32 },
    Pause { button: u32 },
    /// Select a clip and start it
    SelectClip { button: u32 },
    Fade {
        button: u32,
        #[serde(default = "default_fade_seconds")]
        seconds: f64,
    },
    ChangePage { page: u32 },
    StopAll,
    /// Play the next button in sequence (device wraps after the last)
    Next,
    GotoTime { button: u32, seconds: f64 },
    SetVolume {
        button: u32,
        #[serde(default = "default_volume_percent")]
        percent: f64,
    },
    SetLoop {
        button: u32,
        #[serde(default)]
        mode: LoopMode,
    },
    ToggleFullscreen,
    MoveOutput { screen: u32 },
}

/// Invalid action argument
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("button number {0} out of range 1..=999")]
    Button(u32),
    #[error("fade duration {0}s out of range 0.1..=30")]
    FadeDuration(f64),
    #[error("page {0} out of range 1..=99")]
    Page(u32),
    #[error("seek position {0}s out of range 0..=86400")]
    SeekPosition(f64),
    #[error("volume {0}% out of range 0..=200")]
    Volume(f64),
    #[error("screen {0} out of range 0..=10")]
    Screen(u32),
}

/// Failure of [`execute`]
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Invalid(#[from] ActionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The literal device call an action resolves to
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
}

impl CommandRequest {
    fn post(path: String) -> Self {
        Self {
            path,
            method: HttpMethod::Post,
            body: None,
        }
    }

    fn get(path: String) -> Self {
        Self {
            path,
            method: HttpMethod::Get,
            body: None,
        }
    }
}

/// Device-side identifier of a 1-based button number
pub fn remote_button_id(button: u32) -> String {
    format!("button-{}", button.saturating_sub(1))
}

fn check_button(button: u32) -> Result<(), ActionError> {
    if (1..=MAX_BUTTON_NUMBER).contains(&button) {
        Ok(())
    } else {
        Err(ActionError::Button(button))
    }
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value.is_finite() && value >= min && value <= max
}

impl Action {
    /// Snake-case name, as used in the `action` tag
    pub fn name(&self) -> &'static str {
        match self {
            Action::Play { .. } => "play",
            Action::Stop { .. } => "stop",
            Action::Toggle { .. } => "toggle",
            Action::Pause { .. } => "pause",
            Action::SelectClip { .. } => "select_clip",
            Action::Fade { .. } => "fade",
            Action::ChangePage { .. } => "change_page",
            Action::StopAll => "stop_all",
            Action::Next => "next",
            Action::GotoTime { .. } => "goto_time",
            Action::SetVolume { .. } => "set_volume",
            Action::SetLoop { .. } => "set_loop",
            Action::ToggleFullscreen => "toggle_fullscreen",
            Action::MoveOutput { .. } => "move_output",
        }
    }

    /// Check argument ranges
    pub fn validate(&self) -> Result<(), ActionError> {
        match *self {
            Action::Play { button }
            | Action::Stop { button }
            | Action::Toggle { button }
            | Action::Pause { button }
            | Action::SelectClip { button }
            | Action::SetLoop { button, .. } => check_button(button),
            Action::Fade { button, seconds } => {
                check_button(button)?;
                if !in_range(seconds, 0.1, 30.0) {
                    return Err(ActionError::FadeDuration(seconds));
                }
                Ok(())
            },
            Action::ChangePage { page } => {
                if (1..=99).contains(&page) {
                    Ok(())
                } else {
                    Err(ActionError::Page(page))
                }
            },
            Action::GotoTime { button, seconds } => {
                check_button(button)?;
                if !in_range(seconds, 0.0, 86_400.0) {
                    return Err(ActionError::SeekPosition(seconds));
                }
                Ok(())
            },
            Action::SetVolume { button, percent } => {
                check_button(button)?;
                if !in_range(percent, 0.0, 200.0) {
                    return Err(ActionError::Volume(percent));
                }
                Ok(())
            },
            Action::MoveOutput { screen } => {
                if screen <= 10 {
                    Ok(())
                } else {
                    Err(ActionError::Screen(screen))
                }
            },
            Action::StopAll | Action::Next | Action::ToggleFullscreen => Ok(()),
        }
    }

    /// Validate and resolve to the device call
    pub fn request(&self) -> Result<CommandRequest, ActionError> {
        self.validate()?;

        let button_path = |button: u32, verb: &str| {
            format!("/api/button/{}/{}", remote_button_id(button), verb)
        };

        let request = match self {
            Action::Play { button } | Action::SelectClip { button } => {
                CommandRequest::post(button_path(*button, "play"))
            },
            Action::Stop { button } => CommandRequest::post(button_path(*button, "stop")),
            Action::Toggle { button } => CommandRequest::post(button_path(*button, "toggle")),
            Action::Pause { button } => CommandRequest::post(button_path(*button, "pause")),
            Action::Fade { button, seconds } => CommandRequest {
                body: Some(json!({ "duration": (seconds * 1000.0).round() as u64 })),
                ..CommandRequest::post(button_path(*button, "fade"))
            },
            Action::ChangePage { page } => CommandRequest::post(format!("/api/page/{}", page)),
            Action::StopAll => CommandRequest::post("/api/stop-all".into()),
            Action::Next => CommandRequest::post("/api/next".into()),
            Action::GotoTime { button, seconds } => {
                CommandRequest::post(button_path(*button, &format!("goto/{}", seconds)))
            },
            Action::SetVolume { button, percent } => {
                // Device expects a 0..=2 gain
                CommandRequest::post(button_path(*button, &format!("volume/{}", percent / 100.0)))
            },
            Action::SetLoop { button, mode } => {
                CommandRequest::post(button_path(*button, &format!("loop/{}", mode.as_str())))
            },
            Action::ToggleFullscreen => CommandRequest::get("/api/output/fullscreen".into()),
            Action::MoveOutput { screen } => {
                CommandRequest::get(format!("/api/output/move/{}", screen))
            },
        };
        Ok(request)
    }
}

/// Validate, resolve and send one action
pub async fn execute(transport: &dyn Transport, action: &Action) -> Result<Value, DispatchError> {
    let request = action.request()?;
    debug!(action = action.name(), path = %request.path, "Dispatching action");

    let response = transport
        .send_command(&request.path, request.method, request.body)
        .await?;

    info!("▶️ {} → {} {}", action.name(), request.method, request.path);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn request(action: Action) -> CommandRequest {
        action.request().unwrap()
    }

    #[test]
    fn test_button_paths_are_zero_indexed() {
        assert_eq!(remote_button_id(1), "button-0");
        assert_eq!(remote_button_id(12), "button-11");

        let req = request(Action::Play { button: 3 });
        assert_eq!(req.path, "/api/button/button-2/play");
        assert_eq!(req.method, HttpMethod::Post);
        assert!(req.body.is_none());
    }

    #[test]
    fn test_select_clip_plays_button() {
        assert_eq!(
            request(Action::SelectClip { button: 5 }),
            request(Action::Play { button: 5 })
        );
    }

    #[test]
    fn test_fade_sends_milliseconds() {
        let req = request(Action::Fade { button: 1, seconds: 2.5 });
        assert_eq!(req.path, "/api/button/button-0/fade");
        assert_eq!(req.body, Some(json!({ "duration": 2500 })));

        let req = request(Action::Fade { button: 1, seconds: 0.1 });
        assert_eq!(req.body, Some(json!({ "duration": 100 })));
    }

    #[test]
    fn test_volume_percent_becomes_gain() {
        assert_eq!(
            request(Action::SetVolume { button: 2, percent: 100.0 }).path,
            "/api/button/button-1/volume/1"
        );
        assert_eq!(
            request(Action::SetVolume { button: 2, percent: 50.0 }).path,
            "/api/button/button-1/volume/0.5"
        );
        assert_eq!(
            request(Action::SetVolume { button: 2, percent: 200.0 }).path,
            "/api/button/button-1/volume/2"
        );
    }

    #[test]
    fn test_global_and_output_paths() {
        assert_eq!(request(Action::StopAll).path, "/api/stop-all");
        assert_eq!(request(Action::Next).path, "/api/next");
        assert_eq!(request(Action::ChangePage { page: 4 }).path, "/api/page/4");
        assert_eq!(
            request(Action::GotoTime { button: 1, seconds: 90.0 }).path,
            "/api/button/button-0/goto/90"
        );
        assert_eq!(
            request(Action::SetLoop { button: 7, mode: LoopMode::Off }).path,
            "/api/button/button-6/loop/off"
        );

        let fullscreen = request(Action::ToggleFullscreen);
        assert_eq!(fullscreen.path, "/api/output/fullscreen");
        assert_eq!(fullscreen.method, HttpMethod::Get);

        let moved = request(Action::MoveOutput { screen: 2 });
        assert_eq!(moved.path, "/api/output/move/2");
        assert_eq!(moved.method, HttpMethod::Get);
    }

    #[test]
    fn test_validation_ranges() {
        assert_eq!(
            Action::Play { button: 0 }.validate(),
            Err(ActionError::Button(0))
        );
        assert_eq!(
            Action::Stop { button: 1000 }.validate(),
            Err(ActionError::Button(1000))
        );
        assert_eq!(
            Action::Fade { button: 1, seconds: 31.0 }.validate(),
            Err(ActionError::FadeDuration(31.0))
        );
        assert_eq!(
            Action::ChangePage { page: 0 }.validate(),
            Err(ActionError::Page(0))
        );
        assert_eq!(
            Action::GotoTime { button: 1, seconds: -1.0 }.validate(),
            Err(ActionError::SeekPosition(-1.0))
        );
        assert_eq!(
            Action::SetVolume { button: 1, percent: 250.0 }.validate(),
            Err(ActionError::Volume(250.0))
        );
        assert_eq!(
            Action::MoveOutput { screen: 11 }.validate(),
            Err(ActionError::Screen(11))
        );
        assert!(Action::GotoTime { button: 1, seconds: f64::NAN }.validate().is_err());
        assert!(Action::StopAll.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let fade: Action = serde_json::from_value(json!({ "action": "fade", "button": 2 })).unwrap();
        assert_eq!(fade, Action::Fade { button: 2, seconds: 3.0 });

        let looped: Action =
            serde_json::from_value(json!({ "action": "set_loop", "button": 1 })).unwrap();
        assert_eq!(looped, Action::SetLoop { button: 1, mode: LoopMode::Toggle });

        let stop_all: Action = serde_json::from_value(json!({ "action": "stop_all" })).unwrap();
        assert_eq!(stop_all.name(), "stop_all");

        assert!(serde_json::from_value::<Action>(json!({ "action": "explode" })).is_err());
    }

    struct RecordingTransport {
        calls: Mutex<Vec<(String, HttpMethod, Option<Value>)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_command(
            &self,
            path: &str,
            method: HttpMethod,
            body: Option<Value>,
        ) -> Result<Value, TransportError> {
            self.calls.lock().push((path.to_string(), method, body));
            Ok(json!({ "ok": true }))
        }
    }

    #[tokio::test]
    async fn test_execute_sends_one_call() {
        let transport = RecordingTransport { calls: Mutex::new(Vec::new()) };

        let response = execute(&transport, &Action::Fade { button: 4, seconds: 1.0 })
            .await
            .unwrap();
        assert_eq!(response, json!({ "ok": true }));

        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/api/button/button-3/fade");
        assert_eq!(calls[0].2, Some(json!({ "duration": 1000 })));
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_without_calling() {
        let transport = RecordingTransport { calls: Mutex::new(Vec::new()) };

        let err = execute(&transport, &Action::ChangePage { page: 120 })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Invalid(ActionError::Page(120))));
        assert!(transport.calls.lock().is_empty());
    }
}
