//! Boolean feedback predicates over the playback snapshot
//!
//! Every predicate is a pure read of a [`Snapshot`]. A button missing from the
//! snapshot does not exist: per-button predicates answer `false` for it.

use crate::state::{ButtonState, Snapshot};
use serde::{Deserialize, Serialize};

/// Button is playing
pub fn is_playing(snapshot: &Snapshot, button: u32) -> bool {
    state_is(snapshot, button, ButtonState::Playing)
}

/// Button is fading out
pub fn is_fading(snapshot: &Snapshot, button: u32) -> bool {
    state_is(snapshot, button, ButtonState::Fading)
}

/// Button is paused
pub fn is_paused(snapshot: &Snapshot, button: u32) -> bool {
    state_is(snapshot, button, ButtonState::Paused)
}

/// Button is playing or paused
pub fn is_active_clip(snapshot: &Snapshot, button: u32) -> bool {
    snapshot
        .get(button)
        .map(|s| s.state().is_active())
        .unwrap_or(false)
}

/// Player-wide status check
///
/// `Playing`/`Paused` hold when any button is in that state. `Stopped` is the
/// absence of activity: it holds only when no button is playing or paused,
/// so a single paused button makes it false.
pub fn player_status_matches(snapshot: &Snapshot, target: PlayerStatus) -> bool {
    match target {
        PlayerStatus::Playing => snapshot.iter().any(|(_, s)| s.state() == ButtonState::Playing),
        PlayerStatus::Paused => snapshot.iter().any(|(_, s)| s.state() == ButtonState::Paused),
        PlayerStatus::Stopped => snapshot.iter().all(|(_, s)| !s.state().is_active()),
    }
}

/// Button's loop flag equals `desired_on`; false for an absent button
pub fn loop_matches(snapshot: &Snapshot, button: u32, desired_on: bool) -> bool {
    snapshot
        .get(button)
        .map(|s| s.is_looping() == desired_on)
        .unwrap_or(false)
}

fn state_is(snapshot: &Snapshot, button: u32, state: ButtonState) -> bool {
    snapshot
        .get(button)
        .map(|s| s.state() == state)
        .unwrap_or(false)
}

/// Target of a [`Feedback::PlayerStatus`] check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Playing,
    Paused,
    Stopped,
}

/// Loop setting for a [`Feedback::LoopStatus`] check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopSetting {
    On,
    Off,
}

impl LoopSetting {
    pub fn is_on(&self) -> bool {
        matches!(self, LoopSetting::On)
    }
}

/// Feedback kinds, used to ask the host to re-check a group of feedbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackKind {
    ButtonState,
    ButtonFading,
    ButtonPaused,
    CurrentClip,
    PlayerStatus,
    LoopStatus,
}

impl FeedbackKind {
    /// Every kind; a poll re-checks all of them
    pub fn all() -> &'static [FeedbackKind] {
        &[
            FeedbackKind::ButtonState,
            FeedbackKind::ButtonFading,
            FeedbackKind::ButtonPaused,
            FeedbackKind::CurrentClip,
            FeedbackKind::PlayerStatus,
            FeedbackKind::LoopStatus,
        ]
    }
}

/// A parameterized feedback query
///
/// Deserializes from config / API as e.g.
/// `{ type: loop_status, button: 1, setting: on }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feedback {
    ButtonPlaying { button: u32 },
    ButtonFading { button: u32 },
    ButtonPaused { button: u32 },
    CurrentClip { button: u32 },
    PlayerStatus { status: PlayerStatus },
    LoopStatus { button: u32, setting: LoopSetting },
}

impl Feedback {
    pub fn kind(&self) -> FeedbackKind {
        match self {
            Feedback::ButtonPlaying { .. } => FeedbackKind::ButtonState,
            Feedback::ButtonFading { .. } => FeedbackKind::ButtonFading,
            Feedback::ButtonPaused { .. } => FeedbackKind::ButtonPaused,
            Feedback::CurrentClip { .. } => FeedbackKind::CurrentClip,
            Feedback::PlayerStatus { .. } => FeedbackKind::PlayerStatus,
            Feedback::LoopStatus { .. } => FeedbackKind::LoopStatus,
        }
    }

    /// Button number this feedback refers to, if any
    pub fn button(&self) -> Option<u32> {
        match self {
            Feedback::ButtonPlaying { button }
            | Feedback::ButtonFading { button }
            | Feedback::ButtonPaused { button }
            | Feedback::CurrentClip { button }
            | Feedback::LoopStatus { button, .. } => Some(*button),
            Feedback::PlayerStatus { .. } => None,
        }
    }

    pub fn evaluate(&self, snapshot: &Snapshot) -> bool {
        match *self {
            Feedback::ButtonPlaying { button } => is_playing(snapshot, button),
            Feedback::ButtonFading { button } => is_fading(snapshot, button),
            Feedback::ButtonPaused { button } => is_paused(snapshot, button),
            Feedback::CurrentClip { button } => is_active_clip(snapshot, button),
            Feedback::PlayerStatus { status } => player_status_matches(snapshot, status),
            Feedback::LoopStatus { button, setting } => {
                loop_matches(snapshot, button, setting.is_on())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RemoteButton;
    use serde_json::json;

    fn snapshot(buttons: &[(u32, ButtonState)]) -> Snapshot {
        let records: Vec<_> = buttons
            .iter()
            .map(|(n, s)| RemoteButton::new(*n, *s))
            .collect();
        Snapshot::from_buttons(&records, None)
    }

    #[test]
    fn test_state_predicates() {
        let snap = snapshot(&[
            (1, ButtonState::Playing),
            (2, ButtonState::Fading),
            (3, ButtonState::Paused),
        ]);

        assert!(is_playing(&snap, 1));
        assert!(!is_playing(&snap, 2));
        assert!(is_fading(&snap, 2));
        assert!(is_paused(&snap, 3));
        assert!(is_active_clip(&snap, 1));
        assert!(is_active_clip(&snap, 3));
        assert!(!is_active_clip(&snap, 2));
    }

    #[test]
    fn test_absent_button_is_false() {
        let snap = snapshot(&[(1, ButtonState::Playing)]);
        assert!(!is_playing(&snap, 9));
        assert!(!is_paused(&snap, 9));
        assert!(!is_fading(&snap, 9));
        assert!(!is_active_clip(&snap, 9));
    }

    #[test]
    fn test_paused_button_blocks_stopped() {
        let snap = snapshot(&[(1, ButtonState::Paused), (2, ButtonState::Idle)]);
        assert!(!player_status_matches(&snap, PlayerStatus::Stopped));
        assert!(player_status_matches(&snap, PlayerStatus::Paused));
        assert!(!player_status_matches(&snap, PlayerStatus::Playing));
    }

    #[test]
    fn test_stopped_when_nothing_active() {
        let snap = snapshot(&[
            (1, ButtonState::Idle),
            (2, ButtonState::Stopped),
            (3, ButtonState::Fading),
        ]);
        assert!(player_status_matches(&snap, PlayerStatus::Stopped));
        assert!(!player_status_matches(&snap, PlayerStatus::Playing));
    }

    #[test]
    fn test_stopped_on_empty_snapshot() {
        let snap = Snapshot::default();
        assert!(player_status_matches(&snap, PlayerStatus::Stopped));
        assert!(!player_status_matches(&snap, PlayerStatus::Playing));
    }

    #[test]
    fn test_loop_matches() {
        let mut looping = RemoteButton::new(1, ButtonState::Playing);
        looping.is_looping = Some(true);
        let plain = RemoteButton::new(2, ButtonState::Playing);
        let snap = Snapshot::from_buttons(&[looping, plain], None);

        assert!(loop_matches(&snap, 1, true));
        assert!(!loop_matches(&snap, 1, false));
        assert!(loop_matches(&snap, 2, false), "missing flag reads as off");
        assert!(!loop_matches(&snap, 2, true));
        assert!(!loop_matches(&snap, 3, true));
        assert!(!loop_matches(&snap, 3, false));
    }

    #[test]
    fn test_feedback_deserialize_and_evaluate() {
        let fb: Feedback =
            serde_json::from_value(json!({ "type": "loop_status", "button": 1, "setting": "off" }))
                .unwrap();
        assert_eq!(fb.kind(), FeedbackKind::LoopStatus);
        assert_eq!(fb.button(), Some(1));

        let snap = snapshot(&[(1, ButtonState::Idle)]);
        assert!(fb.evaluate(&snap));

        let fb: Feedback =
            serde_json::from_value(json!({ "type": "player_status", "status": "stopped" })).unwrap();
        assert!(fb.evaluate(&snap));
        assert_eq!(fb.button(), None);
    }
}
