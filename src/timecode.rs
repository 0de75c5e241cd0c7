//! Duration formatting for display variables
//!
//! Converts clip positions (seconds, as reported by the playback device) into
//! `MM:SS` strings, `HH:MM:SS:FF` timecodes and their individual fields.
//!
//! Timecodes always use the fixed four-field form, so a stopped clip reads
//! `00:00:00:00` and a 5.5s position reads `00:00:05:15`.

use serde::Serialize;

/// Frame rate assumed when converting fractional seconds to frames
pub const FRAMES_PER_SECOND: f64 = 30.0;

/// Timecode shown when nothing is playing
pub const ZERO_TIMECODE: &str = "00:00:00:00";

/// Individual timecode fields, each zero-padded to two digits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimecodeComponents {
    pub hh: String,
    pub mm: String,
    pub ss: String,
    pub ff: String,
}

impl TimecodeComponents {
    /// All-zero components (`00` in every field)
    pub fn zero() -> Self {
        components(0.0)
    }
}

/// Broken-down position, before any string formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parts {
    hours: u64,
    minutes: u64,
    seconds: u64,
    frames: u64,
}

/// Clamp negative, NaN and infinite input to zero
fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

fn split(seconds: f64) -> Parts {
    let s = sanitize(seconds);
    Parts {
        hours: (s / 3600.0).floor() as u64,
        minutes: ((s % 3600.0) / 60.0).floor() as u64,
        seconds: (s % 60.0).floor() as u64,
        // s % 1 is < 1.0, so frames stay within 0..=29
        frames: ((s % 1.0) * FRAMES_PER_SECOND).floor() as u64,
    }
}

/// Format as `MM:SS`
///
/// Minutes are not carried into hours: 3725s reads `62:05`.
pub fn format_short(seconds: f64) -> String {
    let s = sanitize(seconds);
    let minutes = (s / 60.0).floor() as u64;
    let secs = (s % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, secs)
}

/// Format as `HH:MM:SS:FF` at 30 fps
///
/// The hour field widens past two digits for durations of 100 hours or more.
pub fn format_timecode(seconds: f64) -> String {
    let p = split(seconds);
    format!(
        "{:02}:{:02}:{:02}:{:02}",
        p.hours, p.minutes, p.seconds, p.frames
    )
}

/// Split a position into zero-padded timecode fields
pub fn components(seconds: f64) -> TimecodeComponents {
    let p = split(seconds);
    TimecodeComponents {
        hh: format!("{:02}", p.hours),
        mm: format!("{:02}", p.minutes),
        ss: format!("{:02}", p.seconds),
        ff: format!("{:02}", p.frames),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_short() {
        assert_eq!(format_short(0.0), "00:00");
        assert_eq!(format_short(5.9), "00:05");
        assert_eq!(format_short(65.0), "01:05");
        assert_eq!(format_short(3725.0), "62:05");
    }

    #[test]
    fn test_format_timecode_fixed_width() {
        assert_eq!(format_timecode(0.0), ZERO_TIMECODE);
        assert_eq!(format_timecode(5.5), "00:00:05:15");
        assert_eq!(format_timecode(65.25), "00:01:05:07");
        assert_eq!(format_timecode(3661.0), "01:01:01:00");
    }

    #[test]
    fn test_invalid_input_clamps_to_zero() {
        for bad in [-1.0, -0.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(format_short(bad), "00:00");
            assert_eq!(format_timecode(bad), ZERO_TIMECODE);
            assert_eq!(components(bad), TimecodeComponents::zero());
        }
    }

    #[test]
    fn test_long_durations_do_not_fault() {
        assert_eq!(format_timecode(86400.0), "24:00:00:00");
        assert_eq!(format_timecode(360000.0), "100:00:00:00");
        assert_eq!(components(360000.0).hh, "100");
    }

    #[test]
    fn test_components() {
        let tc = components(3723.5);
        assert_eq!(tc.hh, "01");
        assert_eq!(tc.mm, "02");
        assert_eq!(tc.ss, "03");
        assert_eq!(tc.ff, "15");
    }

    proptest! {
        #[test]
        fn prop_short_format_shape(d in 0.0f64..6000.0) {
            let out = format_short(d);
            prop_assert_eq!(out.len(), 5);
            prop_assert_eq!(&out[2..3], ":");
            prop_assert!(out[..2].chars().all(|c| c.is_ascii_digit()));
            prop_assert!(out[3..].chars().all(|c| c.is_ascii_digit()));

            let minutes: u64 = out[..2].parse().unwrap();
            let secs: u64 = out[3..].parse().unwrap();
            prop_assert_eq!(minutes * 60 + secs, d.floor() as u64);
        }

        #[test]
        fn prop_components_two_digits(d in 0.0f64..360000.0) {
            let tc = components(d);
            for field in [&tc.hh, &tc.mm, &tc.ss, &tc.ff] {
                prop_assert_eq!(field.len(), 2);
                prop_assert!(field.chars().all(|c| c.is_ascii_digit()));
            }
            let ff: u32 = tc.ff.parse().unwrap();
            prop_assert!(ff <= 29);
        }

        #[test]
        fn prop_frames_in_range(d in proptest::num::f64::ANY) {
            let ff: u64 = components(d).ff.parse().unwrap();
            prop_assert!(ff <= 29);
        }

        #[test]
        fn prop_timecode_matches_components(d in 0.0f64..86400.0) {
            let tc = components(d);
            prop_assert_eq!(
                format_timecode(d),
                format!("{}:{}:{}:{}", tc.hh, tc.mm, tc.ss, tc.ff)
            );
        }
    }
}
