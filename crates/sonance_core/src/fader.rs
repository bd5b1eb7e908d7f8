//! Volume Fader
//!
//! A fader is a timeline of `duration_ms` milliseconds whose eased value
//! drives the pipeline's volume modifier. Forward runs 0 → duration
//! (value 0.0 → 1.0), backward runs duration → 0 (1.0 → 0.0).
//!
//! ```text
//! value
//! 1.0 ┤            ╭────      Forward:  time 0 ─────────▶ duration
//!     │         ╭──╯          Backward: time 0 ◀───────── duration
//!     │      ╭──╯
//! 0.0 ┼──────╯
//!     └────────────────▶ time
//! ```
//!
//! Time is passed in explicitly so the owner thread decides when to tick.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Interval between fader updates while the owner pumps events
pub const FADER_TICK: Duration = Duration::from_millis(40);

/// Delay before `FaderFinished` with the fudge timer
pub const FADER_FUDGE: Duration = Duration::from_millis(2000);

/// Delay before `FaderFinished` without the fudge timer
pub const FADER_SHORT_FUDGE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaderDirection {
    Forward,
    Backward,
}

/// Easing curves applied to the fader progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    InQuad,
    OutQuad,
    #[default]
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InOutSine,
}

impl Easing {
    /// Map progress `t` in 0..=1 to an eased value in 0..=1
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::OutQuad => -t * (t - 2.0),
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -2.0 * t * t + 4.0 * t - 1.0
                }
            }
            Easing::InCubic => t * t * t,
            Easing::OutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            Easing::InOutSine => -0.5 * ((std::f64::consts::PI * t).cos() - 1.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fader {
    duration_ms: u64,
    direction: FaderDirection,
    easing: Easing,
    start_time_ms: u64,
    started: Instant,
}

impl Fader {
    /// Start a fader at `start_time_ms` on its timeline
    pub fn new(
        duration_ms: u64,
        direction: FaderDirection,
        easing: Easing,
        start_time_ms: u64,
        now: Instant,
    ) -> Self {
        Self {
            duration_ms,
            direction,
            easing,
            start_time_ms: start_time_ms.min(duration_ms),
            started: now,
        }
    }

    /// Start time for a new fader replacing `running`
    ///
    /// Equal durations continue from the running fader's time; otherwise
    /// the time is scaled to keep the same relative progress.
    pub fn start_time(
        duration_ms: u64,
        direction: FaderDirection,
        running: Option<&Fader>,
        now: Instant,
    ) -> u64 {
        let initial = match direction {
            FaderDirection::Forward => 0,
            FaderDirection::Backward => duration_ms,
        };
        match running {
            Some(old) if !old.is_finished(now) => {
                let current = old.current_time_ms(now);
                if old.duration_ms == duration_ms {
                    current
                } else if old.duration_ms == 0 {
                    initial
                } else {
                    (duration_ms as f64 * current as f64 / old.duration_ms as f64).round() as u64
                }
            }
            _ => initial,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn direction(&self) -> FaderDirection {
        self.direction
    }

    /// Position on the timeline in milliseconds
    pub fn current_time_ms(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started).as_millis() as u64;
        match self.direction {
            FaderDirection::Forward => (self.start_time_ms + elapsed).min(self.duration_ms),
            FaderDirection::Backward => self.start_time_ms.saturating_sub(elapsed),
        }
    }

    /// Eased value in 0..=1
    pub fn value(&self, now: Instant) -> f64 {
        if self.duration_ms == 0 {
            return match self.direction {
                FaderDirection::Forward => 1.0,
                FaderDirection::Backward => 0.0,
            };
        }
        let progress = self.current_time_ms(now) as f64 / self.duration_ms as f64;
        self.easing.apply(progress)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        match self.direction {
            FaderDirection::Forward => self.current_time_ms(now) >= self.duration_ms,
            FaderDirection::Backward => self.current_time_ms(now) == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::InQuad,
            Easing::OutQuad,
            Easing::InOutQuad,
            Easing::InCubic,
            Easing::OutCubic,
            Easing::InOutCubic,
            Easing::InOutSine,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-9, "{:?}", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9, "{:?}", easing);
        }
        assert!((Easing::InOutQuad.apply(0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_forward_timeline() {
        let now = Instant::now();
        let fader = Fader::new(1000, FaderDirection::Forward, Easing::Linear, 0, now);
        assert_eq!(fader.current_time_ms(now), 0);
        assert_eq!(fader.value(now), 0.0);

        let later = now + Duration::from_millis(250);
        assert_eq!(fader.current_time_ms(later), 250);
        assert!((fader.value(later) - 0.25).abs() < 1e-9);
        assert!(!fader.is_finished(later));
        assert!(fader.is_finished(now + Duration::from_millis(1000)));
    }

    #[test]
    fn test_backward_timeline() {
        let now = Instant::now();
        let fader = Fader::new(400, FaderDirection::Backward, Easing::Linear, 400, now);
        assert_eq!(fader.value(now), 1.0);
        let later = now + Duration::from_millis(100);
        assert_eq!(fader.current_time_ms(later), 300);
        assert!(fader.is_finished(now + Duration::from_millis(500)));
        assert_eq!(fader.value(now + Duration::from_millis(500)), 0.0);
    }

    #[test]
    fn test_restart_scales_time() {
        let now = Instant::now();
        let old = Fader::new(2000, FaderDirection::Forward, Easing::Linear, 0, now);
        let at = now + Duration::from_millis(500);

        // Same duration: continue where the old one is
        assert_eq!(Fader::start_time(2000, FaderDirection::Forward, Some(&old), at), 500);
        // Different duration: T * D2 / D
        assert_eq!(Fader::start_time(1000, FaderDirection::Forward, Some(&old), at), 250);
        assert_eq!(Fader::start_time(3000, FaderDirection::Backward, Some(&old), at), 750);
    }

    #[test]
    fn test_restart_after_finish_uses_initial_time() {
        let now = Instant::now();
        let old = Fader::new(100, FaderDirection::Forward, Easing::Linear, 0, now);
        let at = now + Duration::from_millis(200);
        assert_eq!(Fader::start_time(1000, FaderDirection::Backward, Some(&old), at), 1000);
        assert_eq!(Fader::start_time(1000, FaderDirection::Forward, None, at), 0);
    }
}
