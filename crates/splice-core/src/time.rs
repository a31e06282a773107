//! Time representation for the timeline axis.
//!
//! Positions are plain `f64` seconds. Media elements report fractional
//! positions and the engine reconciles against them with tolerances, so
//! there is no benefit in a rational representation here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position or span on the timeline, in seconds.
pub type Seconds = f64;

/// Display rate used for timecodes and frame stepping, as `num / den` fps.
///
/// Playback itself never quantizes to frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const fn per_second(fps: u32) -> Self {
        Self { num: fps, den: 1 }
    }

    /// NTSC-style rate, e.g. `ntsc(30)` for 29.97.
    pub const fn ntsc(base: u32) -> Self {
        Self {
            num: base * 1000,
            den: 1001,
        }
    }

    pub fn fps(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// Length of one frame.
    pub fn frame_duration(self) -> Seconds {
        let fps = self.fps();
        if fps > 0.0 {
            1.0 / fps
        } else {
            0.0
        }
    }

    /// Index of the frame showing at `seconds`.
    pub fn frame_at(self, seconds: Seconds) -> u64 {
        // Nudge so exact frame starts don't floor into the previous frame.
        (seconds.max(0.0) * self.fps() + 1e-9).floor() as u64
    }

    /// `HH:MM:SS:FF` with a nominal (rounded) frame count per second.
    pub fn timecode(self, seconds: Seconds) -> String {
        let nominal = (self.fps().round() as u64).max(1);
        let frame = self.frame_at(seconds);
        let secs = frame / nominal;
        format!(
            "{:02}:{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
            frame % nominal
        )
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::per_second(30)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}fps", self.num)
        } else {
            write!(f, "{:.2}fps", self.fps())
        }
    }
}

/// Half-open span `[start, end)` of the timeline.
///
/// Butt-joined clips share an edge without overlapping: `[0, 5)` and
/// `[5, 8)` are disjoint and 5.0 belongs to the second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Seconds,
    pub end: Seconds,
}

impl TimeRange {
    pub fn new(start: Seconds, end: Seconds) -> Self {
        Self { start, end }
    }

    pub fn duration(self) -> Seconds {
        self.end - self.start
    }

    pub fn contains(self, time: Seconds) -> bool {
        self.start <= time && time < self.end
    }

    /// Shared interior with `other`; touching edges don't count.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3})", self.start, self.end)
    }
}
