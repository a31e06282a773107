//! Clip types for the timeline.

use serde::{Deserialize, Serialize};
use splice_core::{RejectReason, Seconds, TimeRange};
use std::collections::BTreeMap;

use crate::ids::{ClipId, TrackId};
use crate::track::TrackKind;

/// Tolerance for the duration/trim/speed consistency check.
pub(crate) const CONSISTENCY_EPSILON: f64 = 1e-6;

/// What a clip presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Video,
    Audio,
    Text,
    Image,
}

impl ClipKind {
    /// The kind of track this clip may live on.
    pub fn track_kind(self) -> TrackKind {
        match self {
            ClipKind::Video | ClipKind::Image => TrackKind::Video,
            ClipKind::Audio => TrackKind::Audio,
            ClipKind::Text => TrackKind::Text,
        }
    }

    /// Whether the clip is backed by seekable, time-based media.
    pub fn has_media_time(self) -> bool {
        matches!(self, ClipKind::Video | ClipKind::Audio)
    }
}

/// Reference to the media a clip plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// Path or URL of the resource (the text body for text clips).
    pub path: String,
    /// Full source duration, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Seconds>,
}

impl SourceRef {
    /// Create a source reference with a known duration.
    pub fn new(path: impl Into<String>, duration: Seconds) -> Self {
        Self {
            path: path.into(),
            duration: Some(duration),
        }
    }

    /// Create a source reference whose length is not known up front.
    pub fn unbounded(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            duration: None,
        }
    }
}

/// Preview-only effect state attached to a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipEffect {
    pub name: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

fn enabled_default() -> bool {
    true
}

impl ClipEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Unique clip ID
    pub id: ClipId,
    /// Owning track (nil until placed)
    pub track_id: TrackId,
    /// What the clip presents
    pub kind: ClipKind,
    /// Timeline in point
    pub start: Seconds,
    /// Timeline out point (exclusive)
    pub end: Seconds,
    /// Reference to source media
    pub source_ref: SourceRef,
    /// Clip name (displayed in UI)
    pub label: String,
    /// Source in point
    pub trim_start: Seconds,
    /// Source out point
    pub trim_end: Seconds,
    /// Playback speed (1.0 = normal)
    #[serde(default = "speed_default")]
    pub speed: f64,
    /// Preview effects
    #[serde(default)]
    pub effects: Vec<ClipEffect>,
}

fn speed_default() -> f64 {
    1.0
}

impl Clip {
    /// Create a clip at `start` playing the first `duration` seconds of `source`.
    pub fn new(
        kind: ClipKind,
        label: impl Into<String>,
        source: SourceRef,
        start: Seconds,
        duration: Seconds,
    ) -> Self {
        Self {
            id: ClipId::new(),
            track_id: TrackId::nil(),
            kind,
            start,
            end: start + duration,
            source_ref: source,
            label: label.into(),
            trim_start: 0.0,
            trim_end: duration,
            speed: 1.0,
            effects: Vec::new(),
        }
    }

    /// Start the source window at `trim_start` instead of zero.
    pub fn with_trim_start(mut self, trim_start: Seconds) -> Self {
        let span = self.source_span();
        self.trim_start = trim_start;
        self.trim_end = trim_start + span;
        self
    }

    /// Play at `speed`, keeping the source window and rescaling the timeline span.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self.end = self.start + self.source_span() / speed;
        self
    }

    pub fn with_effect(mut self, effect: ClipEffect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Duration on the timeline.
    #[inline]
    pub fn duration(&self) -> Seconds {
        self.end - self.start
    }

    /// Length of the trimmed source window.
    #[inline]
    pub fn source_span(&self) -> Seconds {
        self.trim_end - self.trim_start
    }

    /// Timeline range covered by the clip.
    #[inline]
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Whether `time` falls in `[start, end)`.
    #[inline]
    pub fn contains(&self, time: Seconds) -> bool {
        self.range().contains(time)
    }

    /// Source position presented at timeline `time`.
    #[inline]
    pub fn source_time_at(&self, time: Seconds) -> Seconds {
        self.trim_start + (time - self.start) * self.speed
    }

    /// Timeline time at which source `position` is presented.
    #[inline]
    pub fn timeline_time_at(&self, position: Seconds) -> Seconds {
        self.start + (position - self.trim_start) / self.speed
    }

    /// Reset the nominal source window of clips without media time.
    pub(crate) fn normalize_still_trim(&mut self) {
        if !self.kind.has_media_time() {
            self.trim_start = 0.0;
            self.trim_end = self.duration() * self.speed;
        }
    }

    /// Check the clip's own invariants.
    pub fn check(&self, min_duration: Seconds) -> Result<(), RejectReason> {
        let finite = [
            self.start,
            self.end,
            self.trim_start,
            self.trim_end,
            self.speed,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite || self.start < 0.0 || self.speed <= 0.0 || self.trim_start < 0.0 {
            return Err(RejectReason::OutOfRange);
        }
        if self.duration() + CONSISTENCY_EPSILON < min_duration || self.end <= self.start {
            return Err(RejectReason::BelowMinDuration);
        }
        if self.trim_end <= self.trim_start {
            return Err(RejectReason::OutOfRange);
        }
        if (self.duration() - self.source_span() / self.speed).abs() > CONSISTENCY_EPSILON {
            return Err(RejectReason::OutOfRange);
        }
        if let Some(limit) = self.source_ref.duration {
            if self.kind.has_media_time() && self.trim_end > limit + CONSISTENCY_EPSILON {
                return Err(RejectReason::OutOfRange);
            }
        }
        Ok(())
    }
}
