//! The timeline aggregate root.

use serde::{Deserialize, Serialize};
use splice_core::{defaults, FrameRate, Result, Seconds, SpliceError};
use std::collections::BTreeSet;

use crate::clip::Clip;
use crate::ids::{ClipId, MarkerId, TrackId};
use crate::track::{Track, TrackKind};

/// A point annotation on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: MarkerId,
    pub time: Seconds,
    pub label: String,
}

impl Marker {
    pub fn new(time: Seconds, label: impl Into<String>) -> Self {
        Self {
            id: MarkerId::new(),
            time,
            label: label.into(),
        }
    }
}

/// Tracks, markers, playhead and view state for one edit session.
///
/// Consumers read snapshots; changes go through [`crate::EditCommand`],
/// which returns a new validated timeline or a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Tracks, top of the stack first
    pub(crate) tracks: Vec<Track>,
    /// Markers sorted by time
    #[serde(default)]
    pub(crate) markers: Vec<Marker>,
    /// Max clip end over all tracks
    #[serde(default)]
    pub(crate) duration_seconds: Seconds,
    /// Playhead, clamped to `[0, duration_seconds]`
    #[serde(default)]
    pub(crate) current_time: Seconds,
    /// Pixels per second
    #[serde(default = "zoom_default")]
    pub(crate) zoom: f64,
    #[serde(default)]
    pub(crate) selection: BTreeSet<ClipId>,
    #[serde(default)]
    pub frame_rate: FrameRate,
}

fn zoom_default() -> f64 {
    defaults::PIXELS_PER_SECOND
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// Create an empty timeline with no tracks.
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            markers: Vec::new(),
            duration_seconds: 0.0,
            current_time: 0.0,
            zoom: defaults::PIXELS_PER_SECOND,
            selection: BTreeSet::new(),
            frame_rate: FrameRate::default(),
        }
    }

    /// Create a timeline with one video, one audio and one text track.
    pub fn with_default_tracks() -> Self {
        let mut timeline = Self::new();
        timeline.tracks.push(Track::new_video("V1"));
        timeline.tracks.push(Track::new_audio("A1"));
        timeline.tracks.push(Track::new_text("T1"));
        timeline
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn selection(&self) -> &BTreeSet<ClipId> {
        &self.selection
    }

    /// Max clip end over all tracks.
    pub fn duration(&self) -> Seconds {
        self.duration_seconds
    }

    pub fn current_time(&self) -> Seconds {
        self.current_time
    }

    /// Zoom factor in pixels per second.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Move the playhead, clamped to `[0, duration]`.
    pub fn set_current_time(&mut self, time: Seconds) -> Seconds {
        self.current_time = if time.is_finite() {
            time.clamp(0.0, self.duration_seconds)
        } else {
            0.0
        };
        self.current_time
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Tracks of a given kind, in stacking order.
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// Locate a clip. Returns (track index, &Clip).
    pub fn locate(&self, id: ClipId) -> Option<(usize, &Clip)> {
        self.tracks
            .iter()
            .enumerate()
            .find_map(|(ti, track)| track.find_clip(id).map(|(_, clip)| (ti, clip)))
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.locate(id).map(|(_, clip)| clip)
    }

    /// Every clip on every track.
    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.tracks.iter().flat_map(|t| t.clips().iter())
    }

    /// Recompute derived fields after a structural change.
    pub(crate) fn refresh(&mut self) {
        for track in &mut self.tracks {
            track.sort_clips();
        }
        self.duration_seconds = self.tracks.iter().map(Track::end).fold(0.0, f64::max);
        self.markers.sort_by(|a, b| a.time.total_cmp(&b.time));
        let live: BTreeSet<ClipId> = self.clips().map(|c| c.id).collect();
        self.selection.retain(|id| live.contains(id));
        let now = self.current_time;
        self.set_current_time(now);
    }

    /// Check every invariant; used on load and after edits.
    pub fn validate(&self, min_duration: Seconds) -> Result<()> {
        let mut seen = BTreeSet::new();
        for track in &self.tracks {
            track
                .validate(min_duration)
                .map_err(SpliceError::InvalidTimeline)?;
            for clip in track.clips() {
                if !seen.insert(clip.id) {
                    return Err(SpliceError::InvalidTimeline(format!(
                        "clip {} appears more than once",
                        clip.id
                    )));
                }
            }
        }
        let mut track_ids = BTreeSet::new();
        if !self.tracks.iter().all(|t| track_ids.insert(t.id)) {
            return Err(SpliceError::InvalidTimeline("duplicate track id".into()));
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            return Err(SpliceError::InvalidTimeline(format!(
                "zoom must be positive, got {}",
                self.zoom
            )));
        }
        if self.current_time < 0.0 || self.current_time > self.duration_seconds {
            return Err(SpliceError::InvalidTimeline(format!(
                "current time {} outside [0, {}]",
                self.current_time, self.duration_seconds
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{ClipKind, SourceRef};

    #[test]
    fn duration_is_max_clip_end_across_tracks() {
        let mut timeline = Timeline::with_default_tracks();
        timeline.tracks[0]
            .insert(Clip::new(ClipKind::Video, "v", SourceRef::new("v.mp4", 30.0), 0.0, 12.0))
            .unwrap();
        timeline.tracks[1]
            .insert(Clip::new(ClipKind::Audio, "a", SourceRef::new("a.wav", 30.0), 3.0, 20.0))
            .unwrap();
        timeline.refresh();
        assert_eq!(timeline.duration(), 23.0);
        timeline.validate(0.5).unwrap();
    }

    #[test]
    fn playhead_is_clamped() {
        let mut timeline = Timeline::with_default_tracks();
        timeline.tracks[0]
            .insert(Clip::new(ClipKind::Video, "v", SourceRef::new("v.mp4", 30.0), 0.0, 10.0))
            .unwrap();
        timeline.refresh();
        assert_eq!(timeline.set_current_time(42.0), 10.0);
        assert_eq!(timeline.set_current_time(-1.0), 0.0);
        assert_eq!(timeline.set_current_time(f64::NAN), 0.0);
    }
}
