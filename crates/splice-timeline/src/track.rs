//! Track types for the timeline.

use serde::{Deserialize, Serialize};
use splice_core::{RejectReason, Seconds, TimeRange};

use crate::clip::Clip;
use crate::ids::{ClipId, TrackId};

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
}

/// A lane of same-kind clips, ordered by start, never overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Track kind
    pub kind: TrackKind,
    /// Clips sorted by start. Mutated only through `insert`/`remove`.
    #[serde(default)]
    clips: Vec<Clip>,
    /// Is track muted (skipped by playback)
    #[serde(default)]
    pub muted: bool,
    /// Is track locked (prevent edits)
    #[serde(default)]
    pub locked: bool,
}

impl Track {
    /// Create an empty track.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            kind,
            clips: Vec::new(),
            muted: false,
            locked: false,
        }
    }

    /// Create a new video track.
    pub fn new_video(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, name)
    }

    /// Create a new audio track.
    pub fn new_audio(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, name)
    }

    /// Create a new text track.
    pub fn new_text(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Text, name)
    }

    /// Clips in start order.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Number of clips in this track.
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Whether a clip of `clip`'s kind may live here.
    pub fn accepts(&self, clip: &Clip) -> bool {
        clip.kind.track_kind() == self.kind
    }

    /// End of the last clip, or zero.
    pub fn end(&self) -> Seconds {
        self.clips.iter().map(|c| c.end).fold(0.0, f64::max)
    }

    /// Sum of clip durations.
    pub fn occupied_duration(&self) -> Seconds {
        self.clips.iter().map(Clip::duration).sum()
    }

    /// Find a clip by id. Returns (index, &Clip).
    pub fn find_clip(&self, id: ClipId) -> Option<(usize, &Clip)> {
        self.clips.iter().enumerate().find(|(_, c)| c.id == id)
    }

    /// Index of the first clip whose start is at or after `time`.
    fn lower_bound(&self, time: Seconds) -> usize {
        self.clips.partition_point(|c| c.start < time)
    }

    /// The clip whose `[start, end)` contains `time`.
    pub fn clip_at_time(&self, time: Seconds) -> Option<&Clip> {
        let idx = self.clips.partition_point(|c| c.start <= time);
        idx.checked_sub(1)
            .map(|i| &self.clips[i])
            .filter(|c| c.contains(time))
    }

    /// The first clip starting at or after `time`.
    pub fn first_clip_from(&self, time: Seconds) -> Option<&Clip> {
        self.clips.get(self.lower_bound(time))
    }

    /// Clips starting at or after `time`, in order.
    pub fn clips_from(&self, time: Seconds) -> &[Clip] {
        &self.clips[self.lower_bound(time)..]
    }

    /// Clips with any part in `(after, until]`. Ends are ordered like
    /// starts because clips never overlap.
    pub fn clips_touching(&self, after: Seconds, until: Seconds) -> &[Clip] {
        let lo = self.clips.partition_point(|c| c.end <= after);
        let hi = self.clips.partition_point(|c| c.start <= until);
        self.clips.get(lo..hi.max(lo)).unwrap_or(&[])
    }

    /// Whether `range` is unoccupied, optionally ignoring one clip.
    pub fn is_free(&self, range: TimeRange, ignore: Option<ClipId>) -> bool {
        // Only the clip before the insertion point and those starting inside
        // the range can intersect it.
        let from = self.lower_bound(range.start).saturating_sub(1);
        self.clips[from..]
            .iter()
            .take_while(|c| c.start < range.end)
            .filter(|c| Some(c.id) != ignore)
            .all(|c| !c.range().overlaps(range))
    }

    /// Insert a clip, keeping start order. Claims ownership of the clip.
    pub fn insert(&mut self, mut clip: Clip) -> Result<usize, RejectReason> {
        if !self.accepts(&clip) {
            return Err(RejectReason::KindMismatch);
        }
        if !self.is_free(clip.range(), Some(clip.id)) {
            return Err(RejectReason::Overlap);
        }
        clip.track_id = self.id;
        let index = self.lower_bound(clip.start);
        self.clips.insert(index, clip);
        Ok(index)
    }

    /// Remove a clip by id.
    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let (index, _) = self.find_clip(id)?;
        Some(self.clips.remove(index))
    }

    /// Shift every clip starting at or after `from` by `delta`.
    ///
    /// Callers guarantee the shift cannot create an overlap.
    pub(crate) fn shift_from(&mut self, from: Seconds, delta: Seconds) {
        let idx = self.lower_bound(from);
        for clip in &mut self.clips[idx..] {
            clip.start += delta;
            clip.end += delta;
        }
    }

    /// Restore start order after deserialization.
    pub(crate) fn sort_clips(&mut self) {
        self.clips.sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    /// Re-check ordering, ownership, kind and overlap invariants.
    pub fn validate(&self, min_duration: Seconds) -> Result<(), String> {
        for clip in &self.clips {
            if clip.track_id != self.id {
                return Err(format!("clip {} is not owned by track {}", clip.id, self.id));
            }
            if !self.accepts(clip) {
                return Err(format!("clip {} kind {:?} on {:?} track", clip.id, clip.kind, self.kind));
            }
            clip.check(min_duration)
                .map_err(|reason| format!("clip {}: {}", clip.id, reason))?;
        }
        for pair in self.clips.windows(2) {
            if pair[0].end > pair[1].start {
                return Err(format!(
                    "clips {} and {} overlap on track {}",
                    pair[0].id, pair[1].id, self.name
                ));
            }
        }
        Ok(())
    }
}
