//! Drag sessions.
//!
//! A drag is transient UI state: which clip is held, where it was grabbed
//! and which track the pointer hovers. Keeping it in an explicit value lets
//! the edit commands stay pure. Each pointer frame produces a preview by
//! running the `Move` command against the timeline as it was when the drag
//! began; the committed command is the last position that validated.

use splice_core::{EngineConfig, RejectReason, Seconds};

use crate::edit::EditCommand;
use crate::ids::{ClipId, TrackId};
use crate::timeline::Timeline;

/// Where the dragged clip would land this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePreview {
    pub start: Seconds,
    pub track_id: TrackId,
    /// Snap indicator position, if an edge snapped.
    pub snapped_to: Option<Seconds>,
    /// Set when the proposed drop is invalid; `start`/`track_id` then hold
    /// the last valid position.
    pub rejected: Option<RejectReason>,
}

/// An in-progress clip drag.
#[derive(Debug, Clone)]
pub struct DragSession {
    pub clip_id: ClipId,
    pub origin_track: TrackId,
    pub origin_start: Seconds,
    /// Pointer time minus clip start when the drag began.
    pub grab_offset: Seconds,
    pub hovered_track: Option<TrackId>,
    last_valid: (TrackId, Seconds),
}

impl DragSession {
    /// Start dragging `clip_id`, grabbed at timeline time `pointer`.
    pub fn begin(timeline: &Timeline, clip_id: ClipId, pointer: Seconds) -> Result<Self, RejectReason> {
        let clip = timeline.clip(clip_id).ok_or(RejectReason::NotFound)?;
        if timeline.track(clip.track_id).is_some_and(|t| t.locked) {
            return Err(RejectReason::TrackLocked);
        }
        Ok(Self {
            clip_id,
            origin_track: clip.track_id,
            origin_start: clip.start,
            grab_offset: pointer - clip.start,
            hovered_track: None,
            last_valid: (clip.track_id, clip.start),
        })
    }

    /// Update for a pointer frame.
    ///
    /// `timeline` must be the snapshot the drag started from.
    pub fn update(
        &mut self,
        timeline: &Timeline,
        config: &EngineConfig,
        pointer: Seconds,
        hovered_track: Option<TrackId>,
    ) -> MovePreview {
        self.hovered_track = hovered_track;
        let command = EditCommand::Move {
            clip_id: self.clip_id,
            start: pointer - self.grab_offset,
            track_id: hovered_track,
        };

        match command.apply(timeline, config) {
            Ok(outcome) => {
                let landed = outcome
                    .timeline
                    .clip(self.clip_id)
                    .map(|c| (c.track_id, c.start))
                    .unwrap_or(self.last_valid);
                self.last_valid = landed;
                MovePreview {
                    start: landed.1,
                    track_id: landed.0,
                    snapped_to: outcome.snapped_to,
                    rejected: None,
                }
            }
            Err(rejected) => MovePreview {
                start: self.last_valid.1,
                track_id: self.last_valid.0,
                snapped_to: None,
                rejected: Some(rejected.reason),
            },
        }
    }

    /// Whether the last valid position differs from where the clip started.
    pub fn has_moved(&self) -> bool {
        self.last_valid != (self.origin_track, self.origin_start)
    }

    /// The command that commits the drag at its last valid position.
    ///
    /// Snapping is already folded into the stored position, so re-applying
    /// it lands on the same spot.
    pub fn finish(self) -> EditCommand {
        EditCommand::Move {
            clip_id: self.clip_id,
            start: self.last_valid.1,
            track_id: Some(self.last_valid.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Clip, ClipKind, SourceRef};
    use crate::track::Track;

    fn setup() -> (Timeline, EngineConfig, ClipId, TrackId, TrackId) {
        let config = EngineConfig::default();
        let v1 = Track::new_video("V1");
        let v2 = Track::new_video("V2");
        let (v1_id, v2_id) = (v1.id, v2.id);
        let mut timeline = Timeline::new();
        for track in [v1, v2] {
            timeline = EditCommand::AddTrack { track, index: None }
                .apply(&timeline, &config)
                .unwrap()
                .timeline;
        }
        let a = Clip::new(ClipKind::Video, "a", SourceRef::new("a.mp4", 30.0), 0.0, 4.0);
        let b = Clip::new(ClipKind::Video, "b", SourceRef::new("b.mp4", 30.0), 10.0, 4.0);
        let a_id = a.id;
        timeline = EditCommand::Batch(vec![
            EditCommand::AddClip { track_id: v1_id, clip: a },
            EditCommand::AddClip { track_id: v1_id, clip: b },
        ])
        .apply(&timeline, &config)
        .unwrap()
        .timeline;
        (timeline, config, a_id, v1_id, v2_id)
    }

    #[test]
    fn preview_follows_pointer_with_grab_offset() {
        let (timeline, config, a, v1, _) = setup();
        let mut drag = DragSession::begin(&timeline, a, 1.0).unwrap();
        let preview = drag.update(&timeline, &config, 4.0, None);
        assert_eq!(preview.start, 3.0);
        assert_eq!(preview.track_id, v1);
        assert!(preview.rejected.is_none());
        assert!(drag.has_moved());
    }

    #[test]
    fn invalid_drop_keeps_last_valid_position() {
        let (timeline, config, a, v1, _) = setup();
        let mut drag = DragSession::begin(&timeline, a, 0.0).unwrap();
        drag.update(&timeline, &config, 3.0, None);
        let preview = drag.update(&timeline, &config, 9.0, None);
        assert_eq!(preview.rejected, Some(RejectReason::Overlap));
        assert_eq!(preview.start, 3.0);
        assert_eq!(preview.track_id, v1);

        let committed = drag.finish().apply(&timeline, &config).unwrap().timeline;
        assert_eq!(committed.clip(a).unwrap().start, 3.0);
    }

    #[test]
    fn drag_onto_other_track() {
        let (timeline, config, a, _, v2) = setup();
        let mut drag = DragSession::begin(&timeline, a, 0.0).unwrap();
        let preview = drag.update(&timeline, &config, 11.0, Some(v2));
        assert_eq!(preview.track_id, v2);
        assert_eq!(preview.start, 11.0);
        let committed = drag.finish().apply(&timeline, &config).unwrap().timeline;
        assert_eq!(committed.clip(a).unwrap().track_id, v2);
    }

    #[test]
    fn preview_reports_snap() {
        let (timeline, config, a, _, _) = setup();
        let mut drag = DragSession::begin(&timeline, a, 0.0).unwrap();
        let preview = drag.update(&timeline, &config, 5.96, None);
        assert_eq!(preview.snapped_to, Some(10.0));
        assert!((preview.start - 6.0).abs() < 1e-9);
    }
}
