//! Edit operations.
//!
//! Uses the Command pattern: every mutation is an `EditCommand`. Applying a
//! command never touches the input timeline. It works on a copy and returns
//! either the new, invariant-satisfying timeline or the reason it refused,
//! so a rejected edit is always a no-op.

use splice_core::{EngineConfig, RejectReason, Seconds};
use thiserror::Error;
use tracing::debug;

use crate::clip::Clip;
use crate::ids::{ClipId, MarkerId, TrackId};
use crate::snapping::SnappingEngine;
use crate::timeline::{Marker, Timeline};
use crate::track::Track;

// ── Trim types ──────────────────────────────────────────────────

/// Which edge of a clip a trim moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimEdge {
    Start,
    End,
}

// ── Edit commands ───────────────────────────────────────────────

/// An atomic edit operation on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Place a new clip on a track.
    AddClip { track_id: TrackId, clip: Clip },
    /// Move a clip to a proposed start, optionally onto another track.
    /// Both edges snap; the duration never changes.
    Move {
        clip_id: ClipId,
        start: Seconds,
        track_id: Option<TrackId>,
    },
    /// Move one edge of a clip, keeping the source in/out point in step.
    Trim {
        clip_id: ClipId,
        edge: TrimEdge,
        time: Seconds,
    },
    /// Cut a clip in two at a timeline time strictly inside it.
    Split { clip_id: ClipId, at: Seconds },
    /// Remove a clip, leaving a gap.
    Delete { clip_id: ClipId },
    /// Remove a clip and pull later clips on its track earlier to close the gap.
    RippleDelete { clip_id: ClipId },
    /// Relocate a clip to the track at `track_index`, keeping its start.
    MoveToTrack { clip_id: ClipId, track_index: usize },
    /// Place a copy directly after the original.
    Duplicate { clip_id: ClipId },
    /// Change playback speed, rescaling the clip's timeline duration.
    SetSpeed { clip_id: ClipId, speed: f64 },
    /// Add an empty track at `index` (appended when `None`).
    AddTrack { track: Track, index: Option<usize> },
    /// Remove a track and every clip on it.
    RemoveTrack { track_id: TrackId },
    SetTrackMuted { track_id: TrackId, muted: bool },
    SetTrackLocked { track_id: TrackId, locked: bool },
    AddMarker { marker: Marker },
    RemoveMarker { marker_id: MarkerId },
    MoveMarker { marker_id: MarkerId, time: Seconds },
    /// Select clips, extending the current selection when `additive`.
    Select { clip_ids: Vec<ClipId>, additive: bool },
    ClearSelection,
    /// Set the zoom in pixels per second.
    SetZoom { pixels_per_second: f64 },
    /// A batch of commands applied atomically.
    Batch(Vec<EditCommand>),
}

/// An edit that was refused. The timeline it was applied to is unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{command} rejected: {reason}")]
pub struct EditRejected {
    pub command: &'static str,
    pub reason: RejectReason,
}

/// A successfully applied edit.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub timeline: Timeline,
    /// Clip created by split, duplicate or add.
    pub created: Option<ClipId>,
    /// Snap point a move or trim settled on.
    pub snapped_to: Option<Seconds>,
}

#[derive(Default)]
struct Effects {
    created: Option<ClipId>,
    snapped_to: Option<Seconds>,
}

impl EditCommand {
    /// Short name used in logs and rejections.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddClip { .. } => "add-clip",
            Self::Move { .. } => "move",
            Self::Trim { .. } => "trim",
            Self::Split { .. } => "split",
            Self::Delete { .. } => "delete",
            Self::RippleDelete { .. } => "ripple-delete",
            Self::MoveToTrack { .. } => "move-to-track",
            Self::Duplicate { .. } => "duplicate",
            Self::SetSpeed { .. } => "set-speed",
            Self::AddTrack { .. } => "add-track",
            Self::RemoveTrack { .. } => "remove-track",
            Self::SetTrackMuted { .. } => "set-track-muted",
            Self::SetTrackLocked { .. } => "set-track-locked",
            Self::AddMarker { .. } => "add-marker",
            Self::RemoveMarker { .. } => "remove-marker",
            Self::MoveMarker { .. } => "move-marker",
            Self::Select { .. } => "select",
            Self::ClearSelection => "clear-selection",
            Self::SetZoom { .. } => "set-zoom",
            Self::Batch(_) => "batch",
        }
    }

    /// Whether applying this command should create an undo step.
    /// Selection and zoom are view state.
    pub fn records_history(&self) -> bool {
        match self {
            Self::Select { .. } | Self::ClearSelection | Self::SetZoom { .. } => false,
            Self::Batch(commands) => commands.iter().any(Self::records_history),
            _ => true,
        }
    }

    /// Apply this command to a copy of `timeline`.
    pub fn apply(
        &self,
        timeline: &Timeline,
        config: &EngineConfig,
    ) -> Result<EditOutcome, EditRejected> {
        let mut next = timeline.clone();
        let mut effects = Effects::default();

        if let Err(reason) = self.apply_to(&mut next, config, &mut effects) {
            debug!(command = self.name(), reason = reason.code(), "Edit rejected");
            return Err(EditRejected {
                command: self.name(),
                reason,
            });
        }

        next.refresh();
        debug_assert!(
            next.validate(config.min_clip_duration).is_ok(),
            "{} produced an invalid timeline",
            self.name()
        );

        Ok(EditOutcome {
            timeline: next,
            created: effects.created,
            snapped_to: effects.snapped_to,
        })
    }

    fn apply_to(
        &self,
        tl: &mut Timeline,
        config: &EngineConfig,
        out: &mut Effects,
    ) -> Result<(), RejectReason> {
        match self {
            Self::AddClip { track_id, clip } => {
                let ti = tl.track_index(*track_id).ok_or(RejectReason::NotFound)?;
                if tl.clip(clip.id).is_some() {
                    return Err(RejectReason::OutOfRange);
                }
                let mut clip = clip.clone();
                clip.normalize_still_trim();
                out.created = Some(clip.id);
                place(tl, ti, clip, config)
            }
            Self::Move {
                clip_id,
                start,
                track_id,
            } => move_clip(tl, config, *clip_id, *start, *track_id, out),
            Self::Trim {
                clip_id,
                edge,
                time,
            } => trim_clip(tl, config, *clip_id, *edge, *time, out),
            Self::Split { clip_id, at } => split_clip(tl, config, *clip_id, *at, out),
            Self::Delete { clip_id } => {
                let (ti, _) = editable(tl, *clip_id)?;
                tl.tracks[ti].remove(*clip_id);
                Ok(())
            }
            Self::RippleDelete { clip_id } => {
                let (ti, clip) = editable(tl, *clip_id)?;
                tl.tracks[ti].remove(*clip_id);
                tl.tracks[ti].shift_from(clip.start, -clip.duration());
                Ok(())
            }
            Self::MoveToTrack {
                clip_id,
                track_index,
            } => {
                if *track_index >= tl.tracks.len() {
                    return Err(RejectReason::OutOfRange);
                }
                let (src, clip) = editable(tl, *clip_id)?;
                let start = clip.start;
                relocate(tl, config, src, *track_index, clip, start)
            }
            Self::Duplicate { clip_id } => {
                let (ti, original) = editable(tl, *clip_id)?;
                let mut copy = original.clone();
                copy.id = ClipId::new();
                copy.start = original.end;
                copy.end = original.end + original.duration();
                out.created = Some(copy.id);
                place(tl, ti, copy, config)
            }
            Self::SetSpeed { clip_id, speed } => {
                if !(speed.is_finite() && *speed > 0.0) {
                    return Err(RejectReason::OutOfRange);
                }
                let (ti, mut clip) = editable(tl, *clip_id)?;
                clip.speed = *speed;
                clip.end = clip.start + clip.source_span() / speed;
                tl.tracks[ti].remove(*clip_id);
                place(tl, ti, clip, config)
            }
            Self::AddTrack { track, index } => {
                if !track.is_empty() || tl.track(track.id).is_some() {
                    return Err(RejectReason::OutOfRange);
                }
                let index = index.unwrap_or(tl.tracks.len()).min(tl.tracks.len());
                tl.tracks.insert(index, track.clone());
                Ok(())
            }
            Self::RemoveTrack { track_id } => {
                let ti = tl.track_index(*track_id).ok_or(RejectReason::NotFound)?;
                if tl.tracks[ti].locked {
                    return Err(RejectReason::TrackLocked);
                }
                tl.tracks.remove(ti);
                Ok(())
            }
            Self::SetTrackMuted { track_id, muted } => {
                let ti = tl.track_index(*track_id).ok_or(RejectReason::NotFound)?;
                tl.tracks[ti].muted = *muted;
                Ok(())
            }
            Self::SetTrackLocked { track_id, locked } => {
                let ti = tl.track_index(*track_id).ok_or(RejectReason::NotFound)?;
                tl.tracks[ti].locked = *locked;
                Ok(())
            }
            Self::AddMarker { marker } => {
                if !(marker.time.is_finite() && marker.time >= 0.0) {
                    return Err(RejectReason::OutOfRange);
                }
                if tl.markers.iter().any(|m| m.id == marker.id) {
                    return Err(RejectReason::OutOfRange);
                }
                tl.markers.push(marker.clone());
                Ok(())
            }
            Self::RemoveMarker { marker_id } => {
                let before = tl.markers.len();
                tl.markers.retain(|m| m.id != *marker_id);
                if tl.markers.len() == before {
                    return Err(RejectReason::NotFound);
                }
                Ok(())
            }
            Self::MoveMarker { marker_id, time } => {
                if !(time.is_finite() && *time >= 0.0) {
                    return Err(RejectReason::OutOfRange);
                }
                let marker = tl
                    .markers
                    .iter_mut()
                    .find(|m| m.id == *marker_id)
                    .ok_or(RejectReason::NotFound)?;
                marker.time = *time;
                Ok(())
            }
            Self::Select { clip_ids, additive } => {
                if clip_ids.iter().any(|id| tl.clip(*id).is_none()) {
                    return Err(RejectReason::NotFound);
                }
                if !additive {
                    tl.selection.clear();
                }
                tl.selection.extend(clip_ids.iter().copied());
                Ok(())
            }
            Self::ClearSelection => {
                tl.selection.clear();
                Ok(())
            }
            Self::SetZoom { pixels_per_second } => {
                if !(pixels_per_second.is_finite() && *pixels_per_second > 0.0) {
                    return Err(RejectReason::OutOfRange);
                }
                tl.zoom = *pixels_per_second;
                Ok(())
            }
            Self::Batch(commands) => {
                for cmd in commands {
                    cmd.apply_to(tl, config, out)?;
                    tl.refresh();
                }
                Ok(())
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Locate a clip that may be edited. Returns (track index, clip copy).
fn editable(tl: &Timeline, id: ClipId) -> Result<(usize, Clip), RejectReason> {
    let (ti, clip) = tl.locate(id).ok_or(RejectReason::NotFound)?;
    if tl.tracks[ti].locked {
        return Err(RejectReason::TrackLocked);
    }
    Ok((ti, clip.clone()))
}

/// Insert a clip on track `ti` after checking it on its own.
fn place(
    tl: &mut Timeline,
    ti: usize,
    clip: Clip,
    config: &EngineConfig,
) -> Result<(), RejectReason> {
    if tl.tracks[ti].locked {
        return Err(RejectReason::TrackLocked);
    }
    if !tl.tracks[ti].accepts(&clip) {
        return Err(RejectReason::KindMismatch);
    }
    clip.check(config.min_clip_duration)?;
    tl.tracks[ti].insert(clip).map(|_| ())
}

/// Take a clip off track `src` and place it on `dst` at `start`.
fn relocate(
    tl: &mut Timeline,
    config: &EngineConfig,
    src: usize,
    dst: usize,
    mut clip: Clip,
    start: Seconds,
) -> Result<(), RejectReason> {
    let duration = clip.duration();
    tl.tracks[src].remove(clip.id);
    clip.start = start;
    clip.end = start + duration;
    place(tl, dst, clip, config)
}

fn move_clip(
    tl: &mut Timeline,
    config: &EngineConfig,
    clip_id: ClipId,
    proposed: Seconds,
    track_id: Option<TrackId>,
    out: &mut Effects,
) -> Result<(), RejectReason> {
    if !proposed.is_finite() {
        return Err(RejectReason::OutOfRange);
    }
    let (src, clip) = editable(tl, clip_id)?;
    let dst = match track_id {
        Some(id) => tl.track_index(id).ok_or(RejectReason::NotFound)?,
        None => src,
    };
    if !tl.tracks[dst].accepts(&clip) {
        return Err(RejectReason::KindMismatch);
    }

    let engine = SnappingEngine::new(config.snap);
    let points = SnappingEngine::collect_snap_points(tl, Some(clip_id));
    let snap = engine.snap_span(proposed.max(0.0), clip.duration(), &points, tl.zoom);
    out.snapped_to = snap.snapped_to;

    relocate(tl, config, src, dst, clip, snap.start)
}

fn trim_clip(
    tl: &mut Timeline,
    config: &EngineConfig,
    clip_id: ClipId,
    edge: TrimEdge,
    proposed: Seconds,
    out: &mut Effects,
) -> Result<(), RejectReason> {
    if !proposed.is_finite() {
        return Err(RejectReason::OutOfRange);
    }
    let (ti, mut clip) = editable(tl, clip_id)?;

    let engine = SnappingEngine::new(config.snap);
    let points = SnappingEngine::collect_snap_points(tl, Some(clip_id));
    let target = engine.find_snap(proposed, &points, tl.zoom);
    let time = target.unwrap_or(proposed);
    let min = config.min_clip_duration;
    let media = clip.kind.has_media_time();

    let settled = match edge {
        TrimEdge::Start => {
            // The in point cannot move before the start of the source.
            let lower = if media {
                (clip.start - clip.trim_start / clip.speed).max(0.0)
            } else {
                0.0
            };
            let upper = clip.end - min;
            if upper < lower {
                return Err(RejectReason::BelowMinDuration);
            }
            let new_start = time.clamp(lower, upper);
            let delta = new_start - clip.start;
            clip.start = new_start;
            clip.trim_start = (clip.trim_start + delta * clip.speed).max(0.0);
            new_start
        }
        TrimEdge::End => {
            let lower = clip.start + min;
            let upper = match clip.source_ref.duration {
                Some(limit) if media => clip.start + (limit - clip.trim_start) / clip.speed,
                _ => f64::INFINITY,
            };
            if upper < lower {
                return Err(RejectReason::BelowMinDuration);
            }
            let new_end = time.clamp(lower, upper);
            let delta = new_end - clip.end;
            clip.end = new_end;
            clip.trim_end += delta * clip.speed;
            new_end
        }
    };
    out.snapped_to = target.filter(|t| *t == settled);
    clip.normalize_still_trim();

    tl.tracks[ti].remove(clip_id);
    place(tl, ti, clip, config)
}

fn split_clip(
    tl: &mut Timeline,
    config: &EngineConfig,
    clip_id: ClipId,
    at: Seconds,
    out: &mut Effects,
) -> Result<(), RejectReason> {
    let (ti, original) = editable(tl, clip_id)?;
    if !(original.start < at && at < original.end) {
        return Err(RejectReason::OutOfRange);
    }

    let cut = original.source_time_at(at);
    let mut left = original.clone();
    left.end = at;
    left.trim_end = cut;

    let mut right = original;
    right.id = ClipId::new();
    right.start = at;
    right.trim_start = cut;
    right.label = format!("{} (split)", left.label);

    left.normalize_still_trim();
    right.normalize_still_trim();
    out.created = Some(right.id);

    tl.tracks[ti].remove(clip_id);
    place(tl, ti, left, config)?;
    place(tl, ti, right, config)
}

// ── Tests ───────────────────────────────────────────────────────
