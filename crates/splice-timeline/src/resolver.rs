//! Clip resolution for playback.
//!
//! Pure lookups over track snapshots. Tracks keep their clips sorted by
//! start, so each track costs one binary search. Muted tracks are skipped.
//! When several tracks of the same kind cover the same instant, the first
//! track in stacking order wins.

use smallvec::SmallVec;
use splice_core::Seconds;

use crate::clip::Clip;
use crate::track::{Track, TrackKind};

fn playable(tracks: &[Track], kind: TrackKind) -> impl Iterator<Item = &Track> {
    tracks.iter().filter(move |t| t.kind == kind && !t.muted)
}

/// The clip of `kind` whose `[start, end)` contains `time`, or `None` for a gap.
pub fn active_clip(tracks: &[Track], kind: TrackKind, time: Seconds) -> Option<&Clip> {
    playable(tracks, kind).find_map(|t| t.clip_at_time(time))
}

/// The clip that plays after `after`: the smallest start at or beyond
/// `after.end - epsilon`, so butt-joined clips count as contiguous.
pub fn next_clip<'a>(
    tracks: &'a [Track],
    kind: TrackKind,
    after: &Clip,
    epsilon: Seconds,
) -> Option<&'a Clip> {
    let from = after.end - epsilon;
    playable(tracks, kind)
        .filter_map(|t| t.clips_from(from).iter().find(|c| c.id != after.id))
        .fold(None, earliest)
}

fn earliest<'a>(best: Option<&'a Clip>, candidate: &'a Clip) -> Option<&'a Clip> {
    match best {
        Some(b) if b.start <= candidate.start => Some(b),
        _ => Some(candidate),
    }
}

/// The first clip of `kind` starting at or after `time`, used inside gaps.
pub fn next_clip_from(tracks: &[Track], kind: TrackKind, time: Seconds) -> Option<&Clip> {
    playable(tracks, kind)
        .filter_map(|t| t.first_clip_from(time))
        .fold(None, earliest)
}

/// Clip edges of `kind` in `(after, until]`, ascending without repeats.
///
/// These are the only instants where [`active_clip`] can change, including
/// an upper-track clip starting or ending over a lower one.
pub fn edges_between(
    tracks: &[Track],
    kind: TrackKind,
    after: Seconds,
    until: Seconds,
) -> SmallVec<[Seconds; 8]> {
    let mut edges: SmallVec<[Seconds; 8]> = playable(tracks, kind)
        .flat_map(|t| t.clips_touching(after, until))
        .flat_map(|c| [c.start, c.end])
        .filter(|&edge| edge > after && edge <= until)
        .collect();
    edges.sort_by(|a, b| a.total_cmp(b));
    edges.dedup();
    edges
}

/// The active clip of every kind at `time`.
pub fn active_clips(tracks: &[Track], time: Seconds) -> SmallVec<[(TrackKind, &Clip); 3]> {
    [TrackKind::Video, TrackKind::Audio, TrackKind::Text]
        .into_iter()
        .filter_map(|kind| active_clip(tracks, kind, time).map(|c| (kind, c)))
        .collect()
}
