//! Integration tests for the timeline subsystem.
//!
//! Exercises edits, snapping and persistence across splice-core and
//! splice-timeline.

use proptest::prelude::*;
use splice_core::{EngineConfig, RejectReason, SnapConfig};
use splice_timeline::{
    Clip, ClipId, ClipKind, EditCommand, SnapKind, SnapPoint, SnappingEngine, SourceRef, Timeline,
    TimelineFile, TrimEdge,
};

// ── Helpers ────────────────────────────────────────────────────

fn video(label: &str, start: f64, duration: f64, trim_start: f64) -> Clip {
    Clip::new(
        ClipKind::Video,
        label,
        SourceRef::new(format!("media/{label}.mp4"), 60.0),
        start,
        duration,
    )
    .with_trim_start(trim_start)
}

/// V1: A [0,5) and B [6,9); A1: music [0,9).
fn build_timeline() -> (Timeline, ClipId, ClipId) {
    let timeline = Timeline::with_default_tracks();
    let v1 = timeline.tracks()[0].id;
    let a1 = timeline.tracks()[1].id;
    let a = video("a", 0.0, 5.0, 0.0);
    let b = video("b", 6.0, 3.0, 10.0);
    let (a_id, b_id) = (a.id, b.id);
    let music = Clip::new(ClipKind::Audio, "music", SourceRef::new("media/music.wav", 90.0), 0.0, 9.0);
    let timeline = EditCommand::Batch(vec![
        EditCommand::AddClip { track_id: v1, clip: a },
        EditCommand::AddClip { track_id: v1, clip: b },
        EditCommand::AddClip { track_id: a1, clip: music },
    ])
    .apply(&timeline, &EngineConfig::default())
    .unwrap()
    .timeline;
    (timeline, a_id, b_id)
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn zero_duration_clip_is_rejected() {
    let (timeline, _, _) = build_timeline();
    let v1 = timeline.tracks()[0].id;
    let err = EditCommand::AddClip {
        track_id: v1,
        clip: video("empty", 5.0, 0.0, 0.0),
    }
    .apply(&timeline, &EngineConfig::default())
    .unwrap_err();
    assert_eq!(err.reason, RejectReason::BelowMinDuration);
}

#[test]
fn trim_start_snaps_to_previous_clip_end() {
    let (timeline, a, b) = build_timeline();
    let a_end = timeline.clip(a).unwrap().end;
    assert_eq!(a_end, 5.0);

    let outcome = EditCommand::Trim {
        clip_id: b,
        edge: TrimEdge::Start,
        time: a_end - 0.001,
    }
    .apply(&timeline, &EngineConfig::default())
    .unwrap();

    let b_clip = outcome.timeline.clip(b).unwrap();
    assert_eq!(b_clip.start, 5.0);
    assert_eq!(b_clip.trim_start, 9.0);
    assert_eq!(b_clip.end, 9.0);
    assert_eq!(outcome.snapped_to, Some(5.0));
    outcome.timeline.validate(0.5).unwrap();
}

#[test]
fn trim_without_snapping_keeps_the_gap() {
    let (timeline, a, b) = build_timeline();
    let config = EngineConfig {
        snap: SnapConfig {
            enabled: false,
            ..SnapConfig::default()
        },
        ..EngineConfig::default()
    };
    let outcome = EditCommand::Trim {
        clip_id: b,
        edge: TrimEdge::Start,
        time: 5.02,
    }
    .apply(&timeline, &config)
    .unwrap();
    let gap = outcome.timeline.clip(b).unwrap().start - outcome.timeline.clip(a).unwrap().end;
    assert!((gap - 0.02).abs() < 1e-9);
}

#[test]
fn cross_track_move_requires_matching_kind() {
    let (timeline, a, _) = build_timeline();
    let a1 = timeline.tracks()[1].id;
    let err = EditCommand::Move {
        clip_id: a,
        start: 20.0,
        track_id: Some(a1),
    }
    .apply(&timeline, &EngineConfig::default())
    .unwrap_err();
    assert_eq!(err.reason, RejectReason::KindMismatch);
}

#[test]
fn ripple_delete_closes_gap_and_keeps_order() {
    let (timeline, a, b) = build_timeline();
    let before = timeline.tracks()[0].occupied_duration();
    let outcome = EditCommand::RippleDelete { clip_id: a }
        .apply(&timeline, &EngineConfig::default())
        .unwrap();
    let track = &outcome.timeline.tracks()[0];
    assert_eq!(track.occupied_duration(), before - 5.0);
    assert_eq!(track.clip_count(), 1);
    assert_eq!(track.clips()[0].id, b);
    assert_eq!(track.clips()[0].start, 1.0);
}

#[test]
fn persisted_form_uses_camel_case_fields() {
    let (timeline, _, _) = build_timeline();
    let json = TimelineFile::new(timeline.clone()).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    let clip = &value["timeline"]["tracks"][0]["clips"][0];
    for key in ["id", "trackId", "kind", "start", "end", "sourceRef", "label", "trimStart", "trimEnd", "speed", "effects"] {
        assert!(clip.get(key).is_some(), "missing {key}");
    }
    assert!(value["timeline"].get("durationSeconds").is_some());
    assert!(value["timeline"].get("currentTime").is_some());

    let loaded = TimelineFile::from_json(&json, &EngineConfig::default()).unwrap();
    assert_eq!(loaded.timeline, timeline);
}

// ── Properties ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn move_and_trim_keep_invariants_or_reject(
        start in -2.0f64..14.0,
        edge_time in -1.0f64..14.0,
        use_start_edge in any::<bool>(),
    ) {
        let (timeline, a, b) = build_timeline();
        let config = EngineConfig::default();
        let snapshot = timeline.clone();

        let commands = [
            EditCommand::Move { clip_id: a, start, track_id: None },
            EditCommand::Trim {
                clip_id: b,
                edge: if use_start_edge { TrimEdge::Start } else { TrimEdge::End },
                time: edge_time,
            },
        ];
        for command in &commands {
            match command.apply(&timeline, &config) {
                Ok(outcome) => {
                    prop_assert!(outcome.timeline.validate(config.min_clip_duration).is_ok());
                    for clip in outcome.timeline.clips() {
                        prop_assert!(clip.start < clip.end);
                        prop_assert!(clip.start >= 0.0);
                    }
                }
                Err(_) => prop_assert_eq!(&timeline, &snapshot),
            }
        }
    }

    #[test]
    fn split_is_exact(offset in 0.5f64..4.5) {
        let (timeline, a, _) = build_timeline();
        let original = timeline.clip(a).unwrap().clone();
        let at = original.start + offset;

        let outcome = EditCommand::Split { clip_id: a, at }
            .apply(&timeline, &EngineConfig::default())
            .unwrap();
        let left = outcome.timeline.clip(a).unwrap();
        let right = outcome.timeline.clip(outcome.created.unwrap()).unwrap();

        prop_assert_eq!(left.start, original.start);
        prop_assert_eq!(left.end, at);
        prop_assert_eq!(right.start, at);
        prop_assert_eq!(right.end, original.end);
        prop_assert_eq!(left.trim_start, original.trim_start);
        prop_assert_eq!(left.trim_end, right.trim_start);
        prop_assert_eq!(right.trim_end, original.trim_end);
        let span = left.source_span() + right.source_span();
        prop_assert!((span - original.source_span()).abs() < 1e-9);
    }

    #[test]
    fn snapping_is_deterministic(
        times in proptest::collection::vec(0.0f64..100.0, 1..20),
        proposed in 0.0f64..100.0,
        zoom in 10.0f64..400.0,
    ) {
        let engine = SnappingEngine::new(SnapConfig::default());
        let mut points: Vec<SnapPoint> = times
            .iter()
            .map(|&time| SnapPoint { time, kind: SnapKind::ClipEdge })
            .collect();
        points.sort_by(|x, y| x.time.total_cmp(&y.time));

        let first = engine.snap(proposed, &points, zoom);
        let second = engine.snap(proposed, &points, zoom);
        prop_assert_eq!(first, second);

        let threshold = engine.threshold(zoom);
        let nearest = points
            .iter()
            .map(|p| (p.time - proposed).abs())
            .fold(f64::INFINITY, f64::min);
        if nearest > threshold {
            prop_assert_eq!(first, proposed);
        } else {
            prop_assert!((first - proposed).abs() <= threshold);
        }
    }
}
