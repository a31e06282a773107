//! Integration tests for the playback engine.
//!
//! Drives `PlaybackEngine` over simulated surfaces with edits applied
//! mid-playback.

use proptest::prelude::*;
use splice_core::{EngineConfig, GapPolicy};
use splice_playback::{
    BufferSlotManager, Handoff, MediaSurface, PlaybackEngine, SimCatalog, SimSource,
    SimulatedSurface, SlotId, TickReport,
};
use splice_timeline::{
    Clip, ClipId, ClipKind, EditCommand, SourceRef, Timeline, Track, TrimEdge,
};

const FRAME: f64 = 1.0 / 60.0;

type Engine = PlaybackEngine<SimulatedSurface>;

// ── Helpers ────────────────────────────────────────────────────

fn clip(path: &str, start: f64, end: f64) -> Clip {
    Clip::new(ClipKind::Video, path, SourceRef::new(path, 60.0), start, end - start)
}

/// V1 holds `[0,5)`, `[5,8)` and `[8,12)`.
fn contiguous_timeline() -> (Timeline, Vec<ClipId>) {
    let timeline = Timeline::with_default_tracks();
    let v1 = timeline.tracks()[0].id;
    let clips = [clip("a.mp4", 0.0, 5.0), clip("b.mp4", 5.0, 8.0), clip("c.mp4", 8.0, 12.0)];
    let ids = clips.iter().map(|c| c.id).collect();
    let timeline = EditCommand::Batch(
        clips
            .into_iter()
            .map(|clip| EditCommand::AddClip { track_id: v1, clip })
            .collect(),
    )
    .apply(&timeline, &EngineConfig::default())
    .unwrap()
    .timeline;
    (timeline, ids)
}

fn engine(catalog: SimCatalog, config: EngineConfig) -> (Engine, Vec<ClipId>) {
    let (timeline, ids) = contiguous_timeline();
    let (a, b) = catalog.surfaces();
    (PlaybackEngine::new(timeline, config, a, b).unwrap(), ids)
}

fn tick_n(engine: &mut Engine, now: &mut f64, n: usize) -> Vec<TickReport> {
    (0..n)
        .map(|_| {
            *now += FRAME;
            engine.tick(*now)
        })
        .collect()
}

// ── Boundaries ─────────────────────────────────────────────────

#[test]
fn contiguous_boundaries_never_show_a_gap() {
    let (mut engine, ids) = engine(SimCatalog::default(), EngineConfig::default());
    engine.seek(4.9);
    engine.play();
    let mut now = 0.0;
    let reports = tick_n(&mut engine, &mut now, 600);

    for report in reports.iter().filter(|r| r.playing) {
        assert!(report.active_clip.is_some(), "no clip at {}", report.time);
    }
    let at = |t: f64| reports.iter().find(|r| r.time == t).and_then(|r| r.active_clip);
    assert_eq!(at(5.0), Some(ids[1]));
    assert_eq!(at(8.0), Some(ids[2]));
    assert!(reports.iter().any(|r| r.stopped));
    assert_eq!(engine.current_time(), 12.0);
}

#[test]
fn preload_never_starts_beyond_the_horizon() {
    let config = EngineConfig::default();
    let horizon = config.preload_ahead;
    let (mut engine, _) = engine(SimCatalog::default(), config);
    engine.play();
    let mut now = 0.0;
    let mut seen: Option<ClipId> = None;

    for _ in 0..800 {
        now += FRAME;
        let report = engine.tick(now);
        let preloaded = engine.slots().preloaded();
        if preloaded.is_some() && preloaded != seen {
            let start = engine.slots().preloaded_clip().map(|c| c.start).unwrap();
            assert!(
                start - report.time <= horizon + 1e-9,
                "preloaded clip at {start} from {}",
                report.time
            );
        }
        seen = preloaded;
        if report.stopped {
            break;
        }
    }
}

#[test]
fn swap_without_preload_cold_loads() {
    let (a, b) = SimCatalog::default().surfaces();
    let mut slots = BufferSlotManager::new(a, b, &EngineConfig::default());
    let first = clip("a.mp4", 0.0, 5.0);
    let second = clip("b.mp4", 5.0, 8.0);

    assert_eq!(slots.activate(&first, 0.0), Handoff::ColdLoaded);
    assert!(!slots.swap());
    assert_eq!(slots.activate(&second, 0.0), Handoff::ColdLoaded);
    assert_eq!(slots.active_slot(), SlotId::A);
    assert_eq!(slots.clip_in(SlotId::A).map(|c| c.id), Some(second.id));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn jittered_ticks_keep_time_monotonic_with_one_audible_slot(
        deltas in proptest::collection::vec(0.001f64..0.05, 400..700),
    ) {
        let (mut engine, _) = engine(SimCatalog::default(), EngineConfig::default());
        engine.seek(3.0);
        engine.play();
        let mut now = 0.0;
        let mut last = engine.current_time();
        for dt in deltas {
            now += dt;
            let report = engine.tick(now);
            prop_assert!(report.time >= last, "time went back: {} < {}", report.time, last);
            prop_assert!(engine.slots().audible_count() <= 1);
            last = report.time;
        }
    }
}

// ── Failures and edits ─────────────────────────────────────────

#[test]
fn failed_middle_clip_keeps_the_clock_running() {
    let catalog = SimCatalog::default().with("b.mp4", SimSource::failing(0.05));
    let (mut engine, ids) = engine(catalog, EngineConfig::default());
    engine.seek(3.0);
    engine.play();
    let mut now = 0.0;
    let reports = tick_n(&mut engine, &mut now, 600);

    assert!(engine.is_failed(ids[1]));
    for pair in reports.windows(2) {
        assert!(pair[1].time >= pair[0].time);
    }
    assert!(reports.iter().any(|r| r.active_clip == Some(ids[2])));
    assert!(reports.iter().any(|r| r.stopped));
}

#[test]
fn editing_the_next_clip_invalidates_its_preload() {
    let (mut engine, ids) = engine(SimCatalog::default(), EngineConfig::default());
    engine.seek(2.5);
    engine.play();
    let mut now = 0.0;
    tick_n(&mut engine, &mut now, 10);
    assert_eq!(engine.slots().preloaded(), Some(ids[1]));

    engine
        .apply(&EditCommand::Trim {
            clip_id: ids[1],
            edge: TrimEdge::Start,
            time: 5.5,
        })
        .unwrap();
    assert_eq!(engine.slots().preloaded(), None);

    tick_n(&mut engine, &mut now, 5);
    let reloaded = engine.slots().preloaded_clip().unwrap();
    assert_eq!(reloaded.id, ids[1]);
    assert_eq!(reloaded.start, 5.5);
    assert_eq!(reloaded.trim_start, 0.5);
}

#[test]
fn muted_top_track_is_skipped() {
    let (timeline, ids) = contiguous_timeline();
    let overlay = Track::new_video("V2");
    let overlay_id = overlay.id;
    let top = clip("overlay.mp4", 0.0, 12.0);
    let timeline = EditCommand::Batch(vec![
        EditCommand::AddTrack {
            track: overlay,
            index: Some(0),
        },
        EditCommand::AddClip {
            track_id: overlay_id,
            clip: top.clone(),
        },
    ])
    .apply(&timeline, &EngineConfig::default())
    .unwrap()
    .timeline;

    let (a, b) = SimCatalog::default().surfaces();
    let mut engine = PlaybackEngine::new(timeline, EngineConfig::default(), a, b).unwrap();
    assert_eq!(engine.active_clip().map(|c| c.id), Some(top.id));

    engine
        .apply(&EditCommand::SetTrackMuted {
            track_id: overlay_id,
            muted: true,
        })
        .unwrap();
    assert_eq!(engine.active_clip().map(|c| c.id), Some(ids[0]));

    engine.play();
    let mut now = 0.0;
    let reports = tick_n(&mut engine, &mut now, 30);
    assert!(reports.iter().all(|r| r.active_clip != Some(top.id)));
}

/// Contiguous V1 with `overlays` on a V2 track stacked above it.
fn with_overlays(overlays: &[Clip], config: EngineConfig) -> (Engine, Vec<ClipId>) {
    let (timeline, ids) = contiguous_timeline();
    let top = Track::new_video("V2");
    let top_id = top.id;
    let mut commands = vec![EditCommand::AddTrack {
        track: top,
        index: Some(0),
    }];
    commands.extend(overlays.iter().cloned().map(|clip| EditCommand::AddClip {
        track_id: top_id,
        clip,
    }));
    let timeline = EditCommand::Batch(commands)
        .apply(&timeline, &EngineConfig::default())
        .unwrap()
        .timeline;
    let (a, b) = SimCatalog::default().surfaces();
    (PlaybackEngine::new(timeline, config, a, b).unwrap(), ids)
}

#[test]
fn overlay_across_a_cut_is_gapless_under_both_gap_policies() {
    for gap_policy in [GapPolicy::PlayThrough, GapPolicy::Skip] {
        let overlay = clip("overlay.mp4", 3.0, 6.5);
        let config = EngineConfig {
            gap_policy,
            ..EngineConfig::default()
        };
        let (mut engine, ids) = with_overlays(&[overlay.clone()], config);
        engine.play();
        let mut now = 0.0;
        let mut resumed_at = None;
        let mut reports = Vec::new();
        for _ in 0..900 {
            now += FRAME;
            let report = engine.tick(now);
            if report.boundary == Some(overlay.id) {
                let slot = engine.active_slot();
                resumed_at = Some(engine.slots().surface(slot).position());
            }
            if report.playing && report.time > 1.0 {
                assert_eq!(engine.slots().audible_count(), 1, "{gap_policy:?} silent at {}", report.time);
            }
            let stopped = report.stopped;
            reports.push(report);
            if stopped {
                break;
            }
        }

        for report in reports.iter().filter(|r| r.playing) {
            assert!(report.active_clip.is_some(), "{gap_policy:?} gap at {}", report.time);
        }
        for pair in reports.windows(2) {
            assert!(pair[1].time - pair[0].time < 0.2, "{gap_policy:?} jumped at {}", pair[0].time);
        }
        // The cut at 5.0 is hidden under the overlay.
        assert!(reports
            .iter()
            .all(|r| r.boundary.is_none() || r.time < 3.5 || r.time > 6.4));
        let entry = reports.iter().find(|r| r.boundary == Some(ids[0])).unwrap();
        assert_eq!(entry.active_clip, Some(overlay.id));
        assert_eq!(entry.time, 3.0);
        assert_eq!(entry.handoff, Some(Handoff::Swapped));

        let exit = reports.iter().find(|r| r.boundary == Some(overlay.id)).unwrap();
        assert_eq!(exit.time, 6.5);
        assert_eq!(exit.active_clip, Some(ids[1]));
        assert_eq!(exit.handoff, Some(Handoff::Swapped));
        let local = resumed_at.unwrap();
        assert!((local - 1.5).abs() < 0.05, "{gap_policy:?} resumed at {local}");

        assert_eq!(reports.last().unwrap().time, 12.0);
    }
}

#[test]
fn overlay_past_the_last_clip_then_gap() {
    let tail = clip("tail.mp4", 10.0, 14.0);
    let late = clip("late.mp4", 16.0, 18.0);
    for gap_policy in [GapPolicy::PlayThrough, GapPolicy::Skip] {
        let config = EngineConfig {
            gap_policy,
            ..EngineConfig::default()
        };
        let (mut engine, ids) = with_overlays(&[tail.clone(), late.clone()], config);
        engine.seek(9.0);
        engine.play();
        let mut now = 0.0;
        let reports = tick_n(&mut engine, &mut now, 900);

        let entry = reports.iter().find(|r| r.boundary == Some(ids[2])).unwrap();
        assert_eq!(entry.time, 10.0);
        assert_eq!(entry.active_clip, Some(tail.id));

        let gap = reports.iter().any(|r| r.playing && r.active_clip.is_none());
        match gap_policy {
            GapPolicy::PlayThrough => {
                assert!(gap);
                assert!(reports.iter().any(|r| r.time > 15.0 && r.time < 16.0));
            }
            GapPolicy::Skip => {
                assert!(!gap);
                let skip = reports.iter().find(|r| r.boundary == Some(tail.id)).unwrap();
                assert_eq!(skip.time, 16.0);
                assert_eq!(skip.active_clip, Some(late.id));
            }
        }
        assert!(reports.iter().any(|r| r.stopped));
        assert_eq!(engine.current_time(), 18.0);
    }
}
