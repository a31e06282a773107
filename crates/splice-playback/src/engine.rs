//! Sync loop.
//!
//! `PlaybackEngine` owns the timeline, the undo history, the clock and the
//! two slots. The host calls [`PlaybackEngine::tick`] once per display
//! refresh; edits and transport commands arrive between ticks.
//!
//! Per tick while playing:
//! 1. Pump slot events (readiness, failures, native end).
//! 2. Advance the clock, then prefer the active slot's media position when
//!    it agrees with the clock within the drift tolerance.
//! 3. Find the next presentation change: the active clip ending, or an
//!    upper-track clip starting over it. Preload whatever is presented
//!    from there once it is inside the preload horizon.
//! 4. At the end tolerance, handle the boundary: switch to the clip
//!    presented next and swap (or cold-load), enter a gap, loop, or stop.
//!
//! The poll in step 4 and the native end signal both feed
//! `handle_boundary`, which is keyed by clip id and runs once per clip.

use smallvec::SmallVec;
use splice_core::{EngineConfig, GapPolicy, Result, Seconds, SpliceError};
use splice_timeline::{
    resolver, Clip, ClipId, EditCommand, EditOutcome, EditRejected, History, Timeline, TrackKind,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::clock::PlaybackClock;
use crate::slots::{BufferSlotManager, Handoff, SlotId, SlotNotice};
use crate::surface::MediaSurface;

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Virtual time after the tick
    pub time: Seconds,
    pub playing: bool,
    pub active_clip: Option<ClipId>,
    /// Clip whose end boundary was handled this tick
    pub boundary: Option<ClipId>,
    pub handoff: Option<Handoff>,
    pub looped: bool,
    /// Playback stopped at the end of the timeline
    pub stopped: bool,
}

/// Result of an edit applied through the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedEdit {
    pub created: Option<ClipId>,
    pub snapped_to: Option<Seconds>,
}

/// Gapless two-slot player over an editable timeline.
pub struct PlaybackEngine<S> {
    timeline: Timeline,
    history: History,
    config: EngineConfig,
    /// Track kind presented through the slots
    lane: TrackKind,
    clock: PlaybackClock,
    slots: BufferSlotManager<S>,
    /// Clip presented by the active slot
    bound: Option<ClipId>,
    /// Last clip whose end boundary was handled
    handled_boundary: Option<ClipId>,
    /// Clips whose source failed, played as gaps until the next seek
    failed: HashSet<ClipId>,
}

impl<S: MediaSurface> PlaybackEngine<S> {
    /// Create an engine presenting the video lane.
    pub fn new(timeline: Timeline, config: EngineConfig, a: S, b: S) -> Result<Self> {
        Self::with_lane(timeline, config, TrackKind::Video, a, b)
    }

    /// Create an engine presenting `lane` (video or audio).
    pub fn with_lane(
        timeline: Timeline,
        config: EngineConfig,
        lane: TrackKind,
        a: S,
        b: S,
    ) -> Result<Self> {
        config.validate()?;
        if lane == TrackKind::Text {
            return Err(SpliceError::InvalidConfig(
                "text tracks have no media to play".into(),
            ));
        }
        timeline.validate(config.min_clip_duration)?;

        let slots = BufferSlotManager::new(a, b, &config);
        let mut engine = Self {
            history: History::new(config.history_depth),
            clock: PlaybackClock::new(config.max_tick_delta),
            timeline,
            config,
            lane,
            slots,
            bound: None,
            handled_boundary: None,
            failed: HashSet::new(),
        };
        let start = engine.timeline.current_time();
        engine.set_time(start);
        engine.rebind(start);
        info!(
            duration = engine.timeline.duration(),
            lane = ?lane,
            "Playback engine ready"
        );
        Ok(engine)
    }

    // ── Observables ────────────────────────────────────────────

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lane(&self) -> TrackKind {
        self.lane
    }

    pub fn current_time(&self) -> Seconds {
        self.clock.time()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn rate(&self) -> f64 {
        self.clock.rate()
    }

    pub fn is_looping(&self) -> bool {
        self.config.loop_playback
    }

    /// Clip of the presented lane at the playhead; failed clips count as gaps.
    pub fn active_clip(&self) -> Option<&Clip> {
        self.resolve(self.current_time())
    }

    /// Active clip of every track kind at the playhead, for overlays.
    pub fn active_clips(&self) -> SmallVec<[(TrackKind, &Clip); 3]> {
        let mut clips = resolver::active_clips(self.timeline.tracks(), self.current_time());
        clips.retain(|(_, clip)| !self.failed.contains(&clip.id));
        clips
    }

    pub fn active_slot(&self) -> SlotId {
        self.slots.active_slot()
    }

    pub fn video_ready_for_slot(&self, slot: SlotId) -> bool {
        self.slots.video_ready_for_slot(slot)
    }

    pub fn slots(&self) -> &BufferSlotManager<S> {
        &self.slots
    }

    pub fn is_failed(&self, clip_id: ClipId) -> bool {
        self.failed.contains(&clip_id)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ── Transport ──────────────────────────────────────────────

    pub fn play(&mut self) {
        if self.clock.is_playing() {
            return;
        }
        let duration = self.timeline.duration();
        if duration > 0.0 && self.current_time() >= duration {
            self.set_time(0.0);
            self.handled_boundary = None;
        }
        info!(time = self.current_time(), rate = self.clock.rate(), "Play");
        self.clock.play();
        self.slots.set_playing(true);
        let t = self.current_time();
        if self.resolve(t).map(|c| c.id) != self.bound {
            self.rebind(t);
        }
    }

    pub fn pause(&mut self) {
        if !self.clock.is_playing() {
            return;
        }
        info!(time = self.current_time(), "Pause");
        self.clock.pause();
        self.slots.set_playing(false);
    }

    /// Pause, drop any outstanding preload and return to the start.
    pub fn stop(&mut self) {
        info!(time = self.current_time(), "Stop");
        self.clock.pause();
        self.slots.set_playing(false);
        self.slots.invalidate_preload();
        self.seek(0.0);
    }

    /// Move the playhead. Clears the failed-clip set. Returns the clamped time.
    pub fn seek(&mut self, time: Seconds) -> Seconds {
        self.set_time(time);
        self.handled_boundary = None;
        if !self.failed.is_empty() {
            debug!(count = self.failed.len(), "Retrying failed clips after seek");
            self.failed.clear();
        }
        let t = self.current_time();
        self.rebind(t);
        info!(time = t, "Seek");
        t
    }

    /// Set the rate multiplier, clamped to the configured limits.
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        let rate = self.config.clamp_rate(rate);
        self.clock.set_rate(rate);
        self.slots.set_rate(rate);
        info!(rate, "Playback rate changed");
        rate
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.config.loop_playback = enabled;
    }

    // ── Editing ────────────────────────────────────────────────

    /// Apply an edit between ticks and re-resolve playback against it.
    pub fn apply(&mut self, command: &EditCommand) -> std::result::Result<AppliedEdit, EditRejected> {
        let EditOutcome {
            timeline,
            created,
            snapped_to,
        } = command.apply(&self.timeline, &self.config)?;

        let previous = std::mem::replace(&mut self.timeline, timeline);
        if command.records_history() {
            self.history.push(command.name(), previous);
        }
        debug!(command = command.name(), "Edit applied");
        self.after_edit();
        Ok(AppliedEdit {
            created,
            snapped_to,
        })
    }

    /// Group the following edits into one undo step, e.g. a drag's frames.
    pub fn begin_batch(&mut self, label: &str) {
        self.history.begin_batch(label, self.timeline.clone());
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch(&self.timeline);
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        match self.history.undo(self.timeline.clone()) {
            Some(previous) => {
                self.timeline = previous;
                self.after_edit();
                info!("Undo");
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        match self.history.redo(self.timeline.clone()) {
            Some(next) => {
                self.timeline = next;
                self.after_edit();
                info!("Redo");
                true
            }
            None => false,
        }
    }

    // ── Sync loop ──────────────────────────────────────────────

    /// Advance playback to host time `now`.
    pub fn tick(&mut self, now: Seconds) -> TickReport {
        let mut report = TickReport {
            time: self.current_time(),
            playing: self.is_playing(),
            active_clip: None,
            boundary: None,
            handoff: None,
            looped: false,
            stopped: false,
        };

        for notice in self.slots.pump(now) {
            self.on_notice(notice, &mut report);
        }

        let dt = self.clock.advance(now);
        if self.clock.is_playing() {
            let t = self.reconcile(self.clock.time() + dt);
            self.set_time(t);
            self.step(&mut report);
        }

        report.time = self.current_time();
        report.playing = self.is_playing();
        report.active_clip = self.active_clip().map(|c| c.id);
        report
    }

    fn on_notice(&mut self, notice: SlotNotice, report: &mut TickReport) {
        match notice {
            SlotNotice::Failed { slot, clip_id } => {
                warn!(clip = %clip_id, slot = %slot, "Playing failed clip as a gap");
                self.failed.insert(clip_id);
                if self.bound == Some(clip_id) {
                    self.bound = None;
                }
            }
            SlotNotice::Ended { clip_id, .. } => {
                if self.clock.is_playing() && self.bound == Some(clip_id) {
                    debug!(clip = %clip_id, "Native end signal");
                    self.handle_boundary(clip_id, report);
                }
            }
        }
    }

    /// Prefer the media position when it is within tolerance of `t`.
    /// Otherwise keep `t` and move the media to it. Never goes backwards.
    fn reconcile(&mut self, t: Seconds) -> Seconds {
        let previous = self.clock.time();
        let Some(clip) = self.bound.and_then(|id| self.timeline.clip(id)) else {
            return t;
        };
        if !clip.kind.has_media_time() || !clip.contains(previous) {
            return t;
        }
        let Some(position) = self.slots.active_position() else {
            return t;
        };
        let media_time = clip.timeline_time_at(position);
        if (media_time - t).abs() <= self.config.drift_tolerance {
            return media_time.max(previous);
        }
        debug!(clip = %clip.id, drift = media_time - t, "Resyncing active slot");
        let local = clip.source_time_at(t.min(clip.end));
        self.slots.seek_active(local);
        t
    }

    fn step(&mut self, report: &mut TickReport) {
        let t = self.current_time();
        let Some(clip) = self.resolve(t).cloned() else {
            self.step_gap(t, report);
            return;
        };
        if self.bound != Some(clip.id) {
            report.handoff = Some(self.bind(&clip, t));
        }
        let change = self.next_change(&clip, t);
        self.preload_for(change, t, Some(clip.id));
        if change - t <= self.config.end_tolerance {
            self.handle_boundary(clip.id, report);
        }
    }

    fn step_gap(&mut self, t: Seconds, report: &mut TickReport) {
        self.unbind();
        match self.entry_after(t).cloned() {
            Some(next) if self.config.gap_policy == GapPolicy::Skip => {
                let at = next.start.max(t);
                debug!(from = t, to = at, "Skipping gap");
                self.set_time(at);
                report.handoff = Some(self.bind(&next, at));
            }
            Some(next) => {
                if next.start - t <= self.config.preload_ahead {
                    let local = next.source_time_at(next.start.max(t));
                    self.slots.preload_at(&next, local);
                }
            }
            None if t >= self.timeline.duration() => self.finish(report),
            None => self.preload_loop_start(t, None),
        }
    }

    /// Handle the end of `clip_id`'s presentation: an upper-track clip
    /// covering it, the clip ending, or its media running out. Runs once
    /// per clip until it is bound again, a seek or an edit.
    fn handle_boundary(&mut self, clip_id: ClipId, report: &mut TickReport) {
        if self.handled_boundary == Some(clip_id) {
            return;
        }
        let Some(clip) = self.timeline.clip(clip_id).cloned() else {
            return;
        };
        self.handled_boundary = Some(clip_id);
        report.boundary = Some(clip_id);

        let t = self.current_time();
        let change = self.next_change(&clip, t);
        if let Some(next) = self.presented_from(change).cloned() {
            let at = next.start.max(change).max(t);
            debug!(from = %clip.id, to = %next.id, at, "Clip boundary");
            self.set_time(at);
            report.handoff = Some(self.bind(&next, at));
            return;
        }
        // Nothing of this lane at `change`; only now may a gap be skipped.
        match self.entry_after(change).cloned() {
            Some(next) if self.config.gap_policy == GapPolicy::Skip => {
                let at = next.start.max(t);
                debug!(from = %clip.id, to = %next.id, at, "Skipping gap");
                self.set_time(at);
                report.handoff = Some(self.bind(&next, at));
            }
            None if change >= self.timeline.duration() - self.config.end_tolerance => {
                self.finish(report);
            }
            _ => {
                debug!(clip = %clip.id, at = change, "Entering gap");
                self.set_time(change.max(t));
                self.unbind();
            }
        }
    }

    /// End of timeline: loop to zero or stop at the duration.
    fn finish(&mut self, report: &mut TickReport) {
        let duration = self.timeline.duration();
        if self.config.loop_playback && duration > 0.0 {
            info!(duration, "Looping");
            self.handled_boundary = None;
            self.set_time(0.0);
            report.handoff = self.rebind(0.0);
            report.looped = true;
        } else {
            info!(duration, "Reached end of timeline");
            self.set_time(duration);
            self.clock.pause();
            self.slots.set_playing(false);
            report.stopped = true;
        }
    }

    /// Preload what is presented from `change` on, once inside the horizon.
    fn preload_for(&mut self, change: Seconds, t: Seconds, current: Option<ClipId>) {
        if change - t > self.config.preload_ahead {
            return;
        }
        if let Some(next) = self.presented_from(change).cloned() {
            let local = next.source_time_at(next.start.max(change));
            self.slots.preload_at(&next, local);
            return;
        }
        match self.entry_after(change).cloned() {
            Some(next) if next.start - t <= self.config.preload_ahead => {
                self.slots.preload(&next);
            }
            Some(_) => {}
            None => self.preload_loop_start(t, current),
        }
    }

    /// Near the end in loop mode, preload the clip at zero.
    fn preload_loop_start(&mut self, t: Seconds, current: Option<ClipId>) {
        if !self.config.loop_playback
            || self.timeline.duration() - t > self.config.preload_ahead
        {
            return;
        }
        if let Some(first) = self.resolve(0.0).cloned() {
            if Some(first.id) != current {
                self.slots.preload(&first);
            }
        }
    }

    fn bind(&mut self, clip: &Clip, t: Seconds) -> Handoff {
        let local = clip.source_time_at(t);
        let handoff = self.slots.activate(clip, local);
        if self.handled_boundary == Some(clip.id) {
            self.handled_boundary = None;
        }
        self.bound = Some(clip.id);
        debug!(clip = %clip.id, ?handoff, local, "Bound clip");
        handoff
    }

    fn unbind(&mut self) {
        if let Some(id) = self.bound.take() {
            debug!(clip = %id, "Unbound clip");
            self.slots.release_active();
        }
    }

    fn rebind(&mut self, t: Seconds) -> Option<Handoff> {
        match self.resolve(t).cloned() {
            Some(clip) => Some(self.bind(&clip, t)),
            None => {
                self.unbind();
                None
            }
        }
    }

    /// Bring playback back in line with a changed timeline.
    fn after_edit(&mut self) {
        self.set_time(self.clock.time());
        self.handled_boundary = None;
        let timeline = &self.timeline;
        self.failed.retain(|id| timeline.clip(*id).is_some());

        let stale_preload = self.slots.preloaded_clip().map(|loaded| {
            self.timeline.clip(loaded.id).map_or(true, |clip| {
                clip.source_ref != loaded.source_ref || clip.trim_start != loaded.trim_start
            })
        });
        if stale_preload == Some(true) {
            self.slots.invalidate_preload();
        }

        let t = self.current_time();
        match (self.resolve(t).cloned(), self.bound) {
            (Some(clip), Some(bound)) if clip.id == bound => {
                let moved = self
                    .slots
                    .clip_in(self.slots.active_slot())
                    .map_or(true, |loaded| {
                        loaded.start != clip.start
                            || loaded.trim_start != clip.trim_start
                            || loaded.speed != clip.speed
                    });
                if moved {
                    self.bind(&clip, t);
                }
            }
            (Some(clip), _) => {
                self.bind(&clip, t);
            }
            (None, _) => self.unbind(),
        }
    }

    fn set_time(&mut self, time: Seconds) {
        let t = self.timeline.set_current_time(time);
        self.clock.set_time(t);
    }

    fn resolve(&self, t: Seconds) -> Option<&Clip> {
        resolver::active_clip(self.timeline.tracks(), self.lane, t)
            .filter(|clip| !self.failed.contains(&clip.id))
    }

    /// Earliest instant after `t` at which the presented clip stops being
    /// `clip`. Never later than `clip.end`.
    fn next_change(&self, clip: &Clip, t: Seconds) -> Seconds {
        resolver::edges_between(self.timeline.tracks(), self.lane, t, clip.end)
            .into_iter()
            .find(|&edge| self.resolve(edge).map(|c| c.id) != Some(clip.id))
            .unwrap_or(clip.end)
    }

    /// Clip presented from `at` on, bridging sub-epsilon gaps.
    fn presented_from(&self, at: Seconds) -> Option<&Clip> {
        self.resolve(at).or_else(|| {
            self.next_from(at)
                .filter(|c| c.start - at <= self.config.contiguity_epsilon)
        })
    }

    /// Clip presented when the lane is next entered after a gap at `t`.
    fn entry_after(&self, t: Seconds) -> Option<&Clip> {
        let first = self.next_from(t)?;
        Some(self.resolve(first.start).unwrap_or(first))
    }

    /// Next playable clip after `clip`, skipping failed ones.
    fn upcoming(&self, clip: &Clip) -> Option<&Clip> {
        let tracks = self.timeline.tracks();
        let epsilon = self.config.contiguity_epsilon;
        let mut next = resolver::next_clip(tracks, self.lane, clip, epsilon);
        while let Some(candidate) = next {
            if !self.failed.contains(&candidate.id) {
                break;
            }
            next = resolver::next_clip(tracks, self.lane, candidate, epsilon);
        }
        next
    }

    /// First playable clip starting at or after `t`.
    fn next_from(&self, t: Seconds) -> Option<&Clip> {
        let first = resolver::next_clip_from(self.timeline.tracks(), self.lane, t)?;
        if self.failed.contains(&first.id) {
            self.upcoming(first)
        } else {
            Some(first)
        }
    }
}
