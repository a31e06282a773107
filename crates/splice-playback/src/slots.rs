//! Two-slot buffer manager.
//!
//! Two surfaces, A and B, held in a fixed array with an active index. The
//! active slot presents; the standby slot is muted, paused, and receives the
//! next clip ahead of its boundary so the cut is a flip of the index rather
//! than a load. When the standby slot is not ready in time the clip is
//! cold-loaded straight into the active slot instead.
//!
//! Readiness is "can play through", or "can play" held for a short grace
//! period, or a load timeout with no signal at all.

use crossbeam_channel::{unbounded, Receiver, Sender};
use smallvec::SmallVec;
use splice_core::{EngineConfig, Seconds};
use splice_timeline::{Clip, ClipId};
use std::fmt;
use tracing::{debug, trace, warn};

use crate::surface::{EventSink, MediaSurface, SlotEvent, SurfaceEvent};

/// One of the two render slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    fn from_index(index: usize) -> Self {
        if index == 0 {
            Self::A
        } else {
            Self::B
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Load state of a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotState {
    Empty,
    Loading,
    /// Playable but not yet fully buffered.
    CanPlay { since: Seconds },
    Ready,
    Errored,
}

/// How a clip was brought into the active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// The preloaded standby slot became active.
    Swapped,
    /// Loaded directly into the active slot.
    ColdLoaded,
    /// Already active, only repositioned.
    Reseeked,
}

/// Something the engine has to react to, raised while pumping events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotNotice {
    Failed { slot: SlotId, clip_id: ClipId },
    /// The active slot's media reached its end.
    Ended { slot: SlotId, clip_id: ClipId },
}

struct Slot<S> {
    surface: S,
    state: SlotState,
    clip: Option<Clip>,
    token: u64,
    loaded_at: Seconds,
    pending_seek: Option<Seconds>,
    play_when_ready: bool,
}

impl<S: MediaSurface> Slot<S> {
    fn new(surface: S) -> Self {
        Self {
            surface,
            state: SlotState::Empty,
            clip: None,
            token: 0,
            loaded_at: 0.0,
            pending_seek: None,
            play_when_ready: false,
        }
    }

    fn clip_id(&self) -> Option<ClipId> {
        self.clip.as_ref().map(|c| c.id)
    }

    /// Holds `id` in a usable state.
    fn holds(&self, id: ClipId) -> bool {
        self.clip_id() == Some(id) && self.state != SlotState::Errored
    }
}

/// Owns both surfaces and decides which one presents.
pub struct BufferSlotManager<S> {
    slots: [Slot<S>; 2],
    active: usize,
    /// Clip most recently preloaded into standby
    preloaded: Option<ClipId>,
    next_token: u64,
    tx: Sender<SlotEvent>,
    rx: Receiver<SlotEvent>,
    now: Seconds,
    playing: bool,
    rate: f64,
    can_play_grace: Seconds,
    load_timeout: Seconds,
}

impl<S: MediaSurface> BufferSlotManager<S> {
    pub fn new(a: S, b: S, config: &EngineConfig) -> Self {
        let (tx, rx) = unbounded();
        let mut manager = Self {
            slots: [Slot::new(a), Slot::new(b)],
            active: 0,
            preloaded: None,
            next_token: 0,
            tx,
            rx,
            now: 0.0,
            playing: false,
            rate: 1.0,
            can_play_grace: config.can_play_grace,
            load_timeout: config.load_timeout,
        };
        for (index, slot) in manager.slots.iter_mut().enumerate() {
            slot.surface.pause();
            slot.surface.set_muted(index != 0);
        }
        manager
    }

    pub fn active_slot(&self) -> SlotId {
        SlotId::from_index(self.active)
    }

    pub fn standby_slot(&self) -> SlotId {
        SlotId::from_index(1 - self.active)
    }

    pub fn state(&self, slot: SlotId) -> SlotState {
        self.slots[slot.index()].state
    }

    /// Clip loaded into `slot`, as it was when loaded.
    pub fn clip_in(&self, slot: SlotId) -> Option<&Clip> {
        self.slots[slot.index()].clip.as_ref()
    }

    pub fn surface(&self, slot: SlotId) -> &S {
        &self.slots[slot.index()].surface
    }

    pub fn surface_mut(&mut self, slot: SlotId) -> &mut S {
        &mut self.slots[slot.index()].surface
    }

    pub fn preloaded(&self) -> Option<ClipId> {
        self.preloaded
    }

    /// The standby clip recorded by the last `preload`.
    pub fn preloaded_clip(&self) -> Option<&Clip> {
        let standby = &self.slots[1 - self.active];
        self.preloaded
            .and_then(|id| standby.clip.as_ref().filter(|c| c.id == id))
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether `slot` is buffered and positioned on its clip.
    pub fn video_ready_for_slot(&self, slot: SlotId) -> bool {
        let slot = &self.slots[slot.index()];
        slot.state == SlotState::Ready && slot.pending_seek.is_none() && slot.clip.is_some()
    }

    /// Surfaces currently producing sound.
    pub fn audible_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.surface.is_muted() && !s.surface.is_paused())
            .count()
    }

    /// Active slot position when it can be trusted as a clock source.
    pub fn active_position(&self) -> Option<Seconds> {
        let slot = &self.slots[self.active];
        (slot.state == SlotState::Ready && slot.pending_seek.is_none())
            .then(|| slot.surface.position())
    }

    /// Load `clip` into the standby slot, cued at its in point.
    ///
    /// Returns false when `clip` is already the recorded preload.
    pub fn preload(&mut self, clip: &Clip) -> bool {
        self.preload_at(clip, clip.trim_start)
    }

    /// Like [`preload`](Self::preload), cued at source position `local`.
    /// A lower-track clip shown again after an overlay resumes mid-way.
    pub fn preload_at(&mut self, clip: &Clip, local: Seconds) -> bool {
        if self.preloaded == Some(clip.id) {
            return false;
        }
        let standby = 1 - self.active;
        self.preloaded = Some(clip.id);
        if self.slots[standby].holds(clip.id) {
            self.slots[standby].clip = Some(clip.clone());
            self.cue(standby, local);
            debug!(clip = %clip.id, slot = %SlotId::from_index(standby), local, "Re-cued standby");
            return true;
        }
        debug!(clip = %clip.id, slot = %SlotId::from_index(standby), local, "Preloading");
        self.load_into(standby, clip, local, false);
        true
    }

    /// Make the standby slot active if it holds a ready preload.
    ///
    /// The outgoing slot is paused and muted before the incoming one is
    /// unmuted and started, all within this call. Clears the preload
    /// record. Returns false and changes nothing when there is no preload
    /// or it is not ready yet.
    pub fn swap(&mut self) -> bool {
        let standby = 1 - self.active;
        let slot = &self.slots[standby];
        let ready = slot.state == SlotState::Ready
            && self.preloaded.is_some()
            && slot.clip_id() == self.preloaded;
        if !ready {
            return false;
        }
        let outgoing = &mut self.slots[self.active];
        outgoing.surface.pause();
        outgoing.surface.set_muted(true);
        outgoing.play_when_ready = false;

        self.active = standby;
        let incoming = &mut self.slots[standby];
        incoming.surface.set_muted(false);
        if self.playing {
            incoming.surface.play();
        }
        self.preloaded = None;
        debug!(active = %self.active_slot(), "Swapped slots");
        true
    }

    /// Load `clip` directly into the active slot at source position `local`.
    ///
    /// Playback resumes once the slot is ready if the manager is playing.
    pub fn cold_load(&mut self, clip: &Clip, local: Seconds) {
        if self.preloaded == Some(clip.id) {
            self.preloaded = None;
            self.release(1 - self.active);
        }
        debug!(clip = %clip.id, slot = %self.active_slot(), local, "Cold loading");
        self.load_into(self.active, clip, local, self.playing);
    }

    /// Present `clip` at source position `local`: reseek when it is already
    /// active, swap when its preload is ready, otherwise cold-load.
    pub fn activate(&mut self, clip: &Clip, local: Seconds) -> Handoff {
        let active = self.active;
        if self.slots[active].holds(clip.id) {
            self.slots[active].clip = Some(clip.clone());
            self.cue(active, local);
            if self.playing {
                self.resume_active();
            }
            return Handoff::Reseeked;
        }
        let standby = 1 - active;
        if self.preloaded == Some(clip.id) && self.slots[standby].holds(clip.id) {
            self.slots[standby].clip = Some(clip.clone());
            self.cue(standby, local);
            if self.swap() {
                return Handoff::Swapped;
            }
            debug!(clip = %clip.id, "Preload not ready at boundary");
        }
        self.cold_load(clip, local);
        Handoff::ColdLoaded
    }

    /// Reposition the active slot.
    pub fn seek_active(&mut self, local: Seconds) {
        self.cue(self.active, local);
    }

    /// Stop presenting: unload the active slot.
    pub fn release_active(&mut self) {
        self.release(self.active);
    }

    /// Forget the preload and unload the standby slot holding it.
    pub fn invalidate_preload(&mut self) {
        if let Some(id) = self.preloaded.take() {
            let standby = 1 - self.active;
            if self.slots[standby].clip_id() == Some(id) {
                self.release(standby);
            }
            debug!(clip = %id, "Preload invalidated");
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        if playing {
            self.resume_active();
        } else {
            let slot = &mut self.slots[self.active];
            slot.surface.pause();
            slot.play_when_ready = false;
        }
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        for slot in &mut self.slots {
            slot.surface.set_playback_rate(rate);
        }
    }

    /// Advance surfaces to `now`, apply their events and readiness timers.
    pub fn pump(&mut self, now: Seconds) -> SmallVec<[SlotNotice; 2]> {
        self.now = now;
        for slot in &mut self.slots {
            slot.surface.update(now);
        }

        let mut notices = SmallVec::new();
        while let Ok(SlotEvent { slot, token, event }) = self.rx.try_recv() {
            let index = slot.index();
            if self.slots[index].token != token {
                trace!(slot = %slot, token, "Dropping stale surface event");
                continue;
            }
            match event {
                SurfaceEvent::CanPlay => {
                    if self.slots[index].state == SlotState::Loading {
                        self.slots[index].state = SlotState::CanPlay { since: now };
                        debug!(slot = %slot, "Slot can play");
                    }
                }
                SurfaceEvent::CanPlayThrough => {
                    if matches!(
                        self.slots[index].state,
                        SlotState::Loading | SlotState::CanPlay { .. }
                    ) {
                        self.mark_ready(index);
                    }
                }
                SurfaceEvent::Ended => {
                    if index == self.active {
                        if let Some(clip_id) = self.slots[index].clip_id() {
                            notices.push(SlotNotice::Ended { slot, clip_id });
                        }
                    }
                }
                SurfaceEvent::Error(message) => {
                    let entry = &mut self.slots[index];
                    entry.state = SlotState::Errored;
                    entry.pending_seek = None;
                    entry.play_when_ready = false;
                    entry.surface.pause();
                    if let Some(clip_id) = entry.clip_id() {
                        warn!(slot = %slot, clip = %clip_id, %message, "Source failed to load");
                        notices.push(SlotNotice::Failed { slot, clip_id });
                    }
                }
            }
        }

        for index in 0..self.slots.len() {
            let state = self.slots[index].state;
            match state {
                SlotState::CanPlay { since } if now - since >= self.can_play_grace => {
                    self.mark_ready(index);
                }
                SlotState::Loading if now - self.slots[index].loaded_at >= self.load_timeout => {
                    warn!(
                        slot = %SlotId::from_index(index),
                        timeout = self.load_timeout,
                        "No readiness signal, assuming ready"
                    );
                    self.mark_ready(index);
                }
                _ => {}
            }
        }
        notices
    }

    fn load_into(&mut self, index: usize, clip: &Clip, seek: Seconds, play_when_ready: bool) {
        self.next_token += 1;
        let token = self.next_token;
        let sink = EventSink::new(SlotId::from_index(index), token, self.tx.clone());
        let muted = index != self.active;
        let (now, rate) = (self.now, self.rate);

        let slot = &mut self.slots[index];
        slot.surface.pause();
        slot.surface.set_muted(muted);
        slot.surface.load(&clip.source_ref, sink);
        slot.surface.set_playback_rate(rate);
        slot.state = SlotState::Loading;
        slot.clip = Some(clip.clone());
        slot.token = token;
        slot.loaded_at = now;
        slot.pending_seek = Some(seek);
        slot.play_when_ready = play_when_ready;
    }

    fn release(&mut self, index: usize) {
        self.next_token += 1;
        let slot = &mut self.slots[index];
        slot.surface.pause();
        slot.surface.unload();
        slot.state = SlotState::Empty;
        slot.clip = None;
        slot.token = self.next_token;
        slot.pending_seek = None;
        slot.play_when_ready = false;
    }

    /// Seek now when ready, otherwise on readiness.
    fn cue(&mut self, index: usize, position: Seconds) {
        let slot = &mut self.slots[index];
        if slot.state == SlotState::Ready {
            slot.surface.seek(position);
            slot.pending_seek = None;
        } else {
            slot.pending_seek = Some(position);
        }
    }

    fn resume_active(&mut self) {
        let slot = &mut self.slots[self.active];
        match slot.state {
            SlotState::Ready => slot.surface.play(),
            SlotState::Errored | SlotState::Empty => {}
            _ => slot.play_when_ready = true,
        }
    }

    fn mark_ready(&mut self, index: usize) {
        let start = index == self.active && self.playing;
        let slot = &mut self.slots[index];
        slot.state = SlotState::Ready;
        if let Some(position) = slot.pending_seek.take() {
            slot.surface.seek(position);
        }
        if start && slot.play_when_ready {
            slot.surface.play();
        }
        slot.play_when_ready = false;
        debug!(slot = %SlotId::from_index(index), "Slot ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCatalog, SimSource, SimulatedSurface};
    use proptest::prelude::*;
    use splice_timeline::{ClipKind, SourceRef};

    fn manager(catalog: SimCatalog) -> BufferSlotManager<SimulatedSurface> {
        let (a, b) = catalog.surfaces();
        BufferSlotManager::new(a, b, &EngineConfig::default())
    }

    fn clip(path: &str, trim_start: f64) -> Clip {
        Clip::new(ClipKind::Video, path, SourceRef::new(path, 60.0), 0.0, 5.0)
            .with_trim_start(trim_start)
    }

    #[test]
    fn preload_is_idempotent_and_cues_in_point() {
        let mut slots = manager(SimCatalog::new(SimSource::instant()));
        let next = clip("b.mp4", 12.0);
        assert!(slots.preload(&next));
        assert!(!slots.preload(&next));
        assert_eq!(slots.surface(SlotId::B).load_count(), 1);
        assert_eq!(slots.state(SlotId::B), SlotState::Loading);

        slots.pump(0.0);
        assert_eq!(slots.state(SlotId::B), SlotState::Ready);
        assert_eq!(slots.surface(SlotId::B).position(), 12.0);
        assert!(slots.video_ready_for_slot(SlotId::B));
        assert!(slots.surface(SlotId::B).is_muted());
        assert!(slots.surface(SlotId::B).is_paused());
    }

    #[test]
    fn can_play_is_promoted_after_grace() {
        let mut slots = manager(SimCatalog::new(SimSource::with_latency(0.1, None)));
        slots.preload(&clip("b.mp4", 0.0));
        slots.pump(0.1);
        assert!(matches!(slots.state(SlotId::B), SlotState::CanPlay { .. }));
        slots.pump(0.3);
        assert!(matches!(slots.state(SlotId::B), SlotState::CanPlay { .. }));
        slots.pump(0.36);
        assert_eq!(slots.state(SlotId::B), SlotState::Ready);
    }

    #[test]
    fn silent_load_is_forced_ready_after_timeout() {
        let mut slots = manager(SimCatalog::new(SimSource::with_latency(10.0, None)));
        slots.preload(&clip("b.mp4", 2.0));
        slots.pump(1.0);
        assert_eq!(slots.state(SlotId::B), SlotState::Loading);
        slots.pump(1.5);
        assert_eq!(slots.state(SlotId::B), SlotState::Ready);
        assert_eq!(slots.surface(SlotId::B).position(), 2.0);
    }

    #[test]
    fn swap_requires_a_ready_preload() {
        let mut slots = manager(SimCatalog::new(SimSource::with_latency(0.5, Some(0.5))));
        let current = clip("a.mp4", 0.0);
        let next = clip("b.mp4", 0.0);
        slots.set_playing(true);
        slots.cold_load(&current, 0.0);
        assert!(!slots.swap());

        slots.preload(&next);
        assert!(!slots.swap());
        assert_eq!(slots.active_slot(), SlotId::A);

        slots.pump(0.5);
        assert!(slots.swap());
        assert_eq!(slots.active_slot(), SlotId::B);
        assert_eq!(slots.preloaded(), None);
        assert_eq!(slots.audible_count(), 1);
        assert!(!slots.surface(SlotId::B).is_muted());
        assert!(slots.surface(SlotId::A).is_muted());
        assert!(slots.surface(SlotId::A).is_paused());

        // The record is gone, so flipping back would show stale content
        assert!(!slots.swap());
    }

    #[test]
    fn activate_without_preload_cold_loads() {
        let mut slots = manager(SimCatalog::new(SimSource::instant()));
        let current = clip("a.mp4", 0.0);
        let other = clip("b.mp4", 0.0);
        let target = clip("c.mp4", 3.0);
        slots.cold_load(&current, 0.0);
        slots.preload(&other);
        slots.pump(0.0);

        assert_eq!(slots.activate(&target, 4.0), Handoff::ColdLoaded);
        assert_eq!(slots.active_slot(), SlotId::A);
        assert_eq!(slots.clip_in(SlotId::A).map(|c| c.id), Some(target.id));
        assert_eq!(slots.preloaded(), Some(other.id));

        slots.pump(0.1);
        assert_eq!(slots.surface(SlotId::A).position(), 4.0);
        assert_eq!(slots.activate(&target, 5.0), Handoff::Reseeked);
        assert_eq!(slots.surface(SlotId::A).position(), 5.0);
    }

    #[test]
    fn activate_swaps_in_ready_preload() {
        let mut slots = manager(SimCatalog::new(SimSource::instant()));
        let current = clip("a.mp4", 0.0);
        let next = clip("b.mp4", 7.0);
        slots.set_playing(true);
        slots.cold_load(&current, 0.0);
        slots.preload(&next);
        slots.pump(0.0);

        assert_eq!(slots.activate(&next, 7.5), Handoff::Swapped);
        assert_eq!(slots.active_slot(), SlotId::B);
        assert_eq!(slots.surface(SlotId::B).position(), 7.5);
        assert!(!slots.surface(SlotId::B).is_paused());
        assert_eq!(slots.audible_count(), 1);
    }

    #[test]
    fn events_from_a_superseded_load_are_ignored() {
        let mut slots = manager(SimCatalog::new(SimSource::with_latency(0.1, Some(0.1))));
        slots.preload(&clip("b.mp4", 0.0));
        let stale = EventSink::new(SlotId::B, slots.slots[1].token, slots.tx.clone());
        slots.invalidate_preload();
        assert_eq!(slots.state(SlotId::B), SlotState::Empty);

        stale.emit(SurfaceEvent::CanPlayThrough);
        slots.pump(0.2);
        assert_eq!(slots.state(SlotId::B), SlotState::Empty);
        assert!(!slots.video_ready_for_slot(SlotId::B));
    }

    #[test]
    fn load_failure_is_reported_once() {
        let mut slots =
            manager(SimCatalog::default().with("bad.mp4", SimSource::failing(0.0)));
        let bad = clip("bad.mp4", 0.0);
        slots.cold_load(&bad, 0.0);

        let notices = slots.pump(0.0);
        assert_eq!(
            notices.as_slice(),
            &[SlotNotice::Failed {
                slot: SlotId::A,
                clip_id: bad.id
            }]
        );
        assert_eq!(slots.state(SlotId::A), SlotState::Errored);
        assert!(slots.pump(1.0).is_empty());
        assert!(!slots.video_ready_for_slot(SlotId::A));
    }

    #[test]
    fn media_end_is_reported_for_the_active_slot() {
        let source = SimSource {
            duration: Some(1.0),
            ..SimSource::instant()
        };
        let mut slots = manager(SimCatalog::new(source));
        let current = clip("a.mp4", 0.0);
        slots.set_playing(true);
        slots.cold_load(&current, 0.0);
        slots.pump(0.0);

        let notices = slots.pump(1.0);
        assert_eq!(
            notices.as_slice(),
            &[SlotNotice::Ended {
                slot: SlotId::A,
                clip_id: current.id
            }]
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Preload(usize),
        PreloadAt(usize, f64),
        Swap,
        Activate(usize, f64),
        ColdLoad(usize),
        Invalidate,
        Playing(bool),
        Pump(f64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize).prop_map(Op::Preload),
            (0..4usize, 0.0f64..4.0).prop_map(|(i, at)| Op::PreloadAt(i, at)),
            Just(Op::Swap),
            (0..4usize, 0.0f64..4.0).prop_map(|(i, at)| Op::Activate(i, at)),
            (0..4usize).prop_map(Op::ColdLoad),
            Just(Op::Invalidate),
            any::<bool>().prop_map(Op::Playing),
            (0.0f64..0.6).prop_map(Op::Pump),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn slot_roles_stay_exclusive(ops in prop::collection::vec(op(), 1..60)) {
            // The last source fails so errored slots are in the mix.
            let catalog = SimCatalog::new(SimSource::with_latency(0.1, Some(0.3)))
                .with("d.mp4", SimSource::failing(0.2));
            let mut slots = manager(catalog);
            let clips = [clip("a.mp4", 0.0), clip("b.mp4", 1.0), clip("c.mp4", 2.0), clip("d.mp4", 0.0)];
            let mut now = 0.0;
            for op in ops {
                match op.clone() {
                    Op::Preload(i) => {
                        slots.preload(&clips[i]);
                    }
                    Op::PreloadAt(i, at) => {
                        slots.preload_at(&clips[i], at);
                    }
                    Op::Swap => {
                        slots.swap();
                    }
                    Op::Activate(i, at) => {
                        slots.activate(&clips[i], at);
                    }
                    Op::ColdLoad(i) => slots.cold_load(&clips[i], 0.0),
                    Op::Invalidate => slots.invalidate_preload(),
                    Op::Playing(playing) => slots.set_playing(playing),
                    Op::Pump(dt) => {
                        now += dt;
                        slots.pump(now);
                    }
                }

                let standby = slots.standby_slot();
                prop_assert_ne!(slots.active_slot(), standby);
                prop_assert!(slots.audible_count() <= 1);
                let surface = slots.surface(standby);
                prop_assert!(surface.is_muted() || surface.is_paused(), "standby audible after {:?}", op);
                if let Some(id) = slots.preloaded() {
                    prop_assert_eq!(slots.clip_in(standby).map(|c| c.id), Some(id));
                }
            }
        }
    }
}
