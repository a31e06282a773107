//! Render target interface.
//!
//! A surface is anything that can hold one media source and present it:
//! a decoder feeding a texture, an audio voice, or the simulated surface
//! used headless. Loading is asynchronous. Readiness, end and failure are
//! reported later as [`SurfaceEvent`]s through the [`EventSink`] handed to
//! [`MediaSurface::load`].

use crossbeam_channel::Sender;
use splice_core::Seconds;
use splice_timeline::SourceRef;

use crate::slots::SlotId;

/// Asynchronous signal from a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Enough data to start, may still stall.
    CanPlay,
    /// Enough data to play to the end without stalling.
    CanPlayThrough,
    /// Playback reached the end of the source.
    Ended,
    /// The source could not be loaded or decoded.
    Error(String),
}

/// A surface event tagged with the slot and load it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEvent {
    pub slot: SlotId,
    /// Load token; events from a superseded load are discarded.
    pub token: u64,
    pub event: SurfaceEvent,
}

/// Write end of the slot event channel for one load.
#[derive(Debug, Clone)]
pub struct EventSink {
    slot: SlotId,
    token: u64,
    tx: Sender<SlotEvent>,
}

impl EventSink {
    pub(crate) fn new(slot: SlotId, token: u64, tx: Sender<SlotEvent>) -> Self {
        Self { slot, token, tx }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Deliver an event. Dropped silently once the engine is gone.
    pub fn emit(&self, event: SurfaceEvent) {
        let _ = self.tx.send(SlotEvent {
            slot: self.slot,
            token: self.token,
            event,
        });
    }
}

/// One addressable render target.
///
/// Positions are in source seconds. Implementations must not block in any
/// method; `load` only starts the work.
pub trait MediaSurface {
    /// Start loading `source`, replacing whatever was loaded before.
    fn load(&mut self, source: &SourceRef, sink: EventSink);

    /// Drop the current source. Pending events for it must not be sent.
    fn unload(&mut self);

    fn seek(&mut self, position: Seconds);

    fn play(&mut self);

    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);

    fn set_playback_rate(&mut self, rate: f64);

    /// Current source position.
    fn position(&self) -> Seconds;

    /// Source duration once known.
    fn duration(&self) -> Option<Seconds>;

    fn is_paused(&self) -> bool;

    fn is_muted(&self) -> bool;

    /// Called once per tick with the host clock, before events are drained.
    fn update(&mut self, _now: Seconds) {}
}
