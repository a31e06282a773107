//! Headless media surface.
//!
//! `SimulatedSurface` plays sources described by a [`SimCatalog`]: per-path
//! load latency, a "can play" / "can play through" split, failure injection
//! and a known duration after which it reports `Ended`. Time only moves in
//! [`MediaSurface::update`], so runs are deterministic.

use splice_core::Seconds;
use splice_timeline::SourceRef;
use std::collections::HashMap;
use std::sync::Arc;

use crate::surface::{EventSink, MediaSurface, SurfaceEvent};

/// Loading behaviour of one simulated source.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSource {
    /// Delay from load to "can play".
    pub can_play_after: Seconds,
    /// Delay from load to "can play through"; `None` never sends it.
    pub can_play_through_after: Option<Seconds>,
    /// Report an error instead of becoming playable.
    pub fail: bool,
    /// Overrides the duration carried by the source reference.
    pub duration: Option<Seconds>,
}

impl Default for SimSource {
    fn default() -> Self {
        Self {
            can_play_after: 0.02,
            can_play_through_after: Some(0.05),
            fail: false,
            duration: None,
        }
    }
}

impl SimSource {
    /// Ready on the first update after loading.
    pub fn instant() -> Self {
        Self {
            can_play_after: 0.0,
            can_play_through_after: Some(0.0),
            ..Self::default()
        }
    }

    pub fn with_latency(can_play: Seconds, can_play_through: Option<Seconds>) -> Self {
        Self {
            can_play_after: can_play,
            can_play_through_after: can_play_through,
            ..Self::default()
        }
    }

    /// Fails `after` seconds into the load.
    pub fn failing(after: Seconds) -> Self {
        Self {
            can_play_after: after,
            can_play_through_after: None,
            fail: true,
            duration: None,
        }
    }
}

/// Source behaviours by path, with a fallback for unknown paths.
#[derive(Debug, Clone, Default)]
pub struct SimCatalog {
    sources: HashMap<String, SimSource>,
    fallback: SimSource,
}

impl SimCatalog {
    pub fn new(fallback: SimSource) -> Self {
        Self {
            sources: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, path: impl Into<String>, source: SimSource) -> Self {
        self.sources.insert(path.into(), source);
        self
    }

    pub fn get(&self, path: &str) -> &SimSource {
        self.sources.get(path).unwrap_or(&self.fallback)
    }

    /// Two surfaces sharing this catalog.
    pub fn surfaces(self) -> (SimulatedSurface, SimulatedSurface) {
        let catalog = Arc::new(self);
        (
            SimulatedSurface::new(Arc::clone(&catalog)),
            SimulatedSurface::new(catalog),
        )
    }
}

#[derive(Debug)]
struct Loading {
    path: String,
    source: SimSource,
    requested_at: Seconds,
    sink: EventSink,
    can_play_sent: bool,
    through_sent: bool,
    failed: bool,
}

/// A deterministic [`MediaSurface`] driven by host time.
#[derive(Debug)]
pub struct SimulatedSurface {
    catalog: Arc<SimCatalog>,
    loaded: Option<Loading>,
    now: Seconds,
    position: Seconds,
    duration: Option<Seconds>,
    paused: bool,
    muted: bool,
    rate: f64,
    ended_sent: bool,
    load_count: usize,
}

impl SimulatedSurface {
    pub fn new(catalog: Arc<SimCatalog>) -> Self {
        Self {
            catalog,
            loaded: None,
            now: 0.0,
            position: 0.0,
            duration: None,
            paused: true,
            muted: false,
            rate: 1.0,
            ended_sent: false,
            load_count: 0,
        }
    }

    /// Path of the loaded source.
    pub fn source(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.path.as_str())
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl MediaSurface for SimulatedSurface {
    fn load(&mut self, source: &SourceRef, sink: EventSink) {
        let behaviour = self.catalog.get(&source.path).clone();
        self.duration = behaviour.duration.or(source.duration);
        self.position = 0.0;
        self.paused = true;
        self.ended_sent = false;
        self.load_count += 1;
        self.loaded = Some(Loading {
            path: source.path.clone(),
            source: behaviour,
            requested_at: self.now,
            sink,
            can_play_sent: false,
            through_sent: false,
            failed: false,
        });
    }

    fn unload(&mut self) {
        self.loaded = None;
        self.duration = None;
        self.position = 0.0;
        self.paused = true;
    }

    fn seek(&mut self, position: Seconds) {
        let upper = self.duration.unwrap_or(f64::INFINITY);
        self.position = position.clamp(0.0, upper);
        self.ended_sent = false;
    }

    fn play(&mut self) {
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn position(&self) -> Seconds {
        self.position
    }

    fn duration(&self) -> Option<Seconds> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn update(&mut self, now: Seconds) {
        let dt = (now - self.now).max(0.0);
        self.now = now;
        let Some(loading) = self.loaded.as_mut() else {
            return;
        };
        if loading.failed {
            return;
        }

        let elapsed = now - loading.requested_at;
        if loading.source.fail {
            if elapsed >= loading.source.can_play_after {
                loading.failed = true;
                self.paused = true;
                loading
                    .sink
                    .emit(SurfaceEvent::Error(format!("cannot open {}", loading.path)));
            }
            return;
        }
        if !loading.can_play_sent && elapsed >= loading.source.can_play_after {
            loading.can_play_sent = true;
            loading.sink.emit(SurfaceEvent::CanPlay);
        }
        if let Some(after) = loading.source.can_play_through_after {
            if !loading.through_sent && elapsed >= after {
                loading.through_sent = true;
                loading.sink.emit(SurfaceEvent::CanPlayThrough);
            }
        }

        if !self.paused && loading.can_play_sent {
            self.position += dt * self.rate;
            if let Some(duration) = self.duration {
                if self.position >= duration {
                    self.position = duration;
                    self.paused = true;
                    if !self.ended_sent {
                        self.ended_sent = true;
                        loading.sink.emit(SurfaceEvent::Ended);
                    }
                }
            }
        }
    }
}
