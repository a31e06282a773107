//! Virtual playback clock.
//!
//! Integrates host tick deltas scaled by the playback rate. A tick delta is
//! capped so a stalled host does not make the playhead leap.

use splice_core::Seconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: ClockState,
    rate: f64,
    time: Seconds,
    last_tick: Option<Seconds>,
    max_tick_delta: Seconds,
}

impl PlaybackClock {
    pub fn new(max_tick_delta: Seconds) -> Self {
        Self {
            state: ClockState::Stopped,
            rate: 1.0,
            time: 0.0,
            last_tick: None,
            max_tick_delta,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == ClockState::Playing
    }

    /// Start playing. The first tick afterwards advances nothing.
    pub fn play(&mut self) {
        self.state = ClockState::Playing;
        self.last_tick = None;
    }

    pub fn pause(&mut self) {
        self.state = ClockState::Stopped;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn time(&self) -> Seconds {
        self.time
    }

    pub fn set_time(&mut self, time: Seconds) {
        self.time = time;
    }

    /// Record a host tick at `now` and return the virtual delta since the
    /// previous one. Zero while stopped.
    pub fn advance(&mut self, now: Seconds) -> Seconds {
        let previous = self.last_tick.replace(now);
        if !self.is_playing() {
            return 0.0;
        }
        let dt = previous.map_or(0.0, |last| (now - last).clamp(0.0, self.max_tick_delta));
        dt * self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_clock_does_not_advance() {
        let mut clock = PlaybackClock::new(0.25);
        assert_eq!(clock.advance(0.0), 0.0);
        assert_eq!(clock.advance(1.0), 0.0);
    }

    #[test]
    fn first_tick_after_play_is_zero() {
        let mut clock = PlaybackClock::new(0.25);
        clock.advance(0.0);
        clock.play();
        assert_eq!(clock.advance(10.0), 0.0);
        assert!((clock.advance(10.1) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn rate_scales_and_delta_is_capped() {
        let mut clock = PlaybackClock::new(0.25);
        clock.play();
        clock.set_rate(2.0);
        clock.advance(0.0);
        assert!((clock.advance(0.1) - 0.2).abs() < 1e-9);
        // Host stalled for a second
        assert!((clock.advance(1.1) - 0.5).abs() < 1e-9);
        // Host clock went backwards
        assert_eq!(clock.advance(1.0), 0.0);
    }
}
