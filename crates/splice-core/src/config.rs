//! Engine configuration.
//!
//! Every tolerance the edit engine and the sync loop rely on lives here so a
//! host can tune them from a single JSON document.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Result, SpliceError};
use crate::time::Seconds;

/// Snapping behaviour for drag and trim edits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapConfig {
    /// When false, proposed times pass through unchanged.
    pub enabled: bool,
    /// Snap distance in pixels; divided by the zoom to get seconds.
    pub distance_px: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            distance_px: defaults::SNAP_DISTANCE_PX,
        }
    }
}

/// What the sync loop does when the next clip starts after a gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Keep advancing through the gap and present nothing.
    #[default]
    PlayThrough,
    /// Jump straight to the next clip's start at the boundary.
    Skip,
}

/// Tunables for editing and playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub snap: SnapConfig,
    pub min_clip_duration: Seconds,
    pub contiguity_epsilon: Seconds,
    pub preload_ahead: Seconds,
    pub end_tolerance: Seconds,
    pub drift_tolerance: Seconds,
    pub can_play_grace: Seconds,
    pub load_timeout: Seconds,
    pub max_tick_delta: Seconds,
    pub loop_playback: bool,
    pub gap_policy: GapPolicy,
    pub history_depth: usize,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snap: SnapConfig::default(),
            min_clip_duration: defaults::MIN_CLIP_DURATION,
            contiguity_epsilon: defaults::CONTIGUITY_EPSILON,
            preload_ahead: defaults::PRELOAD_AHEAD_SEC,
            end_tolerance: defaults::END_TOLERANCE,
            drift_tolerance: defaults::DRIFT_TOLERANCE,
            can_play_grace: defaults::CAN_PLAY_GRACE,
            load_timeout: defaults::LOAD_TIMEOUT,
            max_tick_delta: defaults::MAX_TICK_DELTA,
            loop_playback: false,
            gap_policy: GapPolicy::default(),
            history_depth: defaults::HISTORY_DEPTH,
            min_rate: defaults::MIN_RATE,
            max_rate: defaults::MAX_RATE,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data)
            .map_err(|e| SpliceError::InvalidConfig(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    /// Check that every tolerance is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("minClipDuration", self.min_clip_duration),
            ("contiguityEpsilon", self.contiguity_epsilon),
            ("preloadAhead", self.preload_ahead),
            ("endTolerance", self.end_tolerance),
            ("driftTolerance", self.drift_tolerance),
            ("canPlayGrace", self.can_play_grace),
            ("loadTimeout", self.load_timeout),
            ("maxTickDelta", self.max_tick_delta),
            ("minRate", self.min_rate),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpliceError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.snap.distance_px.is_finite() && self.snap.distance_px >= 0.0) {
            return Err(SpliceError::InvalidConfig(format!(
                "snap.distancePx must be non-negative, got {}",
                self.snap.distance_px
            )));
        }
        if self.max_rate < self.min_rate {
            return Err(SpliceError::InvalidConfig(format!(
                "maxRate {} is below minRate {}",
                self.max_rate, self.min_rate
            )));
        }
        if self.end_tolerance >= self.preload_ahead {
            return Err(SpliceError::InvalidConfig(
                "endTolerance must be shorter than preloadAhead".into(),
            ));
        }
        Ok(())
    }

    /// Clamp a requested playback rate into the configured limits.
    pub fn clamp_rate(&self, rate: f64) -> f64 {
        if rate.is_finite() {
            rate.clamp(self.min_rate, self.max_rate)
        } else {
            1.0
        }
    }
}
