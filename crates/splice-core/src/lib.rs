//! Splice Core - Foundation types for the timeline engine
//!
//! This crate provides the fundamental types shared by every Splice crate:
//! - Time representation (seconds, FrameRate, TimeRange)
//! - Edit rejection reasons and the crate-wide error type
//! - Engine configuration and its tunable tolerances

pub mod config;
pub mod error;
pub mod time;

pub use config::{EngineConfig, GapPolicy, SnapConfig};
pub use error::{RejectReason, Result, SpliceError};
pub use time::{FrameRate, Seconds, TimeRange};

/// Default tolerances, in seconds unless noted.
pub mod defaults {
    /// Shortest clip a trim or add may produce.
    pub const MIN_CLIP_DURATION: f64 = 0.5;

    /// Gap below which two clips count as butt-joined.
    pub const CONTIGUITY_EPSILON: f64 = 0.01;

    /// Lead time before a clip's start at which it may begin loading.
    pub const PRELOAD_AHEAD_SEC: f64 = 3.0;

    /// Remaining time at which a clip boundary fires (about one frame).
    pub const END_TOLERANCE: f64 = 0.08;

    /// Disagreement between media position and virtual time before reconciling.
    pub const DRIFT_TOLERANCE: f64 = 0.03;

    /// After "can play", how long to wait for "can play through".
    pub const CAN_PLAY_GRACE: f64 = 0.25;

    /// Upper bound on a load that never signals readiness.
    pub const LOAD_TIMEOUT: f64 = 1.5;

    /// Largest wall-clock delta a single tick may integrate.
    pub const MAX_TICK_DELTA: f64 = 0.25;

    /// Snap distance in pixels (divided by zoom).
    pub const SNAP_DISTANCE_PX: f64 = 8.0;

    /// Default zoom, in pixels per second.
    pub const PIXELS_PER_SECOND: f64 = 100.0;

    /// Undo history depth.
    pub const HISTORY_DEPTH: usize = 200;

    /// Playback rate limits.
    pub const MIN_RATE: f64 = 0.1;
    pub const MAX_RATE: f64 = 16.0;
}
