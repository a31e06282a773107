//! Edge snapping for moves and trims.

use splice_core::{Seconds, SnapConfig};

use crate::ids::ClipId;
use crate::timeline::Timeline;

/// A time that dragged edges are attracted to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapPoint {
    pub time: Seconds,
    pub kind: SnapKind,
}

/// Kind of snap point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    Origin,
    Playhead,
    ClipEdge,
    Marker,
}

/// Result of snapping a span that must keep its duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanSnap {
    pub start: Seconds,
    /// The snap point that decided the position, if any.
    pub snapped_to: Option<Seconds>,
}

/// Finds snap targets within a zoom-relative window.
#[derive(Debug, Clone, Copy)]
pub struct SnappingEngine {
    pub enabled: bool,
    /// Window in screen pixels; divided by the zoom to get seconds.
    pub snap_distance_px: f64,
}

impl SnappingEngine {
    pub fn new(config: SnapConfig) -> Self {
        Self {
            enabled: config.enabled,
            snap_distance_px: config.distance_px,
        }
    }

    /// Snap window in seconds at `pixels_per_second`.
    pub fn threshold(&self, pixels_per_second: f64) -> Seconds {
        if pixels_per_second > 0.0 {
            self.snap_distance_px / pixels_per_second
        } else {
            0.0
        }
    }

    /// Collect snap points from the timeline, sorted by time.
    /// `exclude_clip` drops the edges of the clip being dragged.
    pub fn collect_snap_points(timeline: &Timeline, exclude_clip: Option<ClipId>) -> Vec<SnapPoint> {
        let mut points = vec![
            SnapPoint {
                time: 0.0,
                kind: SnapKind::Origin,
            },
            SnapPoint {
                time: timeline.current_time(),
                kind: SnapKind::Playhead,
            },
        ];

        for clip in timeline.clips().filter(|c| Some(c.id) != exclude_clip) {
            points.push(SnapPoint {
                time: clip.start,
                kind: SnapKind::ClipEdge,
            });
            points.push(SnapPoint {
                time: clip.end,
                kind: SnapKind::ClipEdge,
            });
        }

        for marker in timeline.markers() {
            points.push(SnapPoint {
                time: marker.time,
                kind: SnapKind::Marker,
            });
        }

        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        points
    }

    /// Nearest point within the window, or `None`.
    /// Ties go to the earliest point. `points` must be sorted by time.
    pub fn find_snap(&self, time: Seconds, points: &[SnapPoint], pixels_per_second: f64) -> Option<Seconds> {
        if !self.enabled || !time.is_finite() {
            return None;
        }

        let snap_threshold = self.threshold(pixels_per_second);
        let mut best: Option<(Seconds, Seconds)> = None; // (snap_time, distance)

        for sp in points {
            let dist = (sp.time - time).abs();
            if dist <= snap_threshold && best.map_or(true, |(_, d)| dist < d) {
                best = Some((sp.time, dist));
            }
        }

        best.map(|(t, _)| t)
    }

    /// Snap a single time, passing it through when nothing is in range.
    pub fn snap(&self, time: Seconds, points: &[SnapPoint], pixels_per_second: f64) -> Seconds {
        self.find_snap(time, points, pixels_per_second).unwrap_or(time)
    }

    /// Snap both edges of a span of fixed `duration` starting at `start`.
    ///
    /// When both edges find a target and they disagree, the start is derived
    /// from the snapped end so the duration stays exact.
    pub fn snap_span(
        &self,
        start: Seconds,
        duration: Seconds,
        points: &[SnapPoint],
        pixels_per_second: f64,
    ) -> SpanSnap {
        let head = self.find_snap(start, points, pixels_per_second);
        let tail = self.find_snap(start + duration, points, pixels_per_second);

        let (candidate, snapped_to) = match (head, tail) {
            (None, None) => (start, None),
            (Some(s), None) => (s, Some(s)),
            (None, Some(e)) => (e - duration, Some(e)),
            (Some(s), Some(e)) if (s + duration - e).abs() <= f64::EPSILON * e.abs().max(1.0) => {
                (s, Some(s))
            }
            (Some(_), Some(e)) => (e - duration, Some(e)),
        };

        if candidate < 0.0 {
            // Deriving from the end pushed the span before zero.
            return match head {
                Some(s) => SpanSnap {
                    start: s,
                    snapped_to: Some(s),
                },
                None => SpanSnap {
                    start,
                    snapped_to: None,
                },
            };
        }

        SpanSnap {
            start: candidate,
            snapped_to,
        }
    }
}

impl Default for SnappingEngine {
    fn default() -> Self {
        Self::new(SnapConfig::default())
    }
}
