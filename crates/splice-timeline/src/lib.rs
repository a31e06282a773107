//! Splice Timeline - Timeline data model
//!
//! Implements the editable structure behind the player:
//! - Tracks holding non-overlapping, start-ordered clips
//! - Markers and the timeline aggregate root
//! - Validated, atomic edit commands with snapping
//! - Clip resolution for the playback engine
//! - Snapshot undo/redo and versioned JSON persistence

pub mod clip;
pub mod drag;
pub mod edit;
pub mod history;
pub mod ids;
pub mod resolver;
pub mod serialization;
pub mod snapping;
pub mod timeline;
pub mod track;

pub use clip::{Clip, ClipEffect, ClipKind, SourceRef};
pub use drag::{DragSession, MovePreview};
pub use edit::{EditCommand, EditOutcome, EditRejected, TrimEdge};
pub use history::History;
pub use ids::{ClipId, MarkerId, TrackId};
pub use serialization::TimelineFile;
pub use snapping::{SnapKind, SnapPoint, SnappingEngine};
pub use timeline::{Marker, Timeline};
pub use track::{Track, TrackKind};
