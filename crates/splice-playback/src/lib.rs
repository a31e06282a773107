//! Splice Playback - Gapless playback engine
//!
//! Plays an editable timeline as one continuous asset:
//! - `MediaSurface`: the render target interface, with asynchronous signals
//! - `BufferSlotManager`: two slots, preload into standby, atomic swap, cold load
//! - `PlaybackClock`: rate-scaled virtual time from host ticks
//! - `PlaybackEngine`: the sync loop tying clock, resolver and slots together
//! - `SimulatedSurface`: a deterministic headless surface

pub mod clock;
pub mod engine;
pub mod sim;
pub mod slots;
pub mod surface;

pub use clock::{ClockState, PlaybackClock};
pub use engine::{AppliedEdit, PlaybackEngine, TickReport};
pub use sim::{SimCatalog, SimSource, SimulatedSurface};
pub use slots::{BufferSlotManager, Handoff, SlotId, SlotNotice, SlotState};
pub use surface::{EventSink, MediaSurface, SlotEvent, SurfaceEvent};
