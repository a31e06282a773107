//! Splice - headless timeline player
//!
//! Loads a timeline document (or builds a demo one), plays it through two
//! simulated surfaces at display rate and logs the transport.
//!
//! Usage: splice [TIMELINE.json] [--config CONFIG.json] [--catalog SOURCES.json]
//!               [--seconds N] [--from T] [--rate R] [--loop] [--save OUT.json]

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use splice_core::{EngineConfig, Seconds};
use splice_playback::{PlaybackEngine, SimCatalog, SimSource, TickReport};
use splice_timeline::{Clip, ClipKind, EditCommand, Marker, SourceRef, Timeline, TimelineFile};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Host tick rate.
const TICK_HZ: f64 = 60.0;

struct Args {
    timeline: Option<PathBuf>,
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    save: Option<PathBuf>,
    seconds: Seconds,
    from: Seconds,
    rate: f64,
    looping: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let timeline = match &args.timeline {
        Some(path) => {
            TimelineFile::load_from_file(path, &config)
                .with_context(|| format!("loading timeline {}", path.display()))?
                .timeline
        }
        None => {
            info!("No timeline given, using the demo timeline");
            demo_timeline(&config)?
        }
    };

    if let Some(path) = &args.save {
        TimelineFile::new(timeline.clone())
            .save_to_file(path)
            .with_context(|| format!("saving timeline {}", path.display()))?;
        info!(path = %path.display(), "Timeline saved");
    }

    let catalog = match &args.catalog {
        Some(path) => load_catalog(path)?,
        None => SimCatalog::default(),
    };

    info!(
        tracks = timeline.tracks().len(),
        clips = timeline.clips().count(),
        duration = timeline.duration(),
        "Splice starting..."
    );

    let frame_rate = timeline.frame_rate;
    let (a, b) = catalog.surfaces();
    let mut engine = PlaybackEngine::new(timeline, config, a, b)?;
    engine.set_loop(args.looping);
    engine.set_rate(args.rate);
    engine.seek(args.from);
    engine.play();

    let frames = (args.seconds * TICK_HZ).ceil() as u64;
    for frame in 0..=frames {
        let now = frame as f64 / TICK_HZ;
        let report = engine.tick(now);
        log_report(&report, frame, frame_rate);
        if report.stopped {
            break;
        }
    }

    info!(
        time = %frame_rate.timecode(engine.current_time()),
        playing = engine.is_playing(),
        "Done"
    );
    Ok(())
}

fn log_report(report: &TickReport, frame: u64, frame_rate: splice_core::FrameRate) {
    let timecode = frame_rate.timecode(report.time);
    if let Some(clip) = report.boundary {
        info!(%timecode, clip = %clip, handoff = ?report.handoff, "Boundary");
    }
    if report.looped {
        info!(%timecode, "Looped");
    }
    if report.stopped {
        info!(%timecode, "Reached end");
    }
    if frame % TICK_HZ as u64 == 0 {
        match report.active_clip {
            Some(clip) => info!(%timecode, clip = %clip, "Playhead"),
            None => info!(%timecode, "Playhead in gap"),
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args {
        timeline: None,
        config: None,
        catalog: None,
        save: None,
        seconds: 30.0,
        from: 0.0,
        rate: 1.0,
        looping: false,
    };

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .with_context(|| format!("{} needs a value", name))
        };
        match arg.as_str() {
            "--config" => parsed.config = Some(value("--config")?.into()),
            "--catalog" => parsed.catalog = Some(value("--catalog")?.into()),
            "--save" => parsed.save = Some(value("--save")?.into()),
            "--seconds" => parsed.seconds = value("--seconds")?.parse().context("--seconds")?,
            "--from" => parsed.from = value("--from")?.parse().context("--from")?,
            "--rate" => parsed.rate = value("--rate")?.parse().context("--rate")?,
            "--loop" => parsed.looping = true,
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            path => {
                if parsed.timeline.is_some() {
                    bail!("only one timeline may be given");
                }
                parsed.timeline = Some(PathBuf::from(path));
            }
        }
    }

    if !(parsed.seconds.is_finite() && parsed.seconds >= 0.0) {
        bail!("--seconds must be a non-negative number");
    }
    Ok(parsed)
}

/// Load behaviour of one source in a catalog file.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct CatalogEntry {
    /// Seconds until the source can play
    latency: Seconds,
    fail: bool,
}

impl Default for CatalogEntry {
    fn default() -> Self {
        Self {
            latency: 0.02,
            fail: false,
        }
    }
}

impl CatalogEntry {
    fn behaviour(&self) -> SimSource {
        if self.fail {
            SimSource::failing(self.latency)
        } else {
            SimSource::with_latency(self.latency, Some(self.latency * 2.0))
        }
    }
}

/// Read per-path load behaviour: `{ "path": { "latency": s, "fail": bool } }`.
fn load_catalog(path: &std::path::Path) -> Result<SimCatalog> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let entries: BTreeMap<String, CatalogEntry> =
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))?;

    let mut catalog = SimCatalog::default();
    for (source, entry) in entries {
        if entry.fail {
            warn!(source = %source, "Source will fail to load");
        }
        catalog = catalog.with(source, entry.behaviour());
    }
    Ok(catalog)
}

/// Three butt-joined shots, a music bed and a title.
fn demo_timeline(config: &EngineConfig) -> Result<Timeline> {
    let timeline = Timeline::with_default_tracks();
    let [video, audio, text] = [0, 1, 2].map(|i| timeline.tracks()[i].id);

    let shot = |label: &str, path: &str, start: Seconds, duration: Seconds, trim: Seconds| {
        Clip::new(ClipKind::Video, label, SourceRef::new(path, 120.0), start, duration)
            .with_trim_start(trim)
    };

    let commands = vec![
        EditCommand::AddClip {
            track_id: video,
            clip: shot("Intro", "media/intro.mp4", 0.0, 5.0, 2.0),
        },
        EditCommand::AddClip {
            track_id: video,
            clip: shot("Interview", "media/interview.mp4", 5.0, 3.0, 40.0),
        },
        EditCommand::AddClip {
            track_id: video,
            clip: shot("Outro", "media/outro.mp4", 8.0, 4.0, 0.0),
        },
        EditCommand::AddClip {
            track_id: audio,
            clip: Clip::new(ClipKind::Audio, "Music", SourceRef::new("media/music.wav", 180.0), 0.0, 12.0),
        },
        EditCommand::AddClip {
            track_id: text,
            clip: Clip::new(ClipKind::Text, "Title", SourceRef::unbounded("Splice"), 0.5, 3.0),
        },
        EditCommand::AddMarker {
            marker: Marker::new(5.0, "cut"),
        },
    ];

    let outcome = EditCommand::Batch(commands).apply(&timeline, config)?;
    Ok(outcome.timeline)
}
