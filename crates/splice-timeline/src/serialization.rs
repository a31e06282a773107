//! Versioned JSON persistence.
//!
//! The document is the timeline itself (tracks, clips, markers, camelCase
//! fields) wrapped with a schema version. Older documents are upgraded in
//! `serde_json::Value` form before typed deserialization, and every load is
//! validated like an edit would be.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use splice_core::{EngineConfig, Result, SpliceError};
use std::path::Path;
use tracing::debug;

use crate::timeline::Timeline;

/// Schema version written by this build.
pub const CURRENT_VERSION: u32 = 2;

/// Upgrade steps; entry `n` lifts a version-`n` document to `n + 1`.
const MIGRATIONS: [fn(Value) -> Value; CURRENT_VERSION as usize] = [wrap_bare_timeline, rename_zoom];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineFile {
    pub version: u32,
    pub timeline: Timeline,
    /// Version of the crate that wrote the document.
    #[serde(default)]
    pub app_version: String,
}

impl TimelineFile {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            version: CURRENT_VERSION,
            timeline,
            app_version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| corrupt("encode", e))
    }

    /// Parse, upgrade and validate a document against `config`'s limits.
    pub fn from_json(bytes: &[u8], config: &EngineConfig) -> Result<Self> {
        let doc: Value = serde_json::from_slice(bytes).map_err(|e| corrupt("parse", e))?;
        let found = schema_version(&doc);
        if found > CURRENT_VERSION {
            return Err(SpliceError::Serialization(format!(
                "document schema {found} is newer than {CURRENT_VERSION}"
            )));
        }

        let doc = MIGRATIONS[found as usize..]
            .iter()
            .fold(doc, |doc, step| step(doc));
        if found < CURRENT_VERSION {
            debug!(from = found, to = CURRENT_VERSION, "Upgraded timeline document");
        }

        let mut file: Self = serde_json::from_value(doc).map_err(|e| corrupt("decode", e))?;
        file.version = CURRENT_VERSION;
        file.timeline.refresh();
        file.timeline.validate(config.min_clip_duration)?;
        Ok(file)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path, config: &EngineConfig) -> Result<Self> {
        Self::from_json(&std::fs::read(path)?, config)
    }
}

fn corrupt(stage: &str, err: serde_json::Error) -> SpliceError {
    SpliceError::Serialization(format!("timeline {stage} failed: {err}"))
}

/// Documents from before the wrapper existed carry no version at all.
fn schema_version(doc: &Value) -> u32 {
    doc.get("version")
        .and_then(Value::as_u64)
        .map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// v0: the document was the bare timeline.
fn wrap_bare_timeline(doc: Value) -> Value {
    json!({ "version": 1, "timeline": doc, "appVersion": "" })
}

/// v1: zoom was stored as `pixelsPerSecond`.
fn rename_zoom(mut doc: Value) -> Value {
    if let Some(timeline) = doc.get_mut("timeline").and_then(Value::as_object_mut) {
        if let Some(pps) = timeline.remove("pixelsPerSecond") {
            timeline.entry("zoom").or_insert(pps);
        }
    }
    doc["version"] = json!(2);
    doc
}
