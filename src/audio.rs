//! Audio Sources
//!
//! The capture and FFT path lives outside the controller; it feeds per-bin
//! strengths into named [`AudioSource`]s. The [`AudioManager`] persists
//! which source is selected and hands its volume-scaled strengths to the
//! pipeline. With nothing selected, shards see an empty (silent) spectrum.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{info, warn};

use crate::error::{LightstackError, Result};
use crate::storage::{join, Cache, SharedStorage};
use crate::variables::{Variable, VariableRegistry};

// ============================================================================
// Constants
// ============================================================================

pub const AUDIO_DIR: &str = "audio";
pub const VAR_VOLUME: &str = "volume";

const KEY_SELECTED: &str = "selected";

// ============================================================================
// Audio Source
// ============================================================================

/// A named stream of per-bin strengths with its own variables
#[derive(Debug)]
pub struct AudioSource {
    name: String,
    variables: VariableRegistry,
    strengths: Vec<f32>,
}

impl AudioSource {
    fn open(storage: SharedStorage, name: &str) -> Result<Self> {
        let path = join(&join(&join(AUDIO_DIR, "sources"), name), "vars");
        let mut variables = VariableRegistry::open(storage, path, format!("audio/{}", name))?;
        variables.declare(
            Variable::float_range(VAR_VOLUME, 0.5, 0.0, 1.0).with_description("Scale applied to bin strengths"),
        )?;
        Ok(Self {
            name: name.to_string(),
            variables,
            strengths: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the latest per-bin strengths
    pub fn ingest(&mut self, strengths: &[f32]) {
        self.strengths.clear();
        self.strengths.extend_from_slice(strengths);
    }

    /// Latest per-bin strengths, unscaled
    pub fn strengths(&self) -> &[f32] {
        &self.strengths
    }

    pub fn volume(&self) -> f64 {
        self.variables.float(VAR_VOLUME).unwrap_or(0.5)
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.variables
    }
}

// ============================================================================
// Audio Manager
// ============================================================================

/// Manager state reported to the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioInfo {
    pub selected: Option<String>,
    pub sources: Vec<String>,
}

/// Owner of every audio source and of the persisted selection
#[derive(Debug)]
pub struct AudioManager {
    storage: SharedStorage,
    info: Cache,
    sources: BTreeMap<String, AudioSource>,
    selected: Option<String>,
    scaled: Vec<f32>,
}

impl AudioManager {
    /// Load every persisted source and the selection
    ///
    /// A persisted selection naming a missing source falls back to silence.
    pub fn open(storage: SharedStorage) -> Result<Self> {
        let mut initial = Map::new();
        initial.insert(KEY_SELECTED.to_string(), JsonValue::Null);
        let info = Cache::open(storage.clone(), join(AUDIO_DIR, "info"), initial, None)?;

        let mut sources = BTreeMap::new();
        for name in storage.children(&join(AUDIO_DIR, "sources"))? {
            let source = AudioSource::open(storage.clone(), &name)?;
            sources.insert(name, source);
        }

        let selected = match info.get(KEY_SELECTED).ok().and_then(JsonValue::as_str) {
            Some(name) if sources.contains_key(name) => Some(name.to_string()),
            Some(name) => {
                warn!(source = %name, "selected audio source missing, using silence");
                None
            }
            None => None,
        };

        Ok(Self {
            storage,
            info,
            sources,
            selected,
            scaled: Vec::new(),
        })
    }

    /// Register a source (or return the existing one)
    pub fn add_source(&mut self, name: &str) -> Result<&mut AudioSource> {
        if !self.sources.contains_key(name) {
            if name.is_empty() || name.contains('/') {
                return Err(LightstackError::validation("source", name, "invalid source name"));
            }
            let source = AudioSource::open(self.storage.clone(), name)?;
            self.sources.insert(name.to_string(), source);
            info!(source = %name, "audio source added");
        }
        self.source_mut(name)
    }

    pub fn source(&self, name: &str) -> Result<&AudioSource> {
        self.sources.get(name).ok_or_else(|| not_found(name))
    }

    pub fn source_mut(&mut self, name: &str) -> Result<&mut AudioSource> {
        self.sources.get_mut(name).ok_or_else(|| not_found(name))
    }

    /// Registered source names, sorted
    pub fn sources(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Select a source by name, or silence with `None`
    pub fn select(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            self.source(name)?;
        }
        self.info.set(KEY_SELECTED, json!(name))?;
        self.selected = name.map(str::to_string);
        info!(source = ?self.selected, "audio source selected");
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn info(&self) -> AudioInfo {
        AudioInfo {
            selected: self.selected.clone(),
            sources: self.sources(),
        }
    }

    /// Volume-scaled strengths of the selected source
    pub fn strengths(&mut self) -> &[f32] {
        self.scaled.clear();
        if let Some(source) = self.selected.as_ref().and_then(|name| self.sources.get(name)) {
            let volume = source.volume() as f32;
            self.scaled.extend(source.strengths().iter().map(|s| s * volume));
        }
        &self.scaled
    }
}

fn not_found(name: &str) -> LightstackError {
    LightstackError::AudioSourceNotFound {
        name: name.to_string(),
    }
}
