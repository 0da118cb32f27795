//! Shard Registry
//!
//! Maps shard identifiers to factories producing fresh routine instances.
//! Every bind creates a new instance, so no state leaks between layers.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use super::builtin;
use super::producer::FrameProducer;
use crate::error::{LightstackError, Result};

/// Constructs a fresh routine instance
pub type ShardFactory = Rc<dyn Fn() -> Box<dyn FrameProducer>>;

/// Description of a registered shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardInfo {
    pub uuid: String,
    pub description: String,
}

/// Registry of loadable shards
#[derive(Default)]
pub struct ShardRegistry {
    shards: BTreeMap<String, (ShardInfo, ShardFactory)>,
}

impl ShardRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in shards
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::SOLID, "Fill with a single color", Rc::new(|| {
            Box::new(builtin::Solid) as Box<dyn FrameProducer>
        }));
        registry.register(builtin::PALETTE_SWEEP, "Scroll the palette across the canvas", Rc::new(|| {
            Box::new(builtin::PaletteSweep) as Box<dyn FrameProducer>
        }));
        registry.register(builtin::SPECTRUM, "Audio bin strengths as columns", Rc::new(|| {
            Box::new(builtin::Spectrum) as Box<dyn FrameProducer>
        }));
        registry.register(builtin::BLINK, "Blink the first palette color", Rc::new(|| {
            Box::new(builtin::Blink::default()) as Box<dyn FrameProducer>
        }));
        registry
    }

    /// Register (or replace) a shard
    pub fn register(&mut self, uuid: impl Into<String>, description: impl Into<String>, factory: ShardFactory) {
        let uuid = uuid.into();
        debug!(shard = %uuid, "shard registered");
        let info = ShardInfo {
            uuid: uuid.clone(),
            description: description.into(),
        };
        self.shards.insert(uuid, (info, factory));
    }

    /// Create a fresh instance of `uuid`
    pub fn load(&self, uuid: &str) -> Result<Box<dyn FrameProducer>> {
        self.shards
            .get(uuid)
            .map(|(_, factory)| factory())
            .ok_or_else(|| LightstackError::ShardNotFound {
                shard: uuid.to_string(),
            })
    }

    /// Check whether `uuid` is registered
    pub fn contains(&self, uuid: &str) -> bool {
        self.shards.contains_key(uuid)
    }

    /// Registered shards, sorted by identifier
    pub fn list(&self) -> Vec<ShardInfo> {
        self.shards.values().map(|(info, _)| info.clone()).collect()
    }
}

impl fmt::Debug for ShardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardRegistry")
            .field("shards", &self.shards.keys().collect::<Vec<_>>())
            .finish()
    }
}
