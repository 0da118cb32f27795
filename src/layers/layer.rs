//! Layer
//!
//! One rendering slot of a stack. A layer pairs a bound shard with two
//! variable registries (public for the shard author, private for the
//! compositor) and a small structural `info` cache.
//!
//! State machine: **Unbound → Bound → {Active, Inactive}**. A routine that
//! fails while drawing moves its layer to `Inactive`; it stays there until
//! it is explicitly reactivated.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::error::{LightstackError, Result};
use crate::graphics::{BlendingMode, Canvas, CompositionMode};
use crate::logsink::LogSink;
use crate::shard::{Frame, FrameProducer, FrameTime, RenderFault, ShardRegistry};
use crate::storage::{join, Cache, SharedStorage};
use crate::variables::{ColorSequence, Variable, VariableRegistry};

// ============================================================================
// Constants
// ============================================================================

pub const INFO_FILE: &str = "info";
pub const VARS_FILE: &str = "vars";
pub const PRIVATE_VARS_FILE: &str = "private_vars";

const KEY_SHARD: &str = "shard_uuid";
const KEY_ACTIVE: &str = "active";
const KEY_INDEX: &str = "index";
const KEY_LOCAL_PALETTE: &str = "use_local_palette";

pub const VAR_BRIGHTNESS: &str = "brightness";
pub const VAR_BLENDING: &str = "blending_mode";
pub const VAR_COMPOSITION: &str = "composition_mode";
pub const VAR_PALETTE: &str = "palette";

// ============================================================================
// Types
// ============================================================================

/// Collaborators every layer needs
#[derive(Clone)]
pub struct LayerEnv {
    pub storage: SharedStorage,
    pub shards: Rc<ShardRegistry>,
    pub log: Rc<dyn LogSink>,
}

/// Initial structural settings for a new layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerInit {
    pub shard_uuid: Option<String>,
    pub active: bool,
    pub use_local_palette: bool,
}

impl Default for LayerInit {
    fn default() -> Self {
        Self {
            shard_uuid: None,
            active: true,
            use_local_palette: false,
        }
    }
}

impl LayerInit {
    /// Active layer bound to `uuid`
    pub fn shard(uuid: impl Into<String>) -> Self {
        Self {
            shard_uuid: Some(uuid.into()),
            ..Self::default()
        }
    }
}

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerState {
    Unbound,
    Active,
    Inactive,
}

/// Structural description reported to the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    pub id: u32,
    pub shard_uuid: Option<String>,
    pub active: bool,
    pub index: usize,
    pub use_local_palette: bool,
    pub state: LayerState,
}

/// What happened when the pipeline ran a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Unbound or inactive; nothing drawn
    Skipped,
    Rendered,
    /// The routine failed and the layer has been deactivated
    Faulted,
}

/// Shared inputs for one frame of layer rendering
#[derive(Debug, Clone, Copy)]
pub struct RenderInputs<'a> {
    pub palette: &'a ColorSequence,
    pub audio: &'a [f32],
    pub time: FrameTime,
}

// ============================================================================
// Layer
// ============================================================================

/// One rendering slot
pub struct Layer {
    id: u32,
    label: String,
    path: String,
    env: LayerEnv,
    info: Cache,
    variables: VariableRegistry,
    private: VariableRegistry,
    shard: Option<Box<dyn FrameProducer>>,
    active: bool,
    index: usize,
    use_local_palette: bool,
    renders: u64,
}

impl Layer {
    /// Open (or create) the layer stored at `<stack_path>/layers/<id>`
    ///
    /// `init` seeds the structural info when nothing is persisted yet. A
    /// persisted shard that can no longer be loaded leaves the layer unbound.
    pub fn open(env: LayerEnv, stack: &str, stack_path: &str, id: u32, init: LayerInit, index: usize) -> Result<Self> {
        let path = join(&join(stack_path, "layers"), &id.to_string());
        let label = format!("{}/{}", stack, id);

        let mut initial = Map::new();
        initial.insert(KEY_SHARD.to_string(), json!(init.shard_uuid));
        initial.insert(KEY_ACTIVE.to_string(), json!(init.active));
        initial.insert(KEY_INDEX.to_string(), json!(index));
        initial.insert(KEY_LOCAL_PALETTE.to_string(), json!(init.use_local_palette));
        let info = Cache::open(env.storage.clone(), join(&path, INFO_FILE), initial, None)?;

        let variables = VariableRegistry::open(env.storage.clone(), join(&path, VARS_FILE), label.clone())?;
        let mut private = VariableRegistry::open(
            env.storage.clone(),
            join(&path, PRIVATE_VARS_FILE),
            format!("{}/private", label),
        )?;
        declare_private(&mut private)?;

        let mut layer = Self {
            id,
            label,
            path,
            env,
            active: info.get(KEY_ACTIVE).ok().and_then(JsonValue::as_bool).unwrap_or(true),
            index: info
                .get(KEY_INDEX)
                .ok()
                .and_then(JsonValue::as_u64)
                .map_or(index, |i| i as usize),
            use_local_palette: info
                .get(KEY_LOCAL_PALETTE)
                .ok()
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            info,
            variables,
            private,
            shard: None,
            renders: 0,
        };

        if let Some(uuid) = layer.shard_uuid() {
            if let Err(e) = layer.attach(&uuid) {
                warn!(layer = %layer.label, shard = %uuid, error = %e, "layer left unbound");
            }
        }
        debug!(layer = %layer.label, state = ?layer.state(), "layer opened");
        Ok(layer)
    }

    /// Stable identifier within the stack
    pub fn id(&self) -> u32 {
        self.id
    }

    /// `<stack>/<id>` label used in logs and owner names
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Storage directory of this layer
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Position within the stack's composition order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_bound(&self) -> bool {
        self.shard.is_some()
    }

    pub fn use_local_palette(&self) -> bool {
        self.use_local_palette
    }

    /// Number of frames this layer has drawn successfully
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn state(&self) -> LayerState {
        match (&self.shard, self.active) {
            (None, _) => LayerState::Unbound,
            (Some(_), true) => LayerState::Active,
            (Some(_), false) => LayerState::Inactive,
        }
    }

    /// Identifier of the bound (or persisted) shard
    pub fn shard_uuid(&self) -> Option<String> {
        self.info
            .get(KEY_SHARD)
            .ok()
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    /// Author-facing variables
    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.variables
    }

    /// Compositor-facing variables
    pub fn private_variables(&self) -> &VariableRegistry {
        &self.private
    }

    pub fn private_variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.private
    }

    /// Selected blending mode
    pub fn blending_mode(&self) -> BlendingMode {
        self.private
            .option(VAR_BLENDING)
            .ok()
            .and_then(BlendingMode::from_name)
            .unwrap_or_default()
    }

    /// Selected composition mode
    pub fn composition_mode(&self) -> CompositionMode {
        self.private
            .option(VAR_COMPOSITION)
            .ok()
            .and_then(CompositionMode::from_name)
            .unwrap_or_default()
    }

    /// Bind a freshly loaded instance of `uuid` and activate the layer
    pub fn bind(&mut self, uuid: &str) -> Result<()> {
        self.attach(uuid)?;
        self.set_active(true)?;
        info!(layer = %self.label, shard = %uuid, "shard bound");
        Ok(())
    }

    /// Drop the bound shard
    pub fn unbind(&mut self) -> Result<()> {
        self.info.set(KEY_SHARD, JsonValue::Null)?;
        self.shard = None;
        info!(layer = %self.label, "shard unbound");
        Ok(())
    }

    /// Persist and apply the active flag
    pub fn set_active(&mut self, active: bool) -> Result<()> {
        self.info.set(KEY_ACTIVE, active)?;
        self.active = active;
        Ok(())
    }

    /// Persist and apply the local palette flag
    pub fn set_use_local_palette(&mut self, enabled: bool) -> Result<()> {
        self.info.set(KEY_LOCAL_PALETTE, enabled)?;
        self.use_local_palette = enabled;
        Ok(())
    }

    /// Record a new composition position
    ///
    /// The in-memory index is always updated; the error reports a failed
    /// durable write.
    pub(crate) fn set_index(&mut self, index: usize) -> Result<()> {
        self.index = index;
        if self.info.get(KEY_INDEX).ok().and_then(JsonValue::as_u64) == Some(index as u64) {
            return Ok(());
        }
        self.info.set(KEY_INDEX, index)
    }

    /// Structural info as reported to the control surface
    pub fn info(&self) -> LayerInfo {
        LayerInfo {
            id: self.id,
            shard_uuid: self.shard_uuid(),
            active: self.active,
            index: self.index,
            use_local_palette: self.use_local_palette,
            state: self.state(),
        }
    }

    /// Apply several structural settings with one durable write
    ///
    /// Accepts `shard_uuid`, `active` and `use_local_palette`. `id` and
    /// `index` are read-only here; reorder layers through the stack. A new
    /// `shard_uuid` rebinds the layer.
    pub fn merge_info(&mut self, updates: Map<String, JsonValue>) -> Result<()> {
        for (key, value) in &updates {
            match key.as_str() {
                KEY_SHARD => match value {
                    JsonValue::Null => {}
                    JsonValue::String(uuid) if self.env.shards.contains(uuid) => {}
                    JsonValue::String(uuid) => {
                        return Err(LightstackError::ShardNotFound { shard: uuid.clone() })
                    }
                    other => return Err(LightstackError::validation(key, other, "expected a shard identifier")),
                },
                KEY_ACTIVE | KEY_LOCAL_PALETTE => {
                    if !value.is_boolean() {
                        return Err(LightstackError::validation(key, value, "expected a boolean"));
                    }
                }
                "id" | KEY_INDEX => {
                    return Err(LightstackError::validation(key, value, "read-only"));
                }
                _ => return Err(LightstackError::validation(key, value, "unknown layer setting")),
            }
        }

        let rebind = match updates.get(KEY_SHARD) {
            Some(JsonValue::String(uuid)) if self.shard_uuid().as_deref() != Some(uuid.as_str()) => {
                Some(Some(self.prepare(uuid)?))
            }
            Some(JsonValue::Null) => Some(None),
            _ => None,
        };
        self.info.merge(updates)?;

        self.active = self.info.get(KEY_ACTIVE).ok().and_then(JsonValue::as_bool).unwrap_or(self.active);
        self.use_local_palette = self
            .info
            .get(KEY_LOCAL_PALETTE)
            .ok()
            .and_then(JsonValue::as_bool)
            .unwrap_or(self.use_local_palette);

        match rebind {
            Some(Some((shard, variables))) => {
                self.variables = variables;
                self.shard = Some(shard);
            }
            Some(None) => self.shard = None,
            None => {}
        }
        Ok(())
    }

    /// Draw one frame into `canvas`
    ///
    /// A failure (error or panic) inside the routine is reported to the log
    /// sink and deactivates the layer; it never propagates.
    pub fn run(&mut self, canvas: &mut Canvas, inputs: RenderInputs<'_>) -> RunOutcome {
        if !self.active {
            return RunOutcome::Skipped;
        }
        let Some(shard) = self.shard.as_mut() else {
            return RunOutcome::Skipped;
        };

        let palette = if self.use_local_palette {
            self.private.color_sequence(VAR_PALETTE).unwrap_or(inputs.palette)
        } else {
            inputs.palette
        };
        let mut frame = Frame {
            canvas: &mut *canvas,
            variables: &self.variables,
            palette,
            audio: inputs.audio,
            time: inputs.time,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| shard.advance(&mut frame)))
            .unwrap_or_else(|payload| Err(RenderFault::new(panic_reason(payload.as_ref()))));

        match result {
            Ok(()) => {
                let brightness = self.private.float(VAR_BRIGHTNESS).unwrap_or(1.0);
                canvas.scale(brightness);
                self.renders += 1;
                RunOutcome::Rendered
            }
            Err(fault) => {
                self.fault(fault);
                RunOutcome::Faulted
            }
        }
    }

    fn fault(&mut self, fault: RenderFault) {
        self.env.log.log_exception(&LightstackError::Render {
            layer: self.label.clone(),
            source: fault,
        });
        self.active = false;
        if let Err(e) = self.info.set(KEY_ACTIVE, false) {
            warn!(layer = %self.label, error = %e, "could not persist deactivation");
        }
    }

    /// Load `uuid` into a fresh public registry and record the binding
    fn attach(&mut self, uuid: &str) -> Result<()> {
        let (shard, variables) = self.prepare(uuid)?;
        if self.shard_uuid().as_deref() != Some(uuid) {
            self.info.set(KEY_SHARD, uuid)?;
        }
        self.variables = variables;
        self.shard = Some(shard);
        Ok(())
    }

    /// Load `uuid` and declare its variables without touching `info`
    ///
    /// A different shard starts from an empty vars file. If declaration
    /// fails the previous vars file is put back.
    fn prepare(&self, uuid: &str) -> Result<(Box<dyn FrameProducer>, VariableRegistry)> {
        let mut shard = self.env.shards.load(uuid)?;
        let storage = &self.env.storage;
        let vars_path = join(&self.path, VARS_FILE);

        let previous = if self.shard_uuid().as_deref() != Some(uuid) {
            let previous = storage.read(&vars_path)?;
            storage.remove(&vars_path)?;
            previous
        } else {
            None
        };

        let declared = VariableRegistry::open(storage.clone(), vars_path.clone(), self.label.clone())
            .and_then(|mut variables| shard.declare(&mut variables).map(|()| variables));
        match declared {
            Ok(variables) => Ok((shard, variables)),
            Err(e) => {
                if let Some(contents) = previous {
                    if let Err(restore) = storage.write(&vars_path, &contents) {
                        warn!(layer = %self.label, error = %restore, "could not restore variables");
                    }
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("label", &self.label)
            .field("index", &self.index)
            .field("state", &self.state())
            .field("shard", &self.shard_uuid())
            .finish()
    }
}

fn declare_private(private: &mut VariableRegistry) -> Result<()> {
    private.declare(
        Variable::float_range(VAR_BRIGHTNESS, 1.0, 0.0, 1.0).with_description("Layer brightness"),
    )?;
    private.declare(
        Variable::option(VAR_BLENDING, BlendingMode::Normal.name(), BlendingMode::names())
            .with_description("Blend against the composite before composition"),
    )?;
    private.declare(
        Variable::option(VAR_COMPOSITION, CompositionMode::DirectSet.name(), CompositionMode::names())
            .with_description("Merge into the composite"),
    )?;
    private.declare(
        Variable::color_sequence(VAR_PALETTE, ColorSequence::primary())
            .with_description("Palette used when the local palette is enabled"),
    )?;
    Ok(())
}

pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
