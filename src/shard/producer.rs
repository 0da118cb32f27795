//! Frame Producer trait
//!
//! A shard is a per-layer rendering routine. Each call to
//! [`FrameProducer::advance`] draws exactly one frame into the layer's canvas
//! and returns control to the pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::error::{LightstackError, Result};
use crate::graphics::Canvas;
use crate::variables::{ColorSequence, VariableRegistry};

/// Failure raised by a shard while drawing a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct RenderFault {
    pub reason: String,
}

impl RenderFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<LightstackError> for RenderFault {
    fn from(err: LightstackError) -> Self {
        Self::new(err.to_string())
    }
}

/// Frame timing handed to shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTime {
    /// Pipeline frame number, starting at 0
    pub index: u64,
    /// Time since the pipeline started
    pub elapsed: Duration,
}

/// Everything a shard may touch while drawing one frame
pub struct Frame<'a> {
    /// Layer canvas, zeroed before the call
    pub canvas: &'a mut Canvas,
    /// The layer's public variables
    pub variables: &'a VariableRegistry,
    /// Local or global palette, depending on the layer's settings
    pub palette: &'a ColorSequence,
    /// Volume-scaled per-bin strengths of the selected audio source
    pub audio: &'a [f32],
    pub time: FrameTime,
}

/// Per-layer rendering routine
pub trait FrameProducer {
    /// Identifier this producer was loaded under
    fn shard_uuid(&self) -> &str;

    /// Declare the author-facing variables on the layer's public registry
    ///
    /// Called once when the producer is bound to a layer.
    fn declare(&mut self, _variables: &mut VariableRegistry) -> Result<()> {
        Ok(())
    }

    /// Draw one frame
    fn advance(&mut self, frame: &mut Frame<'_>) -> std::result::Result<(), RenderFault>;
}
