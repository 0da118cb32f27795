//! Pipeline Diagnostics

use std::time::Duration;

use serde::Serialize;

use crate::layers::StackName;

/// Running statistics readable through the control surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Frames per second over the framerate window
    pub framerate: f64,
    /// Frames rendered since start
    pub frames: u64,
    /// Layers that drew on the last frame
    pub active_layers: usize,
    pub render_faults: u64,
    pub driver_faults: u64,
    pub active_stack: StackName,
}

/// Outcome of one pipeline iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameReport {
    pub index: u64,
    pub rendered: usize,
    pub skipped: usize,
    pub faulted: usize,
    pub driver_faults: usize,
    /// A shared stage failed and no output was pushed
    pub dropped: bool,
    #[serde(skip)]
    pub elapsed: Duration,
}
