//! Rendering Engine
//!
//! - `Pipeline`: the per-frame compositor
//! - `OutputDriver`: where finished frames go
//! - `FramerateHistory` / `Diagnostics`: what the loop reports

mod diagnostics;
mod driver;
mod framerate;
mod pipeline;

pub use diagnostics::{Diagnostics, FrameReport};
pub use driver::{CaptureDriver, FrameCapture, LogDriver, OutputDriver};
pub use framerate::FramerateHistory;
pub use pipeline::Pipeline;
