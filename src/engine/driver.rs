//! Output Drivers
//!
//! A driver takes the corrected output buffer (`ingest`) and transmits it
//! (`push`). Hardware encodings live outside the controller; the drivers
//! here record frames for inspection or summarise them in the log.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::error::{LightstackError, Result};
use crate::graphics::{color, Canvas, Color};

/// Sink for finished frames
pub trait OutputDriver {
    /// Name used in logs and fault reports
    fn name(&self) -> &str;

    /// Take a copy of the output buffer
    fn ingest(&mut self, output: &Canvas) -> Result<()>;

    /// Transmit the last ingested frame
    fn push(&mut self) -> Result<()>;
}

// ============================================================================
// Capture Driver
// ============================================================================

/// Shared view of the frames a [`CaptureDriver`] has pushed
#[derive(Debug, Clone, Default)]
pub struct FrameCapture {
    frames: Rc<RefCell<Vec<Vec<Color>>>>,
    failing: Rc<Cell<bool>>,
}

impl FrameCapture {
    /// Every pushed frame, oldest first
    pub fn frames(&self) -> Vec<Vec<Color>> {
        self.frames.borrow().clone()
    }

    pub fn last(&self) -> Option<Vec<Color>> {
        self.frames.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }

    /// Make subsequent pushes fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

/// Records every pushed frame in memory
#[derive(Debug, Default)]
pub struct CaptureDriver {
    pending: Vec<Color>,
    capture: FrameCapture,
}

impl CaptureDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for reading captured frames after the driver is handed off
    pub fn capture(&self) -> FrameCapture {
        self.capture.clone()
    }
}

impl OutputDriver for CaptureDriver {
    fn name(&self) -> &str {
        "capture"
    }

    fn ingest(&mut self, output: &Canvas) -> Result<()> {
        self.pending.clear();
        self.pending.extend_from_slice(output.pixels());
        Ok(())
    }

    fn push(&mut self) -> Result<()> {
        if self.capture.failing.get() {
            return Err(LightstackError::Driver {
                driver: self.name().to_string(),
                reason: "capture closed".to_string(),
            });
        }
        self.capture.frames.borrow_mut().push(self.pending.clone());
        Ok(())
    }
}

// ============================================================================
// Log Driver
// ============================================================================

/// Emits a one-line summary of each frame at debug level
#[derive(Debug, Default)]
pub struct LogDriver {
    lit: usize,
    mean_level: f64,
    pushed: u64,
}

impl LogDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputDriver for LogDriver {
    fn name(&self) -> &str {
        "log"
    }

    fn ingest(&mut self, output: &Canvas) -> Result<()> {
        let mut lit = 0;
        let mut total = 0u64;
        for &px in output.pixels() {
            let level = u64::from(color::red(px)) + u64::from(color::green(px)) + u64::from(color::blue(px));
            if level > 0 {
                lit += 1;
            }
            total += level;
        }
        self.lit = lit;
        self.mean_level = if output.is_empty() {
            0.0
        } else {
            total as f64 / (output.len() as f64 * 3.0)
        };
        Ok(())
    }

    fn push(&mut self) -> Result<()> {
        self.pushed += 1;
        debug!(
            driver = self.name(),
            frame = self.pushed,
            lit = self.lit,
            mean_level = self.mean_level,
            "frame pushed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_records_pushes() {
        let mut driver = CaptureDriver::new();
        let capture = driver.capture();
        let mut canvas = Canvas::new(2, 1);
        canvas.fill(0x123456);

        driver.ingest(&canvas).unwrap();
        driver.push().unwrap();
        canvas.clear();
        driver.ingest(&canvas).unwrap();
        driver.push().unwrap();

        assert_eq!(capture.len(), 2);
        assert_eq!(capture.frames()[0], vec![0x123456, 0x123456]);
        assert_eq!(capture.last(), Some(vec![0, 0]));
    }

    #[test]
    fn test_capture_failure() {
        let mut driver = CaptureDriver::new();
        let capture = driver.capture();
        capture.set_failing(true);

        driver.ingest(&Canvas::new(1, 1)).unwrap();
        let err = driver.push().unwrap_err();

        assert_eq!(err.error_code(), "DRIVER_FAULT");
        assert!(capture.is_empty());
    }

    #[test]
    fn test_log_driver_summary() {
        let mut driver = LogDriver::new();
        let mut canvas = Canvas::new(2, 1);
        canvas.set(0, 0, 0xFFFFFF);

        driver.ingest(&canvas).unwrap();
        driver.push().unwrap();

        assert_eq!(driver.lit, 1);
        assert!((driver.mean_level - 127.5).abs() < 1e-9);
    }
}
