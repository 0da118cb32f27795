//! Frame Pipeline
//!
//! One iteration composites the active stack into the output buffer and
//! hands it to every driver:
//!
//! 1. zero the composite
//! 2. per active layer: zero the scratch canvas, run the layer, blend and
//!    compose it into the composite
//! 3. scale by the global brightness
//! 4. gamma-correct into the output buffer
//! 5. ingest + push on every driver
//! 6. record the frame period
//!
//! Layer faults are contained by the layer, driver faults by the driver
//! loop, and a panic in the shared stages drops that frame's output.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, error};

use super::diagnostics::{Diagnostics, FrameReport};
use super::driver::OutputDriver;
use super::framerate::FramerateHistory;
use crate::audio::AudioManager;
use crate::config::ControllerConfig;
use crate::error::LightstackError;
use crate::globals::Globals;
use crate::graphics::{blend, compose, Canvas, Gamma};
use crate::layers::{panic_reason, RenderInputs, RunOutcome, StackManager};
use crate::logsink::LogSink;
use crate::shard::FrameTime;

/// Per-frame compositor and its exclusively owned buffers
pub struct Pipeline {
    scratch: Canvas,
    composite: Canvas,
    output: Canvas,
    gamma: Gamma,
    drivers: Vec<Box<dyn OutputDriver>>,
    history: FramerateHistory,
    log: Rc<dyn LogSink>,
    started: Option<Instant>,
    frames: u64,
    render_faults: u64,
    driver_faults: u64,
    active_layers: usize,
    #[cfg(test)]
    poison_next_frame: bool,
}

impl Pipeline {
    pub fn new(config: &ControllerConfig, log: Rc<dyn LogSink>) -> Self {
        Self {
            scratch: Canvas::new(config.width, config.height),
            composite: Canvas::new(config.width, config.height),
            output: Canvas::new(config.width, config.height),
            gamma: Gamma::new(config.gamma),
            drivers: Vec::new(),
            history: FramerateHistory::new(config.framerate_window),
            log,
            started: None,
            frames: 0,
            render_faults: 0,
            driver_faults: 0,
            active_layers: 0,
            #[cfg(test)]
            poison_next_frame: false,
        }
    }

    /// Register an output driver; drivers are pushed in registration order
    pub fn add_driver(&mut self, driver: Box<dyn OutputDriver>) {
        debug!(driver = driver.name(), "driver registered");
        self.drivers.push(driver);
    }

    pub fn set_gamma(&mut self, gamma: Gamma) {
        self.gamma = gamma;
    }

    /// Last gamma-corrected output buffer
    pub fn output(&self) -> &Canvas {
        &self.output
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn framerate(&self) -> f64 {
        self.history.framerate()
    }

    /// Run one frame against the currently active stack
    ///
    /// The active stack is captured once, so a switch only takes effect on
    /// the next call.
    pub fn render_frame(&mut self, stacks: &mut StackManager, globals: &Globals, audio: &mut AudioManager) -> FrameReport {
        let now = Instant::now();
        let started = *self.started.get_or_insert(now);
        self.history.mark(now);

        let mut report = FrameReport {
            index: self.frames,
            ..FrameReport::default()
        };
        let inputs = RenderInputs {
            palette: globals.palette(),
            audio: audio.strengths(),
            time: FrameTime {
                index: self.frames,
                elapsed: now.saturating_duration_since(started),
            },
        };
        let brightness = globals.brightness();
        let stack = stacks.active_mut();
        #[cfg(test)]
        let poisoned = std::mem::take(&mut self.poison_next_frame);

        let Self {
            scratch,
            composite,
            output,
            gamma,
            ..
        } = &mut *self;
        let shared = panic::catch_unwind(AssertUnwindSafe(|| {
            #[cfg(test)]
            if poisoned {
                panic!("poisoned frame");
            }
            composite.clear();
            for layer in stack.layers_mut() {
                scratch.clear();
                match layer.run(scratch, inputs) {
                    RunOutcome::Rendered => {
                        blend(layer.blending_mode(), composite, scratch);
                        compose(layer.composition_mode(), scratch, composite);
                        report.rendered += 1;
                    }
                    RunOutcome::Skipped => report.skipped += 1,
                    RunOutcome::Faulted => report.faulted += 1,
                }
            }
            composite.scale(brightness);
            gamma.apply(composite, output);
        }));

        self.frames += 1;
        self.render_faults += report.faulted as u64;
        self.active_layers = report.rendered;

        if shared.is_err() {
            error!(frame = report.index, "compositing failed, frame dropped");
            report.dropped = true;
        } else {
            report.driver_faults = self.push_output();
            self.driver_faults += report.driver_faults as u64;
        }

        report.elapsed = now.elapsed();
        report
    }

    fn push_output(&mut self) -> usize {
        let mut faults = 0;
        for driver in &mut self.drivers {
            let output = &self.output;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                driver.ingest(output).and_then(|()| driver.push())
            }))
            .unwrap_or_else(|payload| {
                Err(LightstackError::Driver {
                    driver: driver.name().to_string(),
                    reason: panic_reason(payload.as_ref()),
                })
            });
            if let Err(e) = result {
                faults += 1;
                let fault = match e {
                    err @ LightstackError::Driver { .. } => err,
                    other => LightstackError::Driver {
                        driver: driver.name().to_string(),
                        reason: other.to_string(),
                    },
                };
                self.log.log_exception(&fault);
            }
        }
        faults
    }

    /// Statistics for the control surface
    pub fn diagnostics(&self, stacks: &StackManager) -> Diagnostics {
        Diagnostics {
            framerate: self.history.framerate(),
            frames: self.frames,
            active_layers: self.active_layers,
            render_faults: self.render_faults,
            driver_faults: self.driver_faults,
            active_stack: stacks.active_name(),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("frames", &self.frames)
            .field("drivers", &self.drivers.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("gamma", &self.gamma.exponent())
            .finish()
    }
}
