//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tokio::runtime::Builder;
use tokio::task::LocalSet;
use tracing::{info, warn};

use crate::app::App;
use crate::config::ControllerConfig;
use crate::control::{ControlRequest, ControlSurface};
use crate::engine::{CaptureDriver, LogDriver};
use crate::error::Result;
use crate::graphics::color;
use crate::runtime::{run_controller, RunOptions};

/// Load the configuration, applying a storage-root override.
pub fn load_config(path: Option<&Path>, storage: Option<&Path>) -> Result<ControllerConfig> {
    let mut config = ControllerConfig::load(path)?;
    if let Some(root) = storage {
        config.storage_root = root.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}

/// Run the frame loop until Ctrl-C or the frame limit.
pub fn run(config: ControllerConfig, frames: Option<u64>, control: bool) -> Result<()> {
    info!("Starting controller at: {}", config.storage_root.display());

    let mut app = App::open(config)?;
    app.add_driver(Box::new(LogDriver::new()));
    let app = Rc::new(RefCell::new(app));

    let runtime = Builder::new_current_thread().enable_all().build()?;
    let local = LocalSet::new();
    let options = RunOptions {
        frames,
        control_stdin: control,
        diagnostics: true,
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    let rendered = local.block_on(&runtime, run_controller(Rc::clone(&app), options, shutdown))?;

    println!("Rendered {} frames", rendered);
    Ok(())
}

/// Render frames without pacing and print the final output.
pub fn preview(config: ControllerConfig, frames: u64) -> Result<()> {
    let width = config.width as usize;
    let mut app = App::open(config)?;
    let driver = CaptureDriver::new();
    let capture = driver.capture();
    app.add_driver(Box::new(driver));

    for _ in 0..frames.max(1) {
        app.render_frame();
    }

    let Some(frame) = capture.last() else {
        println!("No frame captured");
        return Ok(());
    };
    for row in frame.chunks(width.max(1)) {
        let line: Vec<String> = row
            .iter()
            .map(|&px| format!("{:02X}{:02X}{:02X}", color::red(px), color::green(px), color::blue(px)))
            .collect();
        println!("{}", line.join(" "));
    }
    Ok(())
}

/// Register an audio source.
pub fn add_audio(config: ControllerConfig, name: &str) -> Result<()> {
    let mut app = App::open(config)?;
    app.audio_mut().add_source(name)?;
    println!("Audio source added: {}", name);
    Ok(())
}

/// Execute one control request and print its JSON reply.
pub fn control(config: ControllerConfig, request: ControlRequest) -> Result<()> {
    let mut app = App::open(config)?;
    let reply = ControlSurface.handle(&mut app, request)?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
