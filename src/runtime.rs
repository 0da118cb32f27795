//! Runtime
//!
//! Drives the pipeline cooperatively on a single-threaded executor. All
//! tasks run on one `LocalSet` and share the [`App`] through `Rc<RefCell>`;
//! no borrow is held across an await point, so the control surface and the
//! diagnostics reporter only ever observe state between frames.
//!
//! The watchdog is the one component on its own OS thread: it must still
//! fire when the executor is stuck inside a frame.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{self, JoinHandle as TaskHandle};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::control::ControlSurface;
use crate::error::Result;

// ============================================================================
// Rate Limiter
// ============================================================================

/// Paces the frame loop to a fixed period
///
/// Late ticks are delayed rather than bursted, so a slow frame never causes
/// a run of back-to-back frames afterwards.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Interval,
}

impl RateLimiter {
    /// Must be called from within a tokio runtime
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next frame slot; the first call completes immediately
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

// ============================================================================
// Watchdog
// ============================================================================

/// Called from the watchdog thread with the time since the last feed
pub type StallAction = Box<dyn Fn(Duration) + Send + 'static>;

/// Detects a stalled frame loop
pub struct Watchdog {
    epoch: Instant,
    last_feed_ms: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start watching; `on_stall` runs whenever `timeout` elapses without a feed
    ///
    /// After firing the watchdog re-arms from the moment it fired.
    pub fn spawn(timeout: Duration, on_stall: StallAction) -> Result<Self> {
        let epoch = Instant::now();
        let last_feed_ms = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let poll = (timeout / 4).max(Duration::from_millis(1));

        let handle = {
            let last_feed_ms = Arc::clone(&last_feed_ms);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("lightstack-watchdog".to_string())
                .spawn(move || loop {
                    thread::park_timeout(poll);
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let now_ms = epoch.elapsed().as_millis() as u64;
                    let since = Duration::from_millis(now_ms.saturating_sub(last_feed_ms.load(Ordering::Acquire)));
                    if since >= timeout {
                        on_stall(since);
                        last_feed_ms.store(now_ms, Ordering::Release);
                    }
                })?
        };

        debug!(timeout_ms = timeout.as_millis() as u64, "watchdog started");
        Ok(Self {
            epoch,
            last_feed_ms,
            stop,
            timeout,
            handle: Some(handle),
        })
    }

    /// Watchdog that terminates the process on a stall
    pub fn exit_on_stall(timeout: Duration) -> Result<Self> {
        Self::spawn(
            timeout,
            Box::new(|since| {
                error!(stalled_ms = since.as_millis() as u64, "frame loop stalled, exiting");
                std::process::exit(1);
            }),
        )
    }

    /// Record that the loop made progress
    pub fn feed(&self) {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.last_feed_ms.store(now_ms, Ordering::Release);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("watchdog thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog").field("timeout", &self.timeout).finish()
    }
}

// ============================================================================
// Controller Loop
// ============================================================================

/// What the controller loop runs besides the pipeline
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this many frames
    pub frames: Option<u64>,
    /// Serve JSON-line control requests on stdin
    pub control_stdin: bool,
    /// Periodically log diagnostics
    pub diagnostics: bool,
}

/// Run the pipeline until `shutdown` resolves or the frame limit is reached
///
/// Must be awaited inside a [`task::LocalSet`]. Returns the number of
/// frames rendered.
pub async fn run_controller<F>(app: Rc<RefCell<App>>, options: RunOptions, shutdown: F) -> Result<u64>
where
    F: Future<Output = ()>,
{
    let (period, diagnostics_period, watchdog_timeout) = {
        let app = app.borrow();
        let config = app.config();
        (config.frame_period(), config.diagnostics_period(), config.watchdog_timeout())
    };

    let watchdog = watchdog_timeout.map(Watchdog::exit_on_stall).transpose()?;
    let mut background: Vec<TaskHandle<()>> = Vec::new();
    if options.diagnostics {
        background.push(task::spawn_local(report_diagnostics(Rc::clone(&app), diagnostics_period)));
    }
    if options.control_stdin {
        background.push(task::spawn_local(serve_stdin(Rc::clone(&app))));
    }

    info!(
        period_ms = period.as_millis() as u64,
        frames = ?options.frames,
        "controller running"
    );

    let mut limiter = RateLimiter::new(period);
    let mut rendered = 0u64;
    tokio::pin!(shutdown);

    loop {
        if options.frames.is_some_and(|limit| rendered >= limit) {
            break;
        }
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            () = limiter.tick() => {}
        }

        let report = app.borrow_mut().render_frame();
        rendered += 1;
        if let Some(watchdog) = &watchdog {
            watchdog.feed();
        }
        if report.faulted > 0 || report.dropped {
            debug!(
                frame = report.index,
                faulted = report.faulted,
                dropped = report.dropped,
                "frame completed with faults"
            );
        }

        // Give control and diagnostics tasks a turn between frames.
        task::yield_now().await;
    }

    for handle in background {
        handle.abort();
    }
    info!(frames = rendered, "controller stopped");
    Ok(rendered)
}

async fn report_diagnostics(app: Rc<RefCell<App>>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;
    loop {
        interval.tick().await;
        let diagnostics = app.borrow().diagnostics();
        info!(
            framerate = diagnostics.framerate,
            frames = diagnostics.frames,
            active_layers = diagnostics.active_layers,
            render_faults = diagnostics.render_faults,
            driver_faults = diagnostics.driver_faults,
            active_stack = %diagnostics.active_stack,
            "diagnostics"
        );
    }
}

async fn serve_stdin(app: Rc<RefCell<App>>) {
    let surface = ControlSurface;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                let reply = surface.handle_line(&mut app.borrow_mut(), &line);
                println!("{}", reply);
            }
            Ok(None) => {
                debug!("control input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "control input failed");
                break;
            }
        }
    }
}
