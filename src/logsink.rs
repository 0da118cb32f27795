//! Fault Reporting
//!
//! Non-fatal faults (a layer's routine failing, a driver dropping a frame)
//! are handed to a [`LogSink`] instead of being propagated.

use std::cell::Cell;
use std::error::Error as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::LightstackError;
use crate::storage::{join, SharedStorage};

/// Directory below the storage root holding fault reports
pub const LOGS_DIR: &str = "logs";

/// Receiver for contained, non-fatal faults
pub trait LogSink {
    /// Report a fault that was contained by the caller
    fn log_exception(&self, error: &LightstackError);
}

/// Emits each fault as a tracing `error!` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log_exception(&self, err: &LightstackError) {
        error!(code = err.error_code(), error = %err, "contained fault");
    }
}

/// One persisted fault report
#[derive(Debug, Clone, Serialize)]
struct FaultReport {
    timestamp: DateTime<Utc>,
    code: &'static str,
    message: String,
    chain: Vec<String>,
}

/// Writes one report file per fault under `logs/<ms>+<n>`
///
/// Each report is also emitted through tracing. A report that cannot be
/// written is dropped with a warning.
pub struct FileLogSink {
    storage: SharedStorage,
    sequence: Cell<u64>,
}

impl FileLogSink {
    /// Create a sink writing below the storage root
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            sequence: Cell::new(0),
        }
    }

    /// Paths of every report written so far, oldest first
    pub fn reports(&self) -> Vec<String> {
        let mut names = self.storage.children(LOGS_DIR).unwrap_or_default();
        names.sort_by_key(|name| report_order(name));
        names.into_iter().map(|name| join(LOGS_DIR, &name)).collect()
    }

    fn next_path(&self, now: DateTime<Utc>) -> String {
        let n = self.sequence.get();
        self.sequence.set(n + 1);
        join(LOGS_DIR, &format!("{}+{}", now.timestamp_millis(), n))
    }
}

impl LogSink for FileLogSink {
    fn log_exception(&self, err: &LightstackError) {
        TracingLogSink.log_exception(err);

        let now = Utc::now();
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        let report = FaultReport {
            timestamp: now,
            code: err.error_code(),
            message: err.to_string(),
            chain,
        };

        let path = self.next_path(now);
        let written = serde_json::to_string_pretty(&report)
            .map_err(LightstackError::from)
            .and_then(|text| self.storage.write(&path, &text));
        if let Err(e) = written {
            warn!(path = %path, error = %e, "failed to write fault report");
        }
    }
}

fn report_order(name: &str) -> (i64, u64) {
    let mut parts = name.splitn(2, '+');
    let ms = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let n = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (ms, n)
}
