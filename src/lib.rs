//! Lightstack - Layer Compositing Controller for LED Displays
//!
//! Lightstack renders frames for an addressable LED display by compositing
//! an ordered stack of layers, each driven by a pluggable frame producer
//! (a "shard").
//!
//! # Architecture
//!
//! - Two stacks, `A` and `B`: one is rendered, the other can be edited and
//!   then swapped in atomically
//! - Every layer, the globals and each audio source own a typed, validated
//!   variable registry that persists through a key-value cache
//! - The pipeline blends and composes layers, applies global brightness and
//!   gamma, then hands the frame to the output drivers
//! - A failing layer is logged and deactivated; the rest keep rendering

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod globals;
pub mod graphics;
pub mod layers;
pub mod logsink;
pub mod runtime;
pub mod shard;
pub mod storage;
pub mod variables;

pub use app::App;
pub use config::ControllerConfig;
pub use control::{ControlRequest, ControlSurface};
pub use error::{LightstackError, Result};
