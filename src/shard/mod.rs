//! Shards
//!
//! Per-layer rendering routines and the loader that instantiates them.

pub mod builtin;
mod producer;
mod registry;

pub use producer::{Frame, FrameProducer, FrameTime, RenderFault};
pub use registry::{ShardFactory, ShardInfo, ShardRegistry};
