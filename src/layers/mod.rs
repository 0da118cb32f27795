//! Layer Model
//!
//! - `Layer`: one rendering slot (shard, variables, structural info)
//! - `Stack`: ordered, index-consistent layers
//! - `StackManager`: the active/inactive pair of stacks

mod layer;
mod manager;
mod stack;

pub use layer::{
    Layer, LayerEnv, LayerInfo, LayerInit, LayerState, RenderInputs, RunOutcome, VAR_BLENDING,
    VAR_BRIGHTNESS, VAR_COMPOSITION, VAR_PALETTE,
};
pub(crate) use layer::panic_reason;
pub use manager::{StackManager, StackManagerInfo};
pub use stack::{Stack, StackName, STACKS_DIR};
