//! CLI Module
//!
//! Command-line interface for the Lightstack controller.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::control::ControlRequest;
use crate::layers::LayerInit;

/// Lightstack - layer compositing controller for LED displays
#[derive(Parser, Debug)]
#[command(name = "lightstack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Controller configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the storage root from the configuration
    #[arg(short, long, global = true)]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the frame loop
    #[command(name = "run")]
    Run {
        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,

        /// Accept JSON control requests on stdin, one per line
        #[arg(long)]
        control: bool,
    },

    /// Render a single frame and print it as a hex grid
    #[command(name = "preview")]
    Preview {
        /// Frames to render before printing
        #[arg(short, long, default_value_t = 1)]
        frames: u64,
    },

    /// Show the active stack and audio selection
    #[command(name = "info")]
    Info,

    /// Swap the active and inactive stacks
    #[command(name = "switch")]
    Switch,

    /// Make a stack active
    #[command(name = "activate")]
    Activate {
        /// A or B
        stack: String,
    },

    /// List a stack's layers
    #[command(name = "layers")]
    Layers {
        /// active, inactive, A or B
        #[arg(default_value = "active")]
        stack: String,
    },

    /// Add a layer bound to a shard
    #[command(name = "add-layer")]
    AddLayer {
        /// Target stack
        stack: String,

        /// Shard uuid (see `shards`)
        shard: String,

        /// Create the layer inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Remove a layer
    #[command(name = "remove-layer")]
    RemoveLayer { stack: String, id: u32 },

    /// Move a layer to a new position
    #[command(name = "move-layer")]
    MoveLayer { stack: String, id: u32, index: usize },

    /// Remove every layer from a stack
    #[command(name = "clear-stack")]
    ClearStack { stack: String },

    /// Show one layer's info
    #[command(name = "layer")]
    LayerInfo { stack: String, id: u32 },

    /// List an owner's variables (globals, audio/<source>, <stack>/<id>[/private])
    #[command(name = "vars")]
    Vars { owner: String },

    /// Read one variable
    #[command(name = "get-var")]
    GetVar { owner: String, name: String },

    /// Set one variable from its serialized form
    #[command(name = "set-var")]
    SetVar {
        owner: String,
        name: String,
        value: String,
    },

    /// List available shards
    #[command(name = "shards")]
    Shards,

    /// Register an audio source
    #[command(name = "add-audio")]
    AddAudio { name: String },

    /// Select an audio source (omit to select silence)
    #[command(name = "select-audio")]
    SelectAudio { source: Option<String> },
}

impl Commands {
    /// The control request this command maps onto, if it is one
    pub fn control_request(&self) -> Option<ControlRequest> {
        let request = match self {
            Commands::Info => ControlRequest::Info,
            Commands::Switch => ControlRequest::Switch,
            Commands::Activate { stack } => ControlRequest::Activate { stack: stack.clone() },
            Commands::Layers { stack } => ControlRequest::Layers { stack: stack.clone() },
            Commands::AddLayer { stack, shard, inactive } => ControlRequest::AddLayer {
                stack: stack.clone(),
                init: LayerInit {
                    active: !inactive,
                    ..LayerInit::shard(shard.clone())
                },
            },
            Commands::RemoveLayer { stack, id } => ControlRequest::RemoveLayer {
                stack: stack.clone(),
                id: *id,
            },
            Commands::MoveLayer { stack, id, index } => ControlRequest::MoveLayer {
                stack: stack.clone(),
                id: *id,
                index: *index,
            },
            Commands::ClearStack { stack } => ControlRequest::ClearStack { stack: stack.clone() },
            Commands::LayerInfo { stack, id } => ControlRequest::LayerInfo {
                stack: stack.clone(),
                id: *id,
            },
            Commands::Vars { owner } => ControlRequest::Vars { owner: owner.clone() },
            Commands::GetVar { owner, name } => ControlRequest::GetVar {
                owner: owner.clone(),
                name: name.clone(),
            },
            Commands::SetVar { owner, name, value } => ControlRequest::SetVar {
                owner: owner.clone(),
                name: name.clone(),
                value: value.clone(),
            },
            Commands::Shards => ControlRequest::Shards,
            Commands::SelectAudio { source } => ControlRequest::SelectAudio { source: source.clone() },
            Commands::Run { .. } | Commands::Preview { .. } | Commands::AddAudio { .. } => return None,
        };
        Some(request)
    }
}
