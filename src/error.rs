//! Error handling for Lightstack
//!
//! Every failure the controller can report goes through [`LightstackError`].
//! Render and driver faults are contained by the pipeline and only ever logged;
//! everything else is returned to the caller that triggered it.

use std::path::PathBuf;

use thiserror::Error;

use crate::shard::RenderFault;

/// Result type alias for Lightstack operations
pub type Result<T> = std::result::Result<T, LightstackError>;

/// Main error type for Lightstack operations
#[derive(Error, Debug)]
pub enum LightstackError {
    // Variable Errors
    #[error("Invalid value for '{name}': {value} ({reason})")]
    Validation {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Variable '{name}' not declared on {owner}")]
    VariableNotFound { owner: String, name: String },

    // Cache Errors
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Nested value rejected for key '{key}': only scalars may be cached")]
    NestedValue { key: String },

    // Structure Errors
    #[error("Layer not found: {id}")]
    LayerNotFound { id: String },

    #[error("Invalid stack selector: '{selector}' (expected active, inactive, A or B)")]
    InvalidSelector { selector: String },

    #[error("Shard not found: {shard}")]
    ShardNotFound { shard: String },

    #[error("Audio source not found: {name}")]
    AudioSourceNotFound { name: String },

    // Runtime Faults
    #[error("Layer {layer} faulted: {source}")]
    Render {
        layer: String,
        #[source]
        source: RenderFault,
    },

    #[error("Output driver '{driver}' failed: {reason}")]
    Driver { driver: String, reason: String },

    // Persistence Errors
    #[error("Persistence failure at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LightstackError {
    /// Shorthand for a validation failure on `name`
    pub fn validation(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        LightstackError::Validation {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LightstackError::Validation { .. } => "VALIDATION",
            LightstackError::VariableNotFound { .. } => "VARIABLE_NOT_FOUND",
            LightstackError::KeyNotFound { .. } => "KEY_NOT_FOUND",
            LightstackError::NestedValue { .. } => "NESTED_VALUE",
            LightstackError::LayerNotFound { .. } => "LAYER_NOT_FOUND",
            LightstackError::InvalidSelector { .. } => "INVALID_SELECTOR",
            LightstackError::ShardNotFound { .. } => "SHARD_NOT_FOUND",
            LightstackError::AudioSourceNotFound { .. } => "AUDIO_SOURCE_NOT_FOUND",
            LightstackError::Render { .. } => "RENDER_FAULT",
            LightstackError::Driver { .. } => "DRIVER_FAULT",
            LightstackError::Persistence { .. } => "PERSISTENCE_FAULT",
            LightstackError::Serialization(_) => "SERIALIZATION_ERROR",
            LightstackError::Config { .. } => "CONFIG_ERROR",
            LightstackError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// A failed durable write leaves the mutation uncommitted and is surfaced
    /// to the caller as fatal to that mutation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            LightstackError::Persistence { .. }
                | LightstackError::Io(_)
                | LightstackError::Config { .. }
        )
    }

    /// True for the "not found" family of lookup failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LightstackError::VariableNotFound { .. }
                | LightstackError::KeyNotFound { .. }
                | LightstackError::LayerNotFound { .. }
                | LightstackError::InvalidSelector { .. }
                | LightstackError::ShardNotFound { .. }
                | LightstackError::AudioSourceNotFound { .. }
        )
    }
}
