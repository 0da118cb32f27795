//! Global Settings
//!
//! Controller-wide variables: output brightness and the shared palette.

use crate::error::Result;
use crate::storage::SharedStorage;
use crate::variables::{ColorSequence, Variable, VariableRegistry};

pub const GLOBALS_VARS: &str = "globals/vars";
pub const VAR_BRIGHTNESS: &str = "brightness";
pub const VAR_PALETTE: &str = "palette";

/// Owner of the global variable registry
#[derive(Debug)]
pub struct Globals {
    variables: VariableRegistry,
    fallback_palette: ColorSequence,
}

impl Globals {
    pub fn open(storage: SharedStorage) -> Result<Self> {
        let mut variables = VariableRegistry::open(storage, GLOBALS_VARS, "globals")?;
        variables.declare(
            Variable::float_range(VAR_BRIGHTNESS, 1.0, 0.0, 1.0).with_description("Output brightness"),
        )?;
        variables.declare(
            Variable::color_sequence(VAR_PALETTE, ColorSequence::primary())
                .with_description("Palette shared by every layer without a local palette"),
        )?;
        Ok(Self {
            variables,
            fallback_palette: ColorSequence::primary(),
        })
    }

    /// Uniform scale applied to the composite
    pub fn brightness(&self) -> f64 {
        self.variables.float(VAR_BRIGHTNESS).unwrap_or(1.0)
    }

    pub fn palette(&self) -> &ColorSequence {
        self.variables
            .color_sequence(VAR_PALETTE)
            .unwrap_or(&self.fallback_palette)
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.variables
    }
}
