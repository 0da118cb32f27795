//! Declarative Variables
//!
//! Typed, range-validated, persisted and observable settings. Layers, audio
//! sources and the global settings all expose their knobs this way.

mod registry;
mod value;
mod variable;

pub use registry::VariableRegistry;
pub use value::{ColorSequence, MapType, Value};
pub use variable::{Observer, TypeTag, Variable, VariableInfo, VariableKind};
