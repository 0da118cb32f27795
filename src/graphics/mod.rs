//! Graphics Primitives
//!
//! Pixel buffers and the opaque per-pixel operations the pipeline runs on
//! them: fill, scale, blend, compose and gamma.

pub mod blend;
pub mod canvas;
pub mod color;
pub mod compose;
pub mod gamma;

pub use blend::{blend, BlendingMode};
pub use canvas::Canvas;
pub use color::Color;
pub use compose::{compose, CompositionMode};
pub use gamma::Gamma;
