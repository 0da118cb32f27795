//! Blending Modes
//!
//! Blending rewrites a layer's canvas against the running composite before
//! composition merges the two. Channels are normalised to `[0, 1]`, with the
//! composite as the base `a` and the layer as the top `b`. Alpha is taken
//! from the layer unchanged.

use serde::{Deserialize, Serialize};

use super::canvas::Canvas;
use super::color::{self, Color};

/// Per-channel blend function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendingMode {
    #[default]
    Normal,
    Forget,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    Difference,
    Exclusion,
}

impl BlendingMode {
    /// Every mode, in option order
    pub const ALL: [BlendingMode; 12] = [
        Self::Normal,
        Self::Forget,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::Difference,
        Self::Exclusion,
    ];

    /// Option name
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Forget => "forget",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color_dodge",
            Self::ColorBurn => "color_burn",
            Self::HardLight => "hard_light",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
        }
    }

    /// All option names, in option order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.name()).collect()
    }

    /// Resolve an option name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Blend a single pixel; `base` is the composite, `top` the layer
    pub fn blend_pixel(self, base: Color, top: Color) -> Color {
        match self {
            Self::Normal => top,
            Self::Forget => color::from_channels(
                color::red(base),
                color::green(base),
                color::blue(base),
                color::alpha(top),
            ),
            _ => {
                let blended = color::zip_channels(base, top, |x, y| self.channel(x, y));
                (blended & 0x00FF_FFFF) | (top & 0xFF00_0000)
            }
        }
    }

    fn channel(self, base: u8, top: u8) -> u8 {
        let a = f32::from(base) / 255.0;
        let b = f32::from(top) / 255.0;
        let out = match self {
            Self::Normal => b,
            Self::Forget => a,
            Self::Multiply => a * b,
            Self::Screen => 1.0 - (1.0 - a) * (1.0 - b),
            Self::Overlay => hard_light(b, a),
            Self::Darken => a.min(b),
            Self::Lighten => a.max(b),
            Self::ColorDodge => {
                if b >= 1.0 {
                    1.0
                } else {
                    (a / (1.0 - b)).min(1.0)
                }
            }
            Self::ColorBurn => {
                if b <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - a) / b).min(1.0)
                }
            }
            Self::HardLight => hard_light(a, b),
            Self::Difference => (a - b).abs(),
            Self::Exclusion => a + b - 2.0 * a * b,
        };
        (out.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

fn hard_light(a: f32, b: f32) -> f32 {
    if b < 0.5 {
        2.0 * a * b
    } else {
        1.0 - 2.0 * (1.0 - a) * (1.0 - b)
    }
}

/// Blend `layer` in place against `composite`
pub fn blend(mode: BlendingMode, composite: &Canvas, layer: &mut Canvas) {
    if mode == BlendingMode::Normal {
        return;
    }
    for (top, &base) in layer.pixels_mut().iter_mut().zip(composite.pixels()) {
        *top = mode.blend_pixel(base, *top);
    }
}
