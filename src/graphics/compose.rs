//! Composition Modes
//!
//! Merge a layer's canvas into the running composite. Direct modes combine
//! RGB channels arithmetically and clamp; alpha modes treat the top byte as
//! coverage.

use serde::{Deserialize, Serialize};

use super::canvas::Canvas;
use super::color::{self, Color};

/// Pixel-combination function used to merge a layer into the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    #[default]
    DirectSet,
    DirectClear,
    DirectAdd,
    DirectSubtract,
    DirectMultiply,
    DirectAnd,
    DirectOr,
    DirectXor,
    AlphaSourceOver,
    AlphaDestinationOver,
}

impl CompositionMode {
    /// Every mode, in option order
    pub const ALL: [CompositionMode; 10] = [
        Self::DirectSet,
        Self::DirectClear,
        Self::DirectAdd,
        Self::DirectSubtract,
        Self::DirectMultiply,
        Self::DirectAnd,
        Self::DirectOr,
        Self::DirectXor,
        Self::AlphaSourceOver,
        Self::AlphaDestinationOver,
    ];

    /// Option name
    pub fn name(self) -> &'static str {
        match self {
            Self::DirectSet => "direct_set",
            Self::DirectClear => "direct_clear",
            Self::DirectAdd => "direct_add",
            Self::DirectSubtract => "direct_subtract",
            Self::DirectMultiply => "direct_multiply",
            Self::DirectAnd => "direct_and",
            Self::DirectOr => "direct_or",
            Self::DirectXor => "direct_xor",
            Self::AlphaSourceOver => "alpha_source_over",
            Self::AlphaDestinationOver => "alpha_destination_over",
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

    /// Combine one source pixel onto one destination pixel
    pub fn compose_pixel(self, source: Color, dest: Color) -> Color {
        match self {
            Self::DirectSet => source,
            Self::DirectClear => color::BLACK,
            Self::DirectAdd => rgb(source, dest, |s, d| color::clamp_channel(i32::from(s) + i32::from(d))),
            Self::DirectSubtract => rgb(source, dest, |s, d| color::clamp_channel(i32::from(d) - i32::from(s))),
            Self::DirectMultiply => rgb(source, dest, |s, d| ((u32::from(s) * u32::from(d)) / 255) as u8),
            Self::DirectAnd => rgb(source, dest, |s, d| s & d),
            Self::DirectOr => rgb(source, dest, |s, d| s | d),
            Self::DirectXor => rgb(source, dest, |s, d| s ^ d),
            Self::AlphaSourceOver => over(source, dest),
            Self::AlphaDestinationOver => over(dest, source),
        }
    }
}

/// Combine RGB channels, keeping the destination alpha
fn rgb(source: Color, dest: Color, mut f: impl FnMut(u8, u8) -> u8) -> Color {
    color::from_channels(
        f(color::red(source), color::red(dest)),
        f(color::green(source), color::green(dest)),
        f(color::blue(source), color::blue(dest)),
        color::alpha(dest),
    )
}

/// Straight-alpha `top` over `bottom`
fn over(top: Color, bottom: Color) -> Color {
    let at = u32::from(color::alpha(top));
    let ab = u32::from(color::alpha(bottom));
    let inv = 255 - at;
    let mix = |t: u8, b: u8| ((u32::from(t) * at + u32::from(b) * inv) / 255) as u8;
    let alpha = at + (ab * inv) / 255;
    color::from_channels(
        mix(color::red(top), color::red(bottom)),
        mix(color::green(top), color::green(bottom)),
        mix(color::blue(top), color::blue(bottom)),
        alpha.min(255) as u8,
    )
}

/// Merge `source` into `dest` using `mode`
pub fn compose(mode: CompositionMode, source: &Canvas, dest: &mut Canvas) {
    for (d, &s) in dest.pixels_mut().iter_mut().zip(source.pixels()) {
        *d = mode.compose_pixel(s, *d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(CompositionMode::DirectSet, 0xFF0000, 0x00FF00 => 0xFF0000)]
    #[test_case(CompositionMode::DirectClear, 0xFF0000, 0x00FF00 => 0x000000)]
    #[test_case(CompositionMode::DirectAdd, 0x80F000, 0x902000 => 0xFFFF00)]
    #[test_case(CompositionMode::DirectSubtract, 0x20FF00, 0x8010FF => 0x6000FF)]
    #[test_case(CompositionMode::DirectMultiply, 0xFF8000, 0x80FF00 => 0x808000)]
    #[test_case(CompositionMode::DirectAnd, 0xF0F0F0, 0x3C3C3C => 0x303030)]
    #[test_case(CompositionMode::DirectOr, 0xF00000, 0x0F0000 => 0xFF0000)]
    #[test_case(CompositionMode::DirectXor, 0xFF00FF, 0xFFFF00 => 0x00FFFF)]
    #[test_case(CompositionMode::AlphaSourceOver, 0xFF_0000FF, 0xFF_FF0000 => 0xFF_0000FF)]
    #[test_case(CompositionMode::AlphaSourceOver, 0x00_0000FF, 0xFF_FF0000 => 0xFF_FF0000)]
    #[test_case(CompositionMode::AlphaDestinationOver, 0xFF_0000FF, 0xFF_FF0000 => 0xFF_FF0000)]
    fn test_compose_pixel(mode: CompositionMode, source: u32, dest: u32) -> u32 {
        mode.compose_pixel(source, dest)
    }

    #[test]
    fn test_half_coverage_over() {
        let out = CompositionMode::AlphaSourceOver.compose_pixel(0x80_FF0000, 0xFF_000000);
        assert_eq!(color::alpha(out), 0xFF);
        assert_eq!(color::red(out), 0x80);
    }

    #[test]
    fn test_compose_canvas() {
        let mut dest = Canvas::new(3, 1);
        dest.fill(0x101010);
        let mut source = Canvas::new(3, 1);
        source.fill(0x010203);

        compose(CompositionMode::DirectAdd, &source, &mut dest);

        assert!(dest.pixels().iter().all(|&p| p == 0x111213));
    }

    #[test]
    fn test_names_round_trip() {
        for mode in CompositionMode::ALL {
            assert_eq!(CompositionMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(CompositionMode::names()[0], "direct_set");
    }
}
