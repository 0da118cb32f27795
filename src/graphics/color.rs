//! Color channel helpers
//!
//! Colors are packed `0xAARRGGBB`. Direct operations work on the RGB
//! channels; the alpha byte is only read by alpha composition modes.

/// Packed `0xAARRGGBB` color
pub type Color = u32;

/// Fully transparent black
pub const BLACK: Color = 0x0000_0000;

/// Alpha channel
#[inline]
pub fn alpha(c: Color) -> u8 {
    (c >> 24) as u8
}

/// Red channel
#[inline]
pub fn red(c: Color) -> u8 {
    (c >> 16) as u8
}

/// Green channel
#[inline]
pub fn green(c: Color) -> u8 {
    (c >> 8) as u8
}

/// Blue channel
#[inline]
pub fn blue(c: Color) -> u8 {
    c as u8
}

/// Pack channels into a color
#[inline]
pub fn from_channels(r: u8, g: u8, b: u8, a: u8) -> Color {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Clamp an intermediate channel value into `0..=255`
#[inline]
pub fn clamp_channel(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Apply `f` to each RGB channel, keeping alpha
#[inline]
pub fn map_rgb(c: Color, mut f: impl FnMut(u8) -> u8) -> Color {
    from_channels(f(red(c)), f(green(c)), f(blue(c)), alpha(c))
}

/// Combine two colors channel by channel (RGB and alpha)
#[inline]
pub fn zip_channels(a: Color, b: Color, mut f: impl FnMut(u8, u8) -> u8) -> Color {
    from_channels(
        f(red(a), red(b)),
        f(green(a), green(b)),
        f(blue(a), blue(b)),
        f(alpha(a), alpha(b)),
    )
}

/// Scale the RGB channels by `factor` (truncating), keeping alpha
#[inline]
pub fn scale(c: Color, factor: f64) -> Color {
    let factor = factor.max(0.0);
    map_rgb(c, |ch| (f64::from(ch) * factor).min(255.0) as u8)
}

/// Linear interpolation between two colors, `t` in `[0, 1]`
pub fn lerp(a: Color, b: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    zip_channels(a, b, |x, y| {
        let delta = f64::from(i32::from(y) - i32::from(x)) * t;
        clamp_channel(i32::from(x) + delta as i32)
    })
}
