//! Pixel Canvas
//!
//! A fixed-size buffer of packed colors, row-major, shared geometry across
//! every buffer the pipeline owns.

use super::color::{self, Color, BLACK};

/// Row-major pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Canvas {
    /// Create a black canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![BLACK; width as usize * height as usize],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total pixel count
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Check whether the canvas has no pixels
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// All pixels, row-major
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// All pixels, row-major (mutable)
    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    /// Set every pixel to `c`
    pub fn fill(&mut self, c: Color) {
        self.pixels.fill(c);
    }

    /// Reset to black
    pub fn clear(&mut self) {
        self.fill(BLACK);
    }

    /// Pixel at `(x, y)`, if inside the canvas
    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Set the pixel at `(x, y)`; out-of-bounds writes are ignored
    pub fn set(&mut self, x: u32, y: u32, c: Color) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = c;
                true
            }
            None => false,
        }
    }

    /// Fill column `x` from the bottom up to `rows` pixels
    pub fn fill_column(&mut self, x: u32, rows: u32, c: Color) {
        let rows = rows.min(self.height);
        for row in 0..rows {
            self.set(x, self.height - 1 - row, c);
        }
    }

    /// Scale every pixel's RGB channels by `factor`
    pub fn scale(&mut self, factor: f64) {
        if (factor - 1.0).abs() < f64::EPSILON {
            return;
        }
        for px in &mut self.pixels {
            *px = color::scale(*px, factor);
        }
    }

    /// Copy pixels from a canvas of the same geometry
    pub fn copy_from(&mut self, other: &Canvas) {
        let n = self.pixels.len().min(other.pixels.len());
        self.pixels[..n].copy_from_slice(&other.pixels[..n]);
    }

    /// RGB bytes in pixel order, alpha dropped
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&c| [color::red(c), color::green(c), color::blue(c)])
            .collect()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}
