//! Gamma Correction
//!
//! A power-law transfer function precomputed into a 256-entry lookup table.

use super::canvas::Canvas;
use super::color;

/// Output transfer function
#[derive(Debug, Clone)]
pub struct Gamma {
    exponent: f64,
    table: [u8; 256],
}

impl Gamma {
    /// Build the lookup table for `exponent`; `1.0` is the identity
    pub fn new(exponent: f64) -> Self {
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let normalized = i as f64 / 255.0;
            *entry = (normalized.powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        Self { exponent, table }
    }

    /// Identity transfer
    pub fn identity() -> Self {
        Self::new(1.0)
    }

    /// Configured exponent
    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Corrected channel value
    #[inline]
    pub fn correct(&self, channel: u8) -> u8 {
        self.table[channel as usize]
    }

    /// Write the corrected `source` into `output`, alpha preserved
    pub fn apply(&self, source: &Canvas, output: &mut Canvas) {
        for (out, &px) in output.pixels_mut().iter_mut().zip(source.pixels()) {
            *out = color::map_rgb(px, |ch| self.correct(ch));
        }
    }
}

impl Default for Gamma {
    fn default() -> Self {
        Self::identity()
    }
}
