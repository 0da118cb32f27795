//! Built-in Shards
//!
//! Rendering routines compiled into the controller. They stand in for
//! loadable shards and double as references for shard authors.

use crate::error::Result;
use crate::variables::{Variable, VariableRegistry};

use super::producer::{Frame, FrameProducer, RenderFault};

// ============================================================================
// Constants
// ============================================================================

pub const SOLID: &str = "solid";
pub const PALETTE_SWEEP: &str = "palette_sweep";
pub const SPECTRUM: &str = "spectrum";
pub const BLINK: &str = "blink";

// ============================================================================
// Solid
// ============================================================================

/// Fills the canvas with one color
#[derive(Debug, Default)]
pub struct Solid;

impl FrameProducer for Solid {
    fn shard_uuid(&self) -> &str {
        SOLID
    }

    fn declare(&mut self, variables: &mut VariableRegistry) -> Result<()> {
        variables.declare(
            Variable::int_range("color", 0xFF_FF0000, 0, i64::from(u32::MAX))
                .with_description("Fill color as 0xAARRGGBB"),
        )?;
        Ok(())
    }

    fn advance(&mut self, frame: &mut Frame<'_>) -> std::result::Result<(), RenderFault> {
        let color = frame.variables.int("color")?;
        frame.canvas.fill(color as u32);
        Ok(())
    }
}

// ============================================================================
// Palette Sweep
// ============================================================================

/// Scrolls the palette horizontally across the canvas
#[derive(Debug, Default)]
pub struct PaletteSweep;

impl FrameProducer for PaletteSweep {
    fn shard_uuid(&self) -> &str {
        PALETTE_SWEEP
    }

    fn declare(&mut self, variables: &mut VariableRegistry) -> Result<()> {
        variables.declare(
            Variable::float_range("speed", 0.2, 0.0, 10.0)
                .with_default_range(0.0, 2.0)
                .with_description("Palette cycles per second"),
        )?;
        Ok(())
    }

    fn advance(&mut self, frame: &mut Frame<'_>) -> std::result::Result<(), RenderFault> {
        let speed = frame.variables.float("speed")?;
        let offset = frame.time.elapsed.as_secs_f64() * speed;
        let width = frame.canvas.width().max(1);
        let height = frame.canvas.height();

        for x in 0..width {
            let color = frame.palette.interpolate(offset + f64::from(x) / f64::from(width));
            for y in 0..height {
                frame.canvas.set(x, y, color);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Spectrum
// ============================================================================

/// Draws audio bin strengths as bottom-up columns
#[derive(Debug, Default)]
pub struct Spectrum;

impl FrameProducer for Spectrum {
    fn shard_uuid(&self) -> &str {
        SPECTRUM
    }

    fn declare(&mut self, variables: &mut VariableRegistry) -> Result<()> {
        variables.declare(
            Variable::float_range("gain", 1.0, 0.0, 8.0).with_description("Column height multiplier"),
        )?;
        Ok(())
    }

    fn advance(&mut self, frame: &mut Frame<'_>) -> std::result::Result<(), RenderFault> {
        let bins = frame.audio.len();
        if bins == 0 {
            return Ok(());
        }

        let gain = frame.variables.float("gain")?;
        let width = frame.canvas.width();
        let height = frame.canvas.height();
        for x in 0..width {
            let bin = (x as usize * bins) / width as usize;
            let strength = (f64::from(frame.audio[bin]) * gain).clamp(0.0, 1.0);
            let rows = (strength * f64::from(height)).round() as u32;
            let color = frame.palette.interpolate(f64::from(x) / f64::from(width));
            frame.canvas.fill_column(x, rows, color);
        }
        Ok(())
    }
}

// ============================================================================
// Blink
// ============================================================================

/// Alternates between the first palette color and black
#[derive(Debug, Default)]
pub struct Blink {
    calls: u64,
}

impl FrameProducer for Blink {
    fn shard_uuid(&self) -> &str {
        BLINK
    }

    fn declare(&mut self, variables: &mut VariableRegistry) -> Result<()> {
        variables.declare(
            Variable::int_range("period", 10, 1, 1000).with_description("Frames per on/off phase"),
        )?;
        Ok(())
    }

    fn advance(&mut self, frame: &mut Frame<'_>) -> std::result::Result<(), RenderFault> {
        let period = frame.variables.int("period")?.max(1) as u64;
        let on = (self.calls / period) % 2 == 0;
        self.calls += 1;
        if on {
            frame.canvas.fill(frame.palette.interpolate(0.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Canvas;
    use crate::shard::FrameTime;
    use crate::storage::MemoryStorage;
    use crate::variables::{ColorSequence, MapType, Value};
    use std::rc::Rc;
    use std::time::Duration;

    fn declared(producer: &mut dyn FrameProducer) -> VariableRegistry {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = VariableRegistry::open(storage, "layer/vars", "layer").unwrap();
        producer.declare(&mut vars).unwrap();
        vars
    }

    fn render(
        producer: &mut dyn FrameProducer,
        vars: &VariableRegistry,
        canvas: &mut Canvas,
        palette: &ColorSequence,
        audio: &[f32],
        time: FrameTime,
    ) {
        let mut frame = Frame {
            canvas,
            variables: vars,
            palette,
            audio,
            time,
        };
        producer.advance(&mut frame).unwrap();
    }

    #[test]
    fn test_solid_uses_color_variable() {
        let mut solid = Solid;
        let mut vars = declared(&mut solid);
        vars.set_value("color", Value::Int(0x00_00FF00)).unwrap();
        let mut canvas = Canvas::new(3, 2);

        render(&mut solid, &vars, &mut canvas, &ColorSequence::primary(), &[], FrameTime::default());

        assert!(canvas.pixels().iter().all(|&p| p == 0x00FF00));
    }

    #[test]
    fn test_palette_sweep_starts_at_first_stop() {
        let mut sweep = PaletteSweep;
        let vars = declared(&mut sweep);
        let palette = ColorSequence::new(vec![0x0000FF, 0xFF0000], MapType::DiscreteLinear);
        let mut canvas = Canvas::new(2, 1);

        render(&mut sweep, &vars, &mut canvas, &palette, &[], FrameTime::default());

        assert_eq!(canvas.pixels(), &[0x0000FF, 0xFF0000]);
    }

    #[test]
    fn test_spectrum_column_heights() {
        let mut spectrum = Spectrum;
        let vars = declared(&mut spectrum);
        let palette = ColorSequence::new(vec![0xFFFFFF], MapType::DiscreteLinear);
        let mut canvas = Canvas::new(2, 4);

        render(&mut spectrum, &vars, &mut canvas, &palette, &[0.5, 1.0], FrameTime::default());

        let lit: Vec<usize> = (0..2)
            .map(|x| (0..4).filter(|&y| canvas.get(x, y) == Some(0xFFFFFF)).count())
            .collect();
        assert_eq!(lit, vec![2, 4]);
    }

    #[test]
    fn test_blink_alternates_each_period() {
        let mut blink = Blink::default();
        let mut vars = declared(&mut blink);
        vars.set_value("period", Value::Int(2)).unwrap();
        let palette = ColorSequence::new(vec![0xABCDEF], MapType::DiscreteLinear);

        let mut pattern = Vec::new();
        for index in 0..6 {
            let mut canvas = Canvas::new(1, 1);
            let time = FrameTime {
                index,
                elapsed: Duration::from_millis(index * 30),
            };
            render(&mut blink, &vars, &mut canvas, &palette, &[], time);
            pattern.push(canvas.pixels()[0] != 0);
        }
        assert_eq!(pattern, vec![true, true, false, false, true, true]);
    }
}
