//! Variable values
//!
//! The tagged union every variable holds, plus the color-sequence type used
//! for palettes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::graphics::color;

/// A variable's current value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Index into the variable's option list
    Option(usize),
    Str(String),
    ColorSequence(ColorSequence),
}

impl Value {
    /// Natural JSON form (used for serialization and control-surface info)
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Bool(v) => json!(v),
            Value::Int(v) => json!(v),
            Value::Float(v) => json!(v),
            Value::Option(v) => json!(v),
            Value::Str(v) => json!(v),
            Value::ColorSequence(seq) => json!(seq),
        }
    }

    /// Scalar form suitable for a `Cache`
    ///
    /// Color sequences are flattened to their serialized text.
    pub fn to_scalar(&self) -> JsonValue {
        match self {
            Value::ColorSequence(_) => JsonValue::String(self.to_json().to_string()),
            _ => self.to_json(),
        }
    }

    /// Short name of the variant, for error messages
    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Option(_) => "option",
            Value::Str(_) => "string",
            Value::ColorSequence(_) => "color_sequence",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => write!(f, "{}", v),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<ColorSequence> for Value {
    fn from(v: ColorSequence) -> Self {
        Value::ColorSequence(v)
    }
}

/// How a color sequence maps a phase onto its stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    #[default]
    ContinuousCircular,
    ContinuousLinear,
    DiscreteCircular,
    DiscreteLinear,
}

/// Ordered color stops plus an interpolation mode
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorSequence {
    pub colors: Vec<u32>,
    #[serde(default)]
    pub map_type: MapType,
}

impl ColorSequence {
    /// Create a sequence from stops and a map type
    pub fn new(colors: Vec<u32>, map_type: MapType) -> Self {
        Self { colors, map_type }
    }

    /// The 16-stop hue wheel used as the default palette
    pub fn primary() -> Self {
        Self::new(
            vec![
                0xFF0000, 0xFF5F00, 0xFFBF00, 0xDFFF00, 0x7FFF00, 0x1FFF00, 0x00FF3F, 0x00FF9F,
                0x00FFFF, 0x009FFF, 0x003FFF, 0x1F00FF, 0x7F00FF, 0xDF00FF, 0xFF00BF, 0xFF005F,
            ],
            MapType::ContinuousCircular,
        )
    }

    /// Number of stops
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Check whether the sequence has no stops
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Look up the color at `phase`
    ///
    /// Circular maps wrap the phase into `[0, 1)`; linear maps clamp it to
    /// `[0, 1]`. An empty sequence yields black.
    pub fn interpolate(&self, phase: f64) -> u32 {
        let n = self.colors.len();
        match n {
            0 => return 0,
            1 => return self.colors[0],
            _ => {}
        }

        let phase = if phase.is_finite() { phase } else { 0.0 };
        match self.map_type {
            MapType::ContinuousCircular => {
                let position = phase.rem_euclid(1.0) * n as f64;
                let lower = (position.floor() as usize).min(n - 1);
                let upper = (lower + 1) % n;
                color::lerp(self.colors[lower], self.colors[upper], position - lower as f64)
            }
            MapType::ContinuousLinear => {
                let position = phase.clamp(0.0, 1.0) * (n - 1) as f64;
                let lower = (position.floor() as usize).min(n - 1);
                let upper = (lower + 1).min(n - 1);
                color::lerp(self.colors[lower], self.colors[upper], position - lower as f64)
            }
            MapType::DiscreteCircular => {
                let index = (phase.rem_euclid(1.0) * n as f64).floor() as usize;
                self.colors[index.min(n - 1)]
            }
            MapType::DiscreteLinear => {
                let index = (phase.clamp(0.0, 1.0) * n as f64).floor() as usize;
                self.colors[index.min(n - 1)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn two_stop(map_type: MapType) -> ColorSequence {
        ColorSequence::new(vec![0x000000, 0x0000FF], map_type)
    }

    #[test_case(MapType::ContinuousLinear, 0.0, 0x000000 ; "linear start")]
    #[test_case(MapType::ContinuousLinear, 1.0, 0x0000FF ; "linear end")]
    #[test_case(MapType::ContinuousLinear, 2.0, 0x0000FF ; "linear clamps")]
    #[test_case(MapType::ContinuousCircular, 0.25, 0x00007F ; "circular midway up")]
    #[test_case(MapType::ContinuousCircular, 1.0, 0x000000 ; "circular wraps")]
    #[test_case(MapType::DiscreteLinear, 0.49, 0x000000 ; "discrete first half")]
    #[test_case(MapType::DiscreteLinear, 0.5, 0x0000FF ; "discrete second half")]
    #[test_case(MapType::DiscreteCircular, 1.5, 0x0000FF ; "discrete circular wraps")]
    fn test_interpolate(map_type: MapType, phase: f64, expected: u32) {
        assert_eq!(two_stop(map_type).interpolate(phase), expected);
    }

    #[test]
    fn test_interpolate_degenerate() {
        assert_eq!(ColorSequence::default().interpolate(0.3), 0);
        let single = ColorSequence::new(vec![0x123456], MapType::ContinuousLinear);
        assert_eq!(single.interpolate(0.9), 0x123456);
    }

    #[test]
    fn test_scalar_form_of_sequence_is_text() {
        let value = Value::ColorSequence(two_stop(MapType::DiscreteLinear));
        let scalar = value.to_scalar();
        assert!(scalar.is_string());
        assert!(scalar.as_str().unwrap().contains("discrete_linear"));
    }

    #[test]
    fn test_primary_palette() {
        let primary = ColorSequence::primary();
        assert_eq!(primary.len(), 16);
        assert_eq!(primary.interpolate(0.0), 0xFF0000);
    }
}
