//! Variable declarations
//!
//! A `Variable` is a named, typed setting with a default, a current value,
//! kind-specific validation rules and an ordered list of observers.

use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::value::{ColorSequence, Value};
use crate::error::{LightstackError, Result};

/// Callback invoked with `(name, value)` after a variable changes
pub type Observer = Box<dyn FnMut(&str, &Value)>;

/// Type tag reported to the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Bool,
    Int,
    Float,
    Option,
    String,
    ColorSequence,
}

/// Kind-specific validation rules and metadata
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Bool {
        tags: [String; 2],
    },
    Int {
        default_range: (i64, i64),
        allowed_range: Option<(i64, i64)>,
    },
    Float {
        default_range: (f64, f64),
        allowed_range: Option<(f64, f64)>,
    },
    Option {
        options: Vec<String>,
    },
    Str,
    ColorSequence,
}

impl VariableKind {
    /// The type tag of this kind
    pub fn type_tag(&self) -> TypeTag {
        match self {
            VariableKind::Bool { .. } => TypeTag::Bool,
            VariableKind::Int { .. } => TypeTag::Int,
            VariableKind::Float { .. } => TypeTag::Float,
            VariableKind::Option { .. } => TypeTag::Option,
            VariableKind::Str => TypeTag::String,
            VariableKind::ColorSequence => TypeTag::ColorSequence,
        }
    }
}

/// Description of a variable for enumeration by the control surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub description: String,
    pub default: JsonValue,
    pub value: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<[String; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_range: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_range: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// A named, typed, validated setting
pub struct Variable {
    name: String,
    description: String,
    kind: VariableKind,
    default: Value,
    value: Value,
    observers: Vec<Observer>,
}

impl Variable {
    fn new(name: impl Into<String>, kind: VariableKind, default: Value) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            value: default.clone(),
            default,
            observers: Vec::new(),
        }
    }

    /// Boolean variable with the default `False`/`True` tags
    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self::new(
            name,
            VariableKind::Bool {
                tags: ["False".to_string(), "True".to_string()],
            },
            Value::Bool(default),
        )
    }

    /// Integer variable without an enforced range
    pub fn int(name: impl Into<String>, default: i64) -> Self {
        Self::new(
            name,
            VariableKind::Int {
                default_range: (0, 100),
                allowed_range: None,
            },
            Value::Int(default),
        )
    }

    /// Integer variable restricted to the inclusive range `[lo, hi]`
    pub fn int_range(name: impl Into<String>, default: i64, lo: i64, hi: i64) -> Self {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        Self::new(
            name,
            VariableKind::Int {
                default_range: (lo, hi),
                allowed_range: Some((lo, hi)),
            },
            Value::Int(default),
        )
    }

    /// Float variable without an enforced range
    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(
            name,
            VariableKind::Float {
                default_range: (0.0, 1.0),
                allowed_range: None,
            },
            Value::Float(default),
        )
    }

    /// Float variable restricted to the inclusive range `[lo, hi]`
    pub fn float_range(name: impl Into<String>, default: f64, lo: f64, hi: f64) -> Self {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        Self::new(
            name,
            VariableKind::Float {
                default_range: (lo, hi),
                allowed_range: Some((lo, hi)),
            },
            Value::Float(default),
        )
    }

    /// Option variable; `default` is the name of the initially selected option
    ///
    /// An unknown default name selects the first option.
    pub fn option<S: Into<String>>(
        name: impl Into<String>,
        default: &str,
        options: impl IntoIterator<Item = S>,
    ) -> Self {
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        let index = options.iter().position(|o| o == default).unwrap_or(0);
        Self::new(name, VariableKind::Option { options }, Value::Option(index))
    }

    /// Unconstrained string variable
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, VariableKind::Str, Value::Str(default.into()))
    }

    /// Color sequence variable
    pub fn color_sequence(name: impl Into<String>, default: ColorSequence) -> Self {
        Self::new(name, VariableKind::ColorSequence, Value::ColorSequence(default))
    }

    /// Attach a human-readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Override the UI hint range of a numeric variable
    pub fn with_default_range(mut self, lo: f64, hi: f64) -> Self {
        match &mut self.kind {
            VariableKind::Int { default_range, .. } => {
                *default_range = (lo.round() as i64, hi.round() as i64);
            }
            VariableKind::Float { default_range, .. } => *default_range = (lo, hi),
            _ => {}
        }
        self
    }

    /// Override the display tags of a boolean variable
    pub fn with_tags(mut self, off: impl Into<String>, on: impl Into<String>) -> Self {
        if let VariableKind::Bool { tags } = &mut self.kind {
            *tags = [off.into(), on.into()];
        }
        self
    }

    /// Register an observer at declaration time
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observers.push(observer);
        self
    }

    /// Variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Validation rules
    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// Declared default value
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Current value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Name of the currently selected option, for option variables
    pub fn selected_option(&self) -> Option<&str> {
        match (&self.kind, &self.value) {
            (VariableKind::Option { options }, Value::Option(index)) => {
                options.get(*index).map(String::as_str)
            }
            _ => None,
        }
    }

    /// Append an observer; observers run in registration order
    pub fn add_observer(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Check `raw` against this variable's type and range
    ///
    /// Returns the normalized value to store: integers widen to floats for
    /// float variables and option names resolve to their index.
    pub fn validate(&self, raw: &Value) -> Result<Value> {
        let reject = |reason: String| Err(LightstackError::validation(&self.name, raw, reason));

        match (&self.kind, raw) {
            (VariableKind::Bool { .. }, Value::Bool(v)) => Ok(Value::Bool(*v)),

            (VariableKind::Int { allowed_range, .. }, Value::Int(v)) => match allowed_range {
                Some((lo, hi)) if v < lo || v > hi => {
                    reject(format!("outside allowed range [{}, {}]", lo, hi))
                }
                _ => Ok(Value::Int(*v)),
            },

            (VariableKind::Float { .. }, Value::Int(v)) => self.validate(&Value::Float(*v as f64)),
            (VariableKind::Float { allowed_range, .. }, Value::Float(v)) => {
                let v = *v;
                if !v.is_finite() {
                    return reject("not a finite number".to_string());
                }
                match allowed_range {
                    Some((lo, hi)) if v < *lo || v > *hi => {
                        reject(format!("outside allowed range [{}, {}]", lo, hi))
                    }
                    _ => Ok(Value::Float(v)),
                }
            }

            (VariableKind::Option { options }, Value::Option(index)) => {
                if *index < options.len() {
                    Ok(Value::Option(*index))
                } else {
                    reject(format!("index must be below {}", options.len()))
                }
            }
            (VariableKind::Option { options }, Value::Str(name)) => {
                match options.iter().position(|o| o == name) {
                    Some(index) => Ok(Value::Option(index)),
                    None => reject(format!("not one of {:?}", options)),
                }
            }

            (VariableKind::Str, Value::Str(v)) => Ok(Value::Str(v.clone())),

            (VariableKind::ColorSequence, Value::ColorSequence(seq)) => {
                Ok(Value::ColorSequence(seq.clone()))
            }

            (kind, other) => reject(format!(
                "expected {:?}, got {}",
                kind.type_tag(),
                other.variant_name()
            )),
        }
    }

    /// Serialize a value of this variable to text
    pub fn serialize(&self, value: &Value) -> String {
        value.to_json().to_string()
    }

    /// Parse text produced by [`Variable::serialize`] (or typed by a human)
    ///
    /// Text that is not valid JSON is taken as a bare string, which lets
    /// option names and plain strings be sent without quoting.
    pub fn deserialize(&self, text: &str) -> Result<Value> {
        let parsed = serde_json::from_str::<JsonValue>(text.trim());
        if let VariableKind::Str = self.kind {
            // strings are unconstrained: anything but a quoted JSON string is taken verbatim
            let value = match parsed {
                Ok(JsonValue::String(s)) => s,
                _ => text.to_string(),
            };
            return self.validate(&Value::Str(value));
        }
        let json = parsed.unwrap_or_else(|_| JsonValue::String(text.to_string()));
        self.from_json(&json)
    }

    /// Convert a JSON value into a validated value of this variable
    pub fn from_json(&self, json: &JsonValue) -> Result<Value> {
        let bad = || LightstackError::validation(&self.name, json, "cannot convert");

        let raw = match (&self.kind, json) {
            (VariableKind::Bool { .. }, JsonValue::Bool(v)) => Value::Bool(*v),
            (VariableKind::Int { .. }, JsonValue::Number(n)) => {
                Value::Int(n.as_i64().ok_or_else(bad)?)
            }
            (VariableKind::Float { .. }, JsonValue::Number(n)) => {
                Value::Float(n.as_f64().ok_or_else(bad)?)
            }
            (VariableKind::Option { .. }, JsonValue::Number(n)) => {
                let index = n.as_u64().ok_or_else(bad)?;
                Value::Option(usize::try_from(index).map_err(|_| bad())?)
            }
            (VariableKind::Option { .. }, JsonValue::String(name)) => Value::Str(name.clone()),
            (VariableKind::Str, JsonValue::String(v)) => Value::Str(v.clone()),
            (VariableKind::ColorSequence, JsonValue::Object(_)) => {
                Value::ColorSequence(serde_json::from_value(json.clone()).map_err(|_| bad())?)
            }
            // the scalar (cached) form of a sequence is its JSON text
            (VariableKind::ColorSequence, JsonValue::String(text)) => {
                let seq: ColorSequence = serde_json::from_str(text).map_err(|_| bad())?;
                Value::ColorSequence(seq)
            }
            _ => return Err(bad()),
        };
        self.validate(&raw)
    }

    /// Commit an already validated value
    pub(crate) fn commit(&mut self, value: Value) {
        self.value = value;
    }

    /// Run every observer with the current value, in registration order
    pub(crate) fn notify(&mut self) {
        let Self {
            name,
            value,
            observers,
            ..
        } = self;
        for observer in observers.iter_mut() {
            observer(name, value);
        }
    }

    /// Describe this variable for the control surface
    pub fn info(&self) -> VariableInfo {
        let (tags, default_range, allowed_range, options) = match &self.kind {
            VariableKind::Bool { tags } => (Some(tags.clone()), None, None, None),
            VariableKind::Int {
                default_range,
                allowed_range,
            } => (
                None,
                Some((default_range.0 as f64, default_range.1 as f64)),
                allowed_range.map(|(lo, hi)| (lo as f64, hi as f64)),
                None,
            ),
            VariableKind::Float {
                default_range,
                allowed_range,
            } => (None, Some(*default_range), *allowed_range, None),
            VariableKind::Option { options } => (None, None, None, Some(options.clone())),
            VariableKind::Str | VariableKind::ColorSequence => (None, None, None, None),
        };

        VariableInfo {
            name: self.name.clone(),
            type_tag: self.kind.type_tag(),
            description: self.description.clone(),
            default: self.default.to_json(),
            value: self.value.to_json(),
            tags,
            default_range,
            allowed_range,
            options,
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::MapType;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("42" ; "number")]
    #[test_case("true" ; "boolean")]
    #[test_case("null" ; "null")]
    #[test_case("[1]" ; "array")]
    #[test_case("world" ; "bare word")]
    fn test_string_takes_any_text(text: &str) {
        let var = Variable::string("label", "hello");
        assert_eq!(var.deserialize(text).unwrap(), Value::Str(text.to_string()));
    }

    #[test]
    fn test_string_quoted_text_unwrapped() {
        let var = Variable::string("label", "hello");
        let serialized = var.serialize(&Value::Str("42".to_string()));
        assert_eq!(var.deserialize(&serialized).unwrap(), Value::Str("42".to_string()));
    }

    #[test_case(-0.1 ; "below")]
    #[test_case(1.5 ; "above")]
    #[test_case(f64::NAN ; "nan")]
    fn test_float_range_rejects(raw: f64) {
        let var = Variable::float_range("brightness", 1.0, 0.0, 1.0);
        let err = var.validate(&Value::Float(raw)).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION");
    }

    #[test]
    fn test_float_range_is_inclusive() {
        let var = Variable::float_range("brightness", 1.0, 0.0, 1.0);
        assert_eq!(var.validate(&Value::Float(0.0)).unwrap(), Value::Float(0.0));
        assert_eq!(var.validate(&Value::Float(1.0)).unwrap(), Value::Float(1.0));
        assert_eq!(var.validate(&Value::Int(1)).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn test_int_range_is_inclusive() {
        let var = Variable::int_range("period", 10, 1, 100);
        assert!(var.validate(&Value::Int(100)).is_ok());
        assert!(var.validate(&Value::Int(101)).is_err());
        assert!(var.validate(&Value::Int(0)).is_err());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let var = Variable::bool("enabled", true);
        assert!(var.validate(&Value::Int(1)).is_err());
        let var = Variable::int("count", 1);
        assert!(var.validate(&Value::Float(1.0)).is_err());
    }

    #[test]
    fn test_option_by_index_and_name() {
        let var = Variable::option("mode", "add", ["set", "add", "xor"]);
        assert_eq!(var.value(), &Value::Option(1));
        assert_eq!(var.selected_option(), Some("add"));
        assert_eq!(var.validate(&Value::Str("xor".into())).unwrap(), Value::Option(2));
        assert!(var.validate(&Value::Option(3)).is_err());
        assert!(var.validate(&Value::Str("XOR".into())).is_err());
    }

    #[test]
    fn test_deserialize_bare_text() {
        let var = Variable::option("mode", "set", ["set", "add"]);
        assert_eq!(var.deserialize("add").unwrap(), Value::Option(1));
        let var = Variable::string("label", "");
        assert_eq!(var.deserialize("hello").unwrap(), Value::Str("hello".into()));
    }

    #[test]
    fn test_round_trip_every_kind() {
        let seq = ColorSequence::new(vec![0xFF0000, 0x00FF00], MapType::DiscreteLinear);
        let cases = vec![
            (Variable::bool("b", false), Value::Bool(true)),
            (Variable::int("i", 0), Value::Int(-42)),
            (Variable::float("f", 0.0), Value::Float(0.1 + 0.2)),
            (Variable::option("o", "a", ["a", "b"]), Value::Option(1)),
            (Variable::string("s", ""), Value::Str("with \"quotes\"".into())),
            (Variable::color_sequence("c", ColorSequence::default()), Value::ColorSequence(seq)),
        ];

        for (var, value) in cases {
            let text = var.serialize(&value);
            assert_eq!(var.deserialize(&text).unwrap(), value, "kind {:?}", var.kind());
            assert_eq!(var.from_json(&value.to_scalar()).unwrap(), value);
        }
    }

    #[test]
    fn test_info_reports_metadata() {
        let var = Variable::float_range("brightness", 1.0, 0.0, 1.0)
            .with_description("global output scale");
        let info = var.info();
        assert_eq!(info.type_tag, TypeTag::Float);
        assert_eq!(info.allowed_range, Some((0.0, 1.0)));
        assert_eq!(info.description, "global output scale");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "float");
        assert!(json.get("options").is_none());
    }
}
