//! Control Surface
//!
//! The operations an external operator may invoke while the controller
//! runs, expressed as serde-tagged requests with JSON responses. Transport
//! (HTTP, BLE, stdin) is the caller's concern.
//!
//! Variable owners are addressed as:
//! - `globals`
//! - `audio/<source>`
//! - `<stack>/<layer>` for a layer's public variables
//! - `<stack>/<layer>/private` for its compositor settings
//!
//! where `<stack>` is `A`, `B`, `active` or `inactive`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::app::App;
use crate::error::{LightstackError, Result};
use crate::layers::{LayerInit, StackName};
use crate::variables::VariableRegistry;

// ============================================================================
// Owners
// ============================================================================

/// Addressable owner of a variable registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Globals,
    Audio(String),
    Layer { stack: String, id: u32, private: bool },
}

impl FromStr for Owner {
    type Err = LightstackError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LightstackError::InvalidSelector {
            selector: s.to_string(),
        };
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            ["globals"] => Ok(Owner::Globals),
            ["audio", source] if !source.is_empty() => Ok(Owner::Audio(source.to_string())),
            [stack, id] => Ok(Owner::Layer {
                stack: stack.to_string(),
                id: id.parse().map_err(|_| invalid())?,
                private: false,
            }),
            [stack, id, "private"] => Ok(Owner::Layer {
                stack: stack.to_string(),
                id: id.parse().map_err(|_| invalid())?,
                private: true,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Globals => f.write_str("globals"),
            Owner::Audio(source) => write!(f, "audio/{}", source),
            Owner::Layer { stack, id, private: false } => write!(f, "{}/{}", stack, id),
            Owner::Layer { stack, id, private: true } => write!(f, "{}/{}/private", stack, id),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// One control-surface operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Active stack and audio selection
    Info,
    Diagnostics,
    Switch,
    Activate { stack: String },
    Layers { stack: String },
    AddLayer {
        stack: String,
        #[serde(default)]
        init: LayerInit,
    },
    RemoveLayer { stack: String, id: u32 },
    MoveLayer { stack: String, id: u32, index: usize },
    ClearStack { stack: String },
    LayerInfo { stack: String, id: u32 },
    MergeLayerInfo {
        stack: String,
        id: u32,
        info: Map<String, JsonValue>,
    },
    Vars { owner: String },
    GetVar { owner: String, name: String },
    /// `value` is the serialized form (`"0.5"`, `"true"`, an option name)
    SetVar { owner: String, name: String, value: String },
    Shards,
    AudioSources,
    SelectAudio { source: Option<String> },
}

/// Dispatcher for [`ControlRequest`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlSurface;

impl ControlSurface {
    /// Execute `request` against `app`
    ///
    /// Validation and lookup failures are returned unchanged; nothing is
    /// mutated when an error is returned.
    pub fn handle(&self, app: &mut App, request: ControlRequest) -> Result<JsonValue> {
        debug!(request = ?request, "control request");
        match request {
            ControlRequest::Info => Ok(json!({
                "stacks": app.stacks().info(),
                "audio": app.audio().info(),
            })),
            ControlRequest::Diagnostics => Ok(serde_json::to_value(app.diagnostics())?),
            ControlRequest::Switch => {
                let active = app.stacks_mut().switch()?;
                Ok(json!({ "active": active }))
            }
            ControlRequest::Activate { stack } => {
                let name: StackName = stack.parse()?;
                app.stacks_mut().activate(name)?;
                Ok(json!({ "active": name }))
            }
            ControlRequest::Layers { stack } => {
                let stack = app.stacks().get(&stack)?;
                Ok(json!({ "stack": stack.name(), "layers": stack.info() }))
            }
            ControlRequest::AddLayer { stack, init } => {
                let id = app.stacks_mut().get_mut(&stack)?.add_layer(init)?;
                Ok(json!({ "id": id }))
            }
            ControlRequest::RemoveLayer { stack, id } => {
                app.stacks_mut().get_mut(&stack)?.remove_layer_by_id(id)?;
                Ok(json!({ "removed": id }))
            }
            ControlRequest::MoveLayer { stack, id, index } => {
                let stack = app.stacks_mut().get_mut(&stack)?;
                stack.move_layer(id, index)?;
                Ok(json!({ "order": stack.ids() }))
            }
            ControlRequest::ClearStack { stack } => {
                app.stacks_mut().get_mut(&stack)?.clear()?;
                Ok(json!({ "cleared": stack }))
            }
            ControlRequest::LayerInfo { stack, id } => {
                let layer = app.stacks().get(&stack)?.get_layer_by_id(id)?;
                Ok(serde_json::to_value(layer.info())?)
            }
            ControlRequest::MergeLayerInfo { stack, id, info } => {
                let layer = app.stacks_mut().get_mut(&stack)?.get_layer_by_id_mut(id)?;
                layer.merge_info(info)?;
                Ok(serde_json::to_value(layer.info())?)
            }
            ControlRequest::Vars { owner } => {
                let registry = registry(app, &owner.parse()?)?;
                Ok(serde_json::to_value(registry.info())?)
            }
            ControlRequest::GetVar { owner, name } => {
                let registry = registry(app, &owner.parse()?)?;
                let variable = registry.get(&name)?;
                Ok(json!({
                    "name": name,
                    "value": variable.value().to_json(),
                    "serialized": registry.serialized(&name)?,
                }))
            }
            ControlRequest::SetVar { owner, name, value } => {
                let registry = registry_mut(app, &owner.parse()?)?;
                registry.set_serialized(&name, &value)?;
                Ok(json!({
                    "name": name,
                    "value": registry.value(&name)?.to_json(),
                }))
            }
            ControlRequest::Shards => Ok(serde_json::to_value(app.shards().list())?),
            ControlRequest::AudioSources => Ok(serde_json::to_value(app.audio().info())?),
            ControlRequest::SelectAudio { source } => {
                app.audio_mut().select(source.as_deref())?;
                Ok(serde_json::to_value(app.audio().info())?)
            }
        }
    }

    /// Parse a JSON request line, execute it and render the reply
    ///
    /// Failures are rendered as `{"error": {"code", "message"}}`.
    pub fn handle_line(&self, app: &mut App, line: &str) -> JsonValue {
        let result = serde_json::from_str::<ControlRequest>(line)
            .map_err(LightstackError::from)
            .and_then(|request| self.handle(app, request));
        match result {
            Ok(value) => json!({ "ok": value }),
            Err(e) => json!({ "error": { "code": e.error_code(), "message": e.to_string() } }),
        }
    }
}

fn registry<'a>(app: &'a App, owner: &Owner) -> Result<&'a VariableRegistry> {
    match owner {
        Owner::Globals => Ok(app.globals().variables()),
        Owner::Audio(source) => Ok(app.audio().source(source)?.variables()),
        Owner::Layer { stack, id, private } => {
            let layer = app.stacks().get(stack)?.get_layer_by_id(*id)?;
            Ok(if *private {
                layer.private_variables()
            } else {
                layer.variables()
            })
        }
    }
}

fn registry_mut<'a>(app: &'a mut App, owner: &Owner) -> Result<&'a mut VariableRegistry> {
    match owner {
        Owner::Globals => Ok(app.globals_mut().variables_mut()),
        Owner::Audio(source) => Ok(app.audio_mut().source_mut(source)?.variables_mut()),
        Owner::Layer { stack, id, private } => {
            let layer = app.stacks_mut().get_mut(stack)?.get_layer_by_id_mut(*id)?;
            Ok(if *private {
                layer.private_variables_mut()
            } else {
                layer.variables_mut()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::shard::ShardRegistry;
    use crate::storage::MemoryStorage;
    use std::rc::Rc;
    use test_case::test_case;

    fn app() -> App {
        App::with_storage(
            ControllerConfig::default(),
            Rc::new(MemoryStorage::new()),
            ShardRegistry::with_builtins(),
        )
        .unwrap()
    }

    #[test_case("globals" => Owner::Globals)]
    #[test_case("audio/mic" => Owner::Audio("mic".to_string()))]
    #[test_case("A/3" => Owner::Layer { stack: "A".to_string(), id: 3, private: false })]
    #[test_case("inactive/0/private" => Owner::Layer { stack: "inactive".to_string(), id: 0, private: true })]
    fn test_owner_parse(text: &str) -> Owner {
        let owner: Owner = text.parse().unwrap();
        assert_eq!(owner.to_string(), text);
        owner
    }

    #[test_case("audio/")]
    #[test_case("A/x")]
    #[test_case("A/1/public")]
    fn test_owner_parse_rejects(text: &str) {
        assert!(text.parse::<Owner>().is_err());
    }

    #[test]
    fn test_add_and_set_layer_var() {
        let surface = ControlSurface;
        let mut app = app();

        let added = surface
            .handle(&mut app, ControlRequest::AddLayer {
                stack: "active".to_string(),
                init: LayerInit::shard("blink"),
            })
            .unwrap();
        assert_eq!(added, json!({ "id": 0 }));

        let set = surface
            .handle(&mut app, ControlRequest::SetVar {
                owner: "A/0".to_string(),
                name: "period".to_string(),
                value: "4".to_string(),
            })
            .unwrap();
        assert_eq!(set, json!({ "name": "period", "value": 4 }));

        let private = surface
            .handle(&mut app, ControlRequest::SetVar {
                owner: "A/0/private".to_string(),
                name: "blending_mode".to_string(),
                value: "screen".to_string(),
            })
            .unwrap();
        assert_eq!(private["value"], json!(3));
    }

    #[test]
    fn test_validation_error_leaves_value() {
        let surface = ControlSurface;
        let mut app = app();

        let err = surface
            .handle(&mut app, ControlRequest::SetVar {
                owner: "globals".to_string(),
                name: "brightness".to_string(),
                value: "1.5".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION");

        let current = surface
            .handle(&mut app, ControlRequest::GetVar {
                owner: "globals".to_string(),
                name: "brightness".to_string(),
            })
            .unwrap();
        assert_eq!(current["value"], json!(1.0));
    }

    #[test]
    fn test_handle_line_round_trip() {
        let surface = ControlSurface;
        let mut app = app();

        let reply = surface.handle_line(&mut app, r#"{"op":"switch"}"#);
        assert_eq!(reply, json!({ "ok": { "active": "B" } }));

        let reply = surface.handle_line(&mut app, r#"{"op":"layers","stack":"C"}"#);
        assert_eq!(reply["error"]["code"], json!("INVALID_SELECTOR"));

        let reply = surface.handle_line(&mut app, "garbage");
        assert_eq!(reply["error"]["code"], json!("SERIALIZATION_ERROR"));
    }

    #[test]
    fn test_merge_layer_info() {
        let surface = ControlSurface;
        let mut app = app();
        surface
            .handle(&mut app, ControlRequest::AddLayer {
                stack: "A".to_string(),
                init: LayerInit::shard("solid"),
            })
            .unwrap();

        let mut info = Map::new();
        info.insert("active".to_string(), json!(false));
        let reply = surface
            .handle(&mut app, ControlRequest::MergeLayerInfo {
                stack: "A".to_string(),
                id: 0,
                info,
            })
            .unwrap();

        assert_eq!(reply["active"], json!(false));
        assert_eq!(reply["state"], json!("inactive"));
    }

    #[test]
    fn test_audio_owner() {
        let surface = ControlSurface;
        let mut app = app();
        app.audio_mut().add_source("mic").unwrap();

        let vars = surface
            .handle(&mut app, ControlRequest::Vars {
                owner: "audio/mic".to_string(),
            })
            .unwrap();
        assert_eq!(vars[0]["name"], json!("volume"));

        let err = surface
            .handle(&mut app, ControlRequest::SelectAudio {
                source: Some("line".to_string()),
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
