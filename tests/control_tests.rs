//! Control surface and variable registry tests

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;

use lightstack::shard::ShardRegistry;
use lightstack::storage::MemoryStorage;
use lightstack::variables::{Value, Variable, VariableRegistry};
use lightstack::{App, ControlRequest, ControlSurface, ControllerConfig};

fn app() -> App {
    App::with_storage(
        ControllerConfig::default(),
        Rc::new(MemoryStorage::new()),
        ShardRegistry::with_builtins(),
    )
    .unwrap()
}

// === Variable Registry ===

#[test]
fn test_out_of_range_set_is_rejected() {
    let storage = Rc::new(MemoryStorage::new());
    let mut registry = VariableRegistry::open(storage.clone(), "test/vars", "test").unwrap();
    registry
        .declare(Variable::float_range("brightness", 1.0, 0.0, 1.0))
        .unwrap();
    let writes = storage.write_count();

    let err = registry.set_value("brightness", Value::Float(1.5)).unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION");
    assert_eq!(registry.get("brightness").unwrap().value(), &Value::Float(1.0));
    assert_eq!(storage.write_count(), writes);
}

#[test]
fn test_observers_fire_in_registration_order() {
    let storage = Rc::new(MemoryStorage::new());
    let mut registry = VariableRegistry::open(storage, "test/vars", "test").unwrap();
    registry.declare(Variable::int_range("count", 0, 0, 10)).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    for tag in ["first", "second"] {
        let seen = Rc::clone(&seen);
        registry
            .add_observer(
                "count",
                Box::new(move |name: &str, value: &Value| {
                    seen.borrow_mut().push(format!("{}:{}={:?}", tag, name, value));
                }),
            )
            .unwrap();
    }

    registry.set_value("count", Value::Int(3)).unwrap();
    assert!(registry.set_value("count", Value::Int(11)).is_err());

    assert_eq!(
        *seen.borrow(),
        vec!["first:count=Int(3)".to_string(), "second:count=Int(3)".to_string()]
    );
}

#[test]
fn test_persisted_value_overrides_default() {
    let storage = Rc::new(MemoryStorage::new());
    {
        let mut registry = VariableRegistry::open(storage.clone(), "test/vars", "test").unwrap();
        registry.declare(Variable::bool("enabled", false)).unwrap();
        registry.set_serialized("enabled", "true").unwrap();
    }

    let mut registry = VariableRegistry::open(storage, "test/vars", "test").unwrap();
    registry.declare(Variable::bool("enabled", false)).unwrap();
    assert_eq!(registry.bool("enabled").unwrap(), true);
}

// === Control Surface ===

#[test]
fn test_edit_inactive_then_switch() {
    let surface = ControlSurface;
    let mut app = app();

    let reply = surface.handle_line(
        &mut app,
        r#"{"op":"add_layer","stack":"inactive","init":{"shard_uuid":"solid"}}"#,
    );
    assert_eq!(reply, json!({ "ok": { "id": 0 } }));

    let reply = surface.handle_line(&mut app, r#"{"op":"layers","stack":"active"}"#);
    assert_eq!(reply["ok"]["stack"], json!("A"));
    assert_eq!(reply["ok"]["layers"], json!([]));

    surface.handle(&mut app, ControlRequest::Switch).unwrap();

    let layers = surface
        .handle(&mut app, ControlRequest::Layers {
            stack: "active".to_string(),
        })
        .unwrap();
    assert_eq!(layers["stack"], json!("B"));
    assert_eq!(layers["layers"][0]["shard_uuid"], json!("solid"));
    assert_eq!(layers["layers"][0]["state"], json!("active"));
}

#[test]
fn test_unknown_shard_leaves_stack_untouched() {
    let surface = ControlSurface;
    let mut app = app();

    let reply = surface.handle_line(
        &mut app,
        r#"{"op":"add_layer","stack":"A","init":{"shard_uuid":"missing"}}"#,
    );

    assert_eq!(reply["error"]["code"], json!("SHARD_NOT_FOUND"));
    assert!(app.stacks().active().is_empty());
}

#[test]
fn test_variable_listing_and_serialized_form() {
    let surface = ControlSurface;
    let mut app = app();
    surface
        .handle(&mut app, ControlRequest::SetVar {
            owner: "globals".to_string(),
            name: "brightness".to_string(),
            value: "0.5".to_string(),
        })
        .unwrap();

    let reply = surface
        .handle(&mut app, ControlRequest::GetVar {
            owner: "globals".to_string(),
            name: "brightness".to_string(),
        })
        .unwrap();
    assert_eq!(reply["value"], json!(0.5));
    assert_eq!(reply["serialized"], json!("0.5"));

    let vars = surface
        .handle(&mut app, ControlRequest::Vars {
            owner: "globals".to_string(),
        })
        .unwrap();
    let names: Vec<&str> = vars
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["name"].as_str())
        .collect();
    assert!(names.contains(&"brightness"));
    assert!(names.contains(&"palette"));
}

#[test]
fn test_missing_layer_and_selector_errors() {
    let surface = ControlSurface;
    let mut app = app();

    let err = surface
        .handle(&mut app, ControlRequest::RemoveLayer {
            stack: "A".to_string(),
            id: 9,
        })
        .unwrap_err();
    assert_eq!(err.error_code(), "LAYER_NOT_FOUND");

    let err = surface
        .handle(&mut app, ControlRequest::Activate {
            stack: "active".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_SELECTOR");
}

#[test]
fn test_diagnostics_after_frames() {
    let surface = ControlSurface;
    let mut app = app();
    app.stacks_mut()
        .active_mut()
        .add_layer(lightstack::layers::LayerInit::shard("palette_sweep"))
        .unwrap();
    for _ in 0..3 {
        app.render_frame();
    }

    let diagnostics = surface.handle(&mut app, ControlRequest::Diagnostics).unwrap();
    assert_eq!(diagnostics["frames"], json!(3));
    assert_eq!(diagnostics["active_layers"], json!(1));
    assert_eq!(diagnostics["active_stack"], json!("A"));
}
