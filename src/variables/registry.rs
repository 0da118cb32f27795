//! Variable Registry
//!
//! Owns the variables of one component (a layer, an audio source or the
//! global settings) and keeps every declared value durable through a
//! [`Cache`] at an owner-specific path.

use std::collections::HashMap;

use serde_json::Map;
use tracing::{debug, warn};

use super::value::{ColorSequence, Value};
use super::variable::{Observer, Variable, VariableInfo};
use crate::error::{LightstackError, Result};
use crate::storage::{Cache, SharedStorage};

/// Named, persisted variables scoped to one owner
#[derive(Debug)]
pub struct VariableRegistry {
    owner: String,
    cache: Cache,
    variables: Vec<Variable>,
    by_name: HashMap<String, usize>,
}

impl VariableRegistry {
    /// Open the registry whose values live at `path`
    pub fn open(storage: SharedStorage, path: impl Into<String>, owner: impl Into<String>) -> Result<Self> {
        let cache = Cache::open(storage, path, Map::new(), None)?;
        Ok(Self {
            owner: owner.into(),
            cache,
            variables: Vec::new(),
            by_name: HashMap::new(),
        })
    }

    /// Name of the owning component, used in error messages
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Declare a variable and return the live instance
    ///
    /// A previously persisted value overrides the declared default when it
    /// still validates. The resulting value is persisted and observers are
    /// notified once. Re-declaring a name replaces the earlier variable.
    pub fn declare(&mut self, mut variable: Variable) -> Result<&mut Variable> {
        let default = variable.validate(variable.default_value())?;
        variable.commit(default);

        let name = variable.name().to_string();
        if let Ok(stored) = self.cache.get(&name) {
            match variable.from_json(stored) {
                Ok(value) => variable.commit(value),
                Err(e) => warn!(
                    owner = %self.owner,
                    variable = %name,
                    error = %e,
                    "persisted value rejected, keeping default"
                ),
            }
        }

        self.cache.set(&name, variable.value().to_scalar())?;
        variable.notify();
        debug!(owner = %self.owner, variable = %name, value = %variable.value(), "variable declared");

        let index = match self.by_name.get(&name) {
            Some(&index) => {
                self.variables[index] = variable;
                index
            }
            None => {
                self.variables.push(variable);
                self.by_name.insert(name, self.variables.len() - 1);
                self.variables.len() - 1
            }
        };
        Ok(&mut self.variables[index])
    }

    /// Look up a declared variable
    pub fn get(&self, name: &str) -> Result<&Variable> {
        self.by_name
            .get(name)
            .map(|&index| &self.variables[index])
            .ok_or_else(|| self.not_found(name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Variable> {
        match self.by_name.get(name) {
            Some(&index) => Ok(&mut self.variables[index]),
            None => Err(self.not_found(name)),
        }
    }

    /// Whether `name` has been declared
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Current value of a declared variable
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get(name).map(Variable::value)
    }

    /// Validate, persist, commit and notify
    ///
    /// On any failure the previous value and persisted state are unchanged.
    pub fn set_value(&mut self, name: &str, raw: Value) -> Result<()> {
        let variable = self.get(name)?;
        let value = variable.validate(&raw)?;
        let scalar = value.to_scalar();

        self.cache.set(name, scalar)?;

        let variable = self.get_mut(name)?;
        variable.commit(value);
        variable.notify();
        Ok(())
    }

    /// Deserialize `text` for the named variable and set it
    pub fn set_serialized(&mut self, name: &str, text: &str) -> Result<()> {
        let value = self.get(name)?.deserialize(text)?;
        self.set_value(name, value)
    }

    /// Serialized form of the named variable's current value
    pub fn serialized(&self, name: &str) -> Result<String> {
        let variable = self.get(name)?;
        Ok(variable.serialize(variable.value()))
    }

    /// Register an observer on a declared variable
    pub fn add_observer(&mut self, name: &str, observer: Observer) -> Result<()> {
        self.get_mut(name)?.add_observer(observer);
        Ok(())
    }

    /// Variables in declaration order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Declared names in declaration order
    pub fn names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name().to_string()).collect()
    }

    /// Control-surface descriptions of every variable
    pub fn info(&self) -> Vec<VariableInfo> {
        self.variables.iter().map(Variable::info).collect()
    }

    /// Number of declared variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check whether nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Float value of a float variable
    pub fn float(&self, name: &str) -> Result<f64> {
        match self.value(name)? {
            Value::Float(v) => Ok(*v),
            other => Err(self.mismatch(name, other, "float")),
        }
    }

    /// Integer value of an int variable
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.value(name)? {
            Value::Int(v) => Ok(*v),
            other => Err(self.mismatch(name, other, "int")),
        }
    }

    /// Value of a bool variable
    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.value(name)? {
            Value::Bool(v) => Ok(*v),
            other => Err(self.mismatch(name, other, "bool")),
        }
    }

    /// Selected option name of an option variable
    pub fn option(&self, name: &str) -> Result<&str> {
        let variable = self.get(name)?;
        variable
            .selected_option()
            .ok_or_else(|| self.mismatch(name, variable.value(), "option"))
    }

    /// Value of a string variable
    pub fn string(&self, name: &str) -> Result<&str> {
        match self.value(name)? {
            Value::Str(v) => Ok(v),
            other => Err(self.mismatch(name, other, "string")),
        }
    }

    /// Value of a color sequence variable
    pub fn color_sequence(&self, name: &str) -> Result<&ColorSequence> {
        match self.value(name)? {
            Value::ColorSequence(v) => Ok(v),
            other => Err(self.mismatch(name, other, "color_sequence")),
        }
    }

    fn not_found(&self, name: &str) -> LightstackError {
        LightstackError::VariableNotFound {
            owner: self.owner.clone(),
            name: name.to_string(),
        }
    }

    fn mismatch(&self, name: &str, value: &Value, expected: &str) -> LightstackError {
        LightstackError::validation(name, value, format!("is not a {} variable", expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn registry(storage: &Rc<MemoryStorage>) -> VariableRegistry {
        VariableRegistry::open(storage.clone(), "globals/vars", "globals").unwrap()
    }

    #[test]
    fn test_declare_persists_default() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);

        vars.declare(Variable::float_range("brightness", 1.0, 0.0, 1.0))
            .unwrap();

        assert_relative_eq!(vars.float("brightness").unwrap(), 1.0);
        let stored = storage.read("globals/vars").unwrap().unwrap();
        assert!(stored.contains("\"brightness\":1.0"));
    }

    #[test]
    fn test_out_of_range_keeps_old_value() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);
        vars.declare(Variable::float_range("brightness", 1.0, 0.0, 1.0))
            .unwrap();
        let writes = storage.write_count();

        let err = vars.set_value("brightness", Value::Float(1.5)).unwrap_err();

        assert!(matches!(err, LightstackError::Validation { ref name, .. } if name == "brightness"));
        assert_relative_eq!(vars.float("brightness").unwrap(), 1.0);
        assert_eq!(storage.write_count(), writes);
    }

    #[test]
    fn test_persisted_value_survives_reopen() {
        let storage = Rc::new(MemoryStorage::new());
        {
            let mut vars = registry(&storage);
            vars.declare(Variable::int_range("count", 3, 0, 10)).unwrap();
            vars.set_value("count", Value::Int(7)).unwrap();
        }

        let mut vars = registry(&storage);
        vars.declare(Variable::int_range("count", 3, 0, 10)).unwrap();
        assert_eq!(vars.int("count").unwrap(), 7);
    }

    #[test]
    fn test_persisted_value_outside_new_range_falls_back() {
        let storage = Rc::new(MemoryStorage::new());
        {
            let mut vars = registry(&storage);
            vars.declare(Variable::int_range("count", 3, 0, 10)).unwrap();
            vars.set_value("count", Value::Int(9)).unwrap();
        }

        let mut vars = registry(&storage);
        vars.declare(Variable::int_range("count", 3, 0, 5)).unwrap();
        assert_eq!(vars.int("count").unwrap(), 3);
    }

    #[test]
    fn test_observers_run_in_order_after_persist() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&log);
        let probe = Rc::clone(&storage);
        vars.declare(Variable::float("speed", 0.5).with_observer(Box::new(move |_, value| {
            let durable = probe.read("globals/vars").unwrap().unwrap_or_default();
            first.borrow_mut().push(format!("first {} durable={}", value, durable.contains(&value.to_string())));
        })))
        .unwrap();
        let second = Rc::clone(&log);
        vars.add_observer("speed", Box::new(move |name, _| {
            second.borrow_mut().push(format!("second {}", name));
        }))
        .unwrap();
        log.borrow_mut().clear();

        vars.set_value("speed", Value::Float(0.25)).unwrap();

        assert_eq!(
            log.borrow().as_slice(),
            &["first 0.25 durable=true".to_string(), "second speed".to_string()]
        );
    }

    #[test]
    fn test_failed_persist_rejects_mutation() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);
        vars.declare(Variable::bool("enabled", true)).unwrap();

        storage.set_fail_writes(true);
        let err = vars.set_value("enabled", Value::Bool(false)).unwrap_err();

        assert_eq!(err.error_code(), "PERSISTENCE_FAULT");
        assert!(vars.bool("enabled").unwrap());
    }

    #[test]
    fn test_unknown_variable() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);
        let err = vars.set_value("nope", Value::Bool(true)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_set_serialized_option() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);
        vars.declare(Variable::option("mode", "set", ["set", "add"])).unwrap();

        vars.set_serialized("mode", "add").unwrap();
        assert_eq!(vars.option("mode").unwrap(), "add");
        assert_eq!(vars.serialized("mode").unwrap(), "1");
    }

    #[test]
    fn test_names_keep_declaration_order() {
        let storage = Rc::new(MemoryStorage::new());
        let mut vars = registry(&storage);
        vars.declare(Variable::bool("z", true)).unwrap();
        vars.declare(Variable::bool("a", true)).unwrap();
        vars.declare(Variable::bool("z", false)).unwrap();

        assert_eq!(vars.names(), vec!["z".to_string(), "a".to_string()]);
        assert_eq!(vars.len(), 2);
    }
}
