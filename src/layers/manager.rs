//! Stack Manager
//!
//! Owns stacks `A` and `B` and the persisted pointer naming the active one.
//! The inactive stack is free to be edited as staging; `switch()` cuts over
//! with a single durable write.

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{info, warn};

use super::layer::LayerEnv;
use super::stack::{Stack, StackName, STACKS_DIR};
use crate::error::{LightstackError, Result};
use crate::storage::{join, Cache};

const KEY_ACTIVE: &str = "active";

/// Manager state reported to the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StackManagerInfo {
    pub active: StackName,
}

/// The double-buffered pair of stacks
#[derive(Debug)]
pub struct StackManager {
    a: Stack,
    b: Stack,
    info: Cache,
    active: StackName,
}

impl StackManager {
    /// Load both stacks and the active pointer (default `A`)
    pub fn open(env: LayerEnv) -> Result<Self> {
        let mut initial = Map::new();
        initial.insert(KEY_ACTIVE.to_string(), json!(StackName::A.as_str()));
        let info = Cache::open(env.storage.clone(), join(STACKS_DIR, "info"), initial, None)?;

        let active = match info.get(KEY_ACTIVE).ok().and_then(JsonValue::as_str) {
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!(active = %name, "unknown active stack, using A");
                StackName::A
            }),
            None => StackName::A,
        };

        let a = Stack::open(env.clone(), StackName::A)?;
        let b = Stack::open(env, StackName::B)?;
        info!(active = %active, "stack manager ready");
        Ok(Self { a, b, info, active })
    }

    /// Name of the stack currently rendered
    pub fn active_name(&self) -> StackName {
        self.active
    }

    /// Make the inactive stack active and return its name
    ///
    /// The stacks' contents are not inspected.
    pub fn switch(&mut self) -> Result<StackName> {
        let next = self.active.other();
        self.activate(next)?;
        Ok(next)
    }

    /// Make `name` the active stack
    pub fn activate(&mut self, name: StackName) -> Result<()> {
        self.info.set(KEY_ACTIVE, name.as_str())?;
        self.active = name;
        info!(active = %name, "active stack changed");
        Ok(())
    }

    /// Resolve `active`, `inactive`, `A` or `B`
    pub fn get(&self, selector: &str) -> Result<&Stack> {
        let name = self.resolve(selector)?;
        Ok(self.stack(name))
    }

    pub fn get_mut(&mut self, selector: &str) -> Result<&mut Stack> {
        let name = self.resolve(selector)?;
        Ok(self.stack_mut(name))
    }

    pub fn stack(&self, name: StackName) -> &Stack {
        match name {
            StackName::A => &self.a,
            StackName::B => &self.b,
        }
    }

    pub fn stack_mut(&mut self, name: StackName) -> &mut Stack {
        match name {
            StackName::A => &mut self.a,
            StackName::B => &mut self.b,
        }
    }

    pub fn active(&self) -> &Stack {
        self.stack(self.active)
    }

    pub fn active_mut(&mut self) -> &mut Stack {
        self.stack_mut(self.active)
    }

    pub fn inactive(&self) -> &Stack {
        self.stack(self.active.other())
    }

    pub fn stacks(&self) -> [StackName; 2] {
        StackName::ALL
    }

    pub fn info(&self) -> StackManagerInfo {
        StackManagerInfo { active: self.active }
    }

    fn resolve(&self, selector: &str) -> Result<StackName> {
        match selector {
            "active" => Ok(self.active),
            "inactive" => Ok(self.active.other()),
            other => other.parse().map_err(|_| LightstackError::InvalidSelector {
                selector: selector.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerInit;
    use crate::logsink::TracingLogSink;
    use crate::shard::ShardRegistry;
    use crate::storage::{MemoryStorage, Storage};
    use std::rc::Rc;

    fn env(storage: &Rc<MemoryStorage>) -> LayerEnv {
        LayerEnv {
            storage: storage.clone(),
            shards: Rc::new(ShardRegistry::with_builtins()),
            log: Rc::new(TracingLogSink),
        }
    }

    #[test]
    fn test_defaults_to_a() {
        let storage = Rc::new(MemoryStorage::new());
        let manager = StackManager::open(env(&storage)).unwrap();

        assert_eq!(manager.active_name(), StackName::A);
        assert_eq!(storage.read("stacks/info").unwrap().unwrap(), "{\"active\":\"A\"}");
    }

    #[test]
    fn test_switch_is_one_write_and_persists() {
        let storage = Rc::new(MemoryStorage::new());
        let mut manager = StackManager::open(env(&storage)).unwrap();
        let writes = storage.write_count();

        assert_eq!(manager.switch().unwrap(), StackName::B);
        assert_eq!(storage.write_count(), writes + 1);
        assert_eq!(manager.get("active").unwrap().name(), StackName::B);
        assert_eq!(manager.get("inactive").unwrap().name(), StackName::A);

        let reopened = StackManager::open(env(&storage)).unwrap();
        assert_eq!(reopened.active_name(), StackName::B);
    }

    #[test]
    fn test_failed_switch_keeps_active() {
        let storage = Rc::new(MemoryStorage::new());
        let mut manager = StackManager::open(env(&storage)).unwrap();
        storage.set_fail_writes(true);

        assert!(manager.switch().is_err());
        assert_eq!(manager.active_name(), StackName::A);
    }

    #[test]
    fn test_invalid_selector() {
        let storage = Rc::new(MemoryStorage::new());
        let manager = StackManager::open(env(&storage)).unwrap();

        let err = manager.get("middle").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SELECTOR");
        assert!(manager.get("B").is_ok());
    }

    #[test]
    fn test_staging_on_inactive() {
        let storage = Rc::new(MemoryStorage::new());
        let mut manager = StackManager::open(env(&storage)).unwrap();

        manager
            .get_mut("inactive")
            .unwrap()
            .add_layer(LayerInit::shard("solid"))
            .unwrap();
        assert!(manager.active().is_empty());

        manager.activate(StackName::B).unwrap();
        assert_eq!(manager.active().len(), 1);
        assert!(manager.inactive().is_empty());
    }
}
