//! Stack
//!
//! An ordered collection of layers. After every structural mutation the
//! layer indices are exactly `0..N-1`, and the reversed view used by
//! back-to-front schemes is recomputed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::layer::{Layer, LayerEnv, LayerInfo, LayerInit};
use crate::error::{LightstackError, Result};
use crate::storage::join;

/// Directory below the storage root holding both stacks
pub const STACKS_DIR: &str = "stacks";

/// Name of one of the two stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackName {
    A,
    B,
}

impl StackName {
    pub const ALL: [StackName; 2] = [StackName::A, StackName::B];

    pub fn as_str(self) -> &'static str {
        match self {
            StackName::A => "A",
            StackName::B => "B",
        }
    }

    /// The other stack
    pub fn other(self) -> Self {
        match self {
            StackName::A => StackName::B,
            StackName::B => StackName::A,
        }
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackName {
    type Err = LightstackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" | "a" => Ok(StackName::A),
            "B" | "b" => Ok(StackName::B),
            _ => Err(LightstackError::InvalidSelector {
                selector: s.to_string(),
            }),
        }
    }
}

/// Ordered, index-consistent collection of layers
pub struct Stack {
    name: StackName,
    path: String,
    env: LayerEnv,
    layers: Vec<Layer>,
    reversed: Vec<usize>,
}

impl Stack {
    /// Reconstruct a stack from storage
    ///
    /// Every numeric directory below `stacks/<name>/layers` becomes a layer.
    /// Layers are ordered by their persisted index (ties by id) and then
    /// renumbered contiguously.
    pub fn open(env: LayerEnv, name: StackName) -> Result<Self> {
        let path = join(STACKS_DIR, name.as_str());
        let mut ids: Vec<u32> = Vec::new();
        for child in env.storage.children(&join(&path, "layers"))? {
            match child.parse() {
                Ok(id) => ids.push(id),
                Err(_) => warn!(stack = %name, entry = %child, "ignoring non-layer entry"),
            }
        }
        ids.sort_unstable();

        let mut layers = Vec::with_capacity(ids.len());
        for (position, id) in ids.into_iter().enumerate() {
            layers.push(Layer::open(env.clone(), name.as_str(), &path, id, LayerInit::default(), position)?);
        }
        layers.sort_by_key(|layer| (layer.index(), layer.id()));

        let mut stack = Self {
            name,
            path,
            env,
            layers,
            reversed: Vec::new(),
        };
        stack.reindex()?;
        info!(stack = %name, layers = stack.len(), "stack loaded");
        Ok(stack)
    }

    pub fn name(&self) -> StackName {
        self.name
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in composition order (ascending index)
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layers in composition order, for per-frame rendering
    ///
    /// The slice cannot change membership or order.
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Layers from the highest index down
    pub fn layers_reversed(&self) -> impl Iterator<Item = &Layer> {
        self.reversed.iter().map(move |&i| &self.layers[i])
    }

    /// Layer ids in composition order
    pub fn ids(&self) -> Vec<u32> {
        self.layers.iter().map(Layer::id).collect()
    }

    /// Structural info of every layer, in composition order
    pub fn info(&self) -> Vec<LayerInfo> {
        self.layers.iter().map(Layer::info).collect()
    }

    /// Number of layers that will draw on the next frame
    pub fn active_count(&self) -> usize {
        self.layers.iter().filter(|l| l.is_active() && l.is_bound()).count()
    }

    /// Append a new layer and return its id
    ///
    /// The id is the lowest one not currently in use.
    pub fn add_layer(&mut self, init: LayerInit) -> Result<u32> {
        if let Some(uuid) = &init.shard_uuid {
            if !self.env.shards.contains(uuid) {
                return Err(LightstackError::ShardNotFound { shard: uuid.clone() });
            }
        }

        let id = self.next_id();
        let layer = Layer::open(self.env.clone(), self.name.as_str(), &self.path, id, init, self.layers.len())?;
        self.layers.push(layer);
        self.reindex()?;
        info!(stack = %self.name, layer = id, "layer added");
        Ok(id)
    }

    /// Delete a layer and its persisted storage
    pub fn remove_layer_by_id(&mut self, id: u32) -> Result<()> {
        let position = self.position(id)?;
        self.env.storage.remove(self.layers[position].path())?;
        self.layers.remove(position);
        self.reindex()?;
        info!(stack = %self.name, layer = id, "layer removed");
        Ok(())
    }

    pub fn get_layer_by_id(&self, id: u32) -> Result<&Layer> {
        let position = self.position(id)?;
        Ok(&self.layers[position])
    }

    pub fn get_layer_by_id_mut(&mut self, id: u32) -> Result<&mut Layer> {
        let position = self.position(id)?;
        Ok(&mut self.layers[position])
    }

    /// Move a layer to `index`, clamped to the last position
    pub fn move_layer(&mut self, id: u32, index: usize) -> Result<()> {
        let position = self.position(id)?;
        let layer = self.layers.remove(position);
        let target = index.min(self.layers.len());
        self.layers.insert(target, layer);
        self.reindex()?;
        info!(stack = %self.name, layer = id, index = target, "layer moved");
        Ok(())
    }

    /// Remove every layer
    pub fn clear(&mut self) -> Result<()> {
        while let Some(layer) = self.layers.last() {
            self.env.storage.remove(layer.path())?;
            self.layers.pop();
        }
        self.reindex()?;
        info!(stack = %self.name, "stack cleared");
        Ok(())
    }

    /// Renumber every layer by its position
    ///
    /// All layers are renumbered even if one durable write fails; the first
    /// failure is returned.
    fn reindex(&mut self) -> Result<()> {
        let mut first_error = None;
        for (index, layer) in self.layers.iter_mut().enumerate() {
            if let Err(e) = layer.set_index(index) {
                warn!(layer = %layer.label(), error = %e, "index not persisted");
                first_error.get_or_insert(e);
            }
        }
        self.reversed = (0..self.layers.len()).rev().collect();
        first_error.map_or(Ok(()), Err)
    }

    fn next_id(&self) -> u32 {
        let used: std::collections::HashSet<u32> = self.layers.iter().map(Layer::id).collect();
        (0..).find(|id| !used.contains(id)).unwrap_or(0)
    }

    fn position(&self, id: u32) -> Result<usize> {
        self.layers
            .iter()
            .position(|layer| layer.id() == id)
            .ok_or_else(|| LightstackError::LayerNotFound {
                id: format!("{}/{}", self.name, id),
            })
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("layers", &self.layers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn indices(stack: &Stack) -> Vec<usize> {
        stack.layers().iter().map(Layer::index).collect()
    }

    #[test]
    fn test_add_allocates_lowest_unused_id() {
        let storage = Rc::new(MemoryStorage::new());
        let mut stack = Stack::open(env(&storage), StackName::A).unwrap();

        assert_eq!(stack.add_layer(LayerInit::shard("solid")).unwrap(), 0);
        assert_eq!(stack.add_layer(LayerInit::shard("solid")).unwrap(), 1);
        assert_eq!(stack.add_layer(LayerInit::shard("solid")).unwrap(), 2);
        stack.remove_layer_by_id(1).unwrap();
        assert_eq!(stack.add_layer(LayerInit::shard("blink")).unwrap(), 1);

        assert_eq!(stack.ids(), vec![0, 2, 1]);
        assert_eq!(indices(&stack), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_reindexes_and_deletes_storage() {
        let storage = Rc::new(MemoryStorage::new());
        let mut stack = Stack::open(env(&storage), StackName::B).unwrap();
        for _ in 0..4 {
            stack.add_layer(LayerInit::shard("solid")).unwrap();
        }

        stack.remove_layer_by_id(0).unwrap();
        stack.remove_layer_by_id(2).unwrap();

        assert_eq!(stack.ids(), vec![1, 3]);
        assert_eq!(indices(&stack), vec![0, 1]);
        assert!(!storage.exists("stacks/B/layers/0"));
        assert!(!storage.exists("stacks/B/layers/2"));
        let info = storage.read("stacks/B/layers/3/info").unwrap().unwrap();
        assert!(info.contains("\"index\":1"));
    }

    #[test]
    fn test_unknown_layer_and_shard() {
        let storage = Rc::new(MemoryStorage::new());
        let mut stack = Stack::open(env(&storage), StackName::A).unwrap();

        assert!(stack.get_layer_by_id(7).unwrap_err().is_not_found());
        assert!(stack.remove_layer_by_id(7).unwrap_err().is_not_found());
        let err = stack.add_layer(LayerInit::shard("nope")).unwrap_err();
        assert_eq!(err.error_code(), "SHARD_NOT_FOUND");
        assert!(stack.is_empty());
    }

    #[test]
    fn test_move_layer() {
        let storage = Rc::new(MemoryStorage::new());
        let mut stack = Stack::open(env(&storage), StackName::A).unwrap();
        for _ in 0..3 {
            stack.add_layer(LayerInit::shard("solid")).unwrap();
        }

        stack.move_layer(0, 9).unwrap();
        assert_eq!(stack.ids(), vec![1, 2, 0]);
        stack.move_layer(2, 0).unwrap();
        assert_eq!(stack.ids(), vec![2, 1, 0]);
        assert_eq!(indices(&stack), vec![0, 1, 2]);

        let reversed: Vec<u32> = stack.layers_reversed().map(Layer::id).collect();
        assert_eq!(reversed, vec![0, 1, 2]);
    }

    #[test]
    fn test_reconstruct_sorted_by_persisted_index() {
        let storage = Rc::new(MemoryStorage::new());
        {
            let mut stack = Stack::open(env(&storage), StackName::A).unwrap();
            for _ in 0..3 {
                stack.add_layer(LayerInit::shard("solid")).unwrap();
            }
            stack.move_layer(2, 0).unwrap();
        }

        let stack = Stack::open(env(&storage), StackName::A).unwrap();
        assert_eq!(stack.ids(), vec![2, 0, 1]);
        assert_eq!(indices(&stack), vec![0, 1, 2]);
    }

    #[test]
    fn test_clear() {
        let storage = Rc::new(MemoryStorage::new());
        let mut stack = Stack::open(env(&storage), StackName::A).unwrap();
        stack.add_layer(LayerInit::shard("solid")).unwrap();
        stack.add_layer(LayerInit::default()).unwrap();

        stack.clear().unwrap();

        assert!(stack.is_empty());
        assert!(!storage.exists("stacks/A/layers"));
    }

    #[test]
    fn test_stack_name_parse() {
        assert_eq!("A".parse::<StackName>().unwrap(), StackName::A);
        assert_eq!("b".parse::<StackName>().unwrap(), StackName::B);
        assert!("C".parse::<StackName>().is_err());
        assert_eq!(StackName::A.other(), StackName::B);
    }
}
