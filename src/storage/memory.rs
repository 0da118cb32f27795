//! In-memory storage
//!
//! Volatile backend for tests and dry runs. Writes can be made to fail on
//! demand to exercise persistence-fault handling.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Storage;
use crate::error::{LightstackError, Result};

/// Storage held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
    fail_writes: Cell<bool>,
    write_count: Cell<usize>,
}

impl MemoryStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.write_count.get()
    }

    /// Snapshot of every stored path
    pub fn paths(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    fn is_within(key: &str, path: &str) -> bool {
        key == path
            || key
                .strip_prefix(path)
                .map_or(false, |rest| rest.starts_with('/'))
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(path).cloned())
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(LightstackError::Persistence {
                path: PathBuf::from(path),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            });
        }
        self.entries
            .borrow_mut()
            .insert(path.to_string(), contents.to_string());
        self.write_count.set(self.write_count.get() + 1);
        Ok(())
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .entries
            .borrow()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        names.dedup();
        Ok(names)
    }

    fn exists(&self, path: &str) -> bool {
        self.entries
            .borrow()
            .keys()
            .any(|key| Self::is_within(key, path))
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .retain(|key, _| !Self::is_within(key, path));
        Ok(())
    }
}
