//! Durable Storage
//!
//! Path-addressed persistence for controller state:
//! - `Storage`: the durable key/value collaborator (filesystem or memory)
//! - `Cache`: one owner's flat map of scalar settings, persisted as a unit

mod cache;
mod fs;
mod memory;

use std::fmt;
use std::rc::Rc;

use crate::error::Result;

pub use cache::{Cache, ChangeHandler};
pub use fs::FsStorage;
pub use memory::MemoryStorage;

/// Durable, path-addressed storage
///
/// Paths are `/`-separated and relative to the storage root. A "directory"
/// exists as long as anything has been written beneath it.
pub trait Storage: fmt::Debug {
    /// Read the contents stored at `path`, or `None` if nothing is there
    fn read(&self, path: &str) -> Result<Option<String>>;

    /// Durably replace the contents at `path`
    ///
    /// Either the whole write lands or the previous contents remain.
    fn write(&self, path: &str, contents: &str) -> Result<()>;

    /// Names of the immediate children below `path`
    fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Whether anything is stored at or below `path`
    fn exists(&self, path: &str) -> bool;

    /// Remove everything at or below `path`
    fn remove(&self, path: &str) -> Result<()>;
}

/// Shared handle to the storage backend
///
/// The controller runs on a single cooperative thread, so a plain `Rc`
/// is sufficient.
pub type SharedStorage = Rc<dyn Storage>;

/// Join two storage path segments
pub fn join(base: &str, child: &str) -> String {
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), child)
    }
}
