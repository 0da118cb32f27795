//! Filesystem-backed storage
//!
//! Each storage path maps to a file below a root directory. Writes go to a
//! sibling temporary file first and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::Storage;
use crate::error::{LightstackError, Result};

/// Suffix of the scratch file used for atomic replacement
const TEMP_SUFFIX: &str = ".tmp";

/// Storage rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create storage rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| LightstackError::Persistence {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self { root })
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl Storage for FsStorage {
    fn read(&self, path: &str) -> Result<Option<String>> {
        let file = self.resolve(path);
        match fs::read_to_string(&file) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LightstackError::Persistence {
                path: file,
                source: e,
            }),
        }
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        let file = self.resolve(path);

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| LightstackError::Persistence {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut temp = file.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        fs::write(&temp, contents).map_err(|e| LightstackError::Persistence {
            path: temp.clone(),
            source: e,
        })?;
        fs::rename(&temp, &file).map_err(|e| LightstackError::Persistence {
            path: file,
            source: e,
        })
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| !name.ends_with(TEMP_SUFFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path);
        let result = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LightstackError::Persistence {
                path: target,
                source: e,
            }),
        }
    }
}
