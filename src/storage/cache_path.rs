use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// A single persisted file or directory
///
/// Thin wrapper over a path that turns I/O failures into [`Error::Io`] with
/// the path in the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePath {
    path: PathBuf,
}

impl CachePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the whole file, `None` when it does not exist
    pub fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(
                format!("Failed to read {}", self.path.display()),
                e,
            )),
        }
    }

    /// Replace the file contents, creating parent directories
    ///
    /// Writes go through a temporary file in the same directory, so a reader
    /// never sees a half-written file.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| {
            Error::io(
                format!("Failed to create directory {}", parent.display()),
                e,
            )
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            Error::io(
                format!("Failed to create temporary file in {}", parent.display()),
                e,
            )
        })?;
        temp.write_all(bytes)
            .map_err(|e| Error::io(format!("Failed to write {}", self.path.display()), e))?;
        temp.persist(&self.path).map_err(|e| {
            Error::io(format!("Failed to persist {}", self.path.display()), e.error)
        })?;
        Ok(())
    }

    pub fn modified(&self) -> Result<SystemTime> {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(format!("Failed to get mtime: {}", self.path.display()), e))
    }

    /// Remove the file or directory tree; returns whether anything was removed
    pub fn rm(&self) -> Result<bool> {
        let metadata = match fs::symlink_metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(Error::io(
                    format!("Failed to stat {}", self.path.display()),
                    e,
                ))
            }
        };

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_file(&self.path)
        };

        match removed {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(
                format!("Failed to remove {}", self.path.display()),
                e,
            )),
        }
    }
}

impl AsRef<Path> for CachePath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Root under which persistent return values are kept
///
/// Layout: `<root>/<namespace>/<segment>/...`. The namespace also names the
/// hidden marker directory placed next to output files (`.<namespace>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    root: PathBuf,
    namespace: String,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.into(),
        }
    }

    /// Store under the default cache directory and namespace
    pub fn default_location() -> Self {
        Self::new(super::resolve_cache_dir(None), super::DEFAULT_NAMESPACE)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Directory holding everything in this namespace
    pub fn base_dir(&self) -> PathBuf {
        self.root.join(&self.namespace)
    }

    /// Name of the marker directory created next to output files
    pub fn marker_dir_name(&self) -> String {
        format!(".{}", self.namespace)
    }

    /// Namespaced path built from segments
    pub fn path<I, S>(&self, segments: I) -> CachePath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut path = self.base_dir();
        for segment in segments {
            path.push(segment);
        }
        CachePath::new(path)
    }

    /// Directory holding the saved values of one task
    ///
    /// Fails for names that are not a single plain path segment.
    pub fn task_dir(&self, task: &str) -> Result<CachePath> {
        validate_task_name(task).map_err(|reason| Error::InvalidTaskName {
            name: task.to_string(),
            reason,
        })?;
        Ok(self.path([task]))
    }
}

/// Task names become directory names under the namespace
pub fn validate_task_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("task names can't be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err("task names can't be '.' or '..'".to_string());
    }
    if name.contains(['/', '\\', '\0']) {
        return Err("task names can't contain path separators or NUL".to_string());
    }
    Ok(())
}
