/// Return value storage and retrieval
///
/// One JSON envelope per call digest, grouped by task:
/// `<root>/<namespace>/<task>/<digest>.json`.
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

use super::call::CallInfo;
use crate::error::{Error, Result};
use crate::logging::{operations, status};
use crate::storage::{CachePath, CacheStore};

const ENVELOPE_VERSION: u32 = 1;
const ENTRY_EXTENSION: &str = "json";

/// Cache entry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    pub task: String,
    pub digest: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    metadata: CacheMetadata,
    value: Value,
}

/// Cache entry found on disk
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub metadata: CacheMetadata,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_tasks: usize,
    pub total_entries: usize,
    pub total_size_bytes: u64,
}

/// Return value cache manager
#[derive(Debug, Clone)]
pub struct ReturnValueCache {
    store: CacheStore,
}

impl ReturnValueCache {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn entry_path(&self, call: &CallInfo) -> Result<CachePath> {
        let dir = self.store.task_dir(&call.name)?;
        Ok(CachePath::new(
            dir.path().join(format!("{}.{ENTRY_EXTENSION}", call.digest())),
        ))
    }

    /// Load the value saved for this exact call
    ///
    /// Returns `Ok(None)` when nothing was saved.
    pub fn load<R: DeserializeOwned>(&self, call: &CallInfo) -> Result<Option<R>> {
        let entry = self.entry_path(call)?;
        let Some(bytes) = entry.read_bytes()? else {
            return Ok(None);
        };
        debug!(
            task = call.name.as_str(),
            operation = operations::LOAD,
            path = %entry.path().display(),
            "loading return value"
        );

        let envelope: Envelope =
            serde_json::from_slice(&bytes).map_err(|e| Error::ReturnValue {
                task: call.name.clone(),
                source: e,
            })?;
        serde_json::from_value(envelope.value)
            .map(Some)
            .map_err(|e| Error::ReturnValue {
                task: call.name.clone(),
                source: e,
            })
    }

    /// Save the return value of a finished run
    pub fn save<R: Serialize>(&self, call: &CallInfo, fingerprint: &str, value: &R) -> Result<()> {
        let entry = self.entry_path(call)?;
        let save_error = |source: crate::error::BoxError| Error::CacheSave {
            task: call.name.clone(),
            path: entry.path().to_path_buf(),
            source,
        };

        let value = serde_json::to_value(value).map_err(|e| save_error(e.into()))?;
        let envelope = Envelope {
            metadata: CacheMetadata {
                version: ENVELOPE_VERSION,
                task: call.name.clone(),
                digest: call.digest(),
                fingerprint: fingerprint.to_string(),
                created_at: Utc::now(),
            },
            value,
        };
        let json = serde_json::to_vec_pretty(&envelope).map_err(|e| save_error(e.into()))?;
        entry.write_bytes(&json).map_err(|e| save_error(e.into()))?;

        debug!(
            task = call.name.as_str(),
            operation = operations::SAVE,
            status = status::SUCCESS,
            path = %entry.path().display(),
            "saved return value"
        );
        Ok(())
    }

    /// Remove every saved value of a task; returns the number of entries removed
    pub fn remove_task(&self, task: &str) -> Result<usize> {
        let dir = self.store.task_dir(task)?;
        let count = self.entries(task)?.len();
        dir.rm()?;
        Ok(count)
    }

    /// Tasks that have at least one saved value, sorted
    pub fn list_tasks(&self) -> Result<Vec<String>> {
        let base = self.store.base_dir();
        let mut tasks = Vec::new();

        if !base.exists() {
            return Ok(tasks);
        }

        let read_dir = fs::read_dir(&base).map_err(|e| {
            Error::io(
                format!("Failed to read cache directory: {}", base.display()),
                e,
            )
        })?;
        for entry in read_dir {
            let entry = entry
                .map_err(|e| Error::io(format!("Failed to read {}", base.display()), e))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    tasks.push(name.to_string());
                }
            }
        }

        tasks.sort();
        Ok(tasks)
    }

    /// Entries of one task, oldest first; unreadable files are skipped
    pub fn entries(&self, task: &str) -> Result<Vec<CacheEntry>> {
        let dir = self.store.task_dir(task)?;
        let mut entries = Vec::new();

        if !dir.exists() {
            return Ok(entries);
        }

        for entry in WalkDir::new(dir.path())
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION)
            {
                continue;
            }

            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            match serde_json::from_slice::<Envelope>(&bytes) {
                Ok(envelope) => entries.push(CacheEntry {
                    metadata: envelope.metadata,
                    path: path.to_path_buf(),
                    size_bytes: bytes.len() as u64,
                }),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable entry"),
            }
        }

        entries.sort_by_key(|e| e.metadata.created_at);
        Ok(entries)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        let base = self.store.base_dir();

        if !base.exists() {
            return Ok(stats);
        }

        stats.total_tasks = self.list_tasks()?.len();
        for entry in WalkDir::new(&base)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            stats.total_entries += 1;
            stats.total_size_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }

        Ok(stats)
    }

    /// Remove every saved value in the namespace; returns the number of tasks removed
    pub fn clean_all(&self) -> Result<usize> {
        let count = self.list_tasks()?.len();
        CachePath::new(self.store.base_dir()).rm()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::args::Arguments;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn call(name: &str, input: &str) -> CallInfo {
        CallInfo {
            name: name.to_string(),
            args: Arguments::default(),
            input_paths: vec![PathBuf::from(input)],
            output_paths: vec![PathBuf::from("out.txt")],
            flags: vec![("mode".to_string(), json!("fast"))],
            version: None,
        }
    }

    fn cache(temp: &TempDir) -> ReturnValueCache {
        ReturnValueCache::new(CacheStore::new(temp.path(), "magictask"))
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let c = call("ages", "names.txt");

        assert_eq!(cache.load::<Vec<u32>>(&c).unwrap(), None);

        cache.save(&c, "fp", &vec![7u32, 12, 40]).unwrap();
        assert_eq!(cache.load::<Vec<u32>>(&c).unwrap(), Some(vec![7, 12, 40]));

        let path = cache.entry_path(&c).unwrap();
        assert!(path
            .path()
            .starts_with(temp.path().join("magictask").join("ages")));

        // A different call of the same task has its own entry
        assert_eq!(cache.load::<Vec<u32>>(&call("ages", "other.txt")).unwrap(), None);
    }

    #[test]
    fn test_load_with_wrong_type_is_an_error() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let c = call("ages", "names.txt");

        cache.save(&c, "fp", &"text").unwrap();
        assert!(matches!(
            cache.load::<u32>(&c),
            Err(Error::ReturnValue { .. })
        ));
    }

    #[test]
    fn test_unserializable_value_is_cache_save_error() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let c = call("pairs", "in.txt");

        let mut value = HashMap::new();
        value.insert((1u32, 2u32), 3u32);

        let err = cache.save(&c, "fp", &value).unwrap_err();
        assert!(matches!(err, Error::CacheSave { ref task, .. } if task == "pairs"));
        assert!(!cache.entry_path(&c).unwrap().exists());
    }

    #[test]
    fn test_list_entries_stats_and_clean() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        cache.save(&call("a", "1"), "fp1", &1).unwrap();
        cache.save(&call("a", "2"), "fp2", &2).unwrap();
        cache.save(&call("b", "1"), "fp3", &3).unwrap();

        assert_eq!(cache.list_tasks().unwrap(), vec!["a", "b"]);

        let entries = cache.entries("a").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.metadata.task == "a"));
        assert!(entries.iter().any(|e| e.metadata.fingerprint == "fp2"));

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.total_entries, 3);
        assert!(stats.total_size_bytes > 0);

        assert_eq!(cache.remove_task("a").unwrap(), 2);
        assert_eq!(cache.list_tasks().unwrap(), vec!["b"]);

        assert_eq!(cache.clean_all().unwrap(), 1);
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn test_task_names_cannot_leave_the_namespace() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let neighbour = temp.path().join("other_namespace/keep.txt");
        CachePath::new(neighbour.clone()).write_bytes(b"keep").unwrap();

        for name in ["..", "../other_namespace", ""] {
            assert!(matches!(
                cache.remove_task(name),
                Err(Error::InvalidTaskName { .. })
            ));
            assert!(cache.entries(name).is_err());
        }
        assert!(neighbour.exists());

        let escaping = call("../../escaped", "in.txt");
        assert!(matches!(
            cache.save(&escaping, "fp", &1),
            Err(Error::InvalidTaskName { .. })
        ));
        assert!(!temp.path().parent().unwrap().join("escaped").exists());
    }
}
