// Common test utilities shared across acceptance tests
//
// ## Test Isolation Strategy
//
// Every test gets its own workspace directory for inputs and outputs and its
// own cache directory for saved return values. Nothing is written to the
// user's cache directory, so tests can run in parallel.
//
// mtimes are set explicitly instead of sleeping between writes, which keeps
// staleness decisions deterministic on filesystems with coarse timestamps.

#![allow(dead_code)]

use assert_cmd::Command;
use magictask::CacheStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Isolated directories for one test
pub struct TestWorkspace {
    temp_dir: TempDir,
    cache_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create workspace dir"),
            cache_dir: TempDir::new().expect("Failed to create cache dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    pub fn cache_path(&self) -> &Path {
        self.cache_dir.path()
    }

    pub fn store(&self) -> CacheStore {
        CacheStore::new(self.cache_path(), "magictask")
    }

    /// Write a file and backdate it so outputs written later are newer
    pub fn create_input(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        set_age(&file_path, Duration::from_secs(3600));
        file_path
    }

    pub fn read_file(&self, path: &str) -> String {
        fs::read_to_string(self.join(path)).unwrap()
    }

    /// The CLI binary pointed at this workspace's cache
    pub fn magictask(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_magictask"));
        cmd.env("MAGICTASK_CACHE_DIR", self.cache_path())
            .env_remove("MAGICTASK_SETTINGS")
            .env_remove("RUST_LOG")
            .current_dir(self.path());
        cmd
    }
}

/// Set a file's mtime to `age` before now
pub fn set_age(path: &Path, age: Duration) {
    set_mtime(path, SystemTime::now() - age);
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}
