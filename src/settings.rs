use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogFormat;
use crate::storage::{resolve_cache_dir, CacheStore, DEFAULT_NAMESPACE};

/// Tool settings (loaded from `magictask.toml`)
///
/// These control where state is kept and how logs look. Task arguments live
/// in the separate task configuration, see [`crate::Config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub log: LogConfig,
}

/// Return value cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Cache root; `MAGICTASK_CACHE_DIR` or the user cache directory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Subdirectory of the cache root, also names the marker directories
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty, compact, json; picked from the environment when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}


impl Settings {
    /// Load settings from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;

        let settings: Settings = toml::from_str(&content).with_context(|| {
            format!("Failed to parse settings file: {}", path.as_ref().display())
        })?;

        settings
            .validate()
            .with_context(|| format!("Invalid settings file: {}", path.as_ref().display()))?;
        Ok(settings)
    }

    /// Generate example settings as TOML string
    pub fn example() -> Result<String> {
        let settings = Settings {
            cache: CacheSettings {
                dir: Some(PathBuf::from(".magictask/cache")),
                namespace: default_namespace(),
            },
            log: LogConfig {
                level: "debug".to_string(),
                format: Some("compact".to_string()),
            },
        };

        toml::to_string_pretty(&settings).context("Failed to serialize example settings")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        let namespace = &self.cache.namespace;
        if namespace.is_empty() {
            anyhow::bail!("cache.namespace must be set");
        }
        if namespace.starts_with('.') {
            anyhow::bail!("cache.namespace must not start with '.': {namespace}");
        }
        if namespace.contains(['/', '\\']) {
            anyhow::bail!("cache.namespace must not contain path separators: {namespace}");
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.log.level.as_str()) {
            anyhow::bail!("log.level must be one of: trace, debug, info, warn, error");
        }

        if let Some(format) = &self.log.format {
            format.parse::<LogFormat>().map_err(anyhow::Error::msg)?;
        }

        Ok(())
    }

    /// Store for return values; `explicit_dir` wins over the settings file
    pub fn cache_store(&self, explicit_dir: Option<PathBuf>) -> CacheStore {
        let root = resolve_cache_dir(explicit_dir.or_else(|| self.cache.dir.clone()));
        CacheStore::new(root, self.cache.namespace.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.cache.namespace, "magictask");
        assert_eq!(settings.cache.dir, None);
        assert_eq!(settings.log.format, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_namespace() {
        for bad in ["", ".hidden", "a/b"] {
            let mut settings = Settings::default();
            settings.cache.namespace = bad.to_string();
            assert!(settings.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_invalid_log_format() {
        let mut settings = Settings::default();
        settings.log.format = Some("xml".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_file_and_example() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("magictask.toml");
        fs::write(&path, Settings::example().unwrap()).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.log.level, "debug");

        let store = settings.cache_store(None);
        assert_eq!(store.root(), Path::new(".magictask/cache"));

        let store = settings.cache_store(Some(temp.path().to_path_buf()));
        assert_eq!(store.root(), temp.path());
        assert_eq!(store.namespace(), "magictask");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("magictask.toml");
        fs::write(&path, "[log]\nformat = \"json\"\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.log.format.as_deref(), Some("json"));
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.cache.namespace, "magictask");
    }
}
