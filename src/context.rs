/// Execution context and nested task configuration
///
/// A `Context` is the first thing every task receives. It carries a nested
/// configuration tree that can be addressed by dotted paths such as
/// `ctx.people.names_path`.
use anyhow::{anyhow, Context as _, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Root tokens accepted at the start of a dotted context path
pub const CONTEXT_ROOTS: &[&str] = &["ctx", "c"];

/// Raised when a dotted path does not exist in the configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("key '{key}' not found while traversing '{path}'")]
pub struct LookupError {
    pub path: String,
    pub key: String,
}

/// A validated dotted path into the context (`ctx`, `ctx.people`, `c.a.b`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CtxPath {
    raw: String,
    keys: Vec<String>,
}

impl CtxPath {
    /// Parse a dotted path, requiring a context root token
    pub fn parse(path: &str) -> std::result::Result<Self, String> {
        if path.ends_with('.') {
            return Err(format!(
                "Path {path:?} can't end in '.'! Try 'ctx' instead of 'ctx.'."
            ));
        }

        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        if !CONTEXT_ROOTS.contains(&root) {
            return Err(format!(
                "Path {path:?} into ctx must start with 'ctx.' or 'c.'"
            ));
        }

        let keys: Vec<String> = segments.map(str::to_string).collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(format!("Path {path:?} contains an empty segment"));
        }

        Ok(Self {
            raw: path.to_string(),
            keys,
        })
    }

    /// Build the default path for a task name (`ctx.<task name>`)
    pub fn for_task(task_name: &str) -> std::result::Result<Self, String> {
        Self::parse(&format!("ctx.{task_name}"))
    }

    /// Keys below the root token
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for CtxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Nested configuration tree (always a table at the root)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap an existing JSON value; the root must be a table
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(anyhow!("Configuration root must be a table, got {value}"));
        }
        Ok(Self { root: value })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let value: Value = toml::from_str(content).context("Failed to parse TOML configuration")?;
        Self::from_value(value)
    }

    /// Load task configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read configuration: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration: {}", path.as_ref().display()))
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Traverse a context path, failing on the first missing key
    pub fn lookup(&self, path: &CtxPath) -> std::result::Result<&Value, LookupError> {
        let mut current = &self.root;
        for key in path.keys() {
            let next = match current {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| LookupError {
                path: path.to_string(),
                key: key.clone(),
            })?;
        }
        Ok(current)
    }

    /// Set a value at dotted `key` (no root token), creating tables on the way
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let keys: Vec<&str> = key.split('.').collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(anyhow!("Invalid configuration key: {key:?}"));
        }

        let (last, parents) = keys.split_last().ok_or_else(|| anyhow!("Empty key"))?;
        let mut current = &mut self.root;
        for part in parents {
            let map = current
                .as_object_mut()
                .ok_or_else(|| anyhow!("Cannot set {key:?}: '{part}' is not inside a table"))?;
            current = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        let map = current
            .as_object_mut()
            .ok_or_else(|| anyhow!("Cannot set {key:?}: parent is not a table"))?;
        map.insert(last.to_string(), value);
        Ok(())
    }

    /// Apply a `key=value` override; the value is parsed as JSON when possible
    pub fn set_override(&mut self, assignment: &str) -> Result<()> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("Override must look like key=value, got {assignment:?}"))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        self.set(key.trim(), value)
    }

    /// Deep-merge `other` into this tree; tables merge, everything else replaces
    pub fn merge(&mut self, other: &Value) {
        merge_values(&mut self.root, other);
    }
}

fn merge_values(target: &mut Value, other: &Value) {
    match (target, other) {
        (Value::Object(target_map), Value::Object(other_map)) => {
            for (key, value) in other_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, other) => *target = other.clone(),
    }
}

/// Ambient execution state handed to every task
#[derive(Debug, Clone, Default)]
pub struct Context {
    config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Look up a dotted context path and clone the value
    ///
    /// Handy inside dynamic defaults: `|ctx| ctx.get("ctx.build.dir")`.
    pub fn get(&self, path: &str) -> Result<Value> {
        let path = CtxPath::parse(path).map_err(|e| anyhow!(e))?;
        Ok(self.config.lookup(&path)?.clone())
    }
}
