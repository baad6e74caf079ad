//! Named task registry
//!
//! A [`Collection`] owns tasks of different return types behind the
//! type-erased [`Invoke`] trait, holds the default configuration its tasks
//! see, and dispatches calls by name.
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::context::{Config, Context};
use crate::error::{Error, Result};
use crate::storage::CacheStore;
use crate::task::{CallArgs, CallOutcome, Signature, Task, TaskBuilder};

/// A task callable through a collection, with its value as JSON
pub trait Invoke: Send + Sync {
    fn name(&self) -> &str;

    fn signature(&self) -> &Signature;

    fn cli_signature(&self) -> Signature;

    fn invoke(&self, ctx: Option<&Context>, args: CallArgs) -> Result<CallOutcome<Value>>;
}

impl<R> Invoke for Task<R>
where
    R: Serialize + DeserializeOwned,
{
    fn name(&self) -> &str {
        Task::name(self)
    }

    fn signature(&self) -> &Signature {
        Task::signature(self)
    }

    fn cli_signature(&self) -> Signature {
        Task::cli_signature(self)
    }

    fn invoke(&self, ctx: Option<&Context>, args: CallArgs) -> Result<CallOutcome<Value>> {
        let to_json = |value: R| {
            serde_json::to_value(value).map_err(|e| Error::ReturnValue {
                task: self.name().to_string(),
                source: e,
            })
        };
        Ok(match self.call(ctx, args)? {
            CallOutcome::Ran(value) => CallOutcome::Ran(to_json(value)?),
            CallOutcome::Cached(value) => CallOutcome::Cached(to_json(value)?),
            CallOutcome::Cleaned(report) => CallOutcome::Cleaned(report),
        })
    }
}

/// Something tasks can be registered with
pub trait Registrar {
    /// Register a task as built
    fn add_task<R>(&mut self, task: Task<R>) -> Result<&mut Self>
    where
        R: Serialize + DeserializeOwned + 'static;

    /// Register a task with argument derivation and skipping switched on
    fn add_magic_task<R>(&mut self, builder: TaskBuilder<R>) -> Result<&mut Self>
    where
        R: Serialize + DeserializeOwned + 'static;
}

/// Tasks by name plus the configuration they run against
pub struct Collection {
    tasks: BTreeMap<String, Box<dyn Invoke>>,
    defaults: Config,
    store: CacheStore,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new(CacheStore::default_location())
    }
}

impl Collection {
    /// Empty collection whose magic tasks save return values in `store`
    pub fn new(store: CacheStore) -> Self {
        Self {
            tasks: BTreeMap::new(),
            defaults: Config::new(),
            store,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Deep-merge `values` into the default configuration
    pub fn configure(&mut self, values: Value) -> anyhow::Result<&mut Self> {
        if !values.is_object() {
            anyhow::bail!("Collection configuration must be a table, got {values}");
        }
        self.defaults.merge(&values);
        Ok(self)
    }

    pub fn defaults(&self) -> &Config {
        &self.defaults
    }

    /// Fresh context built from the default configuration
    pub fn context(&self) -> Context {
        Context::new(self.defaults.clone())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Invoke> {
        self.tasks.get(name).map(|t| t.as_ref())
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Call a task by name
    pub fn invoke(
        &self,
        name: &str,
        ctx: Option<&Context>,
        args: CallArgs,
    ) -> Result<CallOutcome<Value>> {
        let task = self.get(name).ok_or_else(|| Error::UnknownTask {
            name: name.to_string(),
        })?;
        debug!(task = name, "invoking");
        task.invoke(ctx, args)
    }

    /// Relaxed descriptors of every task, by name
    pub fn cli_signatures(&self) -> Vec<(String, Signature)> {
        self.tasks
            .iter()
            .map(|(name, task)| (name.clone(), task.cli_signature()))
            .collect()
    }

    fn insert(&mut self, task: Box<dyn Invoke>) -> Result<&mut Self> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(Error::definition(&name, "a task with this name is already registered"));
        }
        self.tasks.insert(name, task);
        Ok(self)
    }
}

impl Registrar for Collection {
    fn add_task<R>(&mut self, task: Task<R>) -> Result<&mut Self>
    where
        R: Serialize + DeserializeOwned + 'static,
    {
        self.insert(Box::new(task))
    }

    fn add_magic_task<R>(&mut self, builder: TaskBuilder<R>) -> Result<&mut Self>
    where
        R: Serialize + DeserializeOwned + 'static,
    {
        let task = builder
            .derive_params()
            .skippable()
            .cache_store(self.store.clone())
            .build()?;
        self.insert(Box::new(task))
    }
}
